//! Encrypt/decrypt orchestration over `Read`/`Write`
//!
//! Encrypt: source → zstd (optional) → padding → single layer or cascade seal → dest
//! Decrypt: source → peel layers → unpad → zstd (per innermost flags) → dest
//!
//! Decryption streams plaintext as chunks authenticate. On error `dest` may
//! already hold a prefix of the plaintext; callers must discard it (the CLI
//! writes through a temp file and only persists on success).

use std::io::{self, Read, Write};

use secrecy::SecretSlice;
use tracing::{debug, info};

use chto_core::config::EncryptConfig;
use chto_core::{Algorithm, ChtoError, ChtoResult, Cipher};

use crate::cascade::{self, SealReport};
use crate::compress::{self, Decompressor};
use crate::format::{Flags, FormatPolicy, FormatWarning};
use crate::padding::{Padded, Unpadded};

const COPY_BUF_SIZE: usize = 64 * 1024;

/// Options for one encrypt call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptOptions {
    pub compress: bool,
    /// Single-layer cipher; ignored when `cascade` is set.
    pub cipher: Cipher,
    pub cascade: bool,
    pub compression_level: i32,
}

impl Default for EncryptOptions {
    fn default() -> Self {
        Self {
            compress: false,
            cipher: Cipher::Aes256Gcm,
            cascade: false,
            compression_level: compress::DEFAULT_LEVEL,
        }
    }
}

impl From<&EncryptConfig> for EncryptOptions {
    fn from(config: &EncryptConfig) -> Self {
        Self {
            compress: config.compress,
            cipher: config.cipher,
            cascade: config.cascade,
            compression_level: config.compression_level,
        }
    }
}

impl EncryptOptions {
    pub fn algorithm(&self) -> Algorithm {
        if self.cascade {
            Algorithm::Cascade
        } else {
            Algorithm::from(self.cipher)
        }
    }
}

/// Outcome of one decrypt call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptReport {
    /// Algorithm of every layer, outermost first.
    pub layers: Vec<Algorithm>,
    pub plaintext_bytes: u64,
    pub warnings: Vec<FormatWarning>,
}

/// Container engine bound to one format policy.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    policy: FormatPolicy,
}

impl Engine {
    pub fn new(policy: FormatPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &FormatPolicy {
        &self.policy
    }

    /// Encrypt everything `source` yields into a container written to `dest`.
    pub fn encrypt<R: Read, W: Write>(
        &self,
        source: R,
        dest: W,
        password: &SecretSlice<u8>,
        options: &EncryptOptions,
    ) -> ChtoResult<SealReport> {
        let algorithm = options.algorithm();
        if options.cascade && options.cipher != Cipher::default() {
            debug!(cipher = %options.cipher, "cipher choice ignored in cascade mode");
        }

        let mut flags = Flags::empty();
        if options.compress {
            flags |= Flags::COMPRESSED;
        }

        let report = if options.compress {
            let compressed = compress::compressing_reader(source, options.compression_level)?;
            self.seal_padded(compressed, dest, password, algorithm, flags)?
        } else {
            self.seal_padded(source, dest, password, algorithm, flags)?
        };

        info!(
            algorithm = %report.algorithm,
            compressed = options.compress,
            chunks = ?report.layer_chunks,
            "container sealed"
        );
        Ok(report)
    }

    fn seal_padded<R: Read, W: Write>(
        &self,
        source: R,
        dest: W,
        password: &SecretSlice<u8>,
        algorithm: Algorithm,
        flags: Flags,
    ) -> ChtoResult<SealReport> {
        let padded = Padded::new(source)?;
        cascade::seal(padded, dest, password, algorithm, flags, &self.policy)
    }

    /// Decrypt the container read from `source`, writing plaintext to `dest`.
    ///
    /// Header problems are detected before anything is written.
    pub fn decrypt<R: Read, W: Write>(
        &self,
        source: R,
        dest: W,
        password: &SecretSlice<u8>,
    ) -> ChtoResult<DecryptReport> {
        let opened = cascade::open(source, password, &self.policy)?;
        let compressed = opened.header.is_compressed();
        let unpadded = Unpadded::new(opened.reader);

        let plaintext_bytes = if compressed {
            copy_plaintext(Decompressor::new(unpadded)?, dest)?
        } else {
            copy_plaintext(unpadded, dest)?
        };

        info!(
            layers = ?opened.layers,
            compressed,
            plaintext_bytes,
            "container opened"
        );
        Ok(DecryptReport {
            layers: opened.layers,
            plaintext_bytes,
            warnings: opened.warnings,
        })
    }
}

/// Copy `source` to `dest`, keeping typed errors from the pipeline apart from
/// plain I/O failures on `dest`.
fn copy_plaintext<R: Read, W: Write>(mut source: R, mut dest: W) -> ChtoResult<u64> {
    let mut buf = vec![0u8; COPY_BUF_SIZE];
    let mut total = 0u64;
    loop {
        let n = match source.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ChtoError::from(e)),
        };
        dest.write_all(&buf[..n]).map_err(ChtoError::Io)?;
        total += n as u64;
    }
    dest.flush().map_err(ChtoError::Io)?;
    Ok(total)
}

/// Encrypt with the current format policy.
pub fn encrypt<R: Read, W: Write>(
    source: R,
    dest: W,
    password: &SecretSlice<u8>,
    options: &EncryptOptions,
) -> ChtoResult<SealReport> {
    Engine::default().encrypt(source, dest, password, options)
}

/// Decrypt with the current format policy.
pub fn decrypt<R: Read, W: Write>(
    source: R,
    dest: W,
    password: &SecretSlice<u8>,
) -> ChtoResult<DecryptReport> {
    Engine::default().decrypt(source, dest, password)
}
