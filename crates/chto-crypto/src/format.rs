//! Container header codec
//!
//! ```text
//! offset  size  field
//! 0       8     magic
//! 8       1     version
//! 9       1     flags (bit0 = compressed)
//! 10      1     algorithm id (1 = AES-256-GCM, 2 = ChaCha20-Poly1305, 3 = cascade)
//! 11      16    Argon2id salt
//! 27      12    initial chunk nonce
//! ```
//!
//! Every constant of the layout lives in a [`FormatPolicy`] value that is
//! passed into the codec, so tests can run several format versions side by
//! side without touching global state.

use std::io::{self, Read};

use bitflags::bitflags;
use tracing::warn;

use chto_core::{Algorithm, ChtoError, ChtoResult};

use crate::kdf::{generate_salt, KdfParams};
use crate::random::random_array;
use crate::{NONCE_SIZE, SALT_SIZE, TAG_SIZE};

/// Header length of format version 1.
pub const HEADER_LEN: usize = 8 + 1 + 1 + 1 + SALT_SIZE + NONCE_SIZE;

/// Largest plaintext chunk whose sealed form still fits the 2-byte length
/// prefix.
pub const MAX_CHUNK_SIZE: usize = u16::MAX as usize - TAG_SIZE;

bitflags! {
    /// Header flag bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Flags: u8 {
        /// Plaintext was zstd-compressed before padding.
        const COMPRESSED = 1 << 0;
    }
}

/// Everything that is fixed by a format version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatPolicy {
    pub magic: [u8; 8],
    /// Version written into new containers and the newest one accepted.
    pub version: u8,
    /// Plaintext bytes per sealed chunk (at most [`MAX_CHUNK_SIZE`]).
    pub chunk_size: usize,
    pub kdf: KdfParams,
}

impl FormatPolicy {
    pub const V1: Self = Self {
        magic: *b"CHFRMT03",
        version: 1,
        chunk_size: MAX_CHUNK_SIZE,
        kdf: KdfParams::V1,
    };

    pub fn current() -> Self {
        Self::V1
    }

    pub fn header_len(&self) -> usize {
        HEADER_LEN
    }
}

impl Default for FormatPolicy {
    fn default() -> Self {
        Self::current()
    }
}

/// Non-fatal findings while parsing a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatWarning {
    /// The container was written by an older format version.
    LegacyVersion { found: u8, current: u8 },
}

impl std::fmt::Display for FormatWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LegacyVersion { found, current } => write!(
                f,
                "container uses format version {found}, older than current version {current}"
            ),
        }
    }
}

/// A parsed container header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub flags: Flags,
    pub algorithm: Algorithm,
    pub salt: [u8; SALT_SIZE],
    pub nonce: [u8; NONCE_SIZE],
}

impl Header {
    pub fn new(
        policy: &FormatPolicy,
        algorithm: Algorithm,
        flags: Flags,
        salt: [u8; SALT_SIZE],
        nonce: [u8; NONCE_SIZE],
    ) -> Self {
        Self {
            version: policy.version,
            flags,
            algorithm,
            salt,
            nonce,
        }
    }

    /// A header with a fresh random salt and initial nonce.
    pub fn generate(policy: &FormatPolicy, algorithm: Algorithm, flags: Flags) -> ChtoResult<Self> {
        Ok(Self::new(
            policy,
            algorithm,
            flags,
            generate_salt()?,
            random_array()?,
        ))
    }

    pub fn encode(&self, policy: &FormatPolicy) -> Vec<u8> {
        let mut out = Vec::with_capacity(policy.header_len());
        out.extend_from_slice(&policy.magic);
        out.push(self.version);
        out.push(self.flags.bits());
        out.push(self.algorithm.id());
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(&self.nonce);
        out
    }

    /// Parse exactly `policy.header_len()` bytes.
    pub fn decode(bytes: &[u8], policy: &FormatPolicy) -> ChtoResult<Self> {
        if bytes.len() < policy.header_len() {
            return Err(ChtoError::format(format!(
                "truncated header: {} bytes (expected {})",
                bytes.len(),
                policy.header_len()
            )));
        }

        let (magic, rest) = bytes.split_at(policy.magic.len());
        if magic != policy.magic {
            return Err(ChtoError::format("bad magic number"));
        }

        let version = rest[0];
        if version > policy.version {
            return Err(ChtoError::Version {
                found: version,
                supported: policy.version,
            });
        }
        if version < policy.version {
            warn!(
                found = version,
                current = policy.version,
                "reading container written by an older format version"
            );
        }

        let flags = Flags::from_bits(rest[1])
            .ok_or_else(|| ChtoError::format(format!("unknown header flags {:#04x}", rest[1])))?;
        let algorithm = Algorithm::from_id(rest[2])?;

        let rest = &rest[3..];
        let mut salt = [0u8; SALT_SIZE];
        salt.copy_from_slice(&rest[..SALT_SIZE]);
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&rest[SALT_SIZE..SALT_SIZE + NONCE_SIZE]);

        Ok(Self {
            version,
            flags,
            algorithm,
            salt,
            nonce,
        })
    }

    /// Read and parse a header from the front of a stream.
    pub fn read_from<R: Read + ?Sized>(reader: &mut R, policy: &FormatPolicy) -> ChtoResult<Self> {
        let mut buf = vec![0u8; policy.header_len()];
        reader.read_exact(&mut buf).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                ChtoError::format("truncated header")
            } else {
                ChtoError::from(e)
            }
        })?;
        Self::decode(&buf, policy)
    }

    /// The warning this header raises under `policy`, if any.
    pub fn warning(&self, policy: &FormatPolicy) -> Option<FormatWarning> {
        (self.version < policy.version).then_some(FormatWarning::LegacyVersion {
            found: self.version,
            current: policy.version,
        })
    }

    pub fn is_compressed(&self) -> bool {
        self.flags.contains(Flags::COMPRESSED)
    }
}
