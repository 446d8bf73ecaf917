//! Layer composition: single-layer and two-layer cascade containers
//!
//! A cascade container nests a complete AES-256-GCM container inside a
//! ChaCha20-Poly1305 one:
//! ```text
//! outer header (id = 3, salt S, nonce N1)
//!   └── ChaCha20-Poly1305 chunks, key = Argon2id(outer sub-password, S)
//!         └── inner header (id = 1, salt S, nonce N2)
//!               └── AES-256-GCM chunks, key = Argon2id(inner sub-password, S)
//!                     └── padded (and possibly compressed) plaintext
//! ```
//! Both layers stream: the inner sealer writes straight into the outer one.
//!
//! Opening peels layers in a loop bounded by [`MAX_LAYERS`], so a crafted
//! file that nests cascade containers cannot drive unbounded work.

use std::io::{self, Read, Write};

use secrecy::{ExposeSecret, SecretSlice};
use tracing::debug;

use chto_core::{Algorithm, ChtoError, ChtoResult};

use crate::aead::AeadCipher;
use crate::format::{Flags, FormatPolicy, FormatWarning, Header};
use crate::kdf::derive_key;
use crate::keys::derive_sub_passwords;
use crate::random::random_array;
use crate::stream::{ChunkOpener, ChunkSealer};

/// Outer plus inner layer.
pub const MAX_LAYERS: usize = 2;

/// Outcome of sealing one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealReport {
    pub algorithm: Algorithm,
    /// Chunks written per layer, outermost first.
    pub layer_chunks: Vec<u64>,
}

/// The innermost layer of an opened container, ready to be read.
pub struct OpenedContainer<'a> {
    /// Yields the innermost layer's plaintext (still padded).
    pub reader: ChunkOpener<Box<dyn Read + 'a>>,
    /// Header of the innermost layer; its flags govern unpadding/decompression.
    pub header: Header,
    /// Algorithm ids of every layer, outermost first.
    pub layers: Vec<Algorithm>,
    pub warnings: Vec<FormatWarning>,
}

impl std::fmt::Debug for OpenedContainer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenedContainer")
            .field("header", &self.header)
            .field("layers", &self.layers)
            .field("warnings", &self.warnings)
            .finish_non_exhaustive()
    }
}

/// Write `header` and return a sealer for the layer's payload.
fn begin_layer<W: Write>(
    mut dest: W,
    header: &Header,
    password: &SecretSlice<u8>,
    policy: &FormatPolicy,
) -> ChtoResult<ChunkSealer<W>> {
    let key = derive_key(password, &header.salt, &policy.kdf)?;
    let cipher = AeadCipher::new(header.algorithm.layer_cipher(), &key);
    dest.write_all(&header.encode(policy))?;
    debug!(algorithm = %header.algorithm, "layer header written");
    Ok(ChunkSealer::new(dest, cipher, header.nonce, policy.chunk_size))
}

/// Seal `plaintext` into a container using `algorithm`, writing it to `dest`.
///
/// `plaintext` is expected to be already compressed and padded; both
/// transforms are applied once, never per layer.
pub fn seal<R: Read, W: Write>(
    mut plaintext: R,
    dest: W,
    password: &SecretSlice<u8>,
    algorithm: Algorithm,
    flags: Flags,
    policy: &FormatPolicy,
) -> ChtoResult<SealReport> {
    let header = Header::generate(policy, algorithm, flags)?;

    let layer_chunks = match algorithm {
        Algorithm::Cascade => {
            let (inner_pw, outer_pw) = derive_sub_passwords(password)?;
            let outer = begin_layer(dest, &header, &outer_pw, policy)?;

            let inner_header = Header::new(
                policy,
                Algorithm::from(Algorithm::CASCADE_INNER),
                flags,
                header.salt,
                random_array()?,
            );
            let mut inner = begin_layer(outer, &inner_header, &inner_pw, policy)?;

            io::copy(&mut plaintext, &mut inner)?;
            let (outer, inner_chunks) = inner.finish()?;
            let (_, outer_chunks) = outer.finish()?;
            vec![outer_chunks, inner_chunks]
        }
        _ => {
            let mut layer = begin_layer(dest, &header, password, policy)?;
            io::copy(&mut plaintext, &mut layer)?;
            let (_, chunks) = layer.finish()?;
            vec![chunks]
        }
    };

    Ok(SealReport {
        algorithm,
        layer_chunks,
    })
}

/// Parse and authenticate-on-read every layer of a container down to the
/// innermost plaintext.
///
/// A cascade layer derives its key from the outer sub-password and hands the
/// inner sub-password to the next layer, which is opened with whatever cipher
/// its own header names.
pub fn open<'a, R: Read + 'a>(
    source: R,
    password: &SecretSlice<u8>,
    policy: &FormatPolicy,
) -> ChtoResult<OpenedContainer<'a>> {
    let mut reader: Box<dyn Read + 'a> = Box::new(source);
    let mut layer_password = SecretSlice::from(password.expose_secret().to_vec());
    let mut layers = Vec::with_capacity(MAX_LAYERS);
    let mut warnings = Vec::new();

    for depth in 0..MAX_LAYERS {
        let header = Header::read_from(&mut reader, policy)?;
        warnings.extend(header.warning(policy));
        layers.push(header.algorithm);
        debug!(depth, algorithm = %header.algorithm, "opening layer");

        let key = match header.algorithm {
            Algorithm::Cascade if depth + 1 == MAX_LAYERS => {
                return Err(ChtoError::format(format!(
                    "cascade layer at depth {depth}: nesting exceeds {MAX_LAYERS} layers"
                )));
            }
            Algorithm::Cascade => {
                let (inner_pw, outer_pw) = derive_sub_passwords(&layer_password)?;
                layer_password = inner_pw;
                derive_key(&outer_pw, &header.salt, &policy.kdf)?
            }
            _ => derive_key(&layer_password, &header.salt, &policy.kdf)?,
        };

        let cipher = AeadCipher::new(header.algorithm.layer_cipher(), &key);
        let opener = ChunkOpener::new(reader, cipher, header.nonce);

        if header.algorithm != Algorithm::Cascade {
            return Ok(OpenedContainer {
                reader: opener,
                header,
                layers,
                warnings,
            });
        }
        reader = Box::new(opener);
    }

    Err(ChtoError::format(format!(
        "container nesting exceeds {MAX_LAYERS} layers"
    )))
}
