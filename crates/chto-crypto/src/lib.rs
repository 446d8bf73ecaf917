//! chto-crypto: password-based file encryption into a self-describing container
//!
//! Pipeline: plaintext → zstd compress (optional) → random padding → chunked AEAD seal
//!
//! Container layout (format version 1):
//! ```text
//! [8 bytes: magic "CHFRMT03"][1: version][1: flags][1: algorithm id]
//! [16 bytes: Argon2id salt][12 bytes: initial nonce]
//! repeated: [2 bytes BE: sealed length][ciphertext + 16-byte tag]
//! ```
//!
//! Key hierarchy:
//! ```text
//! Password
//!   ├── single layer: Argon2id(password, salt) → AES-256-GCM or ChaCha20-Poly1305 key
//!   └── cascade: HKDF-SHA256(password, info="chiffrement-cascade") → inner ‖ outer sub-passwords
//!       ├── Argon2id(inner, salt) → AES-256-GCM key      (inner container)
//!       └── Argon2id(outer, salt) → ChaCha20-Poly1305 key (outer container)
//! ```

pub mod aead;
pub mod cascade;
pub mod compress;
pub mod engine;
pub mod format;
pub mod kdf;
pub mod keys;
pub mod padding;
pub mod random;
pub mod stream;

pub use aead::AeadCipher;
pub use cascade::{MAX_LAYERS, OpenedContainer, SealReport};
pub use engine::{decrypt, encrypt, DecryptReport, EncryptOptions, Engine};
pub use format::{Flags, FormatPolicy, FormatWarning, Header};
pub use kdf::{derive_key, KdfParams};
pub use keys::{derive_sub_passwords, CipherKey};
pub use padding::{add_padding, remove_padding};
pub use stream::{ChunkOpener, ChunkSealer, NonceCounter};

pub use chto_core::{Algorithm, ChtoError, ChtoResult, Cipher};

/// Size of a derived cipher key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of the Argon2id salt stored in the header
pub const SALT_SIZE: usize = 16;

/// Size of an AES-GCM / ChaCha20-Poly1305 nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of a GCM / Poly1305 authentication tag
pub const TAG_SIZE: usize = 16;
