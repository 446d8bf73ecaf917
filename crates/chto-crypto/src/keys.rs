//! Key material: derived cipher keys and cascade sub-password expansion

use hkdf::Hkdf;
use secrecy::{ExposeSecret, SecretSlice};
use sha2::Sha256;
use zeroize::Zeroize;

use chto_core::{ChtoError, ChtoResult};

use crate::KEY_SIZE;

/// HKDF info label separating cascade sub-passwords from any other use of
/// the password.
pub const CASCADE_INFO: &[u8] = b"chiffrement-cascade";

/// Length of each cascade sub-password in bytes.
pub const SUB_PASSWORD_SIZE: usize = 32;

/// A 256-bit AEAD key. Zeroized on drop.
#[derive(Clone)]
pub struct CipherKey {
    bytes: [u8; KEY_SIZE],
}

impl CipherKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for CipherKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Expand a master password into independent `(inner, outer)` sub-passwords
/// via HKDF-SHA256.
///
/// The inner password is the first 32 bytes of output, the outer the next 32.
/// Each is then run through Argon2id with the container salt.
pub fn derive_sub_passwords(
    master: &SecretSlice<u8>,
) -> ChtoResult<(SecretSlice<u8>, SecretSlice<u8>)> {
    let hkdf = Hkdf::<Sha256>::new(None, master.expose_secret());
    let mut okm = [0u8; 2 * SUB_PASSWORD_SIZE];
    hkdf.expand(CASCADE_INFO, &mut okm)
        .map_err(|e| ChtoError::KeyDerivation(format!("HKDF expand failed: {e}")))?;

    let inner = SecretSlice::from(okm[..SUB_PASSWORD_SIZE].to_vec());
    let outer = SecretSlice::from(okm[SUB_PASSWORD_SIZE..].to_vec());
    okm.zeroize();

    Ok((inner, outer))
}
