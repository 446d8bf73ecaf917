//! AEAD cipher engine: AES-256-GCM or ChaCha20-Poly1305 behind one type
//!
//! Two modes:
//! - explicit nonce (`seal` / `open`), used by the chunk stream where the
//!   nonce is a counter kept in lock-step by encoder and decoder;
//! - whole-buffer (`seal_buffer` / `open_buffer`), which draws one random
//!   nonce and returns `[12-byte nonce][ciphertext][16-byte tag]`.
//!
//! Tag failures map to `ChtoError::Authentication` and carry no detail: a
//! wrong key and modified ciphertext must look the same to the caller.

use aes_gcm::Aes256Gcm;
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305,
};

use chto_core::{Algorithm, ChtoError, ChtoResult, Cipher};

use crate::keys::CipherKey;
use crate::random::random_array;
use crate::{NONCE_SIZE, TAG_SIZE};

pub enum AeadCipher {
    Aes256Gcm(Box<Aes256Gcm>),
    ChaCha20Poly1305(Box<ChaCha20Poly1305>),
}

impl AeadCipher {
    pub fn new(cipher: Cipher, key: &CipherKey) -> Self {
        match cipher {
            Cipher::Aes256Gcm => Self::Aes256Gcm(Box::new(Aes256Gcm::new(key.as_bytes().into()))),
            Cipher::ChaCha20Poly1305 => {
                Self::ChaCha20Poly1305(Box::new(ChaCha20Poly1305::new(key.as_bytes().into())))
            }
        }
    }

    /// Bind `key` to the engine named by a header algorithm id. The cascade id
    /// selects the outer-layer cipher.
    pub fn for_algorithm_id(id: u8, key: &CipherKey) -> ChtoResult<Self> {
        let algorithm = Algorithm::from_id(id)?;
        Ok(Self::new(algorithm.layer_cipher(), key))
    }

    pub fn cipher(&self) -> Cipher {
        match self {
            Self::Aes256Gcm(_) => Cipher::Aes256Gcm,
            Self::ChaCha20Poly1305(_) => Cipher::ChaCha20Poly1305,
        }
    }

    /// Seal `plaintext` under `nonce`. Returns ciphertext followed by the tag.
    pub fn seal(&self, nonce: &[u8; NONCE_SIZE], plaintext: &[u8]) -> ChtoResult<Vec<u8>> {
        self.seal_with_aad(nonce, &[], plaintext)
    }

    /// Seal `plaintext` under `nonce`, authenticating `aad` alongside it.
    pub fn seal_with_aad(
        &self,
        nonce: &[u8; NONCE_SIZE],
        aad: &[u8],
        plaintext: &[u8],
    ) -> ChtoResult<Vec<u8>> {
        let payload = Payload {
            msg: plaintext,
            aad,
        };
        let sealed = match self {
            Self::Aes256Gcm(c) => c.encrypt(nonce.into(), payload),
            Self::ChaCha20Poly1305(c) => c.encrypt(nonce.into(), payload),
        };
        sealed.map_err(|e| ChtoError::Cipher(format!("{} seal failed: {e}", self.cipher())))
    }

    /// Verify and open `sealed` (ciphertext followed by tag) under `nonce`.
    pub fn open(&self, nonce: &[u8; NONCE_SIZE], sealed: &[u8]) -> ChtoResult<Vec<u8>> {
        self.open_with_aad(nonce, &[], sealed)
    }

    /// Verify and open `sealed`; `aad` must match what it was sealed with.
    pub fn open_with_aad(
        &self,
        nonce: &[u8; NONCE_SIZE],
        aad: &[u8],
        sealed: &[u8],
    ) -> ChtoResult<Vec<u8>> {
        let payload = Payload { msg: sealed, aad };
        let opened = match self {
            Self::Aes256Gcm(c) => c.decrypt(nonce.into(), payload),
            Self::ChaCha20Poly1305(c) => c.decrypt(nonce.into(), payload),
        };
        opened.map_err(|_| ChtoError::Authentication)
    }

    /// Seal a whole buffer under a fresh random nonce.
    ///
    /// Returns: `[12-byte nonce][ciphertext][16-byte tag]`
    pub fn seal_buffer(&self, plaintext: &[u8]) -> ChtoResult<Vec<u8>> {
        let nonce: [u8; NONCE_SIZE] = random_array()?;
        let ciphertext = self.seal(&nonce, plaintext)?;

        let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        result.extend_from_slice(&nonce);
        result.extend_from_slice(&ciphertext);
        Ok(result)
    }

    /// Open the output of [`AeadCipher::seal_buffer`].
    pub fn open_buffer(&self, sealed: &[u8]) -> ChtoResult<Vec<u8>> {
        if sealed.len() < NONCE_SIZE + TAG_SIZE {
            return Err(ChtoError::format(format!(
                "sealed buffer too short: {} bytes (minimum {})",
                sealed.len(),
                NONCE_SIZE + TAG_SIZE
            )));
        }
        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(nonce_bytes);
        self.open(&nonce, ciphertext)
    }
}

impl std::fmt::Debug for AeadCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AeadCipher")
            .field("cipher", &self.cipher())
            .finish_non_exhaustive()
    }
}
