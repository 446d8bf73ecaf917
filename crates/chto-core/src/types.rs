use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ChtoError;

/// A single AEAD primitive selectable for single-layer encryption.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cipher {
    /// AES-256-GCM
    #[default]
    #[serde(rename = "aes", alias = "aes-256-gcm")]
    Aes256Gcm,
    /// ChaCha20-Poly1305
    #[serde(rename = "chacha", alias = "chacha20-poly1305")]
    ChaCha20Poly1305,
}

impl fmt::Display for Cipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aes256Gcm => f.write_str("AES-256-GCM"),
            Self::ChaCha20Poly1305 => f.write_str("ChaCha20-Poly1305"),
        }
    }
}

/// Algorithm id stored in a container header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Algorithm {
    Aes256Gcm = 1,
    ChaCha20Poly1305 = 2,
    /// Two nested layers: an AES-256-GCM container sealed again under
    /// ChaCha20-Poly1305.
    Cascade = 3,
}

impl Algorithm {
    /// Cipher used by the inner layer of a cascade.
    pub const CASCADE_INNER: Cipher = Cipher::Aes256Gcm;

    /// Cipher used by the outer layer of a cascade.
    pub const CASCADE_OUTER: Cipher = Cipher::ChaCha20Poly1305;

    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Result<Self, ChtoError> {
        match id {
            1 => Ok(Self::Aes256Gcm),
            2 => Ok(Self::ChaCha20Poly1305),
            3 => Ok(Self::Cascade),
            other => Err(ChtoError::UnsupportedAlgorithm(other)),
        }
    }

    /// The cipher that seals the layer carrying this id. For `Cascade` that
    /// is the outer layer.
    pub fn layer_cipher(self) -> Cipher {
        match self {
            Self::Aes256Gcm => Cipher::Aes256Gcm,
            Self::ChaCha20Poly1305 => Cipher::ChaCha20Poly1305,
            Self::Cascade => Self::CASCADE_OUTER,
        }
    }
}

impl From<Cipher> for Algorithm {
    fn from(cipher: Cipher) -> Self {
        match cipher {
            Cipher::Aes256Gcm => Self::Aes256Gcm,
            Cipher::ChaCha20Poly1305 => Self::ChaCha20Poly1305,
        }
    }
}

impl TryFrom<u8> for Algorithm {
    type Error = ChtoError;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        Self::from_id(id)
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aes256Gcm => Cipher::Aes256Gcm.fmt(f),
            Self::ChaCha20Poly1305 => Cipher::ChaCha20Poly1305.fmt(f),
            Self::Cascade => write!(f, "cascade ({} + {})", Self::CASCADE_INNER, Self::CASCADE_OUTER),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_algorithm_ids_are_stable() {
        assert_eq!(Algorithm::Aes256Gcm.id(), 1);
        assert_eq!(Algorithm::ChaCha20Poly1305.id(), 2);
        assert_eq!(Algorithm::Cascade.id(), 3);

        for id in 1..=3 {
            assert_eq!(Algorithm::from_id(id).unwrap().id(), id);
        }
    }

    #[test]
    fn test_unknown_algorithm_id() {
        for id in [0u8, 4, 0xFF] {
            match Algorithm::try_from(id) {
                Err(ChtoError::UnsupportedAlgorithm(found)) => assert_eq!(found, id),
                other => panic!("expected UnsupportedAlgorithm, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_cascade_outer_layer_is_chacha() {
        assert_eq!(Algorithm::Cascade.layer_cipher(), Cipher::ChaCha20Poly1305);
        assert_eq!(Algorithm::CASCADE_INNER, Cipher::Aes256Gcm);
        assert_eq!(Algorithm::Aes256Gcm.layer_cipher(), Cipher::Aes256Gcm);
    }
}
