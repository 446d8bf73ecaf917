//! Key derivation: Argon2id password → cipher key

use argon2::{Argon2, Params, Version};
use secrecy::{ExposeSecret, SecretSlice};

use chto_core::{ChtoError, ChtoResult};

use crate::keys::CipherKey;
use crate::random::random_array;
use crate::{KEY_SIZE, SALT_SIZE};

/// Argon2id parameters for KDF.
///
/// These are part of the on-disk format: a container can only be opened with
/// the parameters it was sealed with, so they change only with a version bump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB
    pub mem_cost_kib: u32,
    /// Time cost / iterations
    pub time_cost: u32,
    /// Parallelism
    pub parallelism: u32,
}

impl KdfParams {
    /// Format version 1: 32 MiB, 3 passes, 4 lanes.
    pub const V1: Self = Self {
        mem_cost_kib: 32 * 1024,
        time_cost: 3,
        parallelism: 4,
    };
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::V1
    }
}

/// A fresh random salt for one container.
pub fn generate_salt() -> ChtoResult<[u8; SALT_SIZE]> {
    random_array()
}

/// Derive a 256-bit cipher key from a password and salt using Argon2id.
pub fn derive_key(
    password: &SecretSlice<u8>,
    salt: &[u8; SALT_SIZE],
    params: &KdfParams,
) -> ChtoResult<CipherKey> {
    let argon2_params = Params::new(
        params.mem_cost_kib,
        params.time_cost,
        params.parallelism,
        Some(KEY_SIZE),
    )
    .map_err(|e| ChtoError::KeyDerivation(format!("invalid Argon2id params: {e}")))?;

    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key = [0u8; KEY_SIZE];
    argon2
        .hash_password_into(password.expose_secret(), salt, &mut key)
        .map_err(|e| ChtoError::KeyDerivation(format!("Argon2id failed: {e}")))?;

    Ok(CipherKey::from_bytes(key))
}
