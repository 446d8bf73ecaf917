//! OS random source for salts, nonces and padding

use rand::rngs::OsRng;
use rand::RngCore;

use chto_core::{ChtoError, ChtoResult};

/// Fill `buf` from the operating system CSPRNG.
pub fn fill_random(buf: &mut [u8]) -> ChtoResult<()> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| ChtoError::Random(e.to_string()))
}

/// A fresh random array, e.g. a salt or an initial nonce.
pub fn random_array<const N: usize>() -> ChtoResult<[u8; N]> {
    let mut bytes = [0u8; N];
    fill_random(&mut bytes)?;
    Ok(bytes)
}
