//! The single place where we generate random material for our own use.

use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use rand_core::{CryptoRng, RngCore};

use crate::crypto::SecureRandom;

/// Make a [`Vec<u8>`] of the given size containing random material.
pub(crate) fn random_vec(
    secure_random: &dyn SecureRandom,
    len: usize,
) -> Result<Vec<u8>, GetRandomFailed> {
    let mut v = vec![0; len];
    secure_random.fill(&mut v)?;
    Ok(v)
}

/// Return a uniformly random [`u8`].
pub(crate) fn random_u8(secure_random: &dyn SecureRandom) -> Result<u8, GetRandomFailed> {
    let mut buf = [0u8; 1];
    secure_random.fill(&mut buf)?;
    Ok(buf[0])
}

/// Return 32 random bytes, e.g. for a hello `random` field.
pub(crate) fn random_array(
    secure_random: &dyn SecureRandom,
) -> Result<[u8; 32], GetRandomFailed> {
    let mut buf = [0u8; 32];
    secure_random.fill(&mut buf)?;
    Ok(buf)
}

/// Random material generation failed.
#[derive(Debug)]
pub struct GetRandomFailed;

impl fmt::Display for GetRandomFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("failed to get random bytes")
    }
}

impl std::error::Error for GetRandomFailed {}

/// Presents a [`SecureRandom`] as a `rand_core` generator, for KEM crates
/// that take one.
///
/// A failure of the underlying source panics inside `fill_bytes`, as
/// `rand_core` requires; `try_fill_bytes` reports it instead.
pub(crate) struct RngAdapter<'a>(pub(crate) &'a dyn SecureRandom);

impl RngCore for RngAdapter<'_> {
    fn next_u32(&mut self) -> u32 {
        let mut buf = [0u8; 4];
        self.fill_bytes(&mut buf);
        u32::from_le_bytes(buf)
    }

    fn next_u64(&mut self) -> u64 {
        let mut buf = [0u8; 8];
        self.fill_bytes(&mut buf);
        u64::from_le_bytes(buf)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        if self.0.fill(dest).is_err() {
            panic!("secure random source failed");
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.0
            .fill(dest)
            .map_err(rand_core::Error::new)
    }
}

impl CryptoRng for RngAdapter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::OsRandom;

    #[derive(Debug)]
    struct Broken;

    impl SecureRandom for Broken {
        fn fill(&self, _: &mut [u8]) -> Result<(), GetRandomFailed> {
            Err(GetRandomFailed)
        }
    }

    #[test]
    fn random_vec_has_requested_length() {
        assert_eq!(random_vec(&OsRandom, 37).unwrap().len(), 37);
        assert!(random_vec(&Broken, 1).is_err());
    }

    #[test]
    fn adapter_reports_failure() {
        let mut buf = [0u8; 8];
        assert!(RngAdapter(&Broken)
            .try_fill_bytes(&mut buf)
            .is_err());
        assert!(RngAdapter(&OsRandom)
            .try_fill_bytes(&mut buf)
            .is_ok());
    }
}
