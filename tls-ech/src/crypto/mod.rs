use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt::Debug;

use rand_core::{OsRng, RngCore};
use zeroize::Zeroize;

use crate::enums::NamedGroup;
use crate::error::Error;

/// Hashing interfaces.
pub mod hash;

/// Hybrid public key encryption (RFC 9180) interfaces.
pub mod hpke;

/// The default HPKE provider.
pub mod hpke_rs;

/// Hybrid classical + post-quantum KEM schemes.
pub mod hybrid;

/// Key exchange groups for the `key_share` extension.
pub mod kx;

pub use crate::rand::GetRandomFailed;

/// A source of cryptographically secure randomness.
///
/// Every random value the handshake draws (hello randoms, ECH config ids,
/// GREASE filler, key shares, HPKE input keying material) comes from here,
/// so tests can substitute a seeded generator.
pub trait SecureRandom: Send + Sync + Debug {
    /// Fill the given buffer with random bytes.
    fn fill(&self, buf: &mut [u8]) -> Result<(), GetRandomFailed>;
}

/// Randomness from the operating system.
#[derive(Debug, Default)]
pub struct OsRandom;

impl SecureRandom for OsRandom {
    fn fill(&self, buf: &mut [u8]) -> Result<(), GetRandomFailed> {
        OsRng
            .try_fill_bytes(buf)
            .map_err(|_| GetRandomFailed)
    }
}

/// A supported key exchange group.
///
/// This has a TLS-level name expressed using the [`NamedGroup`] enum, and
/// a function which produces a [`ActiveKeyExchange`].
pub trait SupportedKxGroup: Send + Sync + Debug {
    /// Start a key exchange.
    ///
    /// This will prepare an ephemeral secret key in the supported group, and a corresponding
    /// public key. The key exchange can be completed by calling [ActiveKeyExchange#complete]
    /// or discarded.
    ///
    /// # Errors
    ///
    /// This can fail if the random source fails during ephemeral key generation.
    fn start(&self, random: &dyn SecureRandom) -> Result<Box<dyn ActiveKeyExchange>, Error>;

    /// Complete a key exchange against the peer's share in one step.
    ///
    /// This is the server side: for a KEM group the returned public key is the
    /// ciphertext to send back.
    fn start_and_complete(
        &self,
        peer_pub_key: &[u8],
        random: &dyn SecureRandom,
    ) -> Result<CompletedKeyExchange, Error> {
        let kx = self.start(random)?;
        Ok(CompletedKeyExchange {
            group: kx.group(),
            pub_key: kx.pub_key().to_vec(),
            secret: kx.complete(peer_pub_key)?,
        })
    }

    /// Named group the SupportedKxGroup operates in.
    fn name(&self) -> NamedGroup;
}

/// An in-progress key exchange originating from a `SupportedKxGroup`.
pub trait ActiveKeyExchange: Send + Sync {
    /// Completes the key exchange, given the peer's public key.
    ///
    /// The shared secret is returned as a [`SharedSecret`] which can be constructed
    /// from a `&[u8]`.
    ///
    /// This consumes and so terminates the [`ActiveKeyExchange`].
    fn complete(self: Box<Self>, peer_pub_key: &[u8]) -> Result<SharedSecret, Error>;

    /// Return the public key being used.
    fn pub_key(&self) -> &[u8];

    /// Return the group being used.
    fn group(&self) -> NamedGroup;
}

/// The result from [`SupportedKxGroup::start_and_complete`].
pub struct CompletedKeyExchange {
    /// Which group was used.
    pub group: NamedGroup,

    /// Our key share (sometimes a public key).
    pub pub_key: Vec<u8>,

    /// The computed shared secret.
    pub secret: SharedSecret,
}

/// The result from `ActiveKeyExchange::complete` as a value.
pub struct SharedSecret(Vec<u8>);

impl SharedSecret {
    /// Returns the shared secret as a slice of bytes.
    pub fn secret_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Drop for SharedSecret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl From<&[u8]> for SharedSecret {
    fn from(source: &[u8]) -> Self {
        Self(source.to_vec())
    }
}

impl From<Vec<u8>> for SharedSecret {
    fn from(buf: Vec<u8>) -> Self {
        Self(buf)
    }
}

impl Debug for SharedSecret {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("SharedSecret")
            .finish_non_exhaustive()
    }
}
