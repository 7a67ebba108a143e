use alloc::boxed::Box;
use alloc::vec::Vec;

use x25519_dalek::{PublicKey, StaticSecret};

use crate::crypto::hybrid::{curve_id_to_hybrid_scheme, HybridPrivateKey, HybridScheme};
use crate::crypto::{
    ActiveKeyExchange, CompletedKeyExchange, SecureRandom, SharedSecret, SupportedKxGroup,
};
use crate::enums::NamedGroup;
use crate::error::{Error, PeerMisbehaved};
use crate::rand::random_array;

/// X25519 (RFC 7748).
pub static X25519: &dyn SupportedKxGroup = &X25519Group;

/// X25519MLKEM768, a hybrid of X25519 and ML-KEM-768.
pub static X25519MLKEM768: &dyn SupportedKxGroup = &HybridGroup(HybridScheme::X25519MLKEM768);

/// X25519Kyber768Draft00, a hybrid of X25519 and round-3 Kyber768.
pub static X25519KYBER768DRAFT00: &dyn SupportedKxGroup =
    &HybridGroup(HybridScheme::X25519Kyber768Draft00);

/// A list of all the key exchange groups supported by this crate.
pub static ALL_KX_GROUPS: &[&dyn SupportedKxGroup] =
    &[X25519MLKEM768, X25519, X25519KYBER768DRAFT00];

/// The group implementation for `name`: its hybrid scheme when it has one,
/// plain X25519 for `X25519`, and `None` otherwise.
pub fn find_kx_group(name: NamedGroup) -> Option<&'static dyn SupportedKxGroup> {
    match curve_id_to_hybrid_scheme(name) {
        Some(HybridScheme::X25519MLKEM768) => Some(X25519MLKEM768),
        Some(HybridScheme::X25519Kyber768Draft00) => Some(X25519KYBER768DRAFT00),
        None if name == NamedGroup::X25519 => Some(X25519),
        None => None,
    }
}

#[derive(Debug)]
struct X25519Group;

impl SupportedKxGroup for X25519Group {
    fn start(&self, random: &dyn SecureRandom) -> Result<Box<dyn ActiveKeyExchange>, Error> {
        let priv_key = StaticSecret::from(random_array(random)?);
        let pub_key = PublicKey::from(&priv_key);
        Ok(Box::new(X25519Active { priv_key, pub_key }))
    }

    fn name(&self) -> NamedGroup {
        NamedGroup::X25519
    }
}

struct X25519Active {
    priv_key: StaticSecret,
    pub_key: PublicKey,
}

impl ActiveKeyExchange for X25519Active {
    fn complete(self: Box<Self>, peer_pub_key: &[u8]) -> Result<SharedSecret, Error> {
        let peer: [u8; 32] = peer_pub_key
            .try_into()
            .map_err(|_| Error::from(PeerMisbehaved::InvalidKeyShare))?;
        let shared = self
            .priv_key
            .diffie_hellman(&PublicKey::from(peer));
        if !shared.was_contributory() {
            return Err(PeerMisbehaved::InvalidKeyShare.into());
        }
        Ok(SharedSecret::from(&shared.as_bytes()[..]))
    }

    fn pub_key(&self) -> &[u8] {
        self.pub_key.as_bytes()
    }

    fn group(&self) -> NamedGroup {
        NamedGroup::X25519
    }
}

#[derive(Debug)]
struct HybridGroup(HybridScheme);

impl SupportedKxGroup for HybridGroup {
    fn start(&self, random: &dyn SecureRandom) -> Result<Box<dyn ActiveKeyExchange>, Error> {
        let (pub_key, priv_key) = self.0.generate_key_pair(random)?;
        Ok(Box::new(HybridActive {
            scheme: self.0,
            priv_key,
            pub_key,
        }))
    }

    fn start_and_complete(
        &self,
        peer_pub_key: &[u8],
        random: &dyn SecureRandom,
    ) -> Result<CompletedKeyExchange, Error> {
        let (ciphertext, secret) = self.0.encapsulate(peer_pub_key, random)?;
        Ok(CompletedKeyExchange {
            group: self.name(),
            pub_key: ciphertext,
            secret,
        })
    }

    fn name(&self) -> NamedGroup {
        crate::crypto::hybrid::scheme_to_curve_id(self.0)
    }
}

struct HybridActive {
    scheme: HybridScheme,
    priv_key: HybridPrivateKey,
    pub_key: Vec<u8>,
}

impl ActiveKeyExchange for HybridActive {
    fn complete(self: Box<Self>, peer_pub_key: &[u8]) -> Result<SharedSecret, Error> {
        self.scheme
            .decapsulate(&self.priv_key, peer_pub_key)
    }

    fn pub_key(&self) -> &[u8] {
        &self.pub_key
    }

    fn group(&self) -> NamedGroup {
        crate::crypto::hybrid::scheme_to_curve_id(self.scheme)
    }
}
