//! Hybrid key encapsulation: X25519 combined with a post-quantum KEM.
//!
//! Two code points are known:
//!
//! - [X25519MLKEM768] (`0x11ec`): ML-KEM-768 (FIPS 203) first, then X25519,
//!   in shares, ciphertexts and the shared secret.
//! - [X25519Kyber768Draft00] (`0x6399`): X25519 first, then round-3
//!   Kyber768.
//!
//! [X25519MLKEM768]: <https://datatracker.ietf.org/doc/draft-kwiatkowski-tls-ecdhe-mlkem/>
//! [X25519Kyber768Draft00]: <https://datatracker.ietf.org/doc/draft-tls-westerbaan-xyber768d00/>

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

use fips203::ml_kem_768;
use fips203::traits::{Decaps, Encaps, KeyGen, SerDes};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::crypto::{SecureRandom, SharedSecret};
use crate::enums::NamedGroup;
use crate::error::{Error, PeerMisbehaved};
use crate::rand::{random_array, RngAdapter};

/// A hybrid KEM scheme usable as a TLS key exchange group.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HybridScheme {
    /// X25519 with round-3 Kyber768, classical half first.
    X25519Kyber768Draft00,
    /// X25519 with ML-KEM-768, post-quantum half first.
    X25519MLKEM768,
}

/// The named groups that map to a hybrid scheme.
static HYBRID_GROUPS: &[(NamedGroup, HybridScheme)] = &[
    (
        NamedGroup::X25519Kyber768Draft00,
        HybridScheme::X25519Kyber768Draft00,
    ),
    (NamedGroup::X25519MLKEM768, HybridScheme::X25519MLKEM768),
];

/// The hybrid scheme for `group`, or `None` when `group` is not hybrid.
///
/// Callers fall back to plain X25519 on `None`.
pub fn curve_id_to_hybrid_scheme(group: NamedGroup) -> Option<HybridScheme> {
    HYBRID_GROUPS
        .iter()
        .find(|(g, _)| *g == group)
        .map(|(_, scheme)| *scheme)
}

/// The named group carrying `scheme`.
pub fn scheme_to_curve_id(scheme: HybridScheme) -> NamedGroup {
    match scheme {
        HybridScheme::X25519Kyber768Draft00 => NamedGroup::X25519Kyber768Draft00,
        HybridScheme::X25519MLKEM768 => NamedGroup::X25519MLKEM768,
    }
}

impl HybridScheme {
    /// The length of a combined public key (a ClientHello share).
    pub fn public_key_len(&self) -> usize {
        PQ_ENCAP_LEN + X25519_LEN
    }

    /// The length of a combined ciphertext (a ServerHello share).
    pub fn ciphertext_len(&self) -> usize {
        PQ_CIPHERTEXT_LEN + X25519_LEN
    }

    /// Generate a fresh key pair, returning the combined public key.
    pub fn generate_key_pair(
        &self,
        random: &dyn SecureRandom,
    ) -> Result<(Vec<u8>, HybridPrivateKey), Error> {
        let x25519 = StaticSecret::from(random_array(random)?);
        let x25519_pub = PublicKey::from(&x25519);

        let mut rng = RngAdapter(random);
        let (pq_pub, pq) = match self {
            Self::X25519MLKEM768 => {
                let (ek, dk) = ml_kem_768::KG::try_keygen_with_rng(&mut rng)
                    .map_err(|_| Error::FailedToGetRandomBytes)?;
                (ek.into_bytes().to_vec(), PqDecapsKey::MlKem768(Box::new(dk)))
            }
            Self::X25519Kyber768Draft00 => {
                let keys = pqc_kyber::keypair(&mut rng).map_err(|_| Error::FailedToGetRandomBytes)?;
                (
                    keys.public.to_vec(),
                    PqDecapsKey::Kyber768(Zeroizing::new(keys.secret.to_vec())),
                )
            }
        };

        let public = self.combine(x25519_pub.as_bytes(), &pq_pub);
        Ok((
            public,
            HybridPrivateKey {
                scheme: *self,
                x25519,
                pq,
            },
        ))
    }

    /// Encapsulate to a peer's combined public key.
    ///
    /// Returns the combined ciphertext and the combined shared secret.
    pub fn encapsulate(
        &self,
        peer_public: &[u8],
        random: &dyn SecureRandom,
    ) -> Result<(Vec<u8>, SharedSecret), Error> {
        if peer_public.len() != self.public_key_len() {
            return Err(INVALID_KEY_SHARE);
        }
        let (x25519_peer, pq_peer) = self.split(peer_public, PQ_ENCAP_LEN);

        let eph = StaticSecret::from(random_array(random)?);
        let eph_pub = PublicKey::from(&eph);
        let x25519_ss = x25519_agree(&eph, x25519_peer)?;

        let mut rng = RngAdapter(random);
        let (pq_ct, pq_ss) = match self {
            Self::X25519MLKEM768 => {
                let mut ek = [0u8; ml_kem_768::EK_LEN];
                ek.copy_from_slice(pq_peer);
                let ek =
                    ml_kem_768::EncapsKey::try_from_bytes(ek).map_err(|_| INVALID_KEY_SHARE)?;
                let (ss, ct) = ek
                    .try_encaps_with_rng(&mut rng)
                    .map_err(|_| Error::FailedToGetRandomBytes)?;
                (ct.into_bytes().to_vec(), Zeroizing::new(ss.into_bytes().to_vec()))
            }
            Self::X25519Kyber768Draft00 => {
                let (ct, ss) =
                    pqc_kyber::encapsulate(pq_peer, &mut rng).map_err(|_| INVALID_KEY_SHARE)?;
                (ct.to_vec(), Zeroizing::new(ss.to_vec()))
            }
        };

        Ok((
            self.combine(eph_pub.as_bytes(), &pq_ct),
            SharedSecret::from(self.combine(x25519_ss.as_slice(), &pq_ss)),
        ))
    }

    /// Decapsulate a peer's combined ciphertext with our private key.
    pub fn decapsulate(
        &self,
        private: &HybridPrivateKey,
        ciphertext: &[u8],
    ) -> Result<SharedSecret, Error> {
        if private.scheme != *self || ciphertext.len() != self.ciphertext_len() {
            return Err(INVALID_KEY_SHARE);
        }
        let (x25519_peer, pq_ct) = self.split(ciphertext, PQ_CIPHERTEXT_LEN);
        let x25519_ss = x25519_agree(&private.x25519, x25519_peer)?;

        let pq_ss = match &private.pq {
            PqDecapsKey::MlKem768(dk) => {
                let mut ct = [0u8; ml_kem_768::CT_LEN];
                ct.copy_from_slice(pq_ct);
                let ct =
                    ml_kem_768::CipherText::try_from_bytes(ct).map_err(|_| INVALID_KEY_SHARE)?;
                let ss = dk
                    .try_decaps(&ct)
                    .map_err(|_| INVALID_KEY_SHARE)?;
                Zeroizing::new(ss.into_bytes().to_vec())
            }
            PqDecapsKey::Kyber768(sk) => {
                let ss = pqc_kyber::decapsulate(pq_ct, sk).map_err(|_| INVALID_KEY_SHARE)?;
                Zeroizing::new(ss.to_vec())
            }
        };

        Ok(SharedSecret::from(self.combine(x25519_ss.as_slice(), &pq_ss)))
    }

    /// Concatenate the classical and post-quantum halves in wire order.
    fn combine(&self, x25519: &[u8], pq: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(x25519.len() + pq.len());
        match self {
            Self::X25519MLKEM768 => {
                out.extend_from_slice(pq);
                out.extend_from_slice(x25519);
            }
            Self::X25519Kyber768Draft00 => {
                out.extend_from_slice(x25519);
                out.extend_from_slice(pq);
            }
        }
        out
    }

    /// Split a combined value into `(x25519, pq)`; `buf` is already length checked.
    fn split<'a>(&self, buf: &'a [u8], pq_len: usize) -> (&'a [u8], &'a [u8]) {
        match self {
            Self::X25519MLKEM768 => {
                let (pq, x25519) = buf.split_at(pq_len);
                (x25519, pq)
            }
            Self::X25519Kyber768Draft00 => buf.split_at(X25519_LEN),
        }
    }
}

/// The private half of a hybrid key pair.
pub struct HybridPrivateKey {
    scheme: HybridScheme,
    x25519: StaticSecret,
    pq: PqDecapsKey,
}

impl HybridPrivateKey {
    /// The scheme this key belongs to.
    pub fn scheme(&self) -> HybridScheme {
        self.scheme
    }
}

impl fmt::Debug for HybridPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HybridPrivateKey")
            .field("scheme", &self.scheme)
            .finish_non_exhaustive()
    }
}

enum PqDecapsKey {
    MlKem768(Box<ml_kem_768::DecapsKey>),
    Kyber768(Zeroizing<Vec<u8>>),
}

fn x25519_agree(secret: &StaticSecret, peer: &[u8]) -> Result<Zeroizing<[u8; 32]>, Error> {
    let mut peer_bytes = [0u8; X25519_LEN];
    peer_bytes.copy_from_slice(peer);
    let shared = secret.diffie_hellman(&PublicKey::from(peer_bytes));
    if !shared.was_contributory() {
        return Err(INVALID_KEY_SHARE);
    }
    Ok(Zeroizing::new(shared.to_bytes()))
}

const INVALID_KEY_SHARE: Error = Error::PeerMisbehaved(PeerMisbehaved::InvalidKeyShare);

const X25519_LEN: usize = 32;
const PQ_CIPHERTEXT_LEN: usize = 1088;
const PQ_ENCAP_LEN: usize = 1184;
