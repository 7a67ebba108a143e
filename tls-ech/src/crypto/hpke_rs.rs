//! The default [`HpkeProvider`], backed by hpke-rs and the RustCrypto backend.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt::{Debug, Formatter};

use ::hpke_rs::Mode;
use hpke_rs_crypto::types::{AeadAlgorithm, KdfAlgorithm, KemAlgorithm};
use hpke_rs_crypto::HpkeCrypto;
use hpke_rs_rust_crypto::HpkeRustCrypto;
use zeroize::Zeroizing;

use crate::crypto::hpke::{
    EncapsulatedSecret, Hpke, HpkeAead, HpkeKdf, HpkeKem, HpkeKeyPair, HpkeOpener,
    HpkePrivateKey, HpkeProvider, HpkePublicKey, HpkeSealer, HpkeSuite,
};
use crate::crypto::SecureRandom;
use crate::error::{other_err, Error};
use crate::rand::random_vec;

/// The hpke-rs provider, as a trait object.
pub static HPKE_PROVIDER: &dyn HpkeProvider = &HpkeRs;

/// An HPKE provider backed by hpke-rs and the RustCrypto backend.
///
/// Supports DHKEM(X25519) and DHKEM(P-256), HKDF-SHA256/384/512, and the
/// AES-128-GCM, AES-256-GCM and ChaCha20-Poly1305 AEADs.
#[derive(Debug)]
pub struct HpkeRs;

impl HpkeProvider for HpkeRs {
    fn start(&self, suite: &HpkeSuite) -> Result<Box<dyn Hpke + 'static>, Error> {
        let kem = KemAlgorithm::try_from(u16::from(suite.kem)).map_err(other_err)?;
        Ok(Box::new(HpkeRsInstance {
            suite: *suite,
            kem,
            hpke: ::hpke_rs::Hpke::new(
                Mode::Base,
                kem,
                KdfAlgorithm::try_from(u16::from(suite.sym.kdf_id)).map_err(other_err)?,
                AeadAlgorithm::try_from(u16::from(suite.sym.aead_id)).map_err(other_err)?,
            ),
        }))
    }

    fn supports_kem(&self, kem: HpkeKem) -> bool {
        KemAlgorithm::try_from(u16::from(kem))
            .map(|kem| HpkeRustCrypto::supports_kem(kem).is_ok())
            .unwrap_or(false)
    }

    fn supports_kdf(&self, kdf: HpkeKdf) -> bool {
        KdfAlgorithm::try_from(u16::from(kdf))
            .map(|kdf| HpkeRustCrypto::supports_kdf(kdf).is_ok())
            .unwrap_or(false)
    }

    fn supports_aead(&self, aead: HpkeAead) -> bool {
        AeadAlgorithm::try_from(u16::from(aead))
            .map(|aead| HpkeRustCrypto::supports_aead(aead).is_ok())
            .unwrap_or(false)
    }
}

struct HpkeRsInstance {
    suite: HpkeSuite,
    kem: KemAlgorithm,
    hpke: ::hpke_rs::Hpke<HpkeRustCrypto>,
}

impl Debug for HpkeRsInstance {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HpkeRsInstance")
            .field("suite", &self.suite)
            .finish()
    }
}

impl Hpke for HpkeRsInstance {
    fn setup_sealer(
        &mut self,
        info: &[u8],
        pub_key: &HpkePublicKey,
        random: &dyn SecureRandom,
    ) -> Result<(EncapsulatedSecret, Box<dyn HpkeSealer + 'static>), Error> {
        // Encap(pkR) with skE = DeriveKeyPair(ikm), ikm drawn from `random`.
        let ikm = Zeroizing::new(random_vec(random, self.kem.private_key_len())?);
        let ephemeral = self
            .hpke
            .derive_key_pair(&ikm)
            .map_err(other_err)?;
        let enc = ephemeral.public_key().as_slice().to_vec();
        let dh = Zeroizing::new(
            HpkeRustCrypto::kem_derive(self.kem, &pub_key.0, ephemeral.private_key().as_slice())
                .map_err(other_err)?,
        );

        let mut kem_context = enc.clone();
        kem_context.extend_from_slice(&pub_key.0);
        let shared_secret = Zeroizing::new(self.extract_and_expand(&dh, &kem_context)?);

        let context = self
            .hpke
            .key_schedule(&shared_secret, info, &[], &[])
            .map_err(other_err)?;
        Ok((
            EncapsulatedSecret(enc),
            Box::new(HpkeRsSender { context }),
        ))
    }

    fn setup_opener(
        &mut self,
        enc: &EncapsulatedSecret,
        info: &[u8],
        secret_key: &HpkePrivateKey,
    ) -> Result<Box<dyn HpkeOpener + 'static>, Error> {
        let sk_r = ::hpke_rs::HpkePrivateKey::new(secret_key.secret_bytes().to_vec());
        Ok(Box::new(HpkeRsReceiver {
            context: self
                .hpke
                .setup_receiver(enc.0.as_slice(), &sk_r, info, None, None, None)
                .map_err(other_err)?,
        }))
    }

    fn derive_key_pair(&mut self, ikm: &[u8]) -> Result<HpkeKeyPair, Error> {
        let (private_key, public_key) = self
            .hpke
            .derive_key_pair(ikm)
            .map_err(other_err)?
            .into_keys();
        Ok(HpkeKeyPair {
            public_key: HpkePublicKey(public_key.as_slice().to_vec()),
            private_key: HpkePrivateKey::from(private_key.as_slice().to_vec()),
        })
    }

    fn suite(&self) -> HpkeSuite {
        self.suite
    }
}

impl HpkeRsInstance {
    /// `ExtractAndExpand(dh, kem_context)` of the DH-based KEMs (RFC 9180 section 4.1).
    fn extract_and_expand(&self, dh: &[u8], kem_context: &[u8]) -> Result<Vec<u8>, Error> {
        let kdf = KdfAlgorithm::from(self.kem);
        let suite_id = [&b"KEM"[..], &u16::from(self.suite.kem).to_be_bytes()[..]].concat();

        let labeled_ikm = [HPKE_VERSION, &suite_id[..], &b"eae_prk"[..], dh].concat();
        let prk = Zeroizing::new(HpkeRustCrypto::kdf_extract(kdf, &[], &labeled_ikm));

        let len = self.kem.shared_secret_len();
        let labeled_info = [
            &(len as u16).to_be_bytes()[..],
            HPKE_VERSION,
            &suite_id[..],
            &b"shared_secret"[..],
            kem_context,
        ]
        .concat();
        HpkeRustCrypto::kdf_expand(kdf, &prk, &labeled_info, len).map_err(other_err)
    }
}

const HPKE_VERSION: &[u8] = b"HPKE-v1";

struct HpkeRsSender {
    context: ::hpke_rs::Context<HpkeRustCrypto>,
}

impl Debug for HpkeRsSender {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HpkeRsSender")
            .finish_non_exhaustive()
    }
}

impl HpkeSealer for HpkeRsSender {
    fn seal(&mut self, aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, Error> {
        self.context
            .seal(aad, plaintext)
            .map_err(other_err)
    }
}

struct HpkeRsReceiver {
    context: ::hpke_rs::Context<HpkeRustCrypto>,
}

impl Debug for HpkeRsReceiver {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HpkeRsReceiver")
            .finish_non_exhaustive()
    }
}

impl HpkeOpener for HpkeRsReceiver {
    fn open(&mut self, aad: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, Error> {
        self.context
            .open(aad, ciphertext)
            .map_err(other_err)
    }
}
