use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt::{self, Debug};

use zeroize::Zeroize;

use crate::crypto::SecureRandom;
use crate::error::{Error, InvalidMessage};
use crate::msgs::codec::{Codec, ListLength, Reader, TlsListElement};

/// An HPKE suite, specifying a key encapsulation mechanism and a symmetric cipher suite.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HpkeSuite {
    /// The choice of HPKE key encapsulation mechanism.
    pub kem: HpkeKem,

    /// The choice of HPKE symmetric cipher suite.
    ///
    /// This combines a choice of authenticated encryption with additional data (AEAD) algorithm
    /// and a key derivation function (KDF).
    pub sym: HpkeSymmetricCipherSuite,
}

impl HpkeSuite {
    /// DHKEM(X25519, HKDF-SHA256), HKDF-SHA256, AES-128-GCM.
    pub const X25519_SHA256_AES128: Self = Self {
        kem: HpkeKem::DHKEM_X25519_HKDF_SHA256,
        sym: HpkeSymmetricCipherSuite {
            kdf_id: HpkeKdf::HKDF_SHA256,
            aead_id: HpkeAead::AES_128_GCM,
        },
    };
}

impl Default for HpkeSuite {
    fn default() -> Self {
        Self::X25519_SHA256_AES128
    }
}

/// A source of HPKE instances.
///
/// A provider decides which KEMs, KDFs and AEADs it can assemble into a suite.
pub trait HpkeProvider: Debug + Send + Sync {
    /// Start an HPKE instance for `suite`.
    fn start(&self, suite: &HpkeSuite) -> Result<Box<dyn Hpke + 'static>, Error>;

    /// Whether this provider implements `kem`.
    fn supports_kem(&self, kem: HpkeKem) -> bool;

    /// Whether this provider implements `kdf`.
    fn supports_kdf(&self, kdf: HpkeKdf) -> bool;

    /// Whether this provider implements `aead`.
    fn supports_aead(&self, aead: HpkeAead) -> bool;

    /// Validate each component of a suite, naming the first unsupported one.
    fn assemble(
        &self,
        kem: HpkeKem,
        kdf: HpkeKdf,
        aead: HpkeAead,
    ) -> Result<HpkeSuite, HpkeAssembleError> {
        if !self.supports_kem(kem) {
            return Err(HpkeAssembleError::UnsupportedKem(kem));
        }
        if !self.supports_kdf(kdf) {
            return Err(HpkeAssembleError::UnsupportedKdf(kdf));
        }
        if !self.supports_aead(aead) || aead == HpkeAead::EXPORT_ONLY {
            return Err(HpkeAssembleError::UnsupportedAead(aead));
        }

        Ok(HpkeSuite {
            kem,
            sym: HpkeSymmetricCipherSuite {
                kdf_id: kdf,
                aead_id: aead,
            },
        })
    }

    /// Whether every component of `suite` is supported.
    fn supports_suite(&self, suite: &HpkeSuite) -> bool {
        self.assemble(suite.kem, suite.sym.kdf_id, suite.sym.aead_id)
            .is_ok()
    }
}

/// Why a (KEM, KDF, AEAD) triple could not be assembled into a suite.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HpkeAssembleError {
    /// The key encapsulation mechanism is not supported.
    UnsupportedKem(HpkeKem),
    /// The key derivation function is not supported.
    UnsupportedKdf(HpkeKdf),
    /// The AEAD algorithm is not supported.
    UnsupportedAead(HpkeAead),
}

impl fmt::Display for HpkeAssembleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedKem(kem) => write!(f, "unsupported HPKE KEM {:?}", kem),
            Self::UnsupportedKdf(kdf) => write!(f, "unsupported HPKE KDF {:?}", kdf),
            Self::UnsupportedAead(aead) => write!(f, "unsupported HPKE AEAD {:?}", aead),
        }
    }
}

impl std::error::Error for HpkeAssembleError {}

impl From<HpkeAssembleError> for Error {
    fn from(err: HpkeAssembleError) -> Self {
        Self::General(alloc::format!("{}", err))
    }
}

/// An HPKE instance that can be used for base-mode encryption and decryption.
pub trait Hpke: Debug + Send + Sync {
    /// Set up a sealer context for the receiver public key `pub_key` with application supplied `info`.
    ///
    /// Returns both an encapsulated ciphertext and a sealer context that can be used to seal
    /// messages to the recipient. RFC 9180 refers to `pub_key` as `pkR`.
    ///
    /// The ephemeral key is derived from bytes drawn from `random`, and from nothing else.
    fn setup_sealer(
        &mut self,
        info: &[u8],
        pub_key: &HpkePublicKey,
        random: &dyn SecureRandom,
    ) -> Result<(EncapsulatedSecret, Box<dyn HpkeSealer + 'static>), Error>;

    /// Set up an opener context for the secret key `secret_key` with application supplied `info`.
    ///
    /// Returns an opener context that can be used to open sealed messages encrypted to the
    /// public key corresponding to `secret_key`. RFC 9180 refers to `secret_key` as `skR`.
    fn setup_opener(
        &mut self,
        enc: &EncapsulatedSecret,
        info: &[u8],
        secret_key: &HpkePrivateKey,
    ) -> Result<Box<dyn HpkeOpener + 'static>, Error>;

    /// Deterministically derive a key pair from input keying material (`DeriveKeyPair`).
    fn derive_key_pair(&mut self, ikm: &[u8]) -> Result<HpkeKeyPair, Error>;

    /// Return the [HpkeSuite] that this HPKE instance supports.
    fn suite(&self) -> HpkeSuite;
}

/// An HPKE sealer context.
///
/// This is a stateful object that can be used to seal messages for receipt by
/// a receiver.
pub trait HpkeSealer: Debug + Send + Sync + 'static {
    /// Seal the provided `plaintext` with additional data `aad`, returning
    /// ciphertext.
    fn seal(&mut self, aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, Error>;
}

/// An HPKE opener context.
///
/// This is a stateful object that can be used to open sealed messages sealed
/// by a sender.
pub trait HpkeOpener: Debug + Send + Sync + 'static {
    /// Open the provided `ciphertext` with additional data `aad`, returning plaintext.
    fn open(&mut self, aad: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, Error>;
}

/// An HPKE public key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HpkePublicKey(pub Vec<u8>);

/// An HPKE private key.
pub struct HpkePrivateKey(Vec<u8>);

impl HpkePrivateKey {
    /// Return the private key bytes.
    pub fn secret_bytes(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl Clone for HpkePrivateKey {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl Debug for HpkePrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HpkePrivateKey")
            .finish_non_exhaustive()
    }
}

impl PartialEq for HpkePrivateKey {
    fn eq(&self, other: &Self) -> bool {
        use subtle::ConstantTimeEq;
        self.0.ct_eq(&other.0).into()
    }
}

impl From<Vec<u8>> for HpkePrivateKey {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl Drop for HpkePrivateKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// An HPKE key pair, made of a matching public and private key.
#[derive(Debug)]
pub struct HpkeKeyPair {
    /// A HPKE public key.
    pub public_key: HpkePublicKey,
    /// A HPKE private key.
    pub private_key: HpkePrivateKey,
}

/// An encapsulated secret returned from setting up a sender or receiver context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncapsulatedSecret(pub Vec<u8>);

/// An HPKE symmetric cipher suite, combining a KDF and an AEAD algorithm.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct HpkeSymmetricCipherSuite {
    /// The KDF to use for this cipher suite.
    pub kdf_id: HpkeKdf,
    /// The AEAD to use for this cipher suite.
    pub aead_id: HpkeAead,
}

impl Codec<'_> for HpkeSymmetricCipherSuite {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.kdf_id.encode(bytes);
        self.aead_id.encode(bytes);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        Ok(Self {
            kdf_id: HpkeKdf::read(r)?,
            aead_id: HpkeAead::read(r)?,
        })
    }
}

/// `HpkeSymmetricCipherSuite cipher_suites<4..2^16-4>;`
impl TlsListElement for HpkeSymmetricCipherSuite {
    const SIZE_LEN: ListLength = ListLength::U16;
}

enum_builder! {
    /// The Key Encapsulation Mechanism (`Kem`) type for HPKE operations.
    /// Listed by IANA, as specified in [RFC 9180 Section 7.1]
    ///
    /// [RFC 9180 Section 7.1]: <https://datatracker.ietf.org/doc/html/rfc9180#kemid-values>
    #[repr(u16)]
    #[allow(non_camel_case_types)]
    pub enum HpkeKem {
        DHKEM_P256_HKDF_SHA256 => 0x0010,
        DHKEM_P384_HKDF_SHA384 => 0x0011,
        DHKEM_P521_HKDF_SHA512 => 0x0012,
        DHKEM_X25519_HKDF_SHA256 => 0x0020,
        DHKEM_X448_HKDF_SHA512 => 0x0021,
    }
}

impl HpkeKem {
    /// `Npk`: the length of a serialized public key, which is also `Nenc`.
    ///
    /// `None` for KEMs this crate does not know.
    pub fn public_key_len(&self) -> Option<usize> {
        match self {
            Self::DHKEM_P256_HKDF_SHA256 => Some(65),
            Self::DHKEM_P384_HKDF_SHA384 => Some(97),
            Self::DHKEM_P521_HKDF_SHA512 => Some(133),
            Self::DHKEM_X25519_HKDF_SHA256 => Some(32),
            Self::DHKEM_X448_HKDF_SHA512 => Some(56),
            _ => None,
        }
    }
}

enum_builder! {
    /// The Key Derivation Function (`Kdf`) type for HPKE operations.
    /// Listed by IANA, as specified in [RFC 9180 Section 7.2]
    ///
    /// [RFC 9180 Section 7.2]: <https://datatracker.ietf.org/doc/html/rfc9180#name-key-derivation-functions-kd>
    #[repr(u16)]
    #[allow(non_camel_case_types)]
    #[derive(Default)]
    pub enum HpkeKdf {
        #[default]
        HKDF_SHA256 => 0x0001,
        HKDF_SHA384 => 0x0002,
        HKDF_SHA512 => 0x0003,
    }
}

enum_builder! {
    /// The Authenticated Encryption with Associated Data (`Aead`) type for HPKE operations.
    /// Listed by IANA, as specified in [RFC 9180 Section 7.3]
    ///
    /// [RFC 9180 Section 7.3]: <https://datatracker.ietf.org/doc/html/rfc9180#name-authenticated-encryption-wi>
    #[repr(u16)]
    #[allow(non_camel_case_types)]
    #[derive(Default)]
    pub enum HpkeAead {
        #[default]
        AES_128_GCM => 0x0001,
        AES_256_GCM => 0x0002,
        CHACHA20_POLY_1305 => 0x0003,
        EXPORT_ONLY => 0xFFFF,
    }
}

impl HpkeAead {
    /// Returns the length of the tag for the AEAD algorithm, or none if the AEAD is EXPORT_ONLY.
    pub fn tag_len(&self) -> Option<usize> {
        match self {
            // See RFC 9180 Section 7.3, column `Nt`, the length in bytes of the authentication tag
            // for the algorithm.
            // https://www.rfc-editor.org/rfc/rfc9180.html#section-7.3
            Self::AES_128_GCM | Self::AES_256_GCM | Self::CHACHA20_POLY_1305 => Some(16),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hpke_rs::HPKE_PROVIDER;

    #[test]
    fn assemble_names_the_unsupported_component() {
        assert_eq!(
            HPKE_PROVIDER.assemble(
                HpkeKem::DHKEM_X25519_HKDF_SHA256,
                HpkeKdf::HKDF_SHA256,
                HpkeAead::AES_128_GCM
            ),
            Ok(HpkeSuite::default())
        );
        assert_eq!(
            HPKE_PROVIDER.assemble(
                HpkeKem::Unknown(0x9999),
                HpkeKdf::HKDF_SHA256,
                HpkeAead::AES_128_GCM
            ),
            Err(HpkeAssembleError::UnsupportedKem(HpkeKem::Unknown(0x9999)))
        );
        assert_eq!(
            HPKE_PROVIDER.assemble(
                HpkeKem::DHKEM_X25519_HKDF_SHA256,
                HpkeKdf::Unknown(7),
                HpkeAead::AES_128_GCM
            ),
            Err(HpkeAssembleError::UnsupportedKdf(HpkeKdf::Unknown(7)))
        );
        assert_eq!(
            HPKE_PROVIDER.assemble(
                HpkeKem::DHKEM_X25519_HKDF_SHA256,
                HpkeKdf::HKDF_SHA256,
                HpkeAead::EXPORT_ONLY
            ),
            Err(HpkeAssembleError::UnsupportedAead(HpkeAead::EXPORT_ONLY))
        );
    }

    #[test]
    fn assemble_error_becomes_general_error() {
        let err: Error = HpkeAssembleError::UnsupportedKdf(HpkeKdf::Unknown(9)).into();
        assert!(matches!(err, Error::General(msg) if msg.contains("KDF")));
    }

    #[test]
    fn symmetric_suite_codec() {
        let suites = vec![
            HpkeSymmetricCipherSuite::default(),
            HpkeSymmetricCipherSuite {
                kdf_id: HpkeKdf::HKDF_SHA384,
                aead_id: HpkeAead::CHACHA20_POLY_1305,
            },
        ];
        let bytes = suites.get_encoding();
        assert_eq!(bytes, [0, 8, 0, 1, 0, 1, 0, 2, 0, 3]);
        assert_eq!(
            Vec::<HpkeSymmetricCipherSuite>::read_bytes(&bytes).unwrap(),
            suites
        );
    }

    #[test]
    fn public_key_lengths() {
        assert_eq!(
            HpkeKem::DHKEM_X25519_HKDF_SHA256.public_key_len(),
            Some(32)
        );
        assert_eq!(HpkeKem::DHKEM_P256_HKDF_SHA256.public_key_len(), Some(65));
        assert_eq!(HpkeKem::Unknown(1).public_key_len(), None);
        assert_eq!(HpkeAead::EXPORT_ONLY.tag_len(), None);
    }

    #[test]
    fn private_key_debug_hides_bytes() {
        let key = HpkePrivateKey::from(vec![0xaa; 32]);
        assert_eq!(format!("{:?}", key), "HpkePrivateKey(..)");
    }
}
