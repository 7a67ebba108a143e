use alloc::vec::Vec;
use core::fmt;

use p521::elliptic_curve::sec1::ToEncodedPoint;
use pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePublicKey};
use signature::{RandomizedSigner, SignatureEncoding, Signer, Verifier};

use crate::crypto::SecureRandom;
use crate::enums::SignatureScheme;
use crate::error::{DelegatedCredentialError, Error};
use crate::rand::{random_array, RngAdapter};

/// The private key of a delegation-capable end-entity certificate.
///
/// This key signs delegated credentials; it never signs handshake messages
/// directly once a credential is in use.
pub enum DelegatorKey {
    /// ECDSA over P-256.
    EcdsaP256(p256::ecdsa::SigningKey),
    /// ECDSA over P-384.
    EcdsaP384(p384::ecdsa::SigningKey),
    /// ECDSA over P-521.
    EcdsaP521(p521::SecretKey),
    /// Ed25519.
    Ed25519(ed25519_dalek::SigningKey),
    /// RSA, which signs credentials with RSA-PSS.
    Rsa(rsa::RsaPrivateKey),
}

impl DelegatorKey {
    /// Load a PKCS#8 DER private key of any supported type.
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self, Error> {
        if let Ok(key) = p256::ecdsa::SigningKey::from_pkcs8_der(der) {
            return Ok(Self::EcdsaP256(key));
        }
        if let Ok(key) = p384::ecdsa::SigningKey::from_pkcs8_der(der) {
            return Ok(Self::EcdsaP384(key));
        }
        if let Ok(key) = p521::SecretKey::from_pkcs8_der(der) {
            return Ok(Self::EcdsaP521(key));
        }
        if let Ok(key) = ed25519_dalek::SigningKey::from_pkcs8_der(der) {
            return Ok(Self::Ed25519(key));
        }
        if let Ok(key) = rsa::RsaPrivateKey::from_pkcs8_der(der) {
            return Ok(Self::Rsa(key));
        }
        Err(DelegatedCredentialError::UnsupportedDelegatorKey.into())
    }

    /// The scheme this key signs delegated credentials with.
    pub fn scheme(&self) -> SignatureScheme {
        match self {
            Self::EcdsaP256(_) => SignatureScheme::ECDSA_NISTP256_SHA256,
            Self::EcdsaP384(_) => SignatureScheme::ECDSA_NISTP384_SHA384,
            Self::EcdsaP521(_) => SignatureScheme::ECDSA_NISTP521_SHA512,
            Self::Ed25519(_) => SignatureScheme::ED25519,
            Self::Rsa(_) => SignatureScheme::RSA_PSS_SHA256,
        }
    }

    pub(crate) fn sign(&self, message: &[u8], random: &dyn SecureRandom) -> Result<Vec<u8>, Error> {
        let signing_failed = |_| Error::from(DelegatedCredentialError::SigningFailed);
        match self {
            Self::EcdsaP256(key) => {
                let sig: p256::ecdsa::DerSignature = key
                    .try_sign(message)
                    .map_err(signing_failed)?;
                Ok(sig.to_vec())
            }
            Self::EcdsaP384(key) => {
                let sig: p384::ecdsa::DerSignature = key
                    .try_sign(message)
                    .map_err(signing_failed)?;
                Ok(sig.to_vec())
            }
            Self::EcdsaP521(secret) => sign_p521(secret, message),
            Self::Ed25519(key) => Ok(key.sign(message).to_vec()),
            Self::Rsa(key) => {
                let key = rsa::pss::BlindedSigningKey::<sha2::Sha256>::new(key.clone());
                let sig = key
                    .try_sign_with_rng(&mut RngAdapter(random), message)
                    .map_err(signing_failed)?;
                Ok(sig.to_vec())
            }
        }
    }
}

impl fmt::Debug for DelegatorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegatorKey")
            .field("scheme", &self.scheme())
            .finish_non_exhaustive()
    }
}

/// The private half of a delegated credential.
///
/// The credential holder signs CertificateVerify with this key.
pub enum DelegatedKey {
    /// ECDSA over P-256.
    EcdsaP256(p256::ecdsa::SigningKey),
    /// ECDSA over P-384.
    EcdsaP384(p384::ecdsa::SigningKey),
    /// ECDSA over P-521.
    EcdsaP521(p521::SecretKey),
    /// Ed25519.
    Ed25519(ed25519_dalek::SigningKey),
}

impl DelegatedKey {
    /// Generate a fresh key for `scheme`, which must be an ECDSA or Ed25519 scheme.
    pub(crate) fn generate(scheme: SignatureScheme, random: &dyn SecureRandom) -> Result<Self, Error> {
        let mut rng = RngAdapter(random);
        Ok(match scheme {
            SignatureScheme::ECDSA_NISTP256_SHA256 => {
                Self::EcdsaP256(p256::ecdsa::SigningKey::random(&mut rng))
            }
            SignatureScheme::ECDSA_NISTP384_SHA384 => {
                Self::EcdsaP384(p384::ecdsa::SigningKey::random(&mut rng))
            }
            SignatureScheme::ECDSA_NISTP521_SHA512 => {
                Self::EcdsaP521(p521::SecretKey::random(&mut rng))
            }
            SignatureScheme::ED25519 => {
                Self::Ed25519(ed25519_dalek::SigningKey::from_bytes(&random_array(random)?))
            }
            _ => return Err(DelegatedCredentialError::UnsupportedScheme.into()),
        })
    }

    /// The scheme this key signs with.
    pub fn scheme(&self) -> SignatureScheme {
        match self {
            Self::EcdsaP256(_) => SignatureScheme::ECDSA_NISTP256_SHA256,
            Self::EcdsaP384(_) => SignatureScheme::ECDSA_NISTP384_SHA384,
            Self::EcdsaP521(_) => SignatureScheme::ECDSA_NISTP521_SHA512,
            Self::Ed25519(_) => SignatureScheme::ED25519,
        }
    }

    /// The DER SubjectPublicKeyInfo of the public half.
    pub fn public_key_der(&self) -> Result<Vec<u8>, Error> {
        let spki = match self {
            Self::EcdsaP256(key) => key.verifying_key().to_public_key_der(),
            Self::EcdsaP384(key) => key.verifying_key().to_public_key_der(),
            Self::EcdsaP521(key) => key.public_key().to_public_key_der(),
            Self::Ed25519(key) => key.verifying_key().to_public_key_der(),
        }
        .map_err(|_| Error::General("cannot encode delegated public key".into()))?;
        Ok(spki.into_vec())
    }

    /// Sign `message`, e.g. the CertificateVerify input.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, Error> {
        let signing_failed = |_| Error::from(DelegatedCredentialError::SigningFailed);
        match self {
            Self::EcdsaP256(key) => {
                let sig: p256::ecdsa::DerSignature = key
                    .try_sign(message)
                    .map_err(signing_failed)?;
                Ok(sig.to_vec())
            }
            Self::EcdsaP384(key) => {
                let sig: p384::ecdsa::DerSignature = key
                    .try_sign(message)
                    .map_err(signing_failed)?;
                Ok(sig.to_vec())
            }
            Self::EcdsaP521(secret) => sign_p521(secret, message),
            Self::Ed25519(key) => Ok(key.sign(message).to_vec()),
        }
    }
}

impl fmt::Debug for DelegatedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegatedKey")
            .field("scheme", &self.scheme())
            .finish_non_exhaustive()
    }
}

fn sign_p521(secret: &p521::SecretKey, message: &[u8]) -> Result<Vec<u8>, Error> {
    let signing_failed = |_| Error::from(DelegatedCredentialError::SigningFailed);
    let key = p521::ecdsa::SigningKey::from_bytes(&secret.to_bytes()).map_err(signing_failed)?;
    let sig: p521::ecdsa::Signature = key
        .try_sign(message)
        .map_err(signing_failed)?;
    Ok(sig.to_der().as_bytes().to_vec())
}

/// Verify `signature` over `message` with the DER SubjectPublicKeyInfo `spki`.
///
/// Returns false for any key that does not match `scheme`.
pub(crate) fn verify(scheme: SignatureScheme, spki: &[u8], message: &[u8], signature: &[u8]) -> bool {
    match scheme {
        SignatureScheme::ECDSA_NISTP256_SHA256 => {
            let (Ok(key), Ok(sig)) = (
                p256::ecdsa::VerifyingKey::from_public_key_der(spki),
                p256::ecdsa::DerSignature::try_from(signature),
            ) else {
                return false;
            };
            key.verify(message, &sig).is_ok()
        }
        SignatureScheme::ECDSA_NISTP384_SHA384 => {
            let (Ok(key), Ok(sig)) = (
                p384::ecdsa::VerifyingKey::from_public_key_der(spki),
                p384::ecdsa::DerSignature::try_from(signature),
            ) else {
                return false;
            };
            key.verify(message, &sig).is_ok()
        }
        SignatureScheme::ECDSA_NISTP521_SHA512 => {
            let (Ok(public), Ok(sig)) = (
                p521::PublicKey::from_public_key_der(spki),
                p521::ecdsa::Signature::from_der(signature),
            ) else {
                return false;
            };
            let point = public.to_encoded_point(false);
            match p521::ecdsa::VerifyingKey::from_sec1_bytes(point.as_bytes()) {
                Ok(key) => key.verify(message, &sig).is_ok(),
                Err(_) => false,
            }
        }
        SignatureScheme::ED25519 => {
            let (Ok(key), Ok(sig)) = (
                ed25519_dalek::VerifyingKey::from_public_key_der(spki),
                ed25519_dalek::Signature::from_slice(signature),
            ) else {
                return false;
            };
            key.verify(message, &sig).is_ok()
        }
        SignatureScheme::RSA_PSS_SHA256 => verify_pss::<sha2::Sha256>(spki, message, signature),
        SignatureScheme::RSA_PSS_SHA384 => verify_pss::<sha2::Sha384>(spki, message, signature),
        SignatureScheme::RSA_PSS_SHA512 => verify_pss::<sha2::Sha512>(spki, message, signature),
        _ => false,
    }
}

fn verify_pss<D>(spki: &[u8], message: &[u8], signature: &[u8]) -> bool
where
    D: sha2::Digest + sha2::digest::FixedOutputReset,
{
    let (Ok(key), Ok(sig)) = (
        rsa::RsaPublicKey::from_public_key_der(spki),
        rsa::pss::Signature::try_from(signature),
    ) else {
        return false;
    };
    rsa::pss::VerifyingKey::<D>::new(key)
        .verify(message, &sig)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::OsRandom;

    #[test]
    fn delegated_keys_sign_and_verify() {
        for scheme in [
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::ECDSA_NISTP521_SHA512,
            SignatureScheme::ED25519,
        ] {
            let key = DelegatedKey::generate(scheme, &OsRandom).unwrap();
            assert_eq!(key.scheme(), scheme);
            let spki = key.public_key_der().unwrap();
            let sig = key.sign(b"message").unwrap();
            assert!(verify(scheme, &spki, b"message", &sig), "{:?}", scheme);
            assert!(!verify(scheme, &spki, b"massage", &sig), "{:?}", scheme);
        }
    }

    #[test]
    fn unsupported_delegated_scheme() {
        assert_eq!(
            DelegatedKey::generate(SignatureScheme::RSA_PSS_SHA256, &OsRandom).unwrap_err(),
            Error::DelegatedCredential(DelegatedCredentialError::UnsupportedScheme)
        );
    }

    #[test]
    fn verify_rejects_mismatched_scheme() {
        let key = DelegatedKey::generate(SignatureScheme::ED25519, &OsRandom).unwrap();
        let spki = key.public_key_der().unwrap();
        let sig = key.sign(b"m").unwrap();
        assert!(!verify(SignatureScheme::ECDSA_NISTP256_SHA256, &spki, b"m", &sig));
        assert!(!verify(SignatureScheme::RSA_PKCS1_SHA256, &spki, b"m", &sig));
    }

    #[test]
    fn delegator_key_from_pkcs8() {
        let key = rcgen::KeyPair::generate_for(&rcgen::PKCS_ECDSA_P384_SHA384).unwrap();
        let delegator = DelegatorKey::from_pkcs8_der(&key.serialize_der()).unwrap();
        assert_eq!(delegator.scheme(), SignatureScheme::ECDSA_NISTP384_SHA384);

        let sig = delegator.sign(b"input", &OsRandom).unwrap();
        assert!(verify(
            SignatureScheme::ECDSA_NISTP384_SHA384,
            &key.public_key_der(),
            b"input",
            &sig
        ));

        assert!(DelegatorKey::from_pkcs8_der(b"garbage").is_err());
    }
}
