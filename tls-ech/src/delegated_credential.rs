//! Delegated credentials for TLS (draft-ietf-tls-subcerts).
//!
//! A delegated credential is a short-lived key, signed by the key of a
//! delegation-capable end-entity certificate, that the peer accepts in place
//! of the certificate key for CertificateVerify.

use alloc::vec;
use alloc::vec::Vec;
use core::time::Duration;

use const_oid::db::rfc5280::ID_CE_KEY_USAGE;
use const_oid::ObjectIdentifier;
use der::{Decode, Encode};
use pki_types::UnixTime;
use x509_cert::ext::pkix::KeyUsage;
use x509_cert::Certificate;

use crate::crypto::SecureRandom;
use crate::enums::SignatureScheme;
use crate::error::{DelegatedCredentialError, Error, InvalidMessage};
use crate::log::{debug, trace};
use crate::msgs::base::{PayloadU16, PayloadU24};
use crate::msgs::codec::{Codec, Reader};
use crate::msgs::enums::ExtensionType;
use crate::msgs::handshake::{CertificateEntry, Extension};
use crate::sign::{self, DelegatedKey, DelegatorKey};

/// The longest a credential may stay valid: seven days.
pub const MAX_VALIDITY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// The `DelegationUsage` certificate extension (1.3.6.1.4.1.44363.44).
pub const DELEGATION_USAGE: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.44363.44");

const SERVER_CONTEXT: &[u8] = b"TLS, server delegated credentials\0";
const CLIENT_CONTEXT: &[u8] = b"TLS, client delegated credentials\0";

/// The signed portion of a delegated credential.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credential {
    /// Seconds after the certificate's notBefore at which the credential expires.
    pub valid_time: u32,
    /// The scheme the credential key signs CertificateVerify with.
    pub dc_cert_verify_algorithm: SignatureScheme,
    /// DER SubjectPublicKeyInfo of the credential key.
    pub public_key: PayloadU24,
}

impl Codec<'_> for Credential {
    fn encode(&self, bytes: &mut Vec<u8>) {
        Codec::encode(&self.valid_time, bytes);
        self.dc_cert_verify_algorithm.encode(bytes);
        self.public_key.encode(bytes);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        let valid_time = u32::read(r)?;
        let dc_cert_verify_algorithm = SignatureScheme::read(r)?;
        let public_key = PayloadU24::read(r)?;
        if public_key.bytes().is_empty() {
            return Err(InvalidMessage::MissingData("Credential public key"));
        }

        Ok(Self {
            valid_time,
            dc_cert_verify_algorithm,
            public_key,
        })
    }
}

/// A credential together with the delegator's signature over it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DelegatedCredential {
    /// The signed credential.
    pub credential: Credential,
    /// The scheme the delegator signed with.
    pub algorithm: SignatureScheme,
    /// The delegator's signature.
    pub signature: PayloadU16,
}

impl Codec<'_> for DelegatedCredential {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.credential.encode(bytes);
        self.algorithm.encode(bytes);
        self.signature.encode(bytes);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        let credential = Credential::read(r)?;
        let algorithm = SignatureScheme::read(r)?;
        let signature = PayloadU16::read(r)?;
        if signature.bytes().is_empty() {
            return Err(InvalidMessage::MissingData("DelegatedCredential signature"));
        }

        Ok(Self {
            credential,
            algorithm,
            signature,
        })
    }
}

impl DelegatedCredential {
    /// Create a credential for a fresh key of `scheme`, signed by the key of `leaf_cert_der`.
    ///
    /// `valid_for` is rounded to whole seconds and counts from the
    /// certificate's notBefore, not from now. The seven-day limit is
    /// enforced by [`Self::validate`], relative to the time of use.
    pub fn new(
        leaf_cert_der: &[u8],
        delegator: &DelegatorKey,
        scheme: SignatureScheme,
        valid_for: Duration,
        is_client: bool,
        random: &dyn SecureRandom,
    ) -> Result<(Self, DelegatedKey), Error> {
        DelegationParent::parse(leaf_cert_der)?;

        let valid_time = valid_for
            .as_secs()
            .checked_add(u64::from(valid_for.subsec_nanos() >= 500_000_000))
            .and_then(|secs| u32::try_from(secs).ok())
            .ok_or(DelegatedCredentialError::TooLarge)?;

        let key = DelegatedKey::generate(scheme, random)?;
        let public_key = PayloadU24::checked_new(key.public_key_der()?)
            .map_err(|_| DelegatedCredentialError::TooLarge)?;

        let credential = Credential {
            valid_time,
            dc_cert_verify_algorithm: scheme,
            public_key,
        };
        let algorithm = delegator.scheme();
        let input = signature_input(&credential, leaf_cert_der, algorithm, is_client);
        let signature = PayloadU16::checked_new(delegator.sign(&input, random)?)
            .map_err(|_| DelegatedCredentialError::TooLarge)?;

        debug!(
            "Created delegated credential for {:?} signed with {:?}, valid_time {}s",
            scheme, algorithm, valid_time
        );
        Ok((
            Self {
                credential,
                algorithm,
                signature,
            },
            key,
        ))
    }

    /// Check this credential against its parent certificate.
    ///
    /// `cert_verify_scheme` is the scheme of the CertificateVerify the
    /// credential key produced.
    pub fn validate(
        &self,
        parent_cert_der: &[u8],
        is_client: bool,
        now: UnixTime,
        cert_verify_scheme: SignatureScheme,
    ) -> bool {
        self.check(parent_cert_der, is_client, now, cert_verify_scheme)
            .inspect_err(|err| debug!("Delegated credential rejected: {:?}", err))
            .is_ok()
    }

    fn check(
        &self,
        parent_cert_der: &[u8],
        is_client: bool,
        now: UnixTime,
        cert_verify_scheme: SignatureScheme,
    ) -> Result<(), DelegatedCredentialError> {
        let parent = DelegationParent::parse(parent_cert_der)?;
        let now = now.as_secs();
        let not_before = parent.not_before;
        let valid_time = u64::from(self.credential.valid_time);

        if now >= not_before.saturating_add(valid_time) {
            return Err(DelegatedCredentialError::Expired);
        }

        let age = now.saturating_sub(not_before);
        if valid_time > age + MAX_VALIDITY.as_secs() {
            return Err(DelegatedCredentialError::LifetimeTooLong);
        }

        if self.credential.dc_cert_verify_algorithm != cert_verify_scheme {
            return Err(DelegatedCredentialError::SchemeMismatch);
        }

        let input = signature_input(
            &self.credential,
            parent_cert_der,
            self.algorithm,
            is_client,
        );
        match sign::verify(
            self.algorithm,
            &parent.spki,
            &input,
            self.signature.bytes(),
        ) {
            true => Ok(()),
            false => Err(DelegatedCredentialError::BadSignature),
        }
    }

    /// The standalone encoding, as carried in a certificate entry.
    pub fn marshal(&self) -> Vec<u8> {
        self.get_encoding()
    }

    /// Parse a standalone encoding; nothing may follow the signature.
    pub fn unmarshal(bytes: &[u8]) -> Result<Self, InvalidMessage> {
        Self::read_bytes(bytes)
    }

    /// The `delegated_credential` extension for the end-entity certificate entry.
    pub fn certificate_extension(&self) -> Extension {
        Extension::new(ExtensionType::DelegatedCredentials, self.marshal())
    }

    /// The credential in an end-entity certificate entry, if there is one.
    pub fn from_certificate_entry(
        entry: &CertificateEntry,
    ) -> Option<Result<Self, InvalidMessage>> {
        entry
            .extension(ExtensionType::DelegatedCredentials)
            .map(|ext| Self::unmarshal(ext.data.bytes()))
    }

    /// The scheme the credential key signs with.
    pub fn scheme(&self) -> SignatureScheme {
        self.credential.dc_cert_verify_algorithm
    }
}

/// A credential and the private key it certifies.
#[derive(Debug)]
pub struct DelegatedCredentialPair {
    /// The credential sent to the peer.
    pub credential: DelegatedCredential,
    /// The key that signs CertificateVerify in place of the certificate key.
    pub key: DelegatedKey,
}

impl DelegatedCredentialPair {
    /// The first pair whose scheme the peer offered in `delegated_credentials`.
    pub fn select<'a>(pairs: &'a [Self], offered: &[SignatureScheme]) -> Option<&'a Self> {
        let selected = pairs
            .iter()
            .find(|pair| offered.contains(&pair.credential.scheme()));
        if selected.is_none() {
            trace!("No delegated credential for offered schemes {:?}", offered);
        }
        selected
    }

    /// Add the credential to the end-entity certificate entry.
    pub fn attach(&self, entry: &mut CertificateEntry) {
        entry
            .extensions
            .retain(|ext| ext.typ != ExtensionType::DelegatedCredentials);
        entry
            .extensions
            .push(self.credential.certificate_extension());
    }
}

fn signature_input(
    credential: &Credential,
    cert_der: &[u8],
    algorithm: SignatureScheme,
    is_client: bool,
) -> Vec<u8> {
    let context = match is_client {
        true => CLIENT_CONTEXT,
        false => SERVER_CONTEXT,
    };

    let mut input = vec![0x20u8; 64];
    input.extend_from_slice(context);
    input.extend_from_slice(cert_der);
    credential.encode(&mut input);
    algorithm.encode(&mut input);
    input
}

/// What a credential needs from its parent certificate.
struct DelegationParent {
    spki: Vec<u8>,
    not_before: u64,
}

impl DelegationParent {
    /// Parse `cert_der`, requiring it to be capable of delegation.
    fn parse(cert_der: &[u8]) -> Result<Self, DelegatedCredentialError> {
        let cert = Certificate::from_der(cert_der)
            .map_err(|_| DelegatedCredentialError::BadCertificate)?;
        let tbs = &cert.tbs_certificate;
        let extensions = tbs
            .extensions
            .as_deref()
            .unwrap_or_default();

        let digital_signature = extensions
            .iter()
            .find(|ext| ext.extn_id == ID_CE_KEY_USAGE)
            .and_then(|ext| KeyUsage::from_der(ext.extn_value.as_bytes()).ok())
            .is_some_and(|usage| usage.digital_signature());
        if !digital_signature {
            return Err(DelegatedCredentialError::MissingDigitalSignatureUsage);
        }

        match extensions
            .iter()
            .find(|ext| ext.extn_id == DELEGATION_USAGE)
        {
            None => return Err(DelegatedCredentialError::MissingDelegationUsage),
            Some(ext) if ext.critical => {
                return Err(DelegatedCredentialError::CriticalDelegationUsage)
            }
            Some(_) => {}
        }

        let spki = tbs
            .subject_public_key_info
            .to_der()
            .map_err(|_| DelegatedCredentialError::BadCertificate)?;
        Ok(Self {
            spki,
            not_before: tbs
                .validity
                .not_before
                .to_unix_duration()
                .as_secs(),
        })
    }
}
