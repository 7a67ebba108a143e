use alloc::format;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use std::error::Error as StdError;

use crate::enums::{AlertDescription, HandshakeType};
use crate::msgs::ech::EchConfigPayload;
use crate::rand;

/// tls-ech reports protocol errors using this type.
#[non_exhaustive]
#[derive(Debug, PartialEq, Clone)]
pub enum Error {
    /// We received a TLS handshake message that isn't valid right now.
    /// `expect_types` lists the handshake message types we can expect
    /// right now.  `got_type` is the type we found.
    InappropriateHandshakeMessage {
        /// Which handshake type we expected
        expect_types: Vec<HandshakeType>,
        /// What handshake type we received
        got_type: HandshakeType,
    },

    /// The peer sent us a TLS message with invalid contents.
    InvalidMessage(InvalidMessage),

    /// We couldn't decrypt a message.  This is invariably fatal.
    DecryptError,

    /// The peer doesn't support a protocol version/feature we require.
    /// The parameter gives a hint as to what version/feature it is.
    PeerIncompatible(PeerIncompatible),

    /// The peer deviated from the standard TLS protocol.
    /// The parameter gives a hint where.
    PeerMisbehaved(PeerMisbehaved),

    /// An ECH configuration could not be used.
    InvalidEncryptedClientHello(EncryptedClientHelloError),

    /// The server rejected our encrypted client hello.
    ///
    /// Any retry configurations the server offered are carried along.
    RejectedEch(RejectedEch),

    /// A delegated credential could not be created or used.
    DelegatedCredential(DelegatedCredentialError),

    /// A catch-all error for unlikely errors.
    General(String),

    /// We failed to figure out what time it currently is.
    FailedToGetCurrentTime,

    /// We failed to acquire random bytes from the system.
    FailedToGetRandomBytes,

    /// An internal invariant was violated.
    ///
    /// This is a bug in this crate or in data it produced itself; it is never
    /// reported to the peer.
    Unreachable(&'static str),

    /// Any other error.
    ///
    /// This variant should only be used when the error is not better described by a more
    /// specific variant. For example, if an HPKE backend returns a backend
    /// specific error.
    ///
    /// Enums holding this variant will never compare equal to each other.
    Other(OtherError),
}

/// A corrupt TLS message payload that resulted in an error.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InvalidMessage {
    /// An ECH extension in a ClientHello had an unknown variant byte.
    InvalidEchType,
    /// The `ech_outer_extensions` back-reference in an EncodedClientHelloInner
    /// could not be resolved against the ClientHelloOuter.
    InvalidEchOuterExtensions,
    /// A peer's server name could not be decoded
    InvalidServerName,
    /// A TLS message payload was larger then allowed by the specification.
    MessageTooLarge,
    /// Message is shorter than the expected length
    MessageTooShort,
    /// Missing data for the named handshake payload value
    MissingData(&'static str),
    /// An EncodedClientHelloInner carried a non-empty legacy session id.
    NonEmptyInnerSessionId,
    /// An EncodedClientHelloInner was padded with non-zero bytes.
    NonZeroClientHelloInnerPadding,
    /// Trailing data found for the named handshake payload value
    TrailingData(&'static str),
    /// A peer sent an unexpected message type.
    UnexpectedMessage(&'static str),
    /// A peer sent a non-null compression method.
    UnsupportedCompression,
    /// An ECHConfig had a version this crate cannot parse.
    UnsupportedEchVersion,
}

impl From<InvalidMessage> for Error {
    #[inline]
    fn from(e: InvalidMessage) -> Self {
        Self::InvalidMessage(e)
    }
}

impl From<InvalidMessage> for AlertDescription {
    fn from(e: InvalidMessage) -> Self {
        match e {
            InvalidMessage::InvalidEchOuterExtensions
            | InvalidMessage::NonEmptyInnerSessionId
            | InvalidMessage::NonZeroClientHelloInnerPadding
            | InvalidMessage::InvalidEchType => Self::IllegalParameter,
            _ => Self::DecodeError,
        }
    }
}

#[non_exhaustive]
#[allow(missing_docs)]
#[derive(Debug, PartialEq, Clone)]
/// The set of cases where we failed to make a connection because we thought
/// the peer was misbehaving.
///
/// This is `non_exhaustive`: we might add or stop using items here in minor
/// versions.  We also don't document what they mean.  Generally a user of
/// this crate shouldn't vary its behaviour on these error codes, and there is
/// nothing it can do to improve matters.
pub enum PeerMisbehaved {
    DuplicateClientHelloExtensions,
    DuplicateServerHelloExtensions,
    EchConfigChangedAfterHelloRetryRequest,
    EchMissingAfterHelloRetryRequest,
    EchRetryConfigsAfterAcceptance,
    IllegalHelloRetryRequestWithInvalidEch,
    IllegalHelloRetryRequestWithNoChanges,
    IllegalHelloRetryRequestWithOfferedGroup,
    IllegalHelloRetryRequestWithUnofferedNamedGroup,
    InvalidEchExtension,
    InvalidEchRetryConfigs,
    InvalidKeyShare,
    MissingKeyShare,
    OfferedEchWithOldProtocolVersion,
    OfferedIncorrectEchType,
    RefusedToFollowHelloRetryRequest,
    SelectedDifferentCipherSuiteAfterRetry,
    SelectedPskAfterEchRejection,
    SelectedUnofferedCipherSuite,
    SelectedUnofferedKxGroup,
    SelectedUnsupportedVersion,
    UnexpectedEchAfterHelloRetryRequest,
    UnsolicitedDelegatedCredential,
    UnsolicitedEchRetryConfigs,
}

impl From<PeerMisbehaved> for Error {
    #[inline]
    fn from(e: PeerMisbehaved) -> Self {
        Self::PeerMisbehaved(e)
    }
}

impl From<&PeerMisbehaved> for AlertDescription {
    fn from(e: &PeerMisbehaved) -> Self {
        use PeerMisbehaved::*;
        match e {
            EchMissingAfterHelloRetryRequest | MissingKeyShare => Self::MissingExtension,
            EchRetryConfigsAfterAcceptance | UnsolicitedEchRetryConfigs => {
                Self::UnsupportedExtension
            }
            IllegalHelloRetryRequestWithInvalidEch | InvalidEchRetryConfigs => Self::DecodeError,
            SelectedUnsupportedVersion => Self::ProtocolVersion,
            UnsolicitedDelegatedCredential => Self::UnexpectedMessage,
            _ => Self::IllegalParameter,
        }
    }
}

#[non_exhaustive]
#[allow(missing_docs)]
#[derive(Debug, PartialEq, Clone)]
/// The set of cases where we failed to make a connection because a peer
/// doesn't support a TLS version/feature we require.
///
/// This is `non_exhaustive`: we might add or stop using items here in minor
/// versions.
pub enum PeerIncompatible {
    NoCipherSuitesInCommon,
    NoKxGroupsInCommon,
    SupportedVersionsExtensionRequired,
}

impl From<PeerIncompatible> for Error {
    #[inline]
    fn from(e: PeerIncompatible) -> Self {
        Self::PeerIncompatible(e)
    }
}

/// An error that occurred while handling Encrypted Client Hello (ECH).
#[non_exhaustive]
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum EncryptedClientHelloError {
    /// The provided ECH configuration list was invalid.
    InvalidConfigList,
    /// An ECH key list, or the PEM holding it, was invalid.
    InvalidKeyList,
    /// An ECH key set had more than 255 keys, or two keys with one config id.
    InvalidKeySet,
    /// No compatible ECH configuration.
    NoCompatibleConfig,
}

impl From<EncryptedClientHelloError> for Error {
    #[inline]
    fn from(e: EncryptedClientHelloError) -> Self {
        Self::InvalidEncryptedClientHello(e)
    }
}

/// The server rejected the client's ECH offer.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedEch {
    pub(crate) retry_configs: Option<Vec<EchConfigPayload>>,
}

impl RejectedEch {
    /// Returns true if the server provided retry configurations a client could use.
    pub fn can_retry(&self) -> bool {
        self.retry_configs
            .as_ref()
            .is_some_and(|configs| !configs.is_empty())
    }

    /// The retry configurations the server offered, if any.
    pub fn retry_configs(&self) -> Option<&[EchConfigPayload]> {
        self.retry_configs.as_deref()
    }
}

impl From<RejectedEch> for Error {
    fn from(e: RejectedEch) -> Self {
        Self::RejectedEch(e)
    }
}

/// The reasons a delegated credential could not be created or accepted.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelegatedCredentialError {
    /// The certificate could not be parsed.
    BadCertificate,
    /// The certificate lacks the DelegationUsage extension.
    MissingDelegationUsage,
    /// The DelegationUsage extension was marked critical.
    CriticalDelegationUsage,
    /// The certificate's key usage does not include digitalSignature.
    MissingDigitalSignatureUsage,
    /// The credential's key type is not supported.
    UnsupportedScheme,
    /// The delegator's key cannot sign credentials.
    UnsupportedDelegatorKey,
    /// A credential field did not fit its encoding.
    TooLarge,
    /// Signing the credential failed.
    SigningFailed,
    /// The credential is no longer valid.
    Expired,
    /// The credential's lifetime is longer than the protocol allows.
    LifetimeTooLong,
    /// The credential's scheme does not match the CertificateVerify scheme.
    SchemeMismatch,
    /// The delegator signature did not verify.
    BadSignature,
}

impl From<DelegatedCredentialError> for Error {
    fn from(e: DelegatedCredentialError) -> Self {
        Self::DelegatedCredential(e)
    }
}

fn join<T: fmt::Debug>(items: &[T]) -> String {
    items
        .iter()
        .map(|x| format!("{:?}", x))
        .collect::<Vec<String>>()
        .join(" or ")
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InappropriateHandshakeMessage {
                expect_types,
                got_type,
            } => write!(
                f,
                "received unexpected handshake message: got {:?} when expecting {}",
                got_type,
                join::<HandshakeType>(expect_types)
            ),
            Self::InvalidMessage(typ) => {
                write!(f, "received corrupt message of type {:?}", typ)
            }
            Self::PeerIncompatible(why) => write!(f, "peer is incompatible: {:?}", why),
            Self::PeerMisbehaved(why) => write!(f, "peer misbehaved: {:?}", why),
            Self::DecryptError => write!(f, "cannot decrypt peer's message"),
            Self::InvalidEncryptedClientHello(err) => {
                write!(f, "encrypted client hello failure: {:?}", err)
            }
            Self::RejectedEch(err) => write!(
                f,
                "server rejected encrypted client hello (retry possible: {})",
                err.can_retry()
            ),
            Self::DelegatedCredential(err) => {
                write!(f, "delegated credential unusable: {:?}", err)
            }
            Self::FailedToGetCurrentTime => write!(f, "failed to get current time"),
            Self::FailedToGetRandomBytes => write!(f, "failed to get random bytes"),
            Self::Unreachable(err) => write!(
                f,
                "unexpected error: {} (reached supposedly unreachable state)",
                err
            ),
            Self::General(err) => write!(f, "unexpected error: {}", err),
            Self::Other(err) => write!(f, "other error: {}", err),
        }
    }
}

impl StdError for Error {}

impl From<rand::GetRandomFailed> for Error {
    fn from(_: rand::GetRandomFailed) -> Self {
        Self::FailedToGetRandomBytes
    }
}

/// Any other error that cannot be expressed by a more specific [`Error`] variant.
///
/// For example, an `OtherError` could be produced by an HPKE backend
/// exposing a backend specific error.
///
/// Enums holding this type will never compare equal to each other.
#[derive(Debug, Clone)]
pub struct OtherError(pub Arc<dyn StdError + Send + Sync>);

impl PartialEq<Self> for OtherError {
    fn eq(&self, _other: &Self) -> bool {
        false
    }
}

impl From<OtherError> for Error {
    fn from(value: OtherError) -> Self {
        Self::Other(value)
    }
}

impl fmt::Display for OtherError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl StdError for OtherError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.0.as_ref())
    }
}

/// Wrap a backend error as [`Error::Other`].
pub(crate) fn other_err(err: impl StdError + Send + Sync + 'static) -> Error {
    Error::Other(OtherError(Arc::new(err)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn other_error_equality() {
        let other_error = OtherError(Arc::from(Box::from("")));
        assert_ne!(other_error, other_error);
        let other: Error = other_error.into();
        assert_ne!(other, other);
    }

    #[test]
    fn smoke() {
        let all = vec![
            Error::InappropriateHandshakeMessage {
                expect_types: vec![HandshakeType::ServerHello],
                got_type: HandshakeType::Finished,
            },
            Error::InvalidMessage(InvalidMessage::NonZeroClientHelloInnerPadding),
            Error::DecryptError,
            PeerIncompatible::NoKxGroupsInCommon.into(),
            PeerMisbehaved::EchConfigChangedAfterHelloRetryRequest.into(),
            EncryptedClientHelloError::NoCompatibleConfig.into(),
            RejectedEch {
                retry_configs: None,
            }
            .into(),
            DelegatedCredentialError::Expired.into(),
            Error::General("undocumented error".to_string()),
            Error::FailedToGetCurrentTime,
            Error::FailedToGetRandomBytes,
            Error::Unreachable("smoke"),
            Error::Other(OtherError(Arc::from(Box::from("")))),
        ];

        for err in all {
            println!("{:?}:", err);
            println!("  fmt '{}'", err);
        }
    }

    #[test]
    fn rand_error_mapping() {
        let err: Error = rand::GetRandomFailed.into();
        assert_eq!(err, Error::FailedToGetRandomBytes);
    }

    #[test]
    fn alert_mappings() {
        assert_eq!(
            AlertDescription::from(&PeerMisbehaved::EchMissingAfterHelloRetryRequest),
            AlertDescription::MissingExtension
        );
        assert_eq!(
            AlertDescription::from(&PeerMisbehaved::EchConfigChangedAfterHelloRetryRequest),
            AlertDescription::IllegalParameter
        );
        assert_eq!(
            AlertDescription::from(&PeerMisbehaved::EchRetryConfigsAfterAcceptance),
            AlertDescription::UnsupportedExtension
        );
        assert_eq!(
            AlertDescription::from(InvalidMessage::MissingData("x")),
            AlertDescription::DecodeError
        );
        assert_eq!(
            AlertDescription::from(InvalidMessage::InvalidEchOuterExtensions),
            AlertDescription::IllegalParameter
        );
    }

    #[test]
    fn rejected_ech_retry() {
        assert!(!RejectedEch {
            retry_configs: None
        }
        .can_retry());
        assert!(!RejectedEch {
            retry_configs: Some(Vec::new())
        }
        .can_retry());
    }
}
