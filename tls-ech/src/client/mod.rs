//! The client half: configuration, the ECH offer/GREASE engine and the
//! handshake flights that carry it.

use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

use crate::crypto::kx::ALL_KX_GROUPS;
use crate::crypto::{OsRandom, SecureRandom, SupportedKxGroup};
use crate::enums::{CipherSuite, ProtocolVersion, SignatureScheme};
use crate::time_provider::{DefaultTimeProvider, TimeProvider};

pub(crate) mod ech;
mod hs;

pub use ech::{EchConfig, EchGreaseConfig, EchMode, EchStatus};
pub use hs::{ClientHandshake, ServerHelloOutcome};

/// Common configuration for (typically) all connections made by a program.
///
/// Making one of these is cheap, though one of the inputs may be expensive:
/// an [`EchConfig`] parses and selects from the server's `ECHConfigList`.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// How to use Encrypted Client Hello, if at all.
    pub ech_mode: Option<EchMode>,

    /// TLS 1.3 cipher suites to offer, in preference order.
    pub cipher_suites: Vec<CipherSuite>,

    /// Key exchange groups to offer, in preference order.
    ///
    /// A key share is sent for the first one only.
    pub kx_groups: Vec<&'static dyn SupportedKxGroup>,

    /// Signature schemes for `signature_algorithms`.
    pub signature_schemes: Vec<SignatureScheme>,

    /// Whether to offer to accept delegated credentials, for the schemes in
    /// `signature_schemes`.
    pub delegated_credentials: bool,

    /// Protocol versions for `supported_versions`.
    pub supported_versions: Vec<ProtocolVersion>,

    /// Source of randomness for hello randoms, key shares and ECH.
    pub random: Arc<dyn SecureRandom>,

    /// Source of the current time, for checking delegated credentials.
    pub time_provider: Arc<dyn TimeProvider>,
}

impl ClientConfig {
    /// A TLS 1.3-only configuration without ECH.
    pub fn new() -> Self {
        Self {
            ech_mode: None,
            cipher_suites: vec![
                CipherSuite::TLS13_AES_128_GCM_SHA256,
                CipherSuite::TLS13_AES_256_GCM_SHA384,
                CipherSuite::TLS13_CHACHA20_POLY1305_SHA256,
            ],
            kx_groups: ALL_KX_GROUPS.to_vec(),
            signature_schemes: vec![
                SignatureScheme::ECDSA_NISTP256_SHA256,
                SignatureScheme::ECDSA_NISTP384_SHA384,
                SignatureScheme::ECDSA_NISTP521_SHA512,
                SignatureScheme::ED25519,
                SignatureScheme::RSA_PSS_SHA256,
                SignatureScheme::RSA_PSS_SHA384,
                SignatureScheme::RSA_PSS_SHA512,
            ],
            delegated_credentials: false,
            supported_versions: vec![ProtocolVersion::TLSv1_3],
            random: Arc::new(OsRandom),
            time_provider: Arc::new(DefaultTimeProvider),
        }
    }

    /// This configuration with `mode` for ECH.
    pub fn with_ech(mut self, mode: impl Into<EchMode>) -> Self {
        self.ech_mode = Some(mode.into());
        self
    }
}
