//! The server half: the ECH accept/reject engine, decryption-context
//! providers and the handshake flights that carry the ECH and delegated
//! credential decisions.

use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

use crate::crypto::kx::ALL_KX_GROUPS;
use crate::crypto::{OsRandom, SecureRandom, SupportedKxGroup};
use crate::delegated_credential::DelegatedCredentialPair;
use crate::enums::{CipherSuite, ProtocolVersion};

pub(crate) mod ech;
mod hs;

pub use ech::{EchDecryption, EchKeySet, EchProvider, EchProviderResult};
pub use hs::{ClientHelloOutcome, ServerHandshake};

/// Common configuration for a set of server sessions.
#[derive(Debug)]
pub struct ServerConfig {
    /// Where to find ECH decryption contexts. `None` ignores ECH offers.
    pub ech_provider: Option<Arc<dyn EchProvider>>,

    /// TLS 1.3 cipher suites, in preference order.
    pub cipher_suites: Vec<CipherSuite>,

    /// Key exchange groups, in preference order.
    pub kx_groups: Vec<&'static dyn SupportedKxGroup>,

    /// Source of randomness for the ServerHello and key exchange.
    pub random: Arc<dyn SecureRandom>,

    /// The highest protocol version supported.
    ///
    /// ECH is only accepted when this is TLS 1.3.
    pub max_supported_version: ProtocolVersion,

    /// Delegated credentials for the end-entity certificate.
    ///
    /// The first one whose scheme the client offers is sent.
    pub delegated_credentials: Vec<DelegatedCredentialPair>,
}

impl ServerConfig {
    /// A TLS 1.3 configuration without ECH or delegated credentials.
    pub fn new() -> Self {
        Self {
            ech_provider: None,
            cipher_suites: vec![
                CipherSuite::TLS13_AES_128_GCM_SHA256,
                CipherSuite::TLS13_AES_256_GCM_SHA384,
                CipherSuite::TLS13_CHACHA20_POLY1305_SHA256,
            ],
            kx_groups: ALL_KX_GROUPS.to_vec(),
            random: Arc::new(OsRandom),
            max_supported_version: ProtocolVersion::TLSv1_3,
            delegated_credentials: Vec::new(),
        }
    }

    /// This configuration with `provider` for ECH.
    pub fn with_ech(mut self, provider: Arc<dyn EchProvider>) -> Self {
        self.ech_provider = Some(provider);
        self
    }

    pub(crate) fn ech_provider(&self) -> Option<&dyn EchProvider> {
        match self.max_supported_version {
            ProtocolVersion::TLSv1_3 => self.ech_provider.as_deref(),
            _ => None,
        }
    }
}
