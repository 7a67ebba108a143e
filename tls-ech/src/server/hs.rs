use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use crate::common_state::{CommonState, Side};
use crate::crypto::hash::HashAlgorithm;
use crate::crypto::{SharedSecret, SupportedKxGroup};
use crate::delegated_credential::DelegatedCredentialPair;
use crate::enums::{AlertDescription, CipherSuite, HandshakeType, NamedGroup, ProtocolVersion};
use crate::error::{Error, InvalidMessage, PeerIncompatible, PeerMisbehaved};
use crate::hash_hs::HandshakeHash;
use crate::key_schedule::{server_ech_confirmation, server_ech_hrr_confirmation, ECH_CONFIRMATION_LEN};
use crate::log::{debug, trace};
use crate::msgs::codec::Codec;
use crate::msgs::enums::{Compression, ExtensionType};
use crate::msgs::handshake::{
    CertificateEntry, ClientHelloPayload, EncryptedExtensions, Extension, KeyShareEntry, Random,
    ServerHelloPayload, HELLO_RETRY_REQUEST_RANDOM,
};
use crate::msgs::inner_hello::SERVER_HELLO_ECH_CONFIRMATION_SPAN;
use crate::rand::random_array;
use crate::server::ech::{accept_or_reject, ServerEchState};
use crate::server::ServerConfig;
use crate::sign::DelegatedKey;

/// What the server answers a ClientHello with.
pub enum ClientHelloOutcome {
    /// Send this HelloRetryRequest message and wait for a second ClientHello.
    HelloRetry(Vec<u8>),
    /// Send this ServerHello message; the key exchange completed with `secret`.
    ServerHello {
        /// The encoded ServerHello message.
        message: Vec<u8>,
        /// The key exchange result.
        secret: SharedSecret,
    },
}

impl fmt::Debug for ClientHelloOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HelloRetry(msg) => f
                .debug_tuple("HelloRetry")
                .field(&msg.len())
                .finish(),
            Self::ServerHello { message, .. } => f
                .debug_struct("ServerHello")
                .field("message", &message.len())
                .finish_non_exhaustive(),
        }
    }
}

/// The server side of a TLS 1.3 handshake, from the ClientHello up to the
/// server certificate.
///
/// Each ClientHello passes through the ECH accept/reject decision first, and
/// the rest of the handshake is driven by the hello it resolves to.
pub struct ServerHandshake {
    config: Arc<ServerConfig>,
    common: CommonState,
    ech: ServerEchState,
    client_hello: Option<ClientHelloPayload>,
    suite: Option<CipherSuite>,
    transcript: Option<HandshakeHash>,
    sent_hello_retry: bool,
    sent_server_hello: bool,
}

impl ServerHandshake {
    /// Start a handshake with `config`.
    pub fn new(config: Arc<ServerConfig>) -> Self {
        Self {
            config,
            common: CommonState::new(Side::Server),
            ech: ServerEchState::default(),
            client_hello: None,
            suite: None,
            transcript: None,
            sent_hello_retry: false,
            sent_server_hello: false,
        }
    }

    /// Process a ClientHello handshake message.
    pub fn handle_client_hello(&mut self, msg: &[u8]) -> Result<ClientHelloOutcome, Error> {
        if self.sent_server_hello {
            return Err(self.common.send_fatal_alert(
                AlertDescription::UnexpectedMessage,
                Error::InappropriateHandshakeMessage {
                    expect_types: vec![HandshakeType::Finished],
                    got_type: HandshakeType::ClientHello,
                },
            ));
        }

        let outer = ClientHelloPayload::read_message(msg).map_err(|err| self.decode_error(err))?;
        if outer.has_duplicate_extension() {
            return Err(self
                .common
                .misbehaved(PeerMisbehaved::DuplicateClientHelloExtensions));
        }

        let after_hrr = self.sent_hello_retry;
        let accepted = accept_or_reject(
            self.config.ech_provider(),
            &mut self.ech,
            &mut self.common,
            &outer,
            msg,
            after_hrr,
        )?;
        let (hello, hello_msg) = match accepted {
            Some((inner, inner_msg)) => (inner, inner_msg),
            None => (outer, msg.to_vec()),
        };

        if !hello.offers_tls13() {
            return Err(self.common.send_fatal_alert(
                AlertDescription::ProtocolVersion,
                PeerIncompatible::SupportedVersionsExtensionRequired,
            ));
        }

        let suite = self.choose_suite(&hello)?;
        let Some(algorithm) = HashAlgorithm::for_suite(suite) else {
            return Err(Error::General("configured cipher suite is not TLS 1.3".into()));
        };

        let mut transcript = match self.transcript.take() {
            Some(transcript) => transcript,
            None => HandshakeHash::new(algorithm),
        };
        transcript.add_message(&hello_msg);

        let key_shares = hello
            .key_shares()
            .map_err(|err| self.decode_error(err))?;
        let share = self
            .config
            .kx_groups
            .iter()
            .find_map(|group| {
                key_shares
                    .iter()
                    .find(|share| share.group == group.name())
                    .map(|share| (*group, share))
            });

        let outcome = match share {
            Some((group, share)) => {
                let (message, secret) =
                    self.server_hello(&hello, &mut transcript, group, share, suite)?;
                ClientHelloOutcome::ServerHello { message, secret }
            }
            None if after_hrr => {
                return Err(self
                    .common
                    .misbehaved(PeerMisbehaved::RefusedToFollowHelloRetryRequest));
            }
            None => {
                let group = self.choose_retry_group(&hello)?;
                ClientHelloOutcome::HelloRetry(self.hello_retry_request(
                    &hello,
                    &mut transcript,
                    group,
                    suite,
                )?)
            }
        };

        self.transcript = Some(transcript);
        self.client_hello = Some(hello);
        Ok(outcome)
    }

    /// The EncryptedExtensions message, carrying retry configurations after
    /// an ECH rejection.
    pub fn encrypted_extensions(&mut self) -> Result<Vec<u8>, Error> {
        if !self.sent_server_hello {
            return Err(Error::General(
                "EncryptedExtensions before ServerHello".into(),
            ));
        }

        let mut extensions = Vec::new();
        if let (false, true, Some(configs)) =
            (self.ech.accepted, self.ech.greased, &self.ech.retry_configs)
        {
            trace!("Sending ECH retry configs");
            extensions.push(Extension::new(
                ExtensionType::EncryptedClientHello,
                configs.clone(),
            ));
        }

        let msg = EncryptedExtensions(extensions).encode_message();
        if let Some(transcript) = self.transcript.as_mut() {
            transcript.add_message(&msg);
        }
        Ok(msg)
    }

    /// The end-entity certificate entry for `cert_der`.
    ///
    /// When the client offered delegated credentials for the scheme of a
    /// configured credential, the credential is attached and its key is
    /// returned: it signs CertificateVerify in place of the certificate key.
    pub fn end_entity_certificate(
        &mut self,
        cert_der: &[u8],
    ) -> Result<(CertificateEntry, Option<&DelegatedKey>), Error> {
        let mut entry = CertificateEntry::new(cert_der);
        let offered = match &self.client_hello {
            Some(hello) => hello.delegated_credential_schemes(),
            None => return Err(Error::General("certificate before ClientHello".into())),
        };
        let offered = match offered {
            Ok(Some(offered)) => offered,
            Ok(None) => return Ok((entry, None)),
            Err(err) => return Err(self.decode_error(err)),
        };

        match DelegatedCredentialPair::select(&self.config.delegated_credentials, &offered) {
            Some(pair) => {
                debug!("Sending delegated credential for {:?}", pair.credential.scheme());
                pair.attach(&mut entry);
                Ok((entry, Some(&pair.key)))
            }
            None => Ok((entry, None)),
        }
    }

    /// Whether the connection continues with the ClientHelloInner.
    pub fn ech_accepted(&self) -> bool {
        self.ech.accepted
    }

    /// The ClientHello the handshake is driven by: the inner one when ECH was accepted.
    pub fn client_hello(&self) -> Option<&ClientHelloPayload> {
        self.client_hello.as_ref()
    }

    /// The `server_name` of the resolved ClientHello.
    pub fn server_name(&self) -> Option<Vec<u8>> {
        self.client_hello
            .as_ref()
            .and_then(|hello| hello.server_name().ok().flatten())
    }

    /// The handshake transcript so far.
    pub fn transcript(&self) -> Option<&HandshakeHash> {
        self.transcript.as_ref()
    }

    /// Alert state.
    pub fn common_state(&mut self) -> &mut CommonState {
        &mut self.common
    }

    fn choose_suite(&mut self, hello: &ClientHelloPayload) -> Result<CipherSuite, Error> {
        let chosen = self
            .config
            .cipher_suites
            .iter()
            .find(|suite| hello.cipher_suites.contains(*suite))
            .copied();

        match (chosen, self.suite) {
            (None, _) => Err(self.common.send_fatal_alert(
                AlertDescription::HandshakeFailure,
                PeerIncompatible::NoCipherSuitesInCommon,
            )),
            (Some(chosen), Some(previous)) if chosen != previous => Err(self
                .common
                .misbehaved(PeerMisbehaved::RefusedToFollowHelloRetryRequest)),
            (Some(chosen), _) => {
                trace!("Chose cipher suite {:?}", chosen);
                self.suite = Some(chosen);
                Ok(chosen)
            }
        }
    }

    fn choose_retry_group(&mut self, hello: &ClientHelloPayload) -> Result<NamedGroup, Error> {
        let offered = hello
            .named_groups()
            .map_err(|err| self.decode_error(err))?;
        self.config
            .kx_groups
            .iter()
            .map(|group| group.name())
            .find(|name| offered.contains(name))
            .ok_or_else(|| {
                self.common.send_fatal_alert(
                    AlertDescription::HandshakeFailure,
                    PeerIncompatible::NoKxGroupsInCommon,
                )
            })
    }

    fn hello_retry_request(
        &mut self,
        hello: &ClientHelloPayload,
        transcript: &mut HandshakeHash,
        group: NamedGroup,
        suite: CipherSuite,
    ) -> Result<Vec<u8>, Error> {
        debug!("Asking client for a {:?} key share", group);
        let mut hrr = ServerHelloPayload {
            legacy_version: ProtocolVersion::TLSv1_2,
            random: HELLO_RETRY_REQUEST_RANDOM,
            session_id: hello.session_id.clone(),
            cipher_suite: suite,
            compression_method: Compression::Null,
            extensions: vec![
                Extension::new(
                    ExtensionType::SupportedVersions,
                    ProtocolVersion::TLSv1_3.get_encoding(),
                ),
                Extension::new(ExtensionType::KeyShare, group.get_encoding()),
            ],
        };

        transcript.rollup_for_hrr();
        if self.ech.accepted {
            hrr.set_extension(Extension::new(
                ExtensionType::EncryptedClientHello,
                vec![0; ECH_CONFIRMATION_LEN],
            ));
            let hash = transcript.hash_given(&hrr.encode_message());
            let confirmation = server_ech_hrr_confirmation(
                transcript.algorithm(),
                &hello.random.0,
                hash.as_ref(),
            )?;
            hrr.set_extension(Extension::new(
                ExtensionType::EncryptedClientHello,
                confirmation.to_vec(),
            ));
        }

        let msg = hrr.encode_message();
        transcript.add_message(&msg);
        self.sent_hello_retry = true;
        Ok(msg)
    }

    fn server_hello(
        &mut self,
        hello: &ClientHelloPayload,
        transcript: &mut HandshakeHash,
        group: &'static dyn SupportedKxGroup,
        share: &KeyShareEntry,
        suite: CipherSuite,
    ) -> Result<(Vec<u8>, SharedSecret), Error> {
        let kx = group
            .start_and_complete(share.payload.bytes(), self.config.random.as_ref())
            .map_err(|_| self.common.misbehaved(PeerMisbehaved::InvalidKeyShare))?;

        let mut random = random_array(self.config.random.as_ref())?;
        if self.ech.accepted {
            random[24..].fill(0);
        }

        let mut server_hello = ServerHelloPayload {
            legacy_version: ProtocolVersion::TLSv1_2,
            random: Random(random),
            session_id: hello.session_id.clone(),
            cipher_suite: suite,
            compression_method: Compression::Null,
            extensions: vec![
                Extension::new(
                    ExtensionType::SupportedVersions,
                    ProtocolVersion::TLSv1_3.get_encoding(),
                ),
                Extension::new(
                    ExtensionType::KeyShare,
                    KeyShareEntry::new(kx.group, kx.pub_key).get_encoding(),
                ),
            ],
        };

        let mut msg = server_hello.encode_message();
        if self.ech.accepted {
            let hash = transcript.hash_given(&msg);
            let confirmation = server_ech_confirmation(
                transcript.algorithm(),
                &hello.random.0,
                hash.as_ref(),
            )?;
            server_hello.random.0[24..].copy_from_slice(&confirmation);
            msg[SERVER_HELLO_ECH_CONFIRMATION_SPAN].copy_from_slice(&confirmation);
            debug!("Confirming ECH acceptance in ServerHello");
        }

        transcript.add_message(&msg);
        self.sent_server_hello = true;
        Ok((msg, kx.secret))
    }

    fn decode_error(&mut self, err: InvalidMessage) -> Error {
        self.common
            .send_fatal_alert(AlertDescription::DecodeError, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::kx::{X25519, X25519MLKEM768};
    use crate::crypto::OsRandom;
    use crate::msgs::handshake::SessionId;

    fn client_hello(groups: &[NamedGroup], shares: &[KeyShareEntry]) -> Vec<u8> {
        ClientHelloPayload {
            client_version: ProtocolVersion::TLSv1_2,
            random: Random([3; 32]),
            session_id: SessionId::new(&[4; 32]).unwrap(),
            cipher_suites: vec![CipherSuite::TLS13_AES_256_GCM_SHA384],
            compression_methods: vec![Compression::Null],
            extensions: vec![
                Extension::server_name(b"example.com"),
                Extension::named_groups(groups),
                Extension::supported_versions(&[ProtocolVersion::TLSv1_3]),
                Extension::key_shares(shares),
            ],
        }
        .encode_message()
    }

    fn x25519_share() -> KeyShareEntry {
        let kx = X25519.start(&OsRandom).unwrap();
        KeyShareEntry::new(kx.group(), kx.pub_key())
    }

    #[test]
    fn server_hello_for_offered_share() {
        let mut hs = ServerHandshake::new(Arc::new(ServerConfig::new()));
        let outcome = hs
            .handle_client_hello(&client_hello(&[NamedGroup::X25519], &[x25519_share()]))
            .unwrap();
        let ClientHelloOutcome::ServerHello { message, .. } = outcome else {
            panic!("expected a ServerHello");
        };

        let sh = ServerHelloPayload::read_message(&message).unwrap();
        assert!(!sh.is_hello_retry_request());
        assert_eq!(sh.cipher_suite, CipherSuite::TLS13_AES_256_GCM_SHA384);
        assert_eq!(sh.selected_version().unwrap(), Some(ProtocolVersion::TLSv1_3));
        assert_eq!(sh.key_share().unwrap().unwrap().group, NamedGroup::X25519);
        assert_eq!(sh.session_id.as_ref(), &[4; 32]);
        assert_eq!(hs.server_name().unwrap(), b"example.com");
        assert!(!hs.ech_accepted());

        let ee = EncryptedExtensions::read_message(&hs.encrypted_extensions().unwrap()).unwrap();
        assert!(ee.0.is_empty());
    }

    #[test]
    fn hello_retry_request_for_missing_share() {
        let mut config = ServerConfig::new();
        config.kx_groups = vec![X25519MLKEM768, X25519];
        let mut hs = ServerHandshake::new(Arc::new(config));

        let outcome = hs
            .handle_client_hello(&client_hello(
                &[NamedGroup::X25519MLKEM768, NamedGroup::X25519],
                &[],
            ))
            .unwrap();
        let ClientHelloOutcome::HelloRetry(message) = outcome else {
            panic!("expected a HelloRetryRequest");
        };
        let hrr = ServerHelloPayload::read_message(&message).unwrap();
        assert!(hrr.is_hello_retry_request());
        assert_eq!(hrr.selected_group().unwrap(), Some(NamedGroup::X25519MLKEM768));

        // still no usable share
        let err = hs
            .handle_client_hello(&client_hello(&[NamedGroup::X25519], &[]))
            .unwrap_err();
        assert_eq!(
            err,
            Error::PeerMisbehaved(PeerMisbehaved::RefusedToFollowHelloRetryRequest)
        );
    }

    #[test]
    fn no_common_parameters() {
        let mut hs = ServerHandshake::new(Arc::new(ServerConfig::new()));
        let err = hs
            .handle_client_hello(&client_hello(&[NamedGroup::secp256r1], &[]))
            .unwrap_err();
        assert_eq!(
            err,
            Error::PeerIncompatible(PeerIncompatible::NoKxGroupsInCommon)
        );
        assert_eq!(
            hs.common_state().last_alert(),
            Some(AlertDescription::HandshakeFailure)
        );
    }
}
