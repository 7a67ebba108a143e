use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;
use core::mem;

use crate::client::ech::{self, EchState, EchStatus};
use crate::client::ClientConfig;
use crate::common_state::{CommonState, Side};
use crate::crypto::hash::HashAlgorithm;
use crate::crypto::{ActiveKeyExchange, SharedSecret};
use crate::delegated_credential::DelegatedCredential;
use crate::enums::{
    AlertDescription, CipherSuite, HandshakeType, ProtocolVersion, SignatureScheme,
};
use crate::error::{Error, InvalidMessage, PeerMisbehaved, RejectedEch};
use crate::hash_hs::{HandshakeHash, HandshakeHashBuffer};
use crate::key_schedule::ECH_CONFIRMATION_LEN;
use crate::log::{debug, trace};
use crate::msgs::base::PayloadU16;
use crate::msgs::ech::EchConfigPayload;
use crate::msgs::enums::{Compression, ExtensionType};
use crate::msgs::handshake::{
    CertificateEntry, ClientHelloPayload, EncryptedExtensions, Extension, KeyShareEntry, Random,
    ServerHelloPayload, SessionId,
};
use crate::rand::random_array;

/// What the server's first flight asked of us.
pub enum ServerHelloOutcome {
    /// A HelloRetryRequest: send this second ClientHello message.
    HelloRetry(Vec<u8>),
    /// A ServerHello: the key exchange completed with this secret.
    ServerHello(SharedSecret),
}

impl fmt::Debug for ServerHelloOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HelloRetry(msg) => f
                .debug_tuple("HelloRetry")
                .field(&msg.len())
                .finish(),
            Self::ServerHello(_) => f.write_str("ServerHello"),
        }
    }
}

/// The client side of a TLS 1.3 handshake, from the first ClientHello up to
/// the server certificate.
///
/// Until the ServerHello settles whether ECH was accepted, transcripts are
/// kept for both the ClientHelloOuter and the ClientHelloInner.
pub struct ClientHandshake {
    config: Arc<ClientConfig>,
    common: CommonState,
    ech: EchState,
    outer_hello: ClientHelloPayload,
    inner_hello: Option<ClientHelloPayload>,
    outer_transcript: Transcript,
    inner_transcript: Option<Transcript>,
    key_share: Option<Box<dyn ActiveKeyExchange>>,
    hrr_suite: Option<CipherSuite>,
    transcript: Option<HandshakeHash>,
}

impl ClientHandshake {
    /// Build the first ClientHello for `server_name`.
    ///
    /// Returns the handshake and the encoded ClientHello message to send.
    pub fn start(
        config: Arc<ClientConfig>,
        server_name: Option<&[u8]>,
    ) -> Result<(Self, Vec<u8>), Error> {
        let random = config.random.as_ref();
        let Some(group) = config.kx_groups.first() else {
            return Err(Error::General("no key exchange groups configured".into()));
        };
        let key_share = group.start(random)?;

        let mut extensions = Vec::new();
        if let Some(name) = server_name {
            extensions.push(Extension::server_name(name));
        }
        let groups: Vec<_> = config
            .kx_groups
            .iter()
            .map(|group| group.name())
            .collect();
        extensions.push(Extension::named_groups(&groups));
        extensions.push(Extension::signature_algorithms(
            &config.signature_schemes,
        ));
        if config.delegated_credentials {
            extensions.push(Extension::delegated_credentials(
                &config.signature_schemes,
            ));
        }
        extensions.push(Extension::supported_versions(
            &config.supported_versions,
        ));
        extensions.push(Extension::key_shares(&[KeyShareEntry::new(
            key_share.group(),
            key_share.pub_key(),
        )]));

        let base = ClientHelloPayload {
            client_version: ProtocolVersion::TLSv1_2,
            random: Random(random_array(random)?),
            session_id: SessionId::new(&random_array(random)?)?,
            cipher_suites: config.cipher_suites.clone(),
            compression_methods: vec![Compression::Null],
            extensions,
        };

        let mut ech = EchState::default();
        let (outer_hello, inner_hello) =
            ech::offer_or_grease(config.ech_mode.as_ref(), &mut ech, base, server_name, random)?;

        let outer_msg = outer_hello.encode_message();
        let mut outer_transcript = Transcript::default();
        outer_transcript.add(&outer_msg);
        let inner_transcript = inner_hello.as_ref().map(|inner| {
            let mut transcript = Transcript::default();
            transcript.add(&inner.encode_message());
            transcript
        });

        Ok((
            Self {
                config,
                common: CommonState::new(Side::Client),
                ech,
                outer_hello,
                inner_hello,
                outer_transcript,
                inner_transcript,
                key_share: Some(key_share),
                hrr_suite: None,
                transcript: None,
            },
            outer_msg,
        ))
    }

    /// Process a ServerHello or HelloRetryRequest handshake message.
    pub fn handle_server_hello(&mut self, msg: &[u8]) -> Result<ServerHelloOutcome, Error> {
        if self.transcript.is_some() {
            return Err(self.common.send_fatal_alert(
                AlertDescription::UnexpectedMessage,
                Error::InappropriateHandshakeMessage {
                    expect_types: vec![HandshakeType::EncryptedExtensions],
                    got_type: HandshakeType::ServerHello,
                },
            ));
        }

        let server_hello = ServerHelloPayload::read_message(msg).map_err(|err| self.decode_error(err))?;
        if server_hello.has_duplicate_extension() {
            return Err(self
                .common
                .misbehaved(PeerMisbehaved::DuplicateServerHelloExtensions));
        }

        match server_hello.is_hello_retry_request() {
            true => self
                .handle_hello_retry_request(&server_hello, msg)
                .map(ServerHelloOutcome::HelloRetry),
            false => self
                .handle_real_server_hello(&server_hello, msg)
                .map(ServerHelloOutcome::ServerHello),
        }
    }

    fn handle_hello_retry_request(
        &mut self,
        hrr: &ServerHelloPayload,
        msg: &[u8],
    ) -> Result<Vec<u8>, Error> {
        if self.hrr_suite.is_some() {
            return Err(self.common.send_fatal_alert(
                AlertDescription::UnexpectedMessage,
                Error::InappropriateHandshakeMessage {
                    expect_types: vec![HandshakeType::ServerHello],
                    got_type: HandshakeType::HelloRetryRequest,
                },
            ));
        }
        let algorithm = self.check_suite_and_version(hrr)?;
        self.hrr_suite = Some(hrr.cipher_suite);

        let cookie = hrr
            .cookie()
            .map_err(|err| self.decode_error(err))?;
        let group = hrr
            .selected_group()
            .map_err(|err| self.decode_error(err))?;
        if cookie.is_none() && group.is_none() {
            return Err(self
                .common
                .misbehaved(PeerMisbehaved::IllegalHelloRetryRequestWithNoChanges));
        }

        let mut new_share = None;
        if let Some(group) = group {
            if self
                .key_share
                .as_ref()
                .is_some_and(|share| share.group() == group)
            {
                return Err(self
                    .common
                    .misbehaved(PeerMisbehaved::IllegalHelloRetryRequestWithOfferedGroup));
            }
            let Some(kx) = self
                .config
                .kx_groups
                .iter()
                .find(|kx| kx.name() == group)
            else {
                return Err(self
                    .common
                    .misbehaved(PeerMisbehaved::IllegalHelloRetryRequestWithUnofferedNamedGroup));
            };
            trace!("Server asked for a {:?} key share", group);
            new_share = Some(kx.start(self.config.random.as_ref())?);
        }

        let mut outer_transcript = mem::take(&mut self.outer_transcript).into_hash(algorithm);
        outer_transcript.rollup_for_hrr();
        let mut inner_transcript = self
            .inner_transcript
            .take()
            .map(|transcript| {
                let mut transcript = transcript.into_hash(algorithm);
                transcript.rollup_for_hrr();
                transcript
            });

        let mut hrr_accepted = false;
        if let (Some(inner_transcript), Some(ext)) = (
            &inner_transcript,
            hrr.extension(ExtensionType::EncryptedClientHello),
        ) {
            if ext.data.bytes().len() != ECH_CONFIRMATION_LEN {
                return Err(self
                    .common
                    .misbehaved(PeerMisbehaved::IllegalHelloRetryRequestWithInvalidEch));
            }
            hrr_accepted = self
                .ech
                .hrr_accepted(inner_transcript, msg, ext.data.bytes())?;
        }

        let share_entry = new_share
            .as_ref()
            .map(|kx| KeyShareEntry::new(kx.group(), kx.pub_key()));
        let outer = retry_hello(&self.outer_hello, share_entry.as_ref(), cookie.as_ref());

        let (outer, inner) = match &self.inner_hello {
            Some(inner) if hrr_accepted => {
                let inner = retry_hello(inner, share_entry.as_ref(), cookie.as_ref());
                (self.ech.reseal(outer, &inner)?, Some(inner))
            }
            _ if self.ech.offered || self.ech.greased => {
                if self.ech.offered {
                    debug!("ECH rejected in hello retry request");
                }
                (
                    self.ech
                        .regrease(outer, self.config.random.as_ref())?,
                    None,
                )
            }
            _ => (outer, None),
        };

        let outer_msg = outer.encode_message();
        outer_transcript
            .add_message(msg)
            .add_message(&outer_msg);
        self.outer_transcript = Transcript::Hashing(outer_transcript);

        if let (Some(inner), Some(transcript)) = (&inner, inner_transcript.as_mut()) {
            transcript
                .add_message(msg)
                .add_message(&inner.encode_message());
        }
        self.inner_transcript = inner_transcript
            .filter(|_| inner.is_some())
            .map(Transcript::Hashing);

        self.outer_hello = outer;
        self.inner_hello = inner;
        if let Some(share) = new_share {
            self.key_share = Some(share);
        }
        Ok(outer_msg)
    }

    fn handle_real_server_hello(
        &mut self,
        server_hello: &ServerHelloPayload,
        msg: &[u8],
    ) -> Result<SharedSecret, Error> {
        let algorithm = self.check_suite_and_version(server_hello)?;
        if self
            .hrr_suite
            .is_some_and(|suite| suite != server_hello.cipher_suite)
        {
            return Err(self
                .common
                .misbehaved(PeerMisbehaved::SelectedDifferentCipherSuiteAfterRetry));
        }

        let mut transcript = mem::take(&mut self.outer_transcript).into_hash(algorithm);
        let inner_transcript = self
            .inner_transcript
            .take()
            .map(|transcript| transcript.into_hash(algorithm));

        if self.ech.offered {
            if let Some(inner_transcript) = inner_transcript {
                if self
                    .ech
                    .server_hello_accepted(&inner_transcript, msg, &server_hello.random)?
                {
                    debug!("ECH accepted by server");
                    self.ech.accepted = true;
                    transcript = inner_transcript;
                }
            }

            if !self.ech.accepted {
                debug!("ECH rejected by server");
                if server_hello.has_pre_shared_key() {
                    return Err(self
                        .common
                        .misbehaved(PeerMisbehaved::SelectedPskAfterEchRejection));
                }
            }
        }
        self.ech.resolved = true;

        transcript.add_message(msg);
        self.transcript = Some(transcript);

        let share = match server_hello.key_share() {
            Ok(Some(share)) => share,
            Ok(None) => return Err(self.common.misbehaved(PeerMisbehaved::MissingKeyShare)),
            Err(err) => return Err(self.decode_error(err)),
        };
        let Some(kx) = self.key_share.take() else {
            return Err(Error::Unreachable("key share completed twice"));
        };
        if share.group != kx.group() {
            return Err(self
                .common
                .misbehaved(PeerMisbehaved::SelectedUnofferedKxGroup));
        }

        kx.complete(share.payload.bytes())
            .map_err(|err| {
                self.common
                    .send_fatal_alert(AlertDescription::IllegalParameter, err)
            })
    }

    /// Process the EncryptedExtensions handshake message.
    ///
    /// Retry configurations are kept for [`Self::abort_if_required`].
    pub fn handle_encrypted_extensions(&mut self, msg: &[u8]) -> Result<(), Error> {
        let ee = EncryptedExtensions::read_message(msg).map_err(|err| self.decode_error(err))?;
        if let Some(transcript) = self.transcript.as_mut() {
            transcript.add_message(msg);
        }

        let Some(ext) = ee.extension(ExtensionType::EncryptedClientHello) else {
            return Ok(());
        };

        match self.ech.status() {
            EchStatus::Accepted => Err(self
                .common
                .misbehaved(PeerMisbehaved::EchRetryConfigsAfterAcceptance)),
            EchStatus::Rejected => {
                let configs = EchConfigPayload::parse_list(ext.data.bytes())
                    .map_err(|_| {
                        self.common
                            .misbehaved(PeerMisbehaved::InvalidEchRetryConfigs)
                    })?;
                debug!("Server sent {} usable ECH retry configs", configs.len());
                self.ech.retry_configs = Some(configs);
                Ok(())
            }
            EchStatus::Grease => {
                trace!("Ignoring ECH retry configs after GREASE");
                Ok(())
            }
            EchStatus::NotOffered | EchStatus::Offered => Err(self
                .common
                .misbehaved(PeerMisbehaved::UnsolicitedEchRetryConfigs)),
        }
    }

    /// Check the delegated credential in the server's end-entity certificate entry.
    ///
    /// `cert_verify_scheme` is the scheme of the server's CertificateVerify.
    /// A credential that fails validation is ignored: the handshake goes on
    /// with the certificate key.
    pub fn process_delegated_credential(
        &mut self,
        entry: &CertificateEntry,
        cert_verify_scheme: SignatureScheme,
    ) -> Result<Option<DelegatedCredential>, Error> {
        let credential = match DelegatedCredential::from_certificate_entry(entry) {
            None => return Ok(None),
            Some(_) if !self.config.delegated_credentials => {
                return Err(self
                    .common
                    .misbehaved(PeerMisbehaved::UnsolicitedDelegatedCredential));
            }
            Some(Ok(credential)) => credential,
            Some(Err(err)) => return Err(self.decode_error(err)),
        };

        let now = self
            .config
            .time_provider
            .current_time()
            .ok_or(Error::FailedToGetCurrentTime)?;
        match credential.validate(entry.cert.bytes(), false, now, cert_verify_scheme) {
            true => Ok(Some(credential)),
            false => {
                debug!("Ignoring invalid delegated credential");
                Ok(None)
            }
        }
    }

    /// Fail the handshake if ECH was offered and the server rejected it.
    ///
    /// Call once the server's Finished has been verified. Sends
    /// `ech_required` and returns [`Error::RejectedEch`] with any retry
    /// configurations the server offered.
    pub fn abort_if_required(&mut self) -> Result<(), Error> {
        if self.ech.status() != EchStatus::Rejected {
            return Ok(());
        }
        Err(self.common.send_fatal_alert(
            AlertDescription::EncryptedClientHelloRequired,
            RejectedEch {
                retry_configs: self.ech.retry_configs.clone(),
            },
        ))
    }

    /// How ECH went for this handshake.
    pub fn ech_status(&self) -> EchStatus {
        self.ech.status()
    }

    /// The hello the handshake continues with: the inner one once ECH is accepted.
    pub fn resolved_hello(&self) -> &ClientHelloPayload {
        match (&self.inner_hello, self.ech.accepted) {
            (Some(inner), true) => inner,
            _ => &self.outer_hello,
        }
    }

    /// The ClientHello sent on the wire.
    pub fn outer_hello(&self) -> &ClientHelloPayload {
        &self.outer_hello
    }

    /// The ClientHelloInner of an ECH offer.
    pub fn inner_hello(&self) -> Option<&ClientHelloPayload> {
        self.inner_hello.as_ref()
    }

    /// The transcript of the resolved handshake, once the ServerHello is processed.
    pub fn transcript(&self) -> Option<&HandshakeHash> {
        self.transcript.as_ref()
    }

    /// The retry configurations from EncryptedExtensions, if any.
    pub fn retry_configs(&self) -> Option<&[EchConfigPayload]> {
        self.ech.retry_configs.as_deref()
    }

    /// Alert state.
    pub fn common_state(&mut self) -> &mut CommonState {
        &mut self.common
    }

    fn check_suite_and_version(
        &mut self,
        server_hello: &ServerHelloPayload,
    ) -> Result<HashAlgorithm, Error> {
        match server_hello.selected_version() {
            Ok(Some(ProtocolVersion::TLSv1_3)) => {}
            Ok(_) => {
                return Err(self
                    .common
                    .misbehaved(PeerMisbehaved::SelectedUnsupportedVersion));
            }
            Err(err) => return Err(self.decode_error(err)),
        }

        match HashAlgorithm::for_suite(server_hello.cipher_suite) {
            Some(algorithm)
                if self
                    .config
                    .cipher_suites
                    .contains(&server_hello.cipher_suite) =>
            {
                Ok(algorithm)
            }
            _ => Err(self
                .common
                .misbehaved(PeerMisbehaved::SelectedUnofferedCipherSuite)),
        }
    }

    fn decode_error(&mut self, err: InvalidMessage) -> Error {
        self.common
            .send_fatal_alert(AlertDescription::DecodeError, err)
    }
}

/// A transcript before and after the hash function is known.
enum Transcript {
    Buffered(HandshakeHashBuffer),
    Hashing(HandshakeHash),
}

impl Transcript {
    fn add(&mut self, msg: &[u8]) {
        match self {
            Self::Buffered(buffer) => buffer.add_message(msg),
            Self::Hashing(hash) => {
                hash.add_message(msg);
            }
        }
    }

    fn into_hash(self, algorithm: HashAlgorithm) -> HandshakeHash {
        match self {
            Self::Buffered(buffer) => buffer.start_hash(algorithm),
            Self::Hashing(hash) => hash,
        }
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::Buffered(HandshakeHashBuffer::new())
    }
}

/// `hello` as updated for a HelloRetryRequest: the new key share in place of
/// the old, and the cookie just before it.
fn retry_hello(
    hello: &ClientHelloPayload,
    share: Option<&KeyShareEntry>,
    cookie: Option<&PayloadU16>,
) -> ClientHelloPayload {
    let mut hello = hello.clone();
    if let Some(share) = share {
        hello.set_extension(Extension::key_shares(core::slice::from_ref(share)));
    }
    if let Some(cookie) = cookie {
        let ext = Extension::cookie(cookie.bytes());
        match hello
            .extensions
            .iter()
            .position(|ext| ext.typ == ExtensionType::KeyShare)
        {
            Some(at) => hello.extensions.insert(at, ext),
            None => hello.set_extension(ext),
        }
    }
    hello
}
