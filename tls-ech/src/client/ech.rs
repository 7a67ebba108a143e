use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;

use subtle::ConstantTimeEq;

use crate::crypto::hpke::{HpkeProvider, HpkePublicKey, HpkeSealer, HpkeSuite};
use crate::crypto::hpke_rs::HPKE_PROVIDER;
use crate::crypto::SecureRandom;
use crate::enums::ProtocolVersion;
use crate::error::{EncryptedClientHelloError, Error, InvalidMessage, RejectedEch};
use crate::hash_hs::HandshakeHash;
use crate::key_schedule::{server_ech_confirmation, server_ech_hrr_confirmation};
use crate::log::{debug, trace};
use crate::msgs::base::PayloadU16;
use crate::msgs::codec::ListLength;
use crate::msgs::ech::{
    EchConfigPayload, EchContextHandle, EncryptedClientHello, EncryptedClientHelloOuter,
};
use crate::msgs::enums::ExtensionType;
use crate::msgs::handshake::{ClientHelloPayload, Extension, Random};
use crate::msgs::inner_hello::{
    encode_inner, hrr_confirmation_message, outer_aad, server_hello_confirmation_message,
};
use crate::rand::{random_array, random_u8, random_vec};

/// Controls how Encrypted Client Hello (ECH) is used in a client handshake.
#[derive(Clone, Debug)]
pub enum EchMode {
    /// ECH is enabled and the ClientHello will be encrypted based on the provided
    /// configuration.
    Enable(EchConfig),

    /// No ECH configuration is available but the client should act as though it were.
    ///
    /// This is an anti-ossification measure, sometimes referred to as "GREASE"[^0].
    /// [^0]: <https://www.rfc-editor.org/rfc/rfc8701>
    Grease(EchGreaseConfig),
}

impl From<EchConfig> for EchMode {
    fn from(config: EchConfig) -> Self {
        Self::Enable(config)
    }
}

impl From<EchGreaseConfig> for EchMode {
    fn from(config: EchGreaseConfig) -> Self {
        Self::Grease(config)
    }
}

/// Configuration for performing encrypted client hello.
///
/// Holds every usable configuration from an `ECHConfigList`; one is chosen
/// for each connection attempt.
#[derive(Clone, Debug)]
pub struct EchConfig {
    configs: Vec<EchConfigPayload>,
    provider: &'static dyn HpkeProvider,
}

impl EchConfig {
    /// Construct an EchConfig from an `ECHConfigList`.
    ///
    /// The list bytes usually come from the `ech` parameter of the server's
    /// DNS `HTTPS` record. At least one configuration must be compatible with
    /// `provider` or an error is returned.
    pub fn new(ech_config_list: &[u8], provider: &'static dyn HpkeProvider) -> Result<Self, Error> {
        Self::from_configs(EchConfigPayload::parse_list(ech_config_list)?, provider)
    }

    /// Construct an EchConfig from the retry configurations of a rejection.
    pub fn from_rejection(
        rejected: &RejectedEch,
        provider: &'static dyn HpkeProvider,
    ) -> Result<Self, Error> {
        let configs = rejected
            .retry_configs()
            .ok_or(EncryptedClientHelloError::NoCompatibleConfig)?;
        Self::from_configs(configs.to_vec(), provider)
    }

    fn from_configs(
        configs: Vec<EchConfigPayload>,
        provider: &'static dyn HpkeProvider,
    ) -> Result<Self, Error> {
        let config = Self { configs, provider };
        let Some((selected, suite)) = config.select() else {
            return Err(EncryptedClientHelloError::NoCompatibleConfig.into());
        };
        debug!(
            "selected ECH config ID {:?} suite {:?} public_name {:?}",
            selected.config_id(),
            suite,
            selected.public_name()
        );
        Ok(config)
    }

    /// The configurations in list order.
    pub fn configs(&self) -> &[EchConfigPayload] {
        &self.configs
    }

    /// The first configuration with a suite the provider can assemble.
    pub(crate) fn select(&self) -> Option<(&EchConfigPayload, HpkeSuite)> {
        self.configs.iter().find_map(|config| {
            config
                .select_suite(self.provider)
                .ok()
                .map(|suite| (config, suite))
        })
    }
}

/// The X25519 public key GREASE extensions encapsulate to.
const GREASE_PLACEHOLDER_KEY: [u8; 32] = [
    143, 38, 37, 36, 12, 6, 229, 30, 140, 27, 167, 73, 26, 100, 203, 107, 216, 81, 163, 222, 52,
    211, 54, 210, 46, 37, 78, 216, 157, 97, 241, 244,
];

/// Configuration for GREASE Encrypted Client Hello.
///
/// A GREASE extension is shaped like a real offer: an encapsulation to
/// `placeholder_key` under `suite`, and a random payload of `filler_len`
/// bytes plus the AEAD tag.
#[derive(Clone, Debug)]
pub struct EchGreaseConfig {
    /// The suite advertised in the extension.
    pub suite: HpkeSuite,
    /// A public key of `suite.kem` to encapsulate to.
    pub placeholder_key: HpkePublicKey,
    /// Payload length before the AEAD tag.
    ///
    /// With the tag this must fit a 16-bit length, or the hello is refused
    /// with [`InvalidMessage::MessageTooLarge`].
    pub filler_len: usize,
    /// Where the encapsulation comes from.
    pub provider: &'static dyn HpkeProvider,
}

impl EchGreaseConfig {
    /// Construct a GREASE ECH configuration.
    pub fn new(suite: HpkeSuite, placeholder_key: HpkePublicKey) -> Self {
        Self {
            suite,
            placeholder_key,
            ..Self::default()
        }
    }

    fn grease_ext(
        &self,
        random: &dyn SecureRandom,
    ) -> Result<EncryptedClientHelloOuter, Error> {
        trace!("Preparing GREASE ECH extension");
        let tag_len = self
            .suite
            .sym
            .aead_id
            .tag_len()
            .ok_or_else(|| Error::General("GREASE ECH suite has no AEAD tag".into()))?;
        let payload_len = self
            .filler_len
            .checked_add(tag_len)
            .filter(|len| *len <= ListLength::U16.max_len())
            .ok_or(InvalidMessage::MessageTooLarge)?;

        let (enc, _) = self
            .provider
            .start(&self.suite)?
            .setup_sealer(b"tls ech\0", &self.placeholder_key, random)?;

        Ok(EncryptedClientHelloOuter {
            handle: EchContextHandle {
                cipher_suite: self.suite.sym,
                config_id: random_u8(random)?,
                enc: PayloadU16::new(enc.0),
            },
            payload: PayloadU16::new(random_vec(random, payload_len)?),
        })
    }
}

impl Default for EchGreaseConfig {
    fn default() -> Self {
        Self {
            suite: HpkeSuite::default(),
            placeholder_key: HpkePublicKey(GREASE_PLACEHOLDER_KEY.to_vec()),
            filler_len: 100,
            provider: HPKE_PROVIDER,
        }
    }
}

/// An enum representing ECH offer status.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum EchStatus {
    /// ECH was not offered - it is a normal TLS handshake.
    NotOffered,
    /// GREASE ECH was sent. This is not considered offering ECH.
    Grease,
    /// ECH was offered but we do not yet know whether the offer was accepted or rejected.
    Offered,
    /// ECH was offered and the server accepted.
    Accepted,
    /// ECH was offered and the server rejected.
    Rejected,
}

/// The ECH state of one client connection attempt.
///
/// Moves from empty to offered or greased when the first ClientHello is
/// built, and from offered to accepted at most once.
#[derive(Debug, Default)]
pub(crate) struct EchState {
    pub(crate) offered: bool,
    pub(crate) greased: bool,
    pub(crate) accepted: bool,
    // a ServerHello settled the outcome
    pub(crate) resolved: bool,
    pub(crate) retry_configs: Option<Vec<EchConfigPayload>>,
    handle: Option<EchContextHandle>,
    max_name_len: u8,
    server_name_len: usize,
    tag_len: usize,
    payload_len: usize,
    sealer: Option<Box<dyn HpkeSealer>>,
    inner_random: [u8; 32],
}

impl EchState {
    pub(crate) fn status(&self) -> EchStatus {
        match (self.offered, self.greased) {
            (true, _) if !self.resolved => EchStatus::Offered,
            (true, _) if self.accepted => EchStatus::Accepted,
            (true, _) => EchStatus::Rejected,
            (false, true) => EchStatus::Grease,
            (false, false) => EchStatus::NotOffered,
        }
    }

    /// Re-seal the updated `inner` hello into `outer` after a confirmed
    /// HelloRetryRequest, with an empty `enc`.
    pub(crate) fn reseal(
        &mut self,
        outer: ClientHelloPayload,
        inner: &ClientHelloPayload,
    ) -> Result<ClientHelloPayload, Error> {
        trace!("Re-sealing ECH offer for retry");
        self.seal(outer, inner, Vec::new())
    }

    /// Attach a payload-free lookalike of the first extension to `outer`:
    /// same suite and config id, empty `enc`, fresh random payload.
    pub(crate) fn regrease(
        &mut self,
        mut outer: ClientHelloPayload,
        random: &dyn SecureRandom,
    ) -> Result<ClientHelloPayload, Error> {
        let Some(handle) = &self.handle else {
            return Err(Error::Unreachable("ECH extension repeated without a first one"));
        };

        let ext = EncryptedClientHelloOuter {
            handle: EchContextHandle {
                enc: PayloadU16::empty(),
                ..handle.clone()
            },
            payload: PayloadU16::new(random_vec(random, self.payload_len)?),
        };
        outer.set_extension(Extension::encrypted_client_hello(
            &EncryptedClientHello::Outer(ext),
        ));
        Ok(outer)
    }

    /// Whether the HelloRetryRequest's ECH `confirmation` signals acceptance.
    ///
    /// `inner_transcript` must already be rolled up into `message_hash`.
    pub(crate) fn hrr_accepted(
        &self,
        inner_transcript: &HandshakeHash,
        hrr_msg: &[u8],
        confirmation: &[u8],
    ) -> Result<bool, Error> {
        let hash = inner_transcript.hash_given(&hrr_confirmation_message(hrr_msg)?);
        let expected = server_ech_hrr_confirmation(
            inner_transcript.algorithm(),
            &self.inner_random,
            hash.as_ref(),
        )?;

        let accepted = bool::from(expected[..].ct_eq(confirmation));
        trace!(
            "ECH {} by server in hello retry request",
            if accepted { "accepted" } else { "rejected" }
        );
        Ok(accepted)
    }

    /// Whether the last eight bytes of `random` signal acceptance.
    pub(crate) fn server_hello_accepted(
        &self,
        inner_transcript: &HandshakeHash,
        sh_msg: &[u8],
        random: &Random,
    ) -> Result<bool, Error> {
        let hash = inner_transcript.hash_given(&server_hello_confirmation_message(sh_msg)?);
        let expected = server_ech_confirmation(
            inner_transcript.algorithm(),
            &self.inner_random,
            hash.as_ref(),
        )?;

        Ok(expected[..]
            .ct_eq(&random.0[24..])
            .into())
    }

    fn seal(
        &mut self,
        mut outer: ClientHelloPayload,
        inner: &ClientHelloPayload,
        enc: Vec<u8>,
    ) -> Result<ClientHelloPayload, Error> {
        let Some(handle) = &self.handle else {
            return Err(Error::Unreachable("ECH offered without a context handle"));
        };

        let encoded = encode_inner(
            &inner.encode_message(),
            self.server_name_len,
            self.max_name_len,
        )
        .map_err(|_| Error::Unreachable("ClientHelloInner could not be encoded"))?;
        let payload_len = encoded.len() + self.tag_len;

        let mut ext = EncryptedClientHelloOuter {
            handle: EchContextHandle {
                enc: PayloadU16::new(enc),
                ..handle.clone()
            },
            payload: PayloadU16::new(vec![0; payload_len]),
        };
        outer.set_extension(Extension::encrypted_client_hello(
            &EncryptedClientHello::Outer(ext.clone()),
        ));
        let aad = outer_aad(&outer.encode_message(), payload_len)
            .map_err(|_| Error::Unreachable("ClientHelloOuterAAD could not be built"))?;

        let Some(sealer) = self.sealer.as_mut() else {
            return Err(Error::Unreachable("ECH offered without a sealer"));
        };
        let payload = sealer.seal(&aad, &encoded)?;
        if payload.len() != payload_len {
            return Err(Error::Unreachable("HPKE ciphertext has unexpected length"));
        }

        ext.payload = PayloadU16::new(payload);
        outer.set_extension(Extension::encrypted_client_hello(
            &EncryptedClientHello::Outer(ext),
        ));
        self.payload_len = payload_len;
        Ok(outer)
    }
}

/// Decide between bypass, GREASE and a real offer for the first ClientHello.
///
/// Returns the hello to send and, for a real offer, the ClientHelloInner.
/// `server_name` is the private name, already present in `base`.
pub(crate) fn offer_or_grease(
    mode: Option<&EchMode>,
    state: &mut EchState,
    base: ClientHelloPayload,
    server_name: Option<&[u8]>,
    random: &dyn SecureRandom,
) -> Result<(ClientHelloPayload, Option<ClientHelloPayload>), Error> {
    let config = match mode {
        None => {
            trace!("ECH not configured");
            return Ok((base, None));
        }
        Some(EchMode::Grease(grease)) => return Ok((attach_grease(grease, state, base, random)?, None)),
        Some(EchMode::Enable(config)) => config,
    };

    if !base.offers_tls13() {
        debug!("ECH needs TLS1.3; sending GREASE instead");
        return Ok((
            attach_grease(&EchGreaseConfig::default(), state, base, random)?,
            None,
        ));
    }

    let Some((ech_config, suite)) = config.select() else {
        debug!("No usable ECH config; sending GREASE instead");
        return Ok((
            attach_grease(&EchGreaseConfig::default(), state, base, random)?,
            None,
        ));
    };

    let tag_len = suite
        .sym
        .aead_id
        .tag_len()
        .ok_or(Error::Unreachable("assembled ECH suite without AEAD tag"))?;
    let (enc, sealer) = config
        .provider
        .start(&suite)?
        .setup_sealer(&ech_config.hpke_info(), &ech_config.public_key(), random)?;

    let mut outer = base.clone();
    outer.random = Random(random_array(random)?);
    outer.set_extension(Extension::server_name(ech_config.public_name()));

    let mut inner = base;
    inner.set_extension(Extension::supported_versions(&[ProtocolVersion::TLSv1_3]));
    inner.set_extension(Extension::encrypted_client_hello(
        &EncryptedClientHello::Inner,
    ));

    *state = EchState {
        offered: true,
        handle: Some(EchContextHandle {
            cipher_suite: suite.sym,
            config_id: ech_config.config_id(),
            enc: PayloadU16::empty(),
        }),
        max_name_len: ech_config.max_name_len(),
        server_name_len: server_name.map_or(0, <[u8]>::len),
        tag_len,
        sealer: Some(sealer),
        inner_random: inner.random.0,
        ..EchState::default()
    };

    debug!(
        "Offering ECH with config id {} to public name {:?}",
        ech_config.config_id(),
        ech_config.public_name()
    );
    let outer = state.seal(outer, &inner, enc.0)?;
    Ok((outer, Some(inner)))
}

fn attach_grease(
    grease: &EchGreaseConfig,
    state: &mut EchState,
    mut hello: ClientHelloPayload,
    random: &dyn SecureRandom,
) -> Result<ClientHelloPayload, Error> {
    let ext = grease.grease_ext(random)?;
    let payload_len = ext.payload.bytes().len();
    let handle = ext.handle.clone();

    hello.remove_extension(ExtensionType::EncryptedClientHello);
    hello.set_extension(Extension::encrypted_client_hello(
        &EncryptedClientHello::Outer(ext),
    ));
    if !hello.extensions_fit() {
        return Err(InvalidMessage::MessageTooLarge.into());
    }

    state.greased = true;
    state.payload_len = payload_len;
    state.handle = Some(handle);
    Ok(hello)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::HashAlgorithm;
    use crate::crypto::hpke::{EncapsulatedSecret, HpkeKem, HpkeSymmetricCipherSuite};
    use crate::crypto::OsRandom;
    use crate::ech_key::EchKey;
    use crate::enums::{CipherSuite, NamedGroup};
    use crate::msgs::codec::Codec;
    use crate::msgs::enums::Compression;
    use crate::msgs::handshake::{KeyShareEntry, SessionId};
    use crate::msgs::inner_hello::decode_inner;

    fn base_hello(versions: &[ProtocolVersion]) -> ClientHelloPayload {
        ClientHelloPayload {
            client_version: ProtocolVersion::TLSv1_2,
            random: Random([7; 32]),
            session_id: SessionId::new(&[9; 32]).unwrap(),
            cipher_suites: vec![CipherSuite::TLS13_AES_128_GCM_SHA256],
            compression_methods: vec![Compression::Null],
            extensions: vec![
                Extension::server_name(b"secret.example"),
                Extension::supported_versions(versions),
                Extension::key_shares(&[KeyShareEntry::new(NamedGroup::X25519, vec![1; 32])]),
            ],
        }
    }

    fn ech_key() -> EchKey {
        EchKey::generate(
            3,
            HpkeKem::DHKEM_X25519_HKDF_SHA256,
            &[HpkeSymmetricCipherSuite::default()],
            b"public.example",
            64,
            HPKE_PROVIDER,
            &OsRandom,
        )
        .unwrap()
    }

    fn outer_ext(hello: &ClientHelloPayload) -> EncryptedClientHelloOuter {
        match hello.encrypted_client_hello() {
            Some(Ok(EncryptedClientHello::Outer(outer))) => outer,
            other => panic!("expected outer ECH extension, got {:?}", other),
        }
    }

    #[test]
    fn bypass_leaves_hello_alone() {
        let mut state = EchState::default();
        let base = base_hello(&[ProtocolVersion::TLSv1_3]);
        let (outer, inner) =
            offer_or_grease(None, &mut state, base.clone(), None, &OsRandom).unwrap();
        assert_eq!(outer, base);
        assert!(inner.is_none());
        assert_eq!(state.status(), EchStatus::NotOffered);
    }

    #[test]
    fn grease_has_offer_shape() {
        let mut state = EchState::default();
        let mode = EchMode::Grease(EchGreaseConfig::default());
        let (outer, inner) = offer_or_grease(
            Some(&mode),
            &mut state,
            base_hello(&[ProtocolVersion::TLSv1_3]),
            Some(b"secret.example"),
            &OsRandom,
        )
        .unwrap();

        assert!(inner.is_none());
        assert_eq!(state.status(), EchStatus::Grease);
        let ext = outer_ext(&outer);
        assert_eq!(ext.handle.cipher_suite, HpkeSuite::default().sym);
        assert_eq!(ext.handle.enc.bytes().len(), 32);
        assert_eq!(ext.payload.bytes().len(), 100 + 16);
        // the private name is not hidden by GREASE
        assert_eq!(
            outer.server_name().unwrap().as_deref(),
            Some(&b"secret.example"[..])
        );
        assert_eq!(outer.extensions.last().unwrap().typ, ExtensionType::EncryptedClientHello);
    }

    #[test]
    fn grease_filler_must_fit_its_length_prefix() {
        let grease = |filler_len| {
            let mode = EchMode::Grease(EchGreaseConfig {
                filler_len,
                ..EchGreaseConfig::default()
            });
            offer_or_grease(
                Some(&mode),
                &mut EchState::default(),
                base_hello(&[ProtocolVersion::TLSv1_3]),
                None,
                &OsRandom,
            )
        };

        // Extension headers, then the ECH body: type, suite, config id,
        // 32-byte enc and the payload prefix, then the AES-128-GCM tag.
        let base_len: usize = base_hello(&[ProtocolVersion::TLSv1_3])
            .extensions
            .iter()
            .map(|ext| ext.get_encoding().len())
            .sum();
        let max_filler = 0xffff - base_len - 4 - 42 - 16;

        let outer = grease(max_filler).unwrap();
        assert_eq!(
            outer_ext(&outer.0).payload.bytes().len(),
            max_filler + 16
        );
        assert_eq!(outer.0.extensions.get_encoding().len(), 2 + 0xffff);
        for filler_len in [max_filler + 1, 0xffff - 16, 0xffff - 15, usize::MAX] {
            assert_eq!(
                grease(filler_len).unwrap_err(),
                Error::InvalidMessage(InvalidMessage::MessageTooLarge)
            );
        }
    }

    #[test]
    fn old_versions_get_grease() {
        let key = ech_key();
        let list = EchConfigPayload::marshal_list(&[key.config().clone()]);
        let mode = EchMode::Enable(EchConfig::new(&list, HPKE_PROVIDER).unwrap());
        let mut state = EchState::default();
        let (_, inner) = offer_or_grease(
            Some(&mode),
            &mut state,
            base_hello(&[ProtocolVersion::TLSv1_2]),
            None,
            &OsRandom,
        )
        .unwrap();
        assert!(inner.is_none());
        assert!(state.greased);
        assert!(!state.offered);
    }

    #[test]
    fn config_without_usable_suite_is_refused() {
        let key = ech_key();
        let list = EchConfigPayload::marshal_list(&[key.config().clone()]);
        assert!(EchConfig::new(&list, HPKE_PROVIDER).is_ok());
        assert_eq!(
            EchConfig::new(&[0, 0], HPKE_PROVIDER).unwrap_err(),
            Error::InvalidEncryptedClientHello(EncryptedClientHelloError::NoCompatibleConfig)
        );
        assert!(EchConfig::from_rejection(
            &RejectedEch {
                retry_configs: None
            },
            HPKE_PROVIDER
        )
        .is_err());
    }

    #[test]
    fn offer_seals_inner_hello_to_config() {
        let key = ech_key();
        let list = EchConfigPayload::marshal_list(&[key.config().clone()]);
        let mode = EchMode::Enable(EchConfig::new(&list, HPKE_PROVIDER).unwrap());
        let mut state = EchState::default();
        let (outer, inner) = offer_or_grease(
            Some(&mode),
            &mut state,
            base_hello(&[ProtocolVersion::TLSv1_3, ProtocolVersion::TLSv1_2]),
            Some(b"secret.example"),
            &OsRandom,
        )
        .unwrap();
        let inner = inner.unwrap();
        assert_eq!(state.status(), EchStatus::Offered);

        assert_eq!(
            outer.server_name().unwrap().as_deref(),
            Some(&b"public.example"[..])
        );
        assert_ne!(outer.random, inner.random);
        assert_eq!(outer.session_id, inner.session_id);
        assert_eq!(outer.key_shares().unwrap(), inner.key_shares().unwrap());
        assert_eq!(
            inner.supported_versions().unwrap(),
            Some(vec![ProtocolVersion::TLSv1_3])
        );
        assert_eq!(
            inner.encrypted_client_hello(),
            Some(Ok(EncryptedClientHello::Inner))
        );

        let ext = outer_ext(&outer);
        assert_eq!(ext.handle.config_id, 3);
        let outer_msg = outer.encode_message();
        let mut opener = HPKE_PROVIDER
            .start(&HpkeSuite::default())
            .unwrap()
            .setup_opener(
                &EncapsulatedSecret(ext.handle.enc.bytes().to_vec()),
                &key.config().hpke_info(),
                key.private_key(),
            )
            .unwrap();
        let aad = outer_aad(&outer_msg, ext.payload.bytes().len()).unwrap();
        let encoded = opener
            .open(&aad, ext.payload.bytes())
            .unwrap();
        let decoded = decode_inner(&encoded, &outer_msg, &outer.session_id).unwrap();
        assert_eq!(decoded, inner.encode_message());
    }

    #[test]
    fn regrease_keeps_handle_and_drops_enc() {
        let mut state = EchState::default();
        let mode = EchMode::Grease(EchGreaseConfig::default());
        let (first, _) = offer_or_grease(
            Some(&mode),
            &mut state,
            base_hello(&[ProtocolVersion::TLSv1_3]),
            None,
            &OsRandom,
        )
        .unwrap();
        let second = state
            .regrease(first.clone(), &OsRandom)
            .unwrap();

        let (first, second) = (outer_ext(&first), outer_ext(&second));
        assert_eq!(first.handle.cipher_suite, second.handle.cipher_suite);
        assert_eq!(first.handle.config_id, second.handle.config_id);
        assert!(second.handle.enc.bytes().is_empty());
        assert_eq!(first.payload.bytes().len(), second.payload.bytes().len());
    }

    #[test]
    fn server_hello_confirmation_window() {
        let state = EchState {
            inner_random: [5; 32],
            ..EchState::default()
        };
        let mut transcript = HandshakeHash::new(HashAlgorithm::SHA256);
        transcript.add_message(b"inner client hello");

        let mut sh = crate::msgs::handshake::ServerHelloPayload {
            legacy_version: ProtocolVersion::TLSv1_2,
            random: Random([0xff; 32]),
            session_id: SessionId::empty(),
            cipher_suite: CipherSuite::TLS13_AES_128_GCM_SHA256,
            compression_method: Compression::Null,
            extensions: Vec::new(),
        };
        let zeroed = server_hello_confirmation_message(&sh.encode_message()).unwrap();
        let hash = transcript.hash_given(&zeroed);
        let confirmation =
            server_ech_confirmation(HashAlgorithm::SHA256, &[5; 32], hash.as_ref()).unwrap();
        sh.random.0[24..].copy_from_slice(&confirmation);

        assert!(state
            .server_hello_accepted(&transcript, &sh.encode_message(), &sh.random)
            .unwrap());

        // bytes outside the window are covered by the transcript
        let mut other = sh.clone();
        other.random.0[0] ^= 1;
        assert!(!state
            .server_hello_accepted(&transcript, &other.encode_message(), &other.random)
            .unwrap());

        let mut flipped = sh.clone();
        flipped.random.0[31] ^= 1;
        assert!(!state
            .server_hello_accepted(&transcript, &flipped.encode_message(), &flipped.random)
            .unwrap());
    }
}
