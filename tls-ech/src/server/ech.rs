use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt::Debug;

use crate::common_state::CommonState;
use crate::crypto::hpke::{
    EncapsulatedSecret, HpkeOpener, HpkeProvider, HpkeSymmetricCipherSuite,
};
use crate::ech_key::EchKey;
use crate::enums::{AlertDescription, ProtocolVersion};
use crate::error::{EncryptedClientHelloError, Error, PeerMisbehaved};
use crate::log::{debug, trace};
use crate::msgs::codec::Codec;
use crate::msgs::ech::{EchConfigPayload, EchContextHandle, EncryptedClientHello};
use crate::msgs::enums::EchVersion;
use crate::msgs::handshake::ClientHelloPayload;
use crate::msgs::inner_hello::{decode_inner, outer_aad};

/// A source of ECH decryption contexts for a client-facing server.
///
/// Implementations are shared between connections and must not hold
/// per-connection state.
pub trait EchProvider: Debug + Send + Sync {
    /// Find the HPKE context for a ClientHelloOuter.
    ///
    /// `handle` is the encoded [`EchContextHandle`] of the client's extension,
    /// and `version` is the ECH extension codepoint it arrived under.
    fn decryption_context(&self, handle: &[u8], version: EchVersion) -> EchDecryption;
}

/// The answer of an [`EchProvider`].
#[derive(Debug)]
pub struct EchDecryption {
    /// What to do with the client's offer.
    pub result: EchProviderResult,
    /// An `ECHConfigList` to advertise if ECH ends up rejected; may be empty.
    pub retry_configs: Vec<u8>,
}

/// How an [`EchProvider`] disposes of a client's offer.
#[derive(Debug)]
pub enum EchProviderResult {
    /// Decrypt with this context.
    Success(Box<dyn HpkeOpener>),
    /// Continue with the ClientHelloOuter.
    Reject,
    /// Fail the handshake with this alert.
    Abort(AlertDescription, Error),
}

/// An [`EchProvider`] backed by a set of [`EchKey`]s.
#[derive(Debug)]
pub struct EchKeySet {
    keys: Vec<EchKey>,
    configs: Vec<u8>,
    provider: &'static dyn HpkeProvider,
}

impl EchKeySet {
    /// Make a key set from at most 255 keys with distinct config ids.
    pub fn new(keys: Vec<EchKey>, provider: &'static dyn HpkeProvider) -> Result<Self, Error> {
        if keys.len() > 255 {
            return Err(EncryptedClientHelloError::InvalidKeySet.into());
        }
        for (i, key) in keys.iter().enumerate() {
            if keys[..i]
                .iter()
                .any(|other| other.config().config_id() == key.config().config_id())
            {
                debug!(
                    "ECH config id {} is used by more than one key",
                    key.config().config_id()
                );
                return Err(EncryptedClientHelloError::InvalidKeySet.into());
            }
        }

        let configs: Vec<_> = keys
            .iter()
            .map(|key| key.config().clone())
            .collect();
        Ok(Self {
            configs: EchConfigPayload::marshal_list(&configs),
            keys,
            provider,
        })
    }

    /// Make a key set from an encoded ECH key list.
    pub fn from_key_list(
        key_list: &[u8],
        provider: &'static dyn HpkeProvider,
    ) -> Result<Self, Error> {
        Self::new(EchKey::parse_list(key_list)?, provider)
    }

    /// The `ECHConfigList` for all keys, as advertised in retry configs.
    pub fn configs(&self) -> &[u8] {
        &self.configs
    }

    fn result(&self, handle: &[u8], version: EchVersion) -> EchProviderResult {
        if version != EchVersion::V18 {
            return EchProviderResult::Abort(
                AlertDescription::InternalError,
                Error::General("ECH version not supported".into()),
            );
        }

        let Ok(handle) = EchContextHandle::decode(handle) else {
            trace!("Malformed ECH context handle");
            return EchProviderResult::Reject;
        };
        let Some(key) = self
            .keys
            .iter()
            .find(|key| key.config().config_id() == handle.config_id)
        else {
            trace!("No ECH key for config id {}", handle.config_id);
            return EchProviderResult::Reject;
        };

        let config = key.config();
        if !config.supports_cipher_suite(&handle.cipher_suite) || config.version() != version {
            trace!("ECH config {} does not offer {:?}", handle.config_id, handle.cipher_suite);
            return EchProviderResult::Reject;
        }

        let kem = config.contents().key_config.kem_id;
        let Ok(suite) = self.provider.assemble(
            kem,
            handle.cipher_suite.kdf_id,
            handle.cipher_suite.aead_id,
        ) else {
            trace!("Unsupported ECH cipher suite {:?}", handle.cipher_suite);
            return EchProviderResult::Reject;
        };

        let enc = handle.enc.bytes();
        if kem.public_key_len() != Some(enc.len()) {
            trace!("ECH encapsulated key has wrong length {}", enc.len());
            return EchProviderResult::Reject;
        }

        let opener = self
            .provider
            .start(&suite)
            .and_then(|mut hpke| {
                hpke.setup_opener(
                    &EncapsulatedSecret(enc.to_vec()),
                    &config.hpke_info(),
                    key.private_key(),
                )
            });
        match opener {
            Ok(opener) => EchProviderResult::Success(opener),
            Err(err) => EchProviderResult::Abort(AlertDescription::InternalError, err),
        }
    }
}

impl EchProvider for EchKeySet {
    fn decryption_context(&self, handle: &[u8], version: EchVersion) -> EchDecryption {
        EchDecryption {
            result: self.result(handle, version),
            retry_configs: self.configs.clone(),
        }
    }
}

/// ECH progress of one server connection.
#[derive(Debug, Default)]
pub(crate) struct ServerEchState {
    /// The client's offer was decrypted.
    pub(crate) offered: bool,
    /// The client's offer was rejected: it may have been GREASE.
    pub(crate) greased: bool,
    /// The ClientHelloInner is in use.
    pub(crate) accepted: bool,
    config_id: Option<u8>,
    suite: Option<HpkeSymmetricCipherSuite>,
    opener: Option<Box<dyn HpkeOpener>>,
    /// An `ECHConfigList` to send in EncryptedExtensions after a rejection.
    pub(crate) retry_configs: Option<Vec<u8>>,
}

/// Decide which ClientHello the connection continues with.
///
/// Returns the ClientHelloInner and its encoding when ECH is accepted, and
/// `None` to continue with `hello`. `after_hrr` is true for the second
/// ClientHello.
pub(crate) fn accept_or_reject(
    provider: Option<&dyn EchProvider>,
    state: &mut ServerEchState,
    common: &mut CommonState,
    hello: &ClientHelloPayload,
    msg: &[u8],
    after_hrr: bool,
) -> Result<Option<(ClientHelloPayload, Vec<u8>)>, Error> {
    let Some(provider) = provider else {
        return Ok(None);
    };

    let ech = match hello.encrypted_client_hello() {
        None if state.offered => {
            return Err(common.misbehaved(PeerMisbehaved::EchMissingAfterHelloRetryRequest));
        }
        None => {
            trace!("Client bypassed ECH");
            return Ok(None);
        }
        Some(Ok(EncryptedClientHello::Inner)) => {
            trace!("ClientHelloInner received; continuing as backend server");
            return Ok(None);
        }
        Some(Ok(EncryptedClientHello::Outer(ech))) => ech,
        Some(Err(err)) => {
            debug!("Malformed ECH extension: {:?}", err);
            return Err(common.misbehaved(PeerMisbehaved::InvalidEchExtension));
        }
    };

    if after_hrr && !state.offered && !state.greased {
        return Err(common.misbehaved(PeerMisbehaved::UnexpectedEchAfterHelloRetryRequest));
    }

    if after_hrr
        && state.offered
        && (state.suite != Some(ech.handle.cipher_suite)
            || state.config_id != Some(ech.handle.config_id)
            || !ech.handle.enc.bytes().is_empty())
    {
        return Err(common.misbehaved(PeerMisbehaved::EchConfigChangedAfterHelloRetryRequest));
    }
    state.config_id = Some(ech.handle.config_id);

    if state.opener.is_none() {
        let EchDecryption {
            result,
            retry_configs,
        } = provider.decryption_context(&ech.handle.get_encoding(), EchVersion::V18);
        state.retry_configs = retry_configs_for(&retry_configs, hello, common)?;

        match result {
            EchProviderResult::Success(opener) => {
                state.opener = Some(opener);
                state.suite = Some(ech.handle.cipher_suite);
            }
            EchProviderResult::Reject => {
                debug!("ECH provider rejected config id {}", ech.handle.config_id);
                state.greased = true;
                return Ok(None);
            }
            EchProviderResult::Abort(alert, err) => {
                debug!("ECH provider aborted: {}", err);
                return Err(common.send_fatal_alert(alert, err));
            }
        }
    }

    let aad = outer_aad(msg, ech.payload.bytes().len())
        .map_err(|_| Error::Unreachable("ClientHelloOuterAAD of a parsed hello"))?;
    let Some(opener) = state.opener.as_mut() else {
        return Err(Error::Unreachable("ECH opener missing after provider success"));
    };

    let encoded = match opener.open(&aad, ech.payload.bytes()) {
        Ok(encoded) => encoded,
        Err(_) if after_hrr && state.accepted => {
            return Err(common.send_fatal_alert(AlertDescription::DecryptError, Error::DecryptError));
        }
        Err(_) => {
            debug!("ECH payload did not decrypt; treating the offer as GREASE");
            state.greased = true;
            return Ok(None);
        }
    };

    let inner_msg = decode_inner(&encoded, msg, &hello.session_id)
        .map_err(|err| common.send_fatal_alert(AlertDescription::IllegalParameter, err))?;
    let inner = ClientHelloPayload::read_message(&inner_msg)
        .map_err(|err| common.send_fatal_alert(AlertDescription::IllegalParameter, err))?;

    if !matches!(
        inner.encrypted_client_hello(),
        Some(Ok(EncryptedClientHello::Inner))
    ) {
        return Err(common.misbehaved(PeerMisbehaved::OfferedIncorrectEchType));
    }

    let tls13_only = match inner.supported_versions() {
        Ok(Some(versions)) => {
            !versions.is_empty()
                && versions
                    .iter()
                    .all(|version| u16::from(*version) >= u16::from(ProtocolVersion::TLSv1_3))
        }
        _ => false,
    };
    if !tls13_only {
        return Err(common.misbehaved(PeerMisbehaved::OfferedEchWithOldProtocolVersion));
    }

    debug!("ECH accepted with config id {}", ech.handle.config_id);
    state.offered = true;
    state.accepted = true;
    Ok(Some((inner, inner_msg)))
}

/// Re-marshal the provider's retry configs, dropping versions we do not know.
fn retry_configs_for(
    retry_configs: &[u8],
    hello: &ClientHelloPayload,
    common: &mut CommonState,
) -> Result<Option<Vec<u8>>, Error> {
    if retry_configs.is_empty() {
        return Ok(None);
    }

    let configs = EchConfigPayload::parse_list(retry_configs)
        .map_err(|err| common.send_fatal_alert(AlertDescription::InternalError, err))?;

    let outer_name = hello.server_name().ok().flatten();
    if !configs
        .iter()
        .any(|config| Some(config.public_name()) == outer_name.as_deref())
    {
        debug!(
            "ECH public name mismatch: ClientHelloOuter names {:?}",
            outer_name
        );
    }

    Ok(match configs.is_empty() {
        true => None,
        false => Some(EchConfigPayload::marshal_list(&configs)),
    })
}
