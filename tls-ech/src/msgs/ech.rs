//! ECHConfigList and the `encrypted_client_hello` ClientHello extension.

use alloc::vec::Vec;

use crate::crypto::hpke::{
    HpkeKem, HpkeProvider, HpkePublicKey, HpkeSuite, HpkeSymmetricCipherSuite,
};
use crate::error::{EncryptedClientHelloError, Error, InvalidMessage};
use crate::log::trace;
use crate::msgs::base::{PayloadU16, PayloadU8};
use crate::msgs::codec::{Codec, LengthPrefixedBuffer, ListLength, Reader};
use crate::msgs::enums::{EchClientHelloType, EchVersion};

/// The prefix of the HPKE `info` string used to seal a ClientHelloInner.
const HPKE_INFO_PREFIX: &[u8] = b"tls ech\0";

/// `HpkeKeyConfig` of an ECHConfig.
#[derive(Clone, Debug, PartialEq)]
pub struct HpkeKeyConfig {
    /// Identifies this configuration to the server.
    pub config_id: u8,
    /// The KEM the public key belongs to.
    pub kem_id: HpkeKem,
    /// The server's HPKE public key.
    pub public_key: PayloadU16,
    /// The (KDF, AEAD) pairs the server accepts, in preference order.
    pub symmetric_cipher_suites: Vec<HpkeSymmetricCipherSuite>,
}

impl Codec<'_> for HpkeKeyConfig {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.config_id.encode(bytes);
        self.kem_id.encode(bytes);
        self.public_key.encode(bytes);
        self.symmetric_cipher_suites
            .encode(bytes);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        Ok(Self {
            config_id: u8::read(r)?,
            kem_id: HpkeKem::read(r)?,
            public_key: PayloadU16::read(r)?,
            symmetric_cipher_suites: Vec::<HpkeSymmetricCipherSuite>::read(r)?,
        })
    }
}

/// `ECHConfigContents` for the current ECH version.
#[derive(Clone, Debug, PartialEq)]
pub struct EchConfigContents {
    /// The HPKE parameters.
    pub key_config: HpkeKeyConfig,
    /// The longest server name the client should pad an inner hello for.
    pub maximum_name_length: u8,
    /// The name to put in the ClientHelloOuter's `server_name`.
    pub public_name: PayloadU8,
    /// ECHConfig extensions, kept opaque.
    pub extensions: PayloadU16,
}

impl Codec<'_> for EchConfigContents {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.key_config.encode(bytes);
        self.maximum_name_length.encode(bytes);
        self.public_name.encode(bytes);
        self.extensions.encode(bytes);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        Ok(Self {
            key_config: HpkeKeyConfig::read(r)?,
            maximum_name_length: u8::read(r)?,
            public_name: PayloadU8::read(r)?,
            extensions: PayloadU16::read(r)?,
        })
    }
}

/// One parsed `ECHConfig`, with its exact wire encoding retained.
///
/// The raw bytes are what the HPKE `info` string binds to and what goes back
/// on the wire as a retry configuration, so they are never re-serialized.
#[derive(Clone, Debug, PartialEq)]
pub struct EchConfigPayload {
    version: EchVersion,
    contents: EchConfigContents,
    raw: Vec<u8>,
}

impl EchConfigPayload {
    /// Build a configuration of the current version from its contents.
    pub fn new(contents: EchConfigContents) -> Self {
        let mut raw = Vec::new();
        EchVersion::V18.encode(&mut raw);
        {
            let nest = LengthPrefixedBuffer::new(ListLength::U16, &mut raw);
            contents.encode(nest.buf);
        }

        Self {
            version: EchVersion::V18,
            contents,
            raw,
        }
    }

    /// Parse an `ECHConfigList`.
    ///
    /// Configurations of another version, with an unknown KEM, or whose public
    /// key has the wrong length for their KEM, are skipped. Broken framing
    /// fails the whole list.
    pub fn parse_list(bytes: &[u8]) -> Result<Vec<Self>, EncryptedClientHelloError> {
        let list = PayloadU16::read_bytes(bytes)
            .map_err(|_| EncryptedClientHelloError::InvalidConfigList)?;
        let body = list.bytes();

        let mut configs = Vec::new();
        let mut r = Reader::init(body);
        while r.any_left() {
            let start = r.used();
            let entry =
                Self::read_one(&mut r).map_err(|_| EncryptedClientHelloError::InvalidConfigList)?;
            if let Some(mut config) = entry {
                config.raw = body[start..r.used()].to_vec();
                configs.push(config);
            }
        }

        Ok(configs)
    }

    /// Read one list entry; `Ok(None)` means it was well-framed but unusable.
    pub(crate) fn read_one(r: &mut Reader<'_>) -> Result<Option<Self>, InvalidMessage> {
        let version = EchVersion::read(r)?;
        let contents = PayloadU16::read(r)?;

        if version != EchVersion::V18 {
            trace!("skipping ECHConfig with version {:?}", version);
            return Ok(None);
        }

        let contents = EchConfigContents::read_bytes(contents.bytes())?;
        let kem = contents.key_config.kem_id;
        match kem.public_key_len() {
            Some(len) if len == contents.key_config.public_key.bytes().len() => {}
            _ => {
                trace!("skipping ECHConfig with unusable KEM {:?}", kem);
                return Ok(None);
            }
        }

        Ok(Some(Self::new(contents)))
    }

    /// Serialize `configs` as an `ECHConfigList`.
    pub fn marshal_list(configs: &[Self]) -> Vec<u8> {
        let mut bytes = Vec::new();
        let nest = LengthPrefixedBuffer::new(ListLength::U16, &mut bytes);
        for config in configs {
            nest.buf.extend_from_slice(&config.raw);
        }
        drop(nest);
        bytes
    }

    /// Pick the first advertised cipher suite that `provider` can assemble.
    pub fn select_suite(&self, provider: &dyn HpkeProvider) -> Result<HpkeSuite, Error> {
        let key_config = &self.contents.key_config;
        key_config
            .symmetric_cipher_suites
            .iter()
            .find_map(|suite| {
                provider
                    .assemble(key_config.kem_id, suite.kdf_id, suite.aead_id)
                    .ok()
            })
            .ok_or_else(|| EncryptedClientHelloError::NoCompatibleConfig.into())
    }

    /// Whether this configuration lists `suite`.
    pub fn supports_cipher_suite(&self, suite: &HpkeSymmetricCipherSuite) -> bool {
        self.contents
            .key_config
            .symmetric_cipher_suites
            .contains(suite)
    }

    /// The HPKE `info` for sealing to this configuration: `"tls ech\0" || ECHConfig`.
    pub fn hpke_info(&self) -> Vec<u8> {
        let mut info = Vec::with_capacity(HPKE_INFO_PREFIX.len() + self.raw.len());
        info.extend_from_slice(HPKE_INFO_PREFIX);
        info.extend_from_slice(&self.raw);
        info
    }

    /// The configuration version.
    pub fn version(&self) -> EchVersion {
        self.version
    }

    /// The parsed contents.
    pub fn contents(&self) -> &EchConfigContents {
        &self.contents
    }

    /// `config_id`
    pub fn config_id(&self) -> u8 {
        self.contents.key_config.config_id
    }

    /// The server's HPKE public key.
    pub fn public_key(&self) -> HpkePublicKey {
        HpkePublicKey(
            self.contents
                .key_config
                .public_key
                .bytes()
                .to_vec(),
        )
    }

    /// `maximum_name_length`
    pub fn max_name_len(&self) -> u8 {
        self.contents.maximum_name_length
    }

    /// `public_name`
    pub fn public_name(&self) -> &[u8] {
        self.contents.public_name.bytes()
    }

    /// The exact wire encoding of this configuration.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }
}

impl Codec<'_> for EchConfigPayload {
    fn encode(&self, bytes: &mut Vec<u8>) {
        bytes.extend_from_slice(&self.raw);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        Self::read_one(r)?.ok_or(InvalidMessage::UnsupportedEchVersion)
    }
}

/// The prefix of an outer `ECHClientHello` the server needs to set up HPKE:
/// cipher suite, config id and encapsulated key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EchContextHandle {
    /// The cipher suite used to seal the inner hello.
    pub cipher_suite: HpkeSymmetricCipherSuite,
    /// The id of the ECHConfig used.
    pub config_id: u8,
    /// The HPKE encapsulated key; empty in a ClientHello after HelloRetryRequest.
    pub enc: PayloadU16,
}

impl EchContextHandle {
    /// Parse a handle that must span all of `bytes`.
    pub fn decode(bytes: &[u8]) -> Result<Self, InvalidMessage> {
        Self::read_bytes(bytes)
    }
}

impl Codec<'_> for EchContextHandle {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.cipher_suite.encode(bytes);
        self.config_id.encode(bytes);
        self.enc.encode(bytes);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        Ok(Self {
            cipher_suite: HpkeSymmetricCipherSuite::read(r)?,
            config_id: u8::read(r)?,
            enc: PayloadU16::read(r)?,
        })
    }
}

/// Representation of the `ECHClientHello` client extension.
#[derive(Clone, Debug, PartialEq)]
pub enum EncryptedClientHello {
    /// A `ECHClientHello` with type [EchClientHelloType::ClientHelloOuter].
    Outer(EncryptedClientHelloOuter),
    /// An empty `ECHClientHello` with type [EchClientHelloType::ClientHelloInner].
    ///
    /// This variant has no payload.
    Inner,
}

impl Codec<'_> for EncryptedClientHello {
    fn encode(&self, bytes: &mut Vec<u8>) {
        match self {
            Self::Outer(payload) => {
                EchClientHelloType::ClientHelloOuter.encode(bytes);
                payload.encode(bytes);
            }
            Self::Inner => {
                EchClientHelloType::ClientHelloInner.encode(bytes);
                // Empty payload.
            }
        }
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        match EchClientHelloType::read(r)? {
            EchClientHelloType::ClientHelloOuter => {
                Ok(Self::Outer(EncryptedClientHelloOuter::read(r)?))
            }
            EchClientHelloType::ClientHelloInner => Ok(Self::Inner),
            _ => Err(InvalidMessage::InvalidEchType),
        }
    }
}

/// The outer variant of `ECHClientHello`.
#[derive(Clone, Debug, PartialEq)]
pub struct EncryptedClientHelloOuter {
    /// Suite, config id and encapsulated key.
    pub handle: EchContextHandle,
    /// The serialized and encrypted ClientHelloInner structure, encrypted using HPKE.
    pub payload: PayloadU16,
}

impl Codec<'_> for EncryptedClientHelloOuter {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.handle.encode(bytes);
        self.payload.encode(bytes);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        Ok(Self {
            handle: EchContextHandle::read(r)?,
            payload: PayloadU16::read(r)?,
        })
    }
}
