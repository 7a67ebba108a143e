use alloc::vec::Vec;
use core::fmt;

use crate::enums::{CipherSuite, HandshakeType, NamedGroup, ProtocolVersion, SignatureScheme};
use crate::error::InvalidMessage;
use crate::msgs::base::{PayloadU16, PayloadU24, PayloadU8};
use crate::msgs::codec::{
    encode_handshake_message, split_handshake_message, Codec, ListLength, Reader,
    TlsListElement,
};
use crate::msgs::ech::EncryptedClientHello;
use crate::msgs::enums::{Compression, ExtensionType, ServerNameType};

/// The `random` field of a hello message.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Random(pub [u8; 32]);

impl Codec<'_> for Random {
    fn encode(&self, bytes: &mut Vec<u8>) {
        bytes.extend_from_slice(&self.0);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        let Some(bytes) = r.take(32) else {
            return Err(InvalidMessage::MissingData("Random"));
        };

        let mut opaque = [0; 32];
        opaque.clone_from_slice(bytes);
        Ok(Self(opaque))
    }
}

impl From<[u8; 32]> for Random {
    #[inline]
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for Random {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        super::base::hex(f, &self.0)
    }
}

/// The special `random` value that marks a ServerHello as a HelloRetryRequest.
pub(crate) static HELLO_RETRY_REQUEST_RANDOM: Random = Random([
    0xcf, 0x21, 0xad, 0x74, 0xe5, 0x9a, 0x61, 0x11, 0xbe, 0x1d, 0x8c, 0x02, 0x1e, 0x65, 0xb8, 0x91,
    0xc2, 0xa2, 0x11, 0x16, 0x7a, 0xbb, 0x8c, 0x5e, 0x07, 0x9e, 0x09, 0xe2, 0xc8, 0xa8, 0x33, 0x9c,
]);

/// `legacy_session_id`: at most 32 opaque bytes.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SessionId(Vec<u8>);

impl SessionId {
    /// Build a session id, failing if it is longer than 32 bytes.
    pub fn new(bytes: &[u8]) -> Result<Self, InvalidMessage> {
        match bytes.len() > 32 {
            true => Err(InvalidMessage::MessageTooLarge),
            false => Ok(Self(bytes.to_vec())),
        }
    }

    /// The empty session id.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Whether the session id has no bytes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for SessionId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Codec<'_> for SessionId {
    fn encode(&self, bytes: &mut Vec<u8>) {
        PayloadU8::encode_slice(&self.0, bytes);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        let body = PayloadU8::read(r)?;
        Self::new(body.bytes())
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        super::base::hex(f, &self.0)
    }
}

/// One `Extension` of a hello message: its type and opaque `extension_data`.
///
/// Extensions are kept raw and in wire order, because ECH needs both the
/// exact bytes and the exact order of the ClientHelloOuter's extensions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Extension {
    /// `extension_type`
    pub typ: ExtensionType,
    /// `extension_data`
    pub data: PayloadU16,
}

impl Extension {
    /// An extension with the given type and body.
    pub fn new(typ: ExtensionType, data: Vec<u8>) -> Self {
        Self {
            typ,
            data: PayloadU16::new(data),
        }
    }

    /// `server_name` carrying one host name.
    pub fn server_name(name: &[u8]) -> Self {
        let mut entry = Vec::with_capacity(name.len() + 3);
        ServerNameType::HostName.encode(&mut entry);
        PayloadU16::encode_slice(name, &mut entry);

        let mut body = Vec::with_capacity(entry.len() + 2);
        PayloadU16::encode_slice(&entry, &mut body);
        Self::new(ExtensionType::ServerName, body)
    }

    /// `supported_versions` as sent in a ClientHello.
    pub fn supported_versions(versions: &[ProtocolVersion]) -> Self {
        Self::new(ExtensionType::SupportedVersions, versions.to_vec().get_encoding())
    }

    /// `supported_groups`
    pub fn named_groups(groups: &[NamedGroup]) -> Self {
        Self::new(ExtensionType::EllipticCurves, groups.to_vec().get_encoding())
    }

    /// `signature_algorithms`
    pub fn signature_algorithms(schemes: &[SignatureScheme]) -> Self {
        Self::new(
            ExtensionType::SignatureAlgorithms,
            schemes.to_vec().get_encoding(),
        )
    }

    /// `delegated_credentials` in a ClientHello: the schemes we accept credentials for.
    pub fn delegated_credentials(schemes: &[SignatureScheme]) -> Self {
        Self::new(
            ExtensionType::DelegatedCredentials,
            schemes.to_vec().get_encoding(),
        )
    }

    /// `key_share` as sent in a ClientHello.
    pub fn key_shares(shares: &[KeyShareEntry]) -> Self {
        Self::new(ExtensionType::KeyShare, shares.to_vec().get_encoding())
    }

    /// `cookie`
    pub fn cookie(cookie: &[u8]) -> Self {
        let mut body = Vec::with_capacity(cookie.len() + 2);
        PayloadU16::encode_slice(cookie, &mut body);
        Self::new(ExtensionType::Cookie, body)
    }

    /// `encrypted_client_hello` as sent in a ClientHello.
    pub fn encrypted_client_hello(ech: &EncryptedClientHello) -> Self {
        Self::new(ExtensionType::EncryptedClientHello, ech.get_encoding())
    }
}

impl Codec<'_> for Extension {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.typ.encode(bytes);
        self.data.encode(bytes);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        Ok(Self {
            typ: ExtensionType::read(r)?,
            data: PayloadU16::read(r)?,
        })
    }
}

impl TlsListElement for Extension {
    const SIZE_LEN: ListLength = ListLength::U16;
}

/// Parse an extension body that must be exactly one `T`.
fn parse_body<'a, T: Codec<'a>>(ext: &'a Extension) -> Result<T, InvalidMessage> {
    T::read_bytes(ext.data.bytes())
}

fn find(extensions: &[Extension], typ: ExtensionType) -> Option<&Extension> {
    extensions.iter().find(|ext| ext.typ == typ)
}

fn has_duplicates(extensions: &[Extension]) -> bool {
    let mut seen = Vec::with_capacity(extensions.len());
    for ext in extensions {
        let typ = u16::from(ext.typ);
        if seen.contains(&typ) {
            return true;
        }
        seen.push(typ);
    }
    false
}

/// One `KeyShareEntry`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyShareEntry {
    /// The group of the share.
    pub group: NamedGroup,
    /// The public key, or KEM ciphertext, for the group.
    pub payload: PayloadU16,
}

impl KeyShareEntry {
    /// A share for `group`.
    pub fn new(group: NamedGroup, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            group,
            payload: PayloadU16::new(payload.into()),
        }
    }
}

impl Codec<'_> for KeyShareEntry {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.group.encode(bytes);
        self.payload.encode(bytes);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        let group = NamedGroup::read(r)?;
        let payload = PayloadU16::read(r)?;

        Ok(Self { group, payload })
    }
}

impl TlsListElement for KeyShareEntry {
    const SIZE_LEN: ListLength = ListLength::U16;
}

/// The body of a ClientHello handshake message.
#[derive(Clone, Debug, PartialEq)]
pub struct ClientHelloPayload {
    /// `legacy_version`
    pub client_version: ProtocolVersion,
    /// `random`
    pub random: Random,
    /// `legacy_session_id`
    pub session_id: SessionId,
    /// `cipher_suites`
    pub cipher_suites: Vec<CipherSuite>,
    /// `legacy_compression_methods`
    pub compression_methods: Vec<Compression>,
    /// `extensions`, in wire order
    pub extensions: Vec<Extension>,
}

impl Codec<'_> for ClientHelloPayload {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.client_version.encode(bytes);
        self.random.encode(bytes);
        self.session_id.encode(bytes);
        self.cipher_suites.encode(bytes);
        self.compression_methods.encode(bytes);
        self.extensions.encode(bytes);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        let client_version = ProtocolVersion::read(r)?;
        let random = Random::read(r)?;
        let session_id = SessionId::read(r)?;
        let cipher_suites = Vec::read(r)?;
        let compression_methods = Vec::read(r)?;

        // TLS 1.3 ClientHellos always carry extensions.
        if !r.any_left() {
            return Err(InvalidMessage::MissingData("ClientHelloPayload extensions"));
        }
        let extensions = Vec::read(r)?;

        Ok(Self {
            client_version,
            random,
            session_id,
            cipher_suites,
            compression_methods,
            extensions,
        })
    }
}

impl ClientHelloPayload {
    /// True if every extension body and the extension block as a whole
    /// fit their 16-bit length prefixes.
    pub(crate) fn extensions_fit(&self) -> bool {
        let max = ListLength::U16.max_len();
        self.extensions
            .iter()
            .all(|ext| ext.data.bytes().len() <= max)
            && self
                .extensions
                .iter()
                .map(|ext| 4 + ext.data.bytes().len())
                .sum::<usize>()
                <= max
    }

    /// Encode as a complete handshake message, header included.
    pub fn encode_message(&self) -> Vec<u8> {
        let mut out = Vec::new();
        encode_handshake_message(
            HandshakeType::ClientHello.into(),
            &self.get_encoding(),
            &mut out,
        );
        out
    }

    /// Parse a complete ClientHello handshake message.
    pub fn read_message(msg: &[u8]) -> Result<Self, InvalidMessage> {
        let (typ, body) = split_handshake_message(msg)?;
        if HandshakeType::from(typ) != HandshakeType::ClientHello {
            return Err(InvalidMessage::UnexpectedMessage("ClientHello"));
        }
        Self::read_bytes(body)
    }

    /// The raw extension of type `typ`, if present.
    pub fn extension(&self, typ: ExtensionType) -> Option<&Extension> {
        find(&self.extensions, typ)
    }

    /// Replace the extension of `ext.typ` in place, or append it.
    pub fn set_extension(&mut self, ext: Extension) {
        match self
            .extensions
            .iter_mut()
            .find(|existing| existing.typ == ext.typ)
        {
            Some(existing) => *existing = ext,
            None => self.extensions.push(ext),
        }
    }

    /// Remove the extension of type `typ`, if present.
    pub fn remove_extension(&mut self, typ: ExtensionType) {
        self.extensions.retain(|ext| ext.typ != typ);
    }

    /// True if any extension type appears more than once.
    pub fn has_duplicate_extension(&self) -> bool {
        has_duplicates(&self.extensions)
    }

    /// The host name in `server_name`, if one was sent.
    pub fn server_name(&self) -> Result<Option<Vec<u8>>, InvalidMessage> {
        let Some(ext) = self.extension(ExtensionType::ServerName) else {
            return Ok(None);
        };

        let list = PayloadU16::read_bytes(ext.data.bytes())?;
        let mut r = Reader::init(list.bytes());
        while r.any_left() {
            let typ = ServerNameType::read(&mut r)?;
            let name = PayloadU16::read(&mut r)?;
            if typ == ServerNameType::HostName {
                if name.bytes().is_empty() {
                    return Err(InvalidMessage::InvalidServerName);
                }
                return Ok(Some(name.into_inner()));
            }
        }
        Ok(None)
    }

    /// The offered key shares; empty if `key_share` is absent.
    pub fn key_shares(&self) -> Result<Vec<KeyShareEntry>, InvalidMessage> {
        self.extension(ExtensionType::KeyShare)
            .map(parse_body)
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    /// The offered protocol versions, if `supported_versions` is present.
    pub fn supported_versions(&self) -> Result<Option<Vec<ProtocolVersion>>, InvalidMessage> {
        self.extension(ExtensionType::SupportedVersions)
            .map(parse_body)
            .transpose()
    }

    /// The offered groups; empty if `supported_groups` is absent.
    pub fn named_groups(&self) -> Result<Vec<NamedGroup>, InvalidMessage> {
        self.extension(ExtensionType::EllipticCurves)
            .map(parse_body)
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    /// The offered signature schemes; empty if `signature_algorithms` is absent.
    pub fn signature_schemes(&self) -> Result<Vec<SignatureScheme>, InvalidMessage> {
        self.extension(ExtensionType::SignatureAlgorithms)
            .map(parse_body)
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    /// The schemes the peer accepts delegated credentials for, if it offered any.
    pub fn delegated_credential_schemes(
        &self,
    ) -> Result<Option<Vec<SignatureScheme>>, InvalidMessage> {
        self.extension(ExtensionType::DelegatedCredentials)
            .map(parse_body)
            .transpose()
    }

    /// The `encrypted_client_hello` extension, parsed, if present.
    pub fn encrypted_client_hello(&self) -> Option<Result<EncryptedClientHello, InvalidMessage>> {
        self.extension(ExtensionType::EncryptedClientHello)
            .map(parse_body)
    }

    /// True if the hello offers TLS 1.3.
    pub fn offers_tls13(&self) -> bool {
        matches!(
            self.supported_versions(),
            Ok(Some(versions)) if versions.contains(&ProtocolVersion::TLSv1_3)
        )
    }
}

/// The body of a ServerHello or HelloRetryRequest handshake message.
#[derive(Clone, Debug, PartialEq)]
pub struct ServerHelloPayload {
    /// `legacy_version`
    pub legacy_version: ProtocolVersion,
    /// `random`; for a HelloRetryRequest this is a fixed value.
    pub random: Random,
    /// `legacy_session_id_echo`
    pub session_id: SessionId,
    /// `cipher_suite`
    pub cipher_suite: CipherSuite,
    /// `legacy_compression_method`
    pub compression_method: Compression,
    /// `extensions`, in wire order
    pub extensions: Vec<Extension>,
}

impl Codec<'_> for ServerHelloPayload {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.legacy_version.encode(bytes);
        self.random.encode(bytes);
        self.session_id.encode(bytes);
        self.cipher_suite.encode(bytes);
        self.compression_method.encode(bytes);
        self.extensions.encode(bytes);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        let legacy_version = ProtocolVersion::read(r)?;
        let random = Random::read(r)?;
        let session_id = SessionId::read(r)?;
        let cipher_suite = CipherSuite::read(r)?;
        let compression_method = Compression::read(r)?;
        if compression_method != Compression::Null {
            return Err(InvalidMessage::UnsupportedCompression);
        }
        let extensions = match r.any_left() {
            true => Vec::read(r)?,
            false => Vec::new(),
        };

        Ok(Self {
            legacy_version,
            random,
            session_id,
            cipher_suite,
            compression_method,
            extensions,
        })
    }
}

impl ServerHelloPayload {
    /// Encode as a complete handshake message, header included.
    ///
    /// HelloRetryRequest shares the ServerHello message type.
    pub fn encode_message(&self) -> Vec<u8> {
        let mut out = Vec::new();
        encode_handshake_message(
            HandshakeType::ServerHello.into(),
            &self.get_encoding(),
            &mut out,
        );
        out
    }

    /// Parse a complete ServerHello (or HelloRetryRequest) handshake message.
    pub fn read_message(msg: &[u8]) -> Result<Self, InvalidMessage> {
        let (typ, body) = split_handshake_message(msg)?;
        if HandshakeType::from(typ) != HandshakeType::ServerHello {
            return Err(InvalidMessage::UnexpectedMessage("ServerHello"));
        }
        Self::read_bytes(body)
    }

    /// True if this is a HelloRetryRequest.
    pub fn is_hello_retry_request(&self) -> bool {
        self.random == HELLO_RETRY_REQUEST_RANDOM
    }

    /// The raw extension of type `typ`, if present.
    pub fn extension(&self, typ: ExtensionType) -> Option<&Extension> {
        find(&self.extensions, typ)
    }

    /// Replace the extension of `ext.typ` in place, or append it.
    pub fn set_extension(&mut self, ext: Extension) {
        match self
            .extensions
            .iter_mut()
            .find(|existing| existing.typ == ext.typ)
        {
            Some(existing) => *existing = ext,
            None => self.extensions.push(ext),
        }
    }

    /// True if any extension type appears more than once.
    pub fn has_duplicate_extension(&self) -> bool {
        has_duplicates(&self.extensions)
    }

    /// The version the server selected in `supported_versions`.
    pub fn selected_version(&self) -> Result<Option<ProtocolVersion>, InvalidMessage> {
        self.extension(ExtensionType::SupportedVersions)
            .map(parse_body)
            .transpose()
    }

    /// The server's key share (ServerHello only).
    pub fn key_share(&self) -> Result<Option<KeyShareEntry>, InvalidMessage> {
        self.extension(ExtensionType::KeyShare)
            .map(parse_body)
            .transpose()
    }

    /// The group a HelloRetryRequest asks for.
    pub fn selected_group(&self) -> Result<Option<NamedGroup>, InvalidMessage> {
        self.extension(ExtensionType::KeyShare)
            .map(parse_body)
            .transpose()
    }

    /// The cookie a HelloRetryRequest asks us to echo.
    pub fn cookie(&self) -> Result<Option<PayloadU16>, InvalidMessage> {
        self.extension(ExtensionType::Cookie)
            .map(parse_body)
            .transpose()
    }

    /// True if the server selected a pre-shared key.
    pub fn has_pre_shared_key(&self) -> bool {
        self.extension(ExtensionType::PreSharedKey)
            .is_some()
    }
}

/// The body of an EncryptedExtensions handshake message.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EncryptedExtensions(pub Vec<Extension>);

impl Codec<'_> for EncryptedExtensions {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.0.encode(bytes);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        Ok(Self(Vec::read(r)?))
    }
}

impl EncryptedExtensions {
    /// Encode as a complete handshake message, header included.
    pub fn encode_message(&self) -> Vec<u8> {
        let mut out = Vec::new();
        encode_handshake_message(
            HandshakeType::EncryptedExtensions.into(),
            &self.get_encoding(),
            &mut out,
        );
        out
    }

    /// Parse a complete EncryptedExtensions handshake message.
    pub fn read_message(msg: &[u8]) -> Result<Self, InvalidMessage> {
        let (typ, body) = split_handshake_message(msg)?;
        if HandshakeType::from(typ) != HandshakeType::EncryptedExtensions {
            return Err(InvalidMessage::UnexpectedMessage("EncryptedExtensions"));
        }
        Self::read_bytes(body)
    }

    /// The raw extension of type `typ`, if present.
    pub fn extension(&self, typ: ExtensionType) -> Option<&Extension> {
        find(&self.0, typ)
    }

    /// True if any extension type appears more than once.
    pub fn has_duplicate_extension(&self) -> bool {
        has_duplicates(&self.0)
    }
}

/// One `CertificateEntry` of a TLS 1.3 Certificate message.
///
/// The delegated credential for the end-entity certificate travels in its
/// `extensions`.
#[derive(Clone, Debug, PartialEq)]
pub struct CertificateEntry {
    /// The DER certificate.
    pub cert: PayloadU24,
    /// Per-certificate extensions.
    pub extensions: Vec<Extension>,
}

impl CertificateEntry {
    /// An entry for `cert_der` with no extensions.
    pub fn new(cert_der: &[u8]) -> Self {
        Self {
            cert: PayloadU24::new(cert_der.to_vec()),
            extensions: Vec::new(),
        }
    }

    /// The raw extension of type `typ`, if present.
    pub fn extension(&self, typ: ExtensionType) -> Option<&Extension> {
        find(&self.extensions, typ)
    }
}

impl Codec<'_> for CertificateEntry {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.cert.encode(bytes);
        self.extensions.encode(bytes);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        Ok(Self {
            cert: PayloadU24::read(r)?,
            extensions: Vec::read(r)?,
        })
    }
}

impl TlsListElement for CertificateEntry {
    const SIZE_LEN: ListLength = ListLength::U24 {
        max: crate::msgs::codec::u24::MAX,
    };
}
