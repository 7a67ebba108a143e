//! Conversions between ClientHelloInner, EncodedClientHelloInner and
//! ClientHelloOuterAAD, and the confirmation-hashing views of the server's
//! hello messages.

use alloc::vec;
use alloc::vec::Vec;
use core::ops::Range;

use crate::enums::{CipherSuite, ProtocolVersion};
use crate::error::InvalidMessage;
use crate::msgs::codec::{Codec, LengthPrefixedBuffer, ListLength, Reader};
use crate::msgs::ech::EncryptedClientHello;
use crate::msgs::enums::{Compression, ExtensionType};
use crate::msgs::handshake::{
    ClientHelloPayload, Extension, Random, ServerHelloPayload, SessionId,
};

/// The bytes of an encoded ServerHello message (header included) that carry
/// the ECH acceptance confirmation: the last eight bytes of `random`.
pub(crate) const SERVER_HELLO_ECH_CONFIRMATION_SPAN: Range<usize> =
    (1 + 3 + 2 + 24)..(1 + 3 + 2 + 32);

/// The extensions a ClientHelloInner takes from the ClientHelloOuter.
///
/// These must appear in this relative order in both hellos. The list is
/// matched as a run, so more types may be appended without other changes.
pub fn outer_extension_types() -> &'static [ExtensionType] {
    &[ExtensionType::KeyShare]
}

/// Transform a ClientHelloInner handshake message into an EncodedClientHelloInner.
///
/// The session id is dropped, the run of [`outer_extension_types`] is
/// replaced by one `ech_outer_extensions` back-reference, and zero padding is
/// appended. `server_name_len` is the length of the inner `server_name`, or
/// zero if none was sent.
pub fn encode_inner(
    inner_msg: &[u8],
    server_name_len: usize,
    max_name_len: u8,
) -> Result<Vec<u8>, InvalidMessage> {
    let hello = ClientHelloPayload::read_message(inner_msg)?;
    let outer_exts = outer_extension_types();

    let mut out = Vec::with_capacity(inner_msg.len());
    hello.client_version.encode(&mut out);
    hello.random.encode(&mut out);
    SessionId::empty().encode(&mut out);
    hello.cipher_suites.encode(&mut out);
    hello.compression_methods.encode(&mut out);

    {
        let nest = LengthPrefixedBuffer::new(ListLength::U16, &mut out);
        let mut exts = hello.extensions.iter();
        while let Some(ext) = exts.next() {
            if ext.typ != outer_exts[0] {
                ext.encode(nest.buf);
                continue;
            }

            Extension::new(
                ExtensionType::EncryptedClientHelloOuterExtensions,
                outer_exts.to_vec().get_encoding(),
            )
            .encode(nest.buf);

            for expected in &outer_exts[1..] {
                match exts.next() {
                    Some(next) if next.typ == *expected => {}
                    _ => return Err(InvalidMessage::InvalidEchOuterExtensions),
                }
            }
        }
    }

    let max_name_len = usize::from(max_name_len);
    let pad = match server_name_len {
        0 => 9 + max_name_len,
        len => max_name_len.saturating_sub(len),
    };
    let padded = out.len() + pad;
    out.resize(padded + (31 - padded % 32), 0);
    Ok(out)
}

/// Rebuild the ClientHelloInner handshake message from an EncodedClientHelloInner.
///
/// `outer_msg` is the ClientHelloOuter message the encoding arrived in; the
/// extensions named by the back-reference are copied from it, in order, and
/// its session id is restored.
pub fn decode_inner(
    encoded: &[u8],
    outer_msg: &[u8],
    outer_session_id: &SessionId,
) -> Result<Vec<u8>, InvalidMessage> {
    let outer = ClientHelloPayload::read_message(outer_msg)?;

    let mut r = Reader::init(encoded);
    let client_version = ProtocolVersion::read(&mut r)?;
    let random = Random::read(&mut r)?;
    if !SessionId::read(&mut r)?.is_empty() {
        return Err(InvalidMessage::NonEmptyInnerSessionId);
    }
    let cipher_suites = Vec::<CipherSuite>::read(&mut r)?;
    let compression_methods = Vec::<Compression>::read(&mut r)?;
    if !r.any_left() {
        return Err(InvalidMessage::MissingData("EncodedClientHelloInner extensions"));
    }
    let encoded_exts = Vec::<Extension>::read(&mut r)?;
    if r.rest().iter().any(|b| *b != 0) {
        return Err(InvalidMessage::NonZeroClientHelloInnerPadding);
    }

    let mut extensions = Vec::with_capacity(encoded_exts.len() + outer.extensions.len());
    let mut seen_back_reference = false;
    for ext in encoded_exts {
        if ext.typ != ExtensionType::EncryptedClientHelloOuterExtensions {
            extensions.push(ext);
            continue;
        }

        if seen_back_reference {
            return Err(InvalidMessage::InvalidEchOuterExtensions);
        }
        seen_back_reference = true;

        let types = Vec::<ExtensionType>::read_bytes(ext.data.bytes())
            .map_err(|_| InvalidMessage::InvalidEchOuterExtensions)?;

        // one pass over the outer extensions: the types must come in outer order
        let mut outer_exts = outer.extensions.iter();
        for typ in types {
            if typ == ExtensionType::EncryptedClientHello {
                return Err(InvalidMessage::InvalidEchOuterExtensions);
            }
            match outer_exts.find(|outer_ext| outer_ext.typ == typ) {
                Some(outer_ext) => extensions.push(outer_ext.clone()),
                None => return Err(InvalidMessage::InvalidEchOuterExtensions),
            }
        }
    }

    Ok(ClientHelloPayload {
        client_version,
        random,
        session_id: outer_session_id.clone(),
        cipher_suites,
        compression_methods,
        extensions,
    }
    .encode_message())
}

/// ClientHelloOuterAAD: the ClientHelloOuter body, without the handshake
/// header, with the ECH payload replaced by `payload_len` zero bytes.
pub fn outer_aad(outer_msg: &[u8], payload_len: usize) -> Result<Vec<u8>, InvalidMessage> {
    let mut hello = ClientHelloPayload::read_message(outer_msg)?;
    let mut outer = match hello.encrypted_client_hello() {
        Some(Ok(EncryptedClientHello::Outer(outer))) => outer,
        Some(Ok(EncryptedClientHello::Inner)) => return Err(InvalidMessage::InvalidEchType),
        Some(Err(err)) => return Err(err),
        None => return Err(InvalidMessage::MissingData("encrypted_client_hello")),
    };

    outer.payload = crate::msgs::base::PayloadU16::new(vec![0; payload_len]);
    hello.set_extension(Extension::encrypted_client_hello(
        &EncryptedClientHello::Outer(outer),
    ));
    Ok(hello.get_encoding())
}

/// The HelloRetryRequest as hashed for `hrr_accept_confirmation`: its ECH
/// extension value replaced by eight zero bytes.
pub fn hrr_confirmation_message(hrr_msg: &[u8]) -> Result<Vec<u8>, InvalidMessage> {
    let mut hrr = ServerHelloPayload::read_message(hrr_msg)?;
    if hrr
        .extension(ExtensionType::EncryptedClientHello)
        .is_none()
    {
        return Err(InvalidMessage::MissingData("encrypted_client_hello"));
    }
    hrr.set_extension(Extension::new(
        ExtensionType::EncryptedClientHello,
        vec![0; crate::key_schedule::ECH_CONFIRMATION_LEN],
    ));
    Ok(hrr.encode_message())
}

/// The ServerHello as hashed for `accept_confirmation`: the last eight bytes
/// of its random zeroed.
pub(crate) fn server_hello_confirmation_message(sh_msg: &[u8]) -> Result<Vec<u8>, InvalidMessage> {
    if sh_msg.len() < SERVER_HELLO_ECH_CONFIRMATION_SPAN.end {
        return Err(InvalidMessage::MessageTooShort);
    }
    let mut msg = sh_msg.to_vec();
    msg[SERVER_HELLO_ECH_CONFIRMATION_SPAN].fill(0);
    Ok(msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hpke::HpkeSymmetricCipherSuite;
    use crate::enums::NamedGroup;
    use crate::msgs::base::PayloadU16;
    use crate::msgs::ech::{EchContextHandle, EncryptedClientHelloOuter};
    use crate::msgs::handshake::KeyShareEntry;

    fn inner_hello(name: &[u8]) -> ClientHelloPayload {
        ClientHelloPayload {
            client_version: ProtocolVersion::TLSv1_2,
            random: Random([0x55; 32]),
            session_id: SessionId::new(&[0x33; 32]).unwrap(),
            cipher_suites: vec![CipherSuite::TLS13_AES_128_GCM_SHA256],
            compression_methods: vec![Compression::Null],
            extensions: vec![
                Extension::server_name(name),
                Extension::supported_versions(&[ProtocolVersion::TLSv1_3]),
                Extension::key_shares(&[KeyShareEntry::new(NamedGroup::X25519, [7u8; 32])]),
                Extension::encrypted_client_hello(&EncryptedClientHello::Inner),
            ],
        }
    }

    fn outer_hello(inner: &ClientHelloPayload, payload: Vec<u8>) -> ClientHelloPayload {
        let mut outer = inner.clone();
        outer.random = Random([0x66; 32]);
        outer.set_extension(Extension::server_name(b"public.example"));
        outer.set_extension(Extension::encrypted_client_hello(
            &EncryptedClientHello::Outer(EncryptedClientHelloOuter {
                handle: EchContextHandle {
                    cipher_suite: HpkeSymmetricCipherSuite::default(),
                    config_id: 1,
                    enc: PayloadU16::new(vec![9; 32]),
                },
                payload: PayloadU16::new(payload),
            }),
        ));
        outer
    }

    #[test]
    fn encode_then_decode_restores_inner() {
        let inner = inner_hello(b"secret.example");
        let encoded = encode_inner(&inner.encode_message(), 14, 32).unwrap();
        let outer = outer_hello(&inner, encoded.clone());

        let decoded = decode_inner(&encoded, &outer.encode_message(), &inner.session_id).unwrap();
        assert_eq!(decoded, inner.encode_message());
    }

    #[test]
    fn encoded_inner_elides_key_share_and_session_id() {
        let inner = inner_hello(b"secret.example");
        let encoded = encode_inner(&inner.encode_message(), 14, 0).unwrap();

        let mut r = Reader::init(&encoded);
        ProtocolVersion::read(&mut r).unwrap();
        Random::read(&mut r).unwrap();
        assert!(SessionId::read(&mut r).unwrap().is_empty());
        Vec::<CipherSuite>::read(&mut r).unwrap();
        Vec::<Compression>::read(&mut r).unwrap();
        let exts = Vec::<Extension>::read(&mut r).unwrap();
        let types: Vec<_> = exts.iter().map(|e| e.typ).collect();
        assert_eq!(
            types,
            vec![
                ExtensionType::ServerName,
                ExtensionType::SupportedVersions,
                ExtensionType::EncryptedClientHelloOuterExtensions,
                ExtensionType::EncryptedClientHello,
            ]
        );
        assert_eq!(exts[2].data.bytes(), &[2, 0x00, 0x33]);
        assert!(r.rest().iter().all(|b| *b == 0));
    }

    #[test]
    fn padded_length_is_31_mod_32() {
        let inner = inner_hello(b"a.example").encode_message();
        for name_len in [0usize, 1, 9, 40, 255] {
            for max_name_len in [0u8, 1, 9, 31, 32, 64, 255] {
                let encoded = encode_inner(&inner, name_len, max_name_len).unwrap();
                assert_eq!(encoded.len() % 32, 31, "{} {}", name_len, max_name_len);
            }
        }
    }

    #[test]
    fn padding_covers_the_name_budget() {
        let inner = inner_hello(b"a.example").encode_message();
        let unpadded = encode_inner(&inner, 9, 0).unwrap().len();
        let padded = encode_inner(&inner, 9, 128).unwrap().len();
        assert!(padded >= unpadded + 128 - 9);
        let nameless = encode_inner(&inner, 0, 128).unwrap().len();
        assert!(nameless >= unpadded + 9 + 128 - 31);
    }

    #[test]
    fn encode_rejects_garbage() {
        assert!(encode_inner(&[1, 0, 0, 1, 0], 0, 0).is_err());
        let mut msg = inner_hello(b"x").encode_message();
        msg.push(0);
        assert!(encode_inner(&msg, 1, 0).is_err());
    }

    #[test]
    fn decode_rejects_nonzero_padding() {
        let inner = inner_hello(b"secret.example");
        let mut encoded = encode_inner(&inner.encode_message(), 14, 32).unwrap();
        let outer = outer_hello(&inner, encoded.clone()).encode_message();
        let last = encoded.len() - 1;
        encoded[last] = 1;
        assert_eq!(
            decode_inner(&encoded, &outer, &inner.session_id),
            Err(InvalidMessage::NonZeroClientHelloInnerPadding)
        );
    }

    #[test]
    fn decode_rejects_session_id() {
        let inner = inner_hello(b"x");
        let outer = outer_hello(&inner, vec![1]).encode_message();
        let mut body = inner.get_encoding();
        body.resize(body.len() + 31 - body.len() % 32, 0);
        assert_eq!(
            decode_inner(&body, &outer, &inner.session_id),
            Err(InvalidMessage::NonEmptyInnerSessionId)
        );
    }

    fn encoded_with_back_reference(types: &[u16], duplicate: bool) -> Vec<u8> {
        let mut hello = inner_hello(b"x");
        hello.session_id = SessionId::empty();
        hello.remove_extension(ExtensionType::KeyShare);
        let mut list = Vec::new();
        {
            let nest = LengthPrefixedBuffer::new(ListLength::U8, &mut list);
            for typ in types {
                typ.encode(nest.buf);
            }
        }
        let back_ref = Extension::new(ExtensionType::EncryptedClientHelloOuterExtensions, list);
        hello.extensions.insert(0, back_ref.clone());
        if duplicate {
            hello.extensions.insert(1, back_ref);
        }
        hello.get_encoding()
    }

    #[test]
    fn decode_resolves_back_references_strictly() {
        let inner = inner_hello(b"x");
        let outer = outer_hello(&inner, vec![1]);
        let outer_msg = outer.encode_message();
        let sid = &inner.session_id;

        // SupportedVersions precedes KeyShare in the outer hello
        let ok = encoded_with_back_reference(&[0x002b, 0x0033], false);
        let decoded = decode_inner(&ok, &outer_msg, sid).unwrap();
        let decoded = ClientHelloPayload::read_message(&decoded).unwrap();
        assert_eq!(decoded.extensions[0].typ, ExtensionType::SupportedVersions);
        assert_eq!(decoded.extensions[1].typ, ExtensionType::KeyShare);

        for bad in [
            encoded_with_back_reference(&[0x0033, 0x002b], false),
            encoded_with_back_reference(&[0x0033, 0x0033], false),
            encoded_with_back_reference(&[0xfe0d], false),
            encoded_with_back_reference(&[0x0015], false),
            encoded_with_back_reference(&[0x0033], true),
        ] {
            assert_eq!(
                decode_inner(&bad, &outer_msg, sid),
                Err(InvalidMessage::InvalidEchOuterExtensions)
            );
        }
    }

    #[test]
    fn outer_aad_zeroes_only_the_payload() {
        let inner = inner_hello(b"x");
        let outer = outer_hello(&inner, vec![0xab; 40]);
        let aad = outer_aad(&outer.encode_message(), 40).unwrap();
        assert_eq!(aad, outer_hello(&inner, vec![0; 40]).get_encoding());

        let inner_msg = inner.encode_message();
        assert_eq!(
            outer_aad(&inner_msg, 40),
            Err(InvalidMessage::InvalidEchType)
        );
    }

    #[test]
    fn hrr_confirmation_zeroes_ech_value() {
        let hrr = ServerHelloPayload {
            legacy_version: ProtocolVersion::TLSv1_2,
            random: crate::msgs::handshake::HELLO_RETRY_REQUEST_RANDOM,
            session_id: SessionId::empty(),
            cipher_suite: CipherSuite::TLS13_AES_128_GCM_SHA256,
            compression_method: Compression::Null,
            extensions: vec![
                Extension::new(ExtensionType::EncryptedClientHello, vec![0xff; 8]),
                Extension::new(
                    ExtensionType::SupportedVersions,
                    ProtocolVersion::TLSv1_3.get_encoding(),
                ),
            ],
        };
        let zeroed = hrr_confirmation_message(&hrr.encode_message()).unwrap();
        let parsed = ServerHelloPayload::read_message(&zeroed).unwrap();
        assert_eq!(
            parsed
                .extension(ExtensionType::EncryptedClientHello)
                .unwrap()
                .data
                .bytes(),
            &[0; 8]
        );
        assert_eq!(parsed.extensions[1], hrr.extensions[1]);
    }

    #[test]
    fn server_hello_confirmation_span() {
        let sh = ServerHelloPayload {
            legacy_version: ProtocolVersion::TLSv1_2,
            random: Random([0xff; 32]),
            session_id: SessionId::empty(),
            cipher_suite: CipherSuite::TLS13_AES_128_GCM_SHA256,
            compression_method: Compression::Null,
            extensions: vec![],
        }
        .encode_message();
        let zeroed = server_hello_confirmation_message(&sh).unwrap();
        assert_eq!(zeroed.len(), sh.len());
        assert_eq!(&zeroed[..30], &sh[..30]);
        assert_eq!(&zeroed[30..38], &[0u8; 8]);
        assert_eq!(&zeroed[38..], &sh[38..]);
        assert_eq!(&sh[6..38], &[0xff; 32]);
        assert!(server_hello_confirmation_message(&sh[..20]).is_err());
    }
}
