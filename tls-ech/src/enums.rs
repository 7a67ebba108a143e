//! TLS registry enums shared by the client and server halves.

use crate::msgs::codec::{ListLength, TlsListElement};

enum_builder! {
    /// The `AlertDescription` TLS protocol enum.  Values in this enum are taken
    /// from the various RFCs covering TLS, and are listed by IANA.
    /// The `Unknown` item is used when processing unrecognised ordinals.
    #[repr(u8)]
    pub enum AlertDescription {
        CloseNotify => 0x00,
        UnexpectedMessage => 0x0a,
        BadRecordMac => 0x14,
        HandshakeFailure => 0x28,
        BadCertificate => 0x2a,
        UnsupportedCertificate => 0x2b,
        CertificateExpired => 0x2d,
        CertificateUnknown => 0x2e,
        IllegalParameter => 0x2f,
        UnknownCA => 0x30,
        DecodeError => 0x32,
        DecryptError => 0x33,
        ProtocolVersion => 0x46,
        InsufficientSecurity => 0x47,
        InternalError => 0x50,
        MissingExtension => 0x6d,
        UnsupportedExtension => 0x6e,
        UnrecognisedName => 0x70,
        EncryptedClientHelloRequired => 0x79,
    }
}

enum_builder! {
    /// The `HandshakeType` TLS protocol enum.  Values in this enum are taken
    /// from the various RFCs covering TLS, and are listed by IANA.
    /// The `Unknown` item is used when processing unrecognised ordinals.
    #[repr(u8)]
    pub enum HandshakeType {
        ClientHello => 0x01,
        ServerHello => 0x02,
        NewSessionTicket => 0x04,
        EndOfEarlyData => 0x05,
        HelloRetryRequest => 0x06,
        EncryptedExtensions => 0x08,
        Certificate => 0x0b,
        CertificateRequest => 0x0d,
        CertificateVerify => 0x0f,
        Finished => 0x14,
        MessageHash => 0xfe,
    }
}

enum_builder! {
    /// The `CipherSuite` TLS protocol enum, restricted to what a TLS 1.3
    /// ClientHello carrying ECH needs.
    #[repr(u16)]
    #[allow(non_camel_case_types)]
    pub enum CipherSuite {
        TLS_EMPTY_RENEGOTIATION_INFO_SCSV => 0x00ff,
        TLS13_AES_128_GCM_SHA256 => 0x1301,
        TLS13_AES_256_GCM_SHA384 => 0x1302,
        TLS13_CHACHA20_POLY1305_SHA256 => 0x1303,
    }
}

impl TlsListElement for CipherSuite {
    const SIZE_LEN: ListLength = ListLength::U16;
}

enum_builder! {
    /// The `NamedGroup` TLS protocol enum.  Values in this enum are taken
    /// from the various RFCs covering TLS, and are listed by IANA.
    /// The `Unknown` item is used when processing unrecognised ordinals.
    #[repr(u16)]
    #[allow(non_camel_case_types)]
    pub enum NamedGroup {
        secp256r1 => 0x0017,
        secp384r1 => 0x0018,
        secp521r1 => 0x0019,
        X25519 => 0x001d,
        X448 => 0x001e,
        X25519MLKEM768 => 0x11ec,
        X25519Kyber768Draft00 => 0x6399,
    }
}

impl TlsListElement for NamedGroup {
    const SIZE_LEN: ListLength = ListLength::U16;
}

enum_builder! {
    /// The `ProtocolVersion` TLS protocol enum.  Values in this enum are taken
    /// from the various RFCs covering TLS, and are listed by IANA.
    /// The `Unknown` item is used when processing unrecognised ordinals.
    #[repr(u16)]
    #[allow(non_camel_case_types)]
    pub enum ProtocolVersion {
        SSLv2 => 0x0200,
        SSLv3 => 0x0300,
        TLSv1_0 => 0x0301,
        TLSv1_1 => 0x0302,
        TLSv1_2 => 0x0303,
        TLSv1_3 => 0x0304,
    }
}

impl ProtocolVersion {
    /// True for the versions before TLS 1.3 that ECH must never be used with.
    ///
    /// GREASE and unknown values are not "old".
    pub fn is_pre_tls13(&self) -> bool {
        matches!(
            self,
            Self::SSLv2 | Self::SSLv3 | Self::TLSv1_0 | Self::TLSv1_1 | Self::TLSv1_2
        )
    }
}

/// `ProtocolVersion versions<2..254>` in the ClientHello `supported_versions`.
impl TlsListElement for ProtocolVersion {
    const SIZE_LEN: ListLength = ListLength::U8;
}

enum_builder! {
    /// The `SignatureScheme` TLS protocol enum.  Values in this enum are taken
    /// from the various RFCs covering TLS, and are listed by IANA.
    /// The `Unknown` item is used when processing unrecognised ordinals.
    #[repr(u16)]
    #[allow(non_camel_case_types)]
    pub enum SignatureScheme {
        RSA_PKCS1_SHA256 => 0x0401,
        ECDSA_NISTP256_SHA256 => 0x0403,
        RSA_PKCS1_SHA384 => 0x0501,
        ECDSA_NISTP384_SHA384 => 0x0503,
        RSA_PKCS1_SHA512 => 0x0601,
        ECDSA_NISTP521_SHA512 => 0x0603,
        RSA_PSS_SHA256 => 0x0804,
        RSA_PSS_SHA384 => 0x0805,
        RSA_PSS_SHA512 => 0x0806,
        ED25519 => 0x0807,
        ED448 => 0x0808,
    }
}

impl TlsListElement for SignatureScheme {
    const SIZE_LEN: ListLength = ListLength::U16;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msgs::codec::{Codec, Reader};

    fn round_trip<'a, T: Codec<'a> + PartialEq>(value: T, encoding: &'a [u8]) {
        assert_eq!(value.get_encoding(), encoding);
        assert_eq!(T::read(&mut Reader::init(encoding)).unwrap(), value);
    }

    #[test]
    fn known_and_unknown_values() {
        round_trip(AlertDescription::EncryptedClientHelloRequired, &[0x79]);
        round_trip(NamedGroup::X25519Kyber768Draft00, &[0x63, 0x99]);
        round_trip(NamedGroup::Unknown(0x0a0a), &[0x0a, 0x0a]);
        round_trip(SignatureScheme::ED25519, &[0x08, 0x07]);
    }

    #[test]
    fn debug_names_unknowns() {
        assert_eq!(format!("{:?}", HandshakeType::ServerHello), "ServerHello");
        assert_eq!(
            format!("{:?}", ProtocolVersion::Unknown(0x7f1c)),
            "ProtocolVersion(0x7f1c)"
        );
    }

    #[test]
    fn pre_tls13_versions() {
        assert!(ProtocolVersion::TLSv1_2.is_pre_tls13());
        assert!(ProtocolVersion::SSLv2.is_pre_tls13());
        assert!(!ProtocolVersion::TLSv1_3.is_pre_tls13());
        assert!(!ProtocolVersion::Unknown(0x1a1a).is_pre_tls13());
    }

    #[test]
    fn truncated_read_names_the_type() {
        assert_eq!(
            CipherSuite::read(&mut Reader::init(&[0x13])),
            Err(crate::error::InvalidMessage::MissingData("CipherSuite"))
        );
    }
}
