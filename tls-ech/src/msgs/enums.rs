use crate::msgs::codec::{ListLength, TlsListElement};

enum_builder! {
    /// The `ExtensionType` TLS protocol enum.  Values in this enum are taken
    /// from the various RFCs covering TLS, and are listed by IANA.
    /// The `Unknown` item is used when processing unrecognized ordinals.
    #[repr(u16)]
    pub enum ExtensionType {
        ServerName => 0x0000,
        StatusRequest => 0x0005,
        EllipticCurves => 0x000a,
        ECPointFormats => 0x000b,
        SignatureAlgorithms => 0x000d,
        ALProtocolNegotiation => 0x0010,
        Padding => 0x0015,
        ExtendedMasterSecret => 0x0017,
        DelegatedCredentials => 0x0022,
        SessionTicket => 0x0023,
        PreSharedKey => 0x0029,
        EarlyData => 0x002a,
        SupportedVersions => 0x002b,
        Cookie => 0x002c,
        PSKKeyExchangeModes => 0x002d,
        KeyShare => 0x0033,
        EncryptedClientHelloOuterExtensions => 0xfd00,
        EncryptedClientHello => 0xfe0d,
        RenegotiationInfo => 0xff01,
    }
}

/// `ExtensionType OuterExtensions<2..254>` in `ech_outer_extensions`.
impl TlsListElement for ExtensionType {
    const SIZE_LEN: ListLength = ListLength::U8;
}

enum_builder! {
    /// The variant byte of the `encrypted_client_hello` extension in a ClientHello.
    #[repr(u8)]
    pub enum EchClientHelloType {
        ClientHelloOuter => 0,
        ClientHelloInner => 1,
    }
}

enum_builder! {
    /// ECHConfig versions.
    #[repr(u16)]
    pub enum EchVersion {
        V18 => 0xfe0d,
    }
}

enum_builder! {
    /// The `Compression` TLS protocol enum.
    #[repr(u8)]
    pub enum Compression {
        Null => 0x00,
    }
}

impl TlsListElement for Compression {
    const SIZE_LEN: ListLength = ListLength::U8;
}

enum_builder! {
    /// The `ServerNameType` TLS protocol enum.
    #[repr(u8)]
    pub enum ServerNameType {
        HostName => 0x00,
    }
}
