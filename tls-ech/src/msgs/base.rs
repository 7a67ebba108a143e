use alloc::vec::Vec;
use core::fmt;

use zeroize::Zeroize;

use crate::error::InvalidMessage;
use crate::msgs::codec::{self, Codec, ListLength, Reader};

/// An externally length'd payload: whatever is left in the reader.
#[derive(Clone, Eq, PartialEq, Default)]
pub struct Payload(pub Vec<u8>);

impl Codec<'_> for Payload {
    fn encode(&self, bytes: &mut Vec<u8>) {
        bytes.extend_from_slice(&self.0);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        Ok(Self(r.rest().to_vec()))
    }
}

impl Payload {
    /// Wrap `bytes`.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// The payload bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        hex(f, &self.0)
    }
}

macro_rules! sized_payload {
    ($(#[doc = $comment:literal])* $name:ident, $len:expr, $what:literal) => {
        $(#[doc = $comment])*
        #[derive(Clone, Eq, PartialEq, Default)]
        pub struct $name(pub Vec<u8>);

        impl $name {
            const SIZE_LEN: ListLength = $len;

            /// Wrap `bytes`; the caller guarantees they fit the length prefix.
            pub fn new(bytes: Vec<u8>) -> Self {
                debug_assert!(bytes.len() <= Self::SIZE_LEN.max_len());
                Self(bytes)
            }

            /// Wrap `bytes`, failing if they do not fit the length prefix.
            pub fn checked_new(bytes: Vec<u8>) -> Result<Self, InvalidMessage> {
                match bytes.len() > Self::SIZE_LEN.max_len() {
                    true => Err(InvalidMessage::MessageTooLarge),
                    false => Ok(Self(bytes)),
                }
            }

            /// An empty payload.
            pub fn empty() -> Self {
                Self(Vec::new())
            }

            /// Encode `slice` behind this payload's length prefix.
            pub fn encode_slice(slice: &[u8], bytes: &mut Vec<u8>) {
                let nest = codec::LengthPrefixedBuffer::new(Self::SIZE_LEN, bytes);
                nest.buf.extend_from_slice(slice);
            }

            /// Like `encode_slice`, but refuses oversized input.
            pub fn checked_encode_slice(
                slice: &[u8],
                bytes: &mut Vec<u8>,
            ) -> Result<(), InvalidMessage> {
                codec::checked_encode_slice(Self::SIZE_LEN, slice, bytes)
            }

            /// The payload bytes.
            pub fn bytes(&self) -> &[u8] {
                &self.0
            }

            /// Take the payload bytes.
            pub fn into_inner(self) -> Vec<u8> {
                self.0
            }
        }

        impl Codec<'_> for $name {
            fn encode(&self, bytes: &mut Vec<u8>) {
                Self::encode_slice(&self.0, bytes);
            }

            fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
                codec::read_slice(Self::SIZE_LEN, r)
                    .map(|body| Self(body.to_vec()))
                    .map_err(|err| match err {
                        InvalidMessage::MissingData(_) => InvalidMessage::MissingData($what),
                        other => other,
                    })
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                hex(f, &self.0)
            }
        }
    };
}

sized_payload! {
    /// An arbitrary, unknown-content, u8-length-prefixed payload
    PayloadU8, ListLength::U8, "PayloadU8"
}

sized_payload! {
    /// An arbitrary, unknown-content, u16-length-prefixed payload
    PayloadU16, ListLength::U16, "PayloadU16"
}

sized_payload! {
    /// An arbitrary, unknown-content, u24-length-prefixed payload
    PayloadU24, ListLength::U24 { max: codec::u24::MAX }, "PayloadU24"
}

impl Zeroize for PayloadU8 {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

impl Zeroize for PayloadU16 {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

// Format an iterator of u8 into a hex string
pub(crate) fn hex<'a>(
    f: &mut fmt::Formatter<'_>,
    payload: impl IntoIterator<Item = &'a u8>,
) -> fmt::Result {
    for b in payload {
        write!(f, "{:02x}", b)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_u16_reads_exactly_its_length() {
        let mut r = Reader::init(&[0, 2, 0xaa, 0xbb, 0xcc]);
        let p = PayloadU16::read(&mut r).unwrap();
        assert_eq!(p.bytes(), &[0xaa, 0xbb]);
        assert_eq!(r.rest(), &[0xcc]);
    }

    #[test]
    fn short_payload_is_an_error() {
        assert_eq!(
            PayloadU8::read(&mut Reader::init(&[3, 1])),
            Err(InvalidMessage::MessageTooShort)
        );
        assert_eq!(
            PayloadU24::read(&mut Reader::init(&[0, 0])),
            Err(InvalidMessage::MissingData("PayloadU24"))
        );
    }

    #[test]
    fn checked_constructors_enforce_prefix_width() {
        assert!(PayloadU8::checked_new(vec![0; 255]).is_ok());
        assert_eq!(
            PayloadU8::checked_new(vec![0; 256]),
            Err(InvalidMessage::MessageTooLarge)
        );
        assert_eq!(
            PayloadU24::checked_new(vec![0; codec::u24::MAX + 1]),
            Err(InvalidMessage::MessageTooLarge)
        );
    }

    #[test]
    fn debug_is_hex() {
        assert_eq!(format!("{:?}", PayloadU16::new(vec![0x0f, 0xa0])), "0fa0");
        assert_eq!(format!("{:?}", Payload::new(vec![1])), "01");
    }

    #[test]
    fn encoding_round_trips_through_prefix() {
        let p = PayloadU24::new(vec![7; 3]);
        assert_eq!(p.get_encoding(), [0, 0, 3, 7, 7, 7]);
        assert_eq!(PayloadU24::read_bytes(&p.get_encoding()).unwrap(), p);
    }
}
