use alloc::vec::Vec;
use core::fmt::Debug;

use crate::error::InvalidMessage;

/// Wrapper over a slice of bytes that allows reading chunks from
/// with the current position state held using a cursor.
///
/// A new reader for a sub section of the buffer can be created
/// using the `sub` function or a section of a certain length can
/// be obtained using the `take` function
pub struct Reader<'a> {
    /// The underlying buffer storing the readers content
    buffer: &'a [u8],
    /// Stores the current reading position for the buffer
    cursor: usize,
}

impl<'a> Reader<'a> {
    /// Creates a new Reader of the provided `bytes` slice with
    /// the initial cursor position of zero.
    pub fn init(bytes: &'a [u8]) -> Self {
        Reader {
            buffer: bytes,
            cursor: 0,
        }
    }

    /// Attempts to create a new Reader on a sub section of this
    /// readers bytes by taking a slice of the provided `length`
    /// will return None if there is not enough bytes
    pub fn sub(&mut self, length: usize) -> Result<Self, InvalidMessage> {
        match self.take(length) {
            Some(bytes) => Ok(Reader::init(bytes)),
            None => Err(InvalidMessage::MessageTooShort),
        }
    }

    /// Borrows a slice of all the remaining bytes
    /// that appear after the cursor position.
    ///
    /// Moves the cursor to the end of the buffer length.
    pub fn rest(&mut self) -> &'a [u8] {
        let rest = &self.buffer[self.cursor..];
        self.cursor = self.buffer.len();
        rest
    }

    /// Attempts to borrow a slice of bytes from the current
    /// cursor position of `length` if there is not enough
    /// bytes remaining after the cursor to take the length
    /// then None is returned instead.
    pub fn take(&mut self, length: usize) -> Option<&'a [u8]> {
        if self.left() < length {
            return None;
        }
        let current = self.cursor;
        self.cursor += length;
        Some(&self.buffer[current..current + length])
    }

    /// Used to check whether the reader has any content left
    /// after the cursor (cursor has not reached end of buffer)
    pub fn any_left(&self) -> bool {
        self.cursor < self.buffer.len()
    }

    /// Fails with `TrailingData` naming `name` if any bytes remain.
    pub fn expect_empty(&self, name: &'static str) -> Result<(), InvalidMessage> {
        match self.any_left() {
            true => Err(InvalidMessage::TrailingData(name)),
            false => Ok(()),
        }
    }

    /// Returns the cursor position which is also the number
    /// of bytes that have been read from the buffer.
    pub fn used(&self) -> usize {
        self.cursor
    }

    /// Returns the number of bytes that are still able to be
    /// read (The number of remaining takes)
    pub fn left(&self) -> usize {
        self.buffer.len() - self.cursor
    }
}

/// Trait for implementing encoding and decoding functionality
/// on something.
pub trait Codec<'a>: Debug + Sized {
    /// Function for encoding itself by appending itself to
    /// the provided vec of bytes.
    fn encode(&self, bytes: &mut Vec<u8>);

    /// Function for decoding itself from the provided reader
    /// will return Some if the decoding was successful or
    /// None if it was not.
    fn read(_: &mut Reader<'a>) -> Result<Self, InvalidMessage>;

    /// Convenience function for encoding the implementation
    /// into a vec and returning it
    fn get_encoding(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        self.encode(&mut bytes);
        bytes
    }

    /// Function for wrapping a call to the read function in
    /// a Reader for the slice of bytes provided
    ///
    /// Returns `Err(InvalidMessage::TrailingData(_))` if
    /// the provided bytes are not fully consumed.
    fn read_bytes(bytes: &'a [u8]) -> Result<Self, InvalidMessage> {
        let mut reader = Reader::init(bytes);
        Self::read(&mut reader).and_then(|r| {
            reader.expect_empty("read_bytes")?;
            Ok(r)
        })
    }
}

impl Codec<'_> for u8 {
    fn encode(&self, bytes: &mut Vec<u8>) {
        bytes.push(*self);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        match r.take(1) {
            Some(&[byte]) => Ok(byte),
            _ => Err(InvalidMessage::MissingData("u8")),
        }
    }
}

impl Codec<'_> for u16 {
    fn encode(&self, bytes: &mut Vec<u8>) {
        bytes.extend_from_slice(&Self::to_be_bytes(*self));
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        match r.take(2) {
            Some(&[b1, b2]) => Ok(Self::from_be_bytes([b1, b2])),
            _ => Err(InvalidMessage::MissingData("u16")),
        }
    }
}

// Make a distinct type for u24, even though it's a u32 underneath
#[allow(non_camel_case_types)]
#[derive(Debug, Copy, Clone)]
pub struct u24(pub u32);

impl u24 {
    /// The largest value a u24 can carry.
    pub const MAX: usize = 0xff_ffff;
}

#[cfg(any(target_pointer_width = "32", target_pointer_width = "64"))]
impl From<u24> for usize {
    #[inline]
    fn from(v: u24) -> Self {
        v.0 as Self
    }
}

impl Codec<'_> for u24 {
    fn encode(&self, bytes: &mut Vec<u8>) {
        let be_bytes = u32::to_be_bytes(self.0);
        bytes.extend_from_slice(&be_bytes[1..]);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        match r.take(3) {
            Some(&[a, b, c]) => Ok(Self(u32::from_be_bytes([0, a, b, c]))),
            _ => Err(InvalidMessage::MissingData("u24")),
        }
    }
}

impl Codec<'_> for u32 {
    fn encode(&self, bytes: &mut Vec<u8>) {
        bytes.extend(Self::to_be_bytes(*self));
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        match r.take(4) {
            Some(&[a, b, c, d]) => Ok(Self::from_be_bytes([a, b, c, d])),
            _ => Err(InvalidMessage::MissingData("u32")),
        }
    }
}

/// Implement `Codec` for lists of elements that implement `TlsListElement`.
///
/// `TlsListElement` provides the size of the length prefix for the list.
impl<'a, T: Codec<'a> + TlsListElement + Debug> Codec<'a> for Vec<T> {
    fn encode(&self, bytes: &mut Vec<u8>) {
        let nest = LengthPrefixedBuffer::new(T::SIZE_LEN, bytes);

        for i in self {
            i.encode(nest.buf);
        }
    }

    fn read(r: &mut Reader<'a>) -> Result<Self, InvalidMessage> {
        let len = match T::SIZE_LEN {
            ListLength::U8 => usize::from(u8::read(r)?),
            ListLength::U16 => usize::from(u16::read(r)?),
            ListLength::U24 { max } => Ord::min(usize::from(u24::read(r)?), max),
        };

        let mut sub = r.sub(len)?;
        let mut ret = Self::new();
        while sub.any_left() {
            ret.push(T::read(&mut sub)?);
        }

        Ok(ret)
    }
}

/// A trait for types that can be encoded and decoded in a list.
///
/// This trait is used to implement `Codec` for lists of elements that implement it.
/// `SIZE_LEN` is the size of the length prefix for the list.
pub trait TlsListElement {
    /// The width of the list's length prefix.
    const SIZE_LEN: ListLength;
}

/// The length of the length prefix for a list.
///
/// The types that appear in lists are limited to three kinds of length prefixes:
/// 1, 2, and 3 bytes. For the latter kind, we require a `TlsListElement` implementer
/// to specify a maximum length.
#[derive(Debug, Clone, Copy)]
pub enum ListLength {
    /// One-byte length prefix.
    U8,
    /// Two-byte length prefix.
    U16,
    /// Three-byte length prefix, clamped to `max` when reading.
    U24 {
        /// Largest length accepted when reading.
        max: usize,
    },
}

impl ListLength {
    /// The largest body the prefix can describe.
    pub(crate) fn max_len(&self) -> usize {
        match self {
            Self::U8 => 0xff,
            Self::U16 => 0xffff,
            Self::U24 { .. } => u24::MAX,
        }
    }
}

/// Tracks encoding a length-delimited structure in a single pass.
pub(crate) struct LengthPrefixedBuffer<'a> {
    pub(crate) buf: &'a mut Vec<u8>,
    len_offset: usize,
    size_len: ListLength,
}

impl<'a> LengthPrefixedBuffer<'a> {
    /// Inserts a dummy length into `buf`, and remembers where it went.
    ///
    /// After this, the body of the length-delimited structure should be appended to `LengthPrefixedBuffer::buf`.
    /// The length header is corrected in `LengthPrefixedBuffer::drop()`.
    pub(crate) fn new(size_len: ListLength, buf: &'a mut Vec<u8>) -> Self {
        let len_offset = buf.len();
        buf.extend(match size_len {
            ListLength::U8 => &[0xff][..],
            ListLength::U16 => &[0xff, 0xff],
            ListLength::U24 { .. } => &[0xff, 0xff, 0xff],
        });

        Self {
            buf,
            len_offset,
            size_len,
        }
    }
}

impl Drop for LengthPrefixedBuffer<'_> {
    /// Goes back and corrects the length previously inserted at the start of the structure.
    fn drop(&mut self) {
        match self.size_len {
            ListLength::U8 => {
                let len = self.buf.len() - self.len_offset - 1;
                debug_assert!(len <= 0xff);
                self.buf[self.len_offset] = len as u8;
            }
            ListLength::U16 => {
                let len = self.buf.len() - self.len_offset - 2;
                debug_assert!(len <= 0xffff);
                self.buf[self.len_offset..self.len_offset + 2]
                    .copy_from_slice(&u16::to_be_bytes(len as u16));
            }
            ListLength::U24 { .. } => {
                let len = self.buf.len() - self.len_offset - 3;
                debug_assert!(len <= 0xff_ffff);
                let len_bytes = u32::to_be_bytes(len as u32);
                self.buf[self.len_offset..self.len_offset + 3].copy_from_slice(&len_bytes[1..]);
            }
        }
    }
}

/// Append `body` to `bytes` behind a length prefix of the given width.
///
/// Fails with `MessageTooLarge` rather than truncating when `body` does not fit
/// in the prefix.
pub(crate) fn checked_encode_slice(
    size_len: ListLength,
    body: &[u8],
    bytes: &mut Vec<u8>,
) -> Result<(), InvalidMessage> {
    if body.len() > size_len.max_len() {
        return Err(InvalidMessage::MessageTooLarge);
    }

    let nest = LengthPrefixedBuffer::new(size_len, bytes);
    nest.buf.extend_from_slice(body);
    Ok(())
}

/// Read a length-prefixed opaque slice without copying it.
pub(crate) fn read_slice<'a>(
    size_len: ListLength,
    r: &mut Reader<'a>,
) -> Result<&'a [u8], InvalidMessage> {
    let len = match size_len {
        ListLength::U8 => usize::from(u8::read(r)?),
        ListLength::U16 => usize::from(u16::read(r)?),
        ListLength::U24 { max } => {
            let len = usize::from(u24::read(r)?);
            if len > max {
                return Err(InvalidMessage::MessageTooLarge);
            }
            len
        }
    };

    r.take(len).ok_or(InvalidMessage::MessageTooShort)
}

/// The 4-byte header of a handshake message: type and u24 body length.
pub(crate) const HANDSHAKE_HEADER_LEN: usize = 4;

/// Wrap `body` as a handshake message of type `typ`.
pub(crate) fn encode_handshake_message(typ: u8, body: &[u8], bytes: &mut Vec<u8>) {
    typ.encode(bytes);
    let nest = LengthPrefixedBuffer::new(ListLength::U24 { max: u24::MAX }, bytes);
    nest.buf.extend_from_slice(body);
}

/// Split a handshake message into its type and body.
///
/// The message must be exactly one handshake message.
pub(crate) fn split_handshake_message(msg: &[u8]) -> Result<(u8, &[u8]), InvalidMessage> {
    let mut r = Reader::init(msg);
    let typ = u8::read(&mut r)?;
    let body = read_slice(ListLength::U24 { max: u24::MAX }, &mut r)?;
    r.expect_empty("HandshakeMessage")?;
    Ok((typ, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_tracks_position() {
        let mut r = Reader::init(&[1, 2, 3, 4]);
        assert_eq!(r.take(1), Some(&[1u8][..]));
        assert_eq!(r.used(), 1);
        assert_eq!(r.left(), 3);
        assert!(r.take(4).is_none());
        assert_eq!(r.rest(), &[2, 3, 4]);
        assert!(!r.any_left());
        assert!(r.expect_empty("test").is_ok());
    }

    #[test]
    fn reading_past_end_is_missing_data() {
        assert_eq!(
            u16::read(&mut Reader::init(&[1])),
            Err(InvalidMessage::MissingData("u16"))
        );
        assert_eq!(
            u24::read(&mut Reader::init(&[1, 2])).map(|v| v.0),
            Err(InvalidMessage::MissingData("u24"))
        );
        assert_eq!(
            u32::read(&mut Reader::init(&[])),
            Err(InvalidMessage::MissingData("u32"))
        );
    }

    #[test]
    fn read_bytes_rejects_trailing_data() {
        assert_eq!(
            u16::read_bytes(&[0, 1, 2]),
            Err(InvalidMessage::TrailingData("read_bytes"))
        );
        assert_eq!(u16::read_bytes(&[0x12, 0x34]), Ok(0x1234));
    }

    #[test]
    fn length_prefixed_buffer_patches_length() {
        let mut buf = vec![0xaa];
        {
            let nest = LengthPrefixedBuffer::new(ListLength::U24 { max: u24::MAX }, &mut buf);
            nest.buf.extend_from_slice(&[1, 2, 3, 4, 5]);
        }
        assert_eq!(buf, [0xaa, 0, 0, 5, 1, 2, 3, 4, 5]);

        let mut buf = Vec::new();
        {
            let _nest = LengthPrefixedBuffer::new(ListLength::U16, &mut buf);
        }
        assert_eq!(buf, [0, 0]);
    }

    #[test]
    fn checked_encode_refuses_oversized_bodies() {
        let mut buf = Vec::new();
        assert_eq!(
            checked_encode_slice(ListLength::U8, &[0u8; 256], &mut buf),
            Err(InvalidMessage::MessageTooLarge)
        );
        assert!(buf.is_empty());

        checked_encode_slice(ListLength::U8, &[7u8; 255], &mut buf).unwrap();
        assert_eq!(buf.len(), 256);
        assert_eq!(buf[0], 255);
    }

    #[test]
    fn handshake_message_framing() {
        let mut msg = Vec::new();
        encode_handshake_message(1, &[9, 8, 7], &mut msg);
        assert_eq!(msg, [1, 0, 0, 3, 9, 8, 7]);

        let (typ, body) = split_handshake_message(&msg).unwrap();
        assert_eq!(typ, 1);
        assert_eq!(body, &[9, 8, 7]);

        msg.push(0);
        assert_eq!(
            split_handshake_message(&msg),
            Err(InvalidMessage::TrailingData("HandshakeMessage"))
        );
        assert_eq!(
            split_handshake_message(&[1, 0, 0, 4, 0]),
            Err(InvalidMessage::MessageTooShort)
        );
    }
}
