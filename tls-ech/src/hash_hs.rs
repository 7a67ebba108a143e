use alloc::vec::Vec;
use core::mem;

use crate::crypto::hash::{Context, HashAlgorithm, Output};
use crate::enums::HandshakeType;
use crate::msgs::codec::encode_handshake_message;

/// Early stage buffering of handshake payloads.
///
/// Before we know the hash algorithm to use to verify the handshake, we just buffer the messages.
/// During the handshake, we may restart the transcript due to a HelloRetryRequest, reverting
/// from the `HandshakeHash` to a `HandshakeHashBuffer` again.
#[derive(Clone, Debug, Default)]
pub(crate) struct HandshakeHashBuffer {
    buffer: Vec<u8>,
}

impl HandshakeHashBuffer {
    pub(crate) fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Buffer an encoded handshake message, header included.
    pub(crate) fn add_message(&mut self, encoded: &[u8]) {
        self.buffer.extend_from_slice(encoded);
    }

    /// We now know what hash function the transcript will use.
    pub(crate) fn start_hash(&self, algorithm: HashAlgorithm) -> HandshakeHash {
        let mut ctx = algorithm.start();
        ctx.update(&self.buffer);
        HandshakeHash { algorithm, ctx }
    }
}

/// This deals with keeping a running hash of the handshake
/// payloads.  This is computed by buffering initially.  Once
/// we know what hash function we need to use we switch to
/// incremental hashing.
#[derive(Clone)]
pub struct HandshakeHash {
    algorithm: HashAlgorithm,
    ctx: Context,
}

impl HandshakeHash {
    /// Start an empty transcript.
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self {
            algorithm,
            ctx: algorithm.start(),
        }
    }

    /// Hash an encoded handshake message, header included.
    pub fn add_message(&mut self, encoded: &[u8]) -> &mut Self {
        self.ctx.update(encoded);
        self
    }

    /// Get the hash value if we were to hash `extra` too.
    pub fn hash_given(&self, extra: &[u8]) -> Output {
        let mut ctx = self.ctx.clone();
        ctx.update(extra);
        ctx.finish()
    }

    /// Take the current hash value, and encapsulate it in a
    /// `message_hash` handshake message.  Start this hash
    /// again, with that message at the front.
    pub fn rollup_for_hrr(&mut self) {
        let old_ctx = mem::replace(&mut self.ctx, self.algorithm.start());
        let old_hash = old_ctx.finish();
        self.ctx
            .update(&message_hash(old_hash.as_ref()));
    }

    /// Get the current hash value.
    pub fn current_hash(&self) -> Output {
        self.ctx.fork_finish()
    }

    /// The hashing algorithm
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }
}

impl core::fmt::Debug for HandshakeHash {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HandshakeHash")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// The synthetic `message_hash` handshake message standing in for ClientHello1.
fn message_hash(hash: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + hash.len());
    encode_handshake_message(HandshakeType::MessageHash.into(), hash, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_correctly() {
        let mut hhb = HandshakeHashBuffer::new();
        hhb.add_message(b"hello");
        assert_eq!(hhb.buffer.len(), 5);
        let mut hh = hhb.start_hash(HashAlgorithm::SHA256);
        hh.add_message(b"world");
        let h = hh.current_hash();
        let h = h.as_ref();
        assert_eq!(h[0], 0x93);
        assert_eq!(h[1], 0x6a);
        assert_eq!(h[2], 0x18);
        assert_eq!(h[3], 0x5c);
    }

    #[test]
    fn rollup_prefixes_message_hash() {
        let mut hh = HandshakeHash::new(HashAlgorithm::SHA384);
        hh.add_message(b"client hello");
        let ch1 = hh.current_hash();
        hh.rollup_for_hrr();

        let mut expected = vec![0xfe, 0, 0, 48];
        expected.extend_from_slice(ch1.as_ref());
        assert_eq!(
            hh.current_hash().as_ref(),
            HashAlgorithm::SHA384
                .hash(&expected)
                .as_ref()
        );
    }

    #[test]
    fn hash_given_does_not_consume() {
        let mut hh = HandshakeHash::new(HashAlgorithm::SHA256);
        hh.add_message(b"hello");
        let given = hh.hash_given(b"world");
        assert_ne!(given.as_ref(), hh.current_hash().as_ref());
        hh.add_message(b"world");
        assert_eq!(given.as_ref(), hh.current_hash().as_ref());
    }
}
