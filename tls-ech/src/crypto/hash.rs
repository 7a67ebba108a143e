use sha2::{Digest, Sha256, Sha384};

use crate::enums::CipherSuite;

/// The transcript hash functions of the TLS 1.3 cipher suites.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HashAlgorithm {
    /// SHA-256
    SHA256,
    /// SHA-384
    SHA384,
}

impl HashAlgorithm {
    /// The hash a TLS 1.3 cipher suite uses, or `None` for anything else.
    pub fn for_suite(suite: CipherSuite) -> Option<Self> {
        match suite {
            CipherSuite::TLS13_AES_128_GCM_SHA256
            | CipherSuite::TLS13_CHACHA20_POLY1305_SHA256 => Some(Self::SHA256),
            CipherSuite::TLS13_AES_256_GCM_SHA384 => Some(Self::SHA384),
            _ => None,
        }
    }

    /// The length in bytes of this hash function's output.
    pub fn output_len(&self) -> usize {
        match self {
            Self::SHA256 => 32,
            Self::SHA384 => 48,
        }
    }

    /// Start an incremental hash computation.
    pub(crate) fn start(&self) -> Context {
        match self {
            Self::SHA256 => Context::Sha256(Sha256::new()),
            Self::SHA384 => Context::Sha384(Sha384::new()),
        }
    }

    /// Return the output of this hash function with input `data`.
    pub(crate) fn hash(&self, data: &[u8]) -> Output {
        let mut ctx = self.start();
        ctx.update(data);
        ctx.finish()
    }
}

/// How to incrementally compute a hash.
#[derive(Clone)]
pub(crate) enum Context {
    Sha256(Sha256),
    Sha384(Sha384),
}

impl Context {
    /// Add `data` to computation.
    pub(crate) fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha256(ctx) => ctx.update(data),
            Self::Sha384(ctx) => ctx.update(data),
        }
    }

    /// Finish a copy of the computation; `self` stays usable.
    pub(crate) fn fork_finish(&self) -> Output {
        self.clone().finish()
    }

    /// Terminate and finish the computation, returning the resulting output.
    pub(crate) fn finish(self) -> Output {
        match self {
            Self::Sha256(ctx) => Output::new(&ctx.finalize()),
            Self::Sha384(ctx) => Output::new(&ctx.finalize()),
        }
    }
}

/// A hash output, stored as a value.
#[derive(Clone)]
pub struct Output {
    buf: [u8; Self::MAX_LEN],
    used: usize,
}

impl Output {
    /// Build an `Output` from a slice of no more than `Output::MAX_LEN` bytes.
    pub(crate) fn new(bytes: &[u8]) -> Self {
        let mut output = Self {
            buf: [0u8; Self::MAX_LEN],
            used: bytes.len(),
        };
        debug_assert!(bytes.len() <= Self::MAX_LEN);
        output.buf[..bytes.len()].copy_from_slice(bytes);
        output
    }

    /// Maximum supported hash output size: supports up to SHA384.
    pub const MAX_LEN: usize = 48;
}

impl AsRef<[u8]> for Output {
    fn as_ref(&self) -> &[u8] {
        &self.buf[..self.used]
    }
}

impl core::fmt::Debug for Output {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        crate::msgs::base::hex(f, self.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suites_pick_their_hash() {
        assert_eq!(
            HashAlgorithm::for_suite(CipherSuite::TLS13_AES_256_GCM_SHA384),
            Some(HashAlgorithm::SHA384)
        );
        assert_eq!(
            HashAlgorithm::for_suite(CipherSuite::TLS13_CHACHA20_POLY1305_SHA256),
            Some(HashAlgorithm::SHA256)
        );
        assert_eq!(
            HashAlgorithm::for_suite(CipherSuite::TLS_EMPTY_RENEGOTIATION_INFO_SCSV),
            None
        );
    }

    #[test]
    fn fork_finish_leaves_context_usable() {
        let mut ctx = HashAlgorithm::SHA256.start();
        ctx.update(b"hello");
        let forked = ctx.fork_finish();
        ctx.update(b"world");
        assert_eq!(
            forked.as_ref(),
            HashAlgorithm::SHA256.hash(b"hello").as_ref()
        );
        assert_eq!(&ctx.finish().as_ref()[..4], &[0x93, 0x6a, 0x18, 0x5c]);
    }
}
