//! The slice of the TLS 1.3 key schedule that ECH acceptance needs.

use alloc::vec;
use alloc::vec::Vec;

use hkdf::Hkdf;
use sha2::{Sha256, Sha384};

use crate::crypto::hash::HashAlgorithm;
use crate::error::Error;

/// Length of an ECH acceptance confirmation.
pub(crate) const ECH_CONFIRMATION_LEN: usize = 8;

const ECH_ACCEPT_CONFIRMATION: &[u8] = b"ech accept confirmation";
const ECH_HRR_ACCEPT_CONFIRMATION: &[u8] = b"hrr ech accept confirmation";

/// A pseudorandom key ready for HKDF-Expand.
pub(crate) enum Expander {
    Sha256(Hkdf<Sha256>),
    Sha384(Hkdf<Sha384>),
}

impl Expander {
    /// HKDF-Extract with an all-zero salt of the hash length.
    pub(crate) fn extract_no_salt(algorithm: HashAlgorithm, ikm: &[u8]) -> Self {
        match algorithm {
            HashAlgorithm::SHA256 => Self::Sha256(Hkdf::new(None, ikm)),
            HashAlgorithm::SHA384 => Self::Sha384(Hkdf::new(None, ikm)),
        }
    }

    fn expand(&self, info: &[u8], output: &mut [u8]) -> Result<(), Error> {
        match self {
            Self::Sha256(hkdf) => hkdf.expand(info, output),
            Self::Sha384(hkdf) => hkdf.expand(info, output),
        }
        .map_err(|_| Error::Unreachable("HKDF-Expand output too long"))
    }
}

/// TLS 1.3 `HKDF-Expand-Label(secret, label, context, length)`.
pub(crate) fn hkdf_expand_label(
    expander: &Expander,
    label: &[u8],
    context: &[u8],
    len: usize,
) -> Result<Vec<u8>, Error> {
    const LABEL_PREFIX: &[u8] = b"tls13 ";

    let output_len = u16::try_from(len).map_err(|_| Error::Unreachable("label output length"))?;
    let label_len = u8::try_from(LABEL_PREFIX.len() + label.len())
        .map_err(|_| Error::Unreachable("label too long"))?;
    let context_len =
        u8::try_from(context.len()).map_err(|_| Error::Unreachable("label context too long"))?;

    let mut info = Vec::with_capacity(4 + label_len as usize + context.len());
    info.extend_from_slice(&output_len.to_be_bytes());
    info.push(label_len);
    info.extend_from_slice(LABEL_PREFIX);
    info.extend_from_slice(label);
    info.push(context_len);
    info.extend_from_slice(context);

    let mut output = vec![0u8; len];
    expander.expand(&info, &mut output)?;
    Ok(output)
}

/// `accept_confirmation` for a ServerHello.
///
/// `transcript_hash` covers ClientHelloInner through the ServerHello with the
/// last eight bytes of its random zeroed.
pub(crate) fn server_ech_confirmation(
    algorithm: HashAlgorithm,
    inner_random: &[u8; 32],
    transcript_hash: &[u8],
) -> Result<[u8; ECH_CONFIRMATION_LEN], Error> {
    ech_confirmation(
        algorithm,
        inner_random,
        ECH_ACCEPT_CONFIRMATION,
        transcript_hash,
    )
}

/// `hrr_accept_confirmation` for a HelloRetryRequest.
///
/// `transcript_hash` covers the rolled-up ClientHelloInner1 and the
/// HelloRetryRequest with its ECH extension value zeroed.
pub(crate) fn server_ech_hrr_confirmation(
    algorithm: HashAlgorithm,
    inner_random: &[u8; 32],
    transcript_hash: &[u8],
) -> Result<[u8; ECH_CONFIRMATION_LEN], Error> {
    ech_confirmation(
        algorithm,
        inner_random,
        ECH_HRR_ACCEPT_CONFIRMATION,
        transcript_hash,
    )
}

fn ech_confirmation(
    algorithm: HashAlgorithm,
    inner_random: &[u8; 32],
    label: &[u8],
    transcript_hash: &[u8],
) -> Result<[u8; ECH_CONFIRMATION_LEN], Error> {
    let expander = Expander::extract_no_salt(algorithm, inner_random);
    let okm = hkdf_expand_label(&expander, label, transcript_hash, ECH_CONFIRMATION_LEN)?;
    let mut out = [0u8; ECH_CONFIRMATION_LEN];
    out.copy_from_slice(&okm);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 8448 section 3: the "derived" secret from the early secret.
    #[test]
    fn expand_label_matches_rfc8448() {
        // early secret 33ad0a1c...f92a
        let early = Expander::extract_no_salt(HashAlgorithm::SHA256, &[0u8; 32]);
        let empty_hash = HashAlgorithm::SHA256.hash(&[]);
        let derived = hkdf_expand_label(&early, b"derived", empty_hash.as_ref(), 32).unwrap();
        assert_eq!(
            hex::encode(derived),
            "6f2615a108c702c5678f54fc9dbab69716c076189c48250cebeac3576c3611ba"
        );
    }

    #[test]
    fn confirmation_labels_differ() {
        let random = [7u8; 32];
        let hash = HashAlgorithm::SHA256.hash(b"transcript");
        let sh = server_ech_confirmation(HashAlgorithm::SHA256, &random, hash.as_ref()).unwrap();
        let hrr =
            server_ech_hrr_confirmation(HashAlgorithm::SHA256, &random, hash.as_ref()).unwrap();
        assert_ne!(sh, hrr);
        assert_eq!(
            sh,
            server_ech_confirmation(HashAlgorithm::SHA256, &random, hash.as_ref()).unwrap()
        );
    }

    #[test]
    fn confirmation_depends_on_inner_random() {
        let hash = HashAlgorithm::SHA384.hash(b"transcript");
        let a = server_ech_confirmation(HashAlgorithm::SHA384, &[1u8; 32], hash.as_ref()).unwrap();
        let b = server_ech_confirmation(HashAlgorithm::SHA384, &[2u8; 32], hash.as_ref()).unwrap();
        assert_ne!(a, b);
    }
}
