//! ECH server keys: the key list format, key generation and PEM files.
//!
//! A key list is a sequence of `{u16<private key>, u16<ECHConfig>}` entries.
//! On disk the list goes in an `ECH KEYS` PEM block, and the matching
//! `ECHConfigList` (for publication in DNS) in an `ECH CONFIGS` block.

use alloc::string::String;
use alloc::vec::Vec;

use crate::crypto::hpke::{
    HpkeAead, HpkeKdf, HpkeKem, HpkePrivateKey, HpkeProvider, HpkeSuite,
    HpkeSymmetricCipherSuite,
};
use crate::crypto::SecureRandom;
use crate::error::{EncryptedClientHelloError, Error};
use crate::log::{debug, trace};
use crate::msgs::base::{PayloadU16, PayloadU8};
use crate::msgs::codec::{Codec, Reader};
use crate::msgs::ech::{EchConfigContents, EchConfigPayload, HpkeKeyConfig};
use crate::rand::random_vec;

/// PEM label of an `ECHConfigList`.
pub const CONFIGS_PEM_TAG: &str = "ECH CONFIGS";

/// PEM label of an ECH key list.
pub const KEYS_PEM_TAG: &str = "ECH KEYS";

/// Length of the input keying material drawn for each generated key.
const IKM_LEN: usize = 32;

/// An ECH private key and the configuration that publishes its public half.
#[derive(Clone, Debug, PartialEq)]
pub struct EchKey {
    private_key: HpkePrivateKey,
    config: EchConfigPayload,
}

impl EchKey {
    /// Pair a private key with its configuration.
    pub fn new(private_key: HpkePrivateKey, config: EchConfigPayload) -> Self {
        Self {
            private_key,
            config,
        }
    }

    /// Generate a key for `kem` and build its configuration.
    ///
    /// The key pair is derived with HPKE `DeriveKeyPair` from input keying
    /// material drawn from `random`.
    pub fn generate(
        config_id: u8,
        kem: HpkeKem,
        cipher_suites: &[HpkeSymmetricCipherSuite],
        public_name: &[u8],
        max_name_len: u8,
        provider: &dyn HpkeProvider,
        random: &dyn SecureRandom,
    ) -> Result<Self, Error> {
        if public_name.is_empty() {
            return Err(Error::General("ECH public name must not be empty".into()));
        }
        let public_name = PayloadU8::checked_new(public_name.to_vec())?;
        let Some((first, rest)) = cipher_suites.split_first() else {
            return Err(Error::General("ECH config needs a cipher suite".into()));
        };

        let suite = provider.assemble(kem, first.kdf_id, first.aead_id)?;
        for sym in rest {
            provider.assemble(kem, sym.kdf_id, sym.aead_id)?;
        }

        let ikm = random_vec(random, IKM_LEN)?;
        let key_pair = provider
            .start(&suite)?
            .derive_key_pair(&ikm)?;

        let config = EchConfigPayload::new(EchConfigContents {
            key_config: HpkeKeyConfig {
                config_id,
                kem_id: kem,
                public_key: PayloadU16::checked_new(key_pair.public_key.0)?,
                symmetric_cipher_suites: cipher_suites.to_vec(),
            },
            maximum_name_length: max_name_len,
            public_name,
            extensions: PayloadU16::empty(),
        });

        debug!("Generated ECH key with config id {} for {:?}", config_id, kem);
        Ok(Self::new(key_pair.private_key, config))
    }

    /// The configuration for this key.
    pub fn config(&self) -> &EchConfigPayload {
        &self.config
    }

    /// The HPKE private key.
    pub fn private_key(&self) -> &HpkePrivateKey {
        &self.private_key
    }

    /// Encode as one key list entry.
    pub fn marshal(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        PayloadU16::encode_slice(self.private_key.secret_bytes(), &mut bytes);
        PayloadU16::encode_slice(self.config.raw(), &mut bytes);
        bytes
    }

    /// Encode a key list.
    pub fn marshal_list(keys: &[Self]) -> Vec<u8> {
        keys.iter()
            .flat_map(Self::marshal)
            .collect()
    }

    /// Parse a key list.
    ///
    /// Keys whose configuration has another ECH version, or names an
    /// algorithm this crate does not know, are skipped. Broken framing and
    /// private keys of the wrong length fail the whole list.
    pub fn parse_list(bytes: &[u8]) -> Result<Vec<Self>, Error> {
        let invalid = |_| Error::from(EncryptedClientHelloError::InvalidKeyList);

        let mut keys = Vec::new();
        let mut r = Reader::init(bytes);
        while r.any_left() {
            let private_key = PayloadU16::read(&mut r).map_err(invalid)?;
            let config = PayloadU16::read(&mut r).map_err(invalid)?;

            let mut cr = Reader::init(config.bytes());
            let config = EchConfigPayload::read_one(&mut cr).map_err(invalid)?;
            cr.expect_empty("ECHConfig")
                .map_err(invalid)?;
            let Some(config) = config else {
                continue;
            };

            let key_config = &config.contents().key_config;
            if key_config
                .symmetric_cipher_suites
                .iter()
                .any(|suite| !known_kdf(suite.kdf_id) || !known_aead(suite.aead_id))
            {
                trace!(
                    "skipping ECH key {}: unknown cipher suite",
                    config.config_id()
                );
                continue;
            }

            match private_key_len(key_config.kem_id) {
                Some(len) if len == private_key.bytes().len() => {}
                Some(_) => return Err(EncryptedClientHelloError::InvalidKeyList.into()),
                None => {
                    trace!("skipping ECH key {}: unknown KEM", config.config_id());
                    continue;
                }
            }

            keys.push(Self::new(
                HpkePrivateKey::from(private_key.into_inner()),
                config,
            ));
        }

        Ok(keys)
    }
}

/// Generate the default server key: config id 0, DHKEM(X25519, HKDF-SHA256),
/// offering HKDF-SHA256 with AES-128-GCM or ChaCha20-Poly1305.
///
/// Returns the `ECH CONFIGS` and `ECH KEYS` PEM documents.
pub fn generate_default_pem(
    public_name: &[u8],
    provider: &dyn HpkeProvider,
    random: &dyn SecureRandom,
) -> Result<(String, String), Error> {
    let suites = [
        HpkeSuite::default().sym,
        HpkeSymmetricCipherSuite {
            kdf_id: HpkeKdf::HKDF_SHA256,
            aead_id: HpkeAead::CHACHA20_POLY_1305,
        },
    ];
    let key = EchKey::generate(
        0,
        HpkeKem::DHKEM_X25519_HKDF_SHA256,
        &suites,
        public_name,
        0,
        provider,
        random,
    )?;

    let keys = [key];
    let configs: Vec<EchConfigPayload> = keys
        .iter()
        .map(|key| key.config().clone())
        .collect();
    Ok((configs_to_pem(&configs), keys_to_pem(&keys)))
}

/// Encode an `ECHConfigList` as an `ECH CONFIGS` PEM document.
pub fn configs_to_pem(configs: &[EchConfigPayload]) -> String {
    pem::encode(&pem::Pem::new(
        CONFIGS_PEM_TAG,
        EchConfigPayload::marshal_list(configs),
    ))
}

/// Encode a key list as an `ECH KEYS` PEM document.
pub fn keys_to_pem(keys: &[EchKey]) -> String {
    pem::encode(&pem::Pem::new(KEYS_PEM_TAG, EchKey::marshal_list(keys)))
}

/// Read the `ECHConfigList` from the first `ECH CONFIGS` block of `input`.
pub fn configs_from_pem(input: &[u8]) -> Result<Vec<EchConfigPayload>, Error> {
    let contents =
        find_block(input, CONFIGS_PEM_TAG).ok_or(EncryptedClientHelloError::InvalidConfigList)?;
    Ok(EchConfigPayload::parse_list(&contents)?)
}

/// Read the key list from the first `ECH KEYS` block of `input`.
pub fn keys_from_pem(input: &[u8]) -> Result<Vec<EchKey>, Error> {
    let contents =
        find_block(input, KEYS_PEM_TAG).ok_or(EncryptedClientHelloError::InvalidKeyList)?;
    EchKey::parse_list(&contents)
}

fn find_block(input: &[u8], tag: &str) -> Option<Vec<u8>> {
    let blocks = pem::parse_many(input)
        .inspect_err(|err| debug!("Unreadable PEM: {}", err))
        .ok()?;
    blocks
        .into_iter()
        .find(|block| block.tag() == tag)
        .map(pem::Pem::into_contents)
}

fn known_kdf(kdf: HpkeKdf) -> bool {
    !matches!(kdf, HpkeKdf::Unknown(_))
}

fn known_aead(aead: HpkeAead) -> bool {
    !matches!(aead, HpkeAead::Unknown(_) | HpkeAead::EXPORT_ONLY)
}

/// `Nsk` for the KEMs this crate knows.
fn private_key_len(kem: HpkeKem) -> Option<usize> {
    match kem {
        HpkeKem::DHKEM_P256_HKDF_SHA256 => Some(32),
        HpkeKem::DHKEM_P384_HKDF_SHA384 => Some(48),
        HpkeKem::DHKEM_P521_HKDF_SHA512 => Some(66),
        HpkeKem::DHKEM_X25519_HKDF_SHA256 => Some(32),
        HpkeKem::DHKEM_X448_HKDF_SHA512 => Some(56),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hpke_rs::HPKE_PROVIDER;
    use crate::crypto::OsRandom;
    use crate::msgs::enums::EchVersion;

    fn key(config_id: u8) -> EchKey {
        EchKey::generate(
            config_id,
            HpkeKem::DHKEM_X25519_HKDF_SHA256,
            &[HpkeSymmetricCipherSuite::default()],
            b"public.example",
            32,
            HPKE_PROVIDER,
            &OsRandom,
        )
        .unwrap()
    }

    #[test]
    fn generated_key_matches_config() {
        let key = key(7);
        assert_eq!(key.config().config_id(), 7);
        assert_eq!(key.config().public_name(), b"public.example");
        assert_eq!(key.config().max_name_len(), 32);
        assert_eq!(key.config().version(), EchVersion::V18);
        assert_eq!(key.private_key().secret_bytes().len(), 32);
        assert_eq!(key.config().public_key().0.len(), 32);
    }

    #[test]
    fn generation_rejects_bad_parameters() {
        let generate = |suites: &[HpkeSymmetricCipherSuite], name: &[u8]| {
            EchKey::generate(
                0,
                HpkeKem::DHKEM_X25519_HKDF_SHA256,
                suites,
                name,
                0,
                HPKE_PROVIDER,
                &OsRandom,
            )
        };
        let ok = [HpkeSymmetricCipherSuite::default()];
        assert!(generate(&ok, b"").is_err());
        assert!(generate(&ok, &[b'a'; 256]).is_err());
        assert!(generate(&[], b"a").is_err());
        assert!(generate(
            &[HpkeSymmetricCipherSuite {
                kdf_id: HpkeKdf::Unknown(9),
                aead_id: HpkeAead::AES_128_GCM,
            }],
            b"a"
        )
        .is_err());
    }

    #[test]
    fn key_list_layout() {
        let key = key(1);
        let bytes = key.marshal();
        assert_eq!(&bytes[..2], &[0, 32]);
        assert_eq!(&bytes[2..34], key.private_key().secret_bytes());
        let config_len = u16::from_be_bytes([bytes[34], bytes[35]]) as usize;
        assert_eq!(&bytes[36..], key.config().raw());
        assert_eq!(config_len, key.config().raw().len());

        let list = EchKey::marshal_list(&[key.clone(), self::key(2)]);
        let parsed = EchKey::parse_list(&list).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0], key);
        assert_eq!(parsed[1].config().config_id(), 2);
    }

    #[test]
    fn parse_skips_foreign_versions_and_rejects_bad_keys() {
        let key = key(1);

        let mut foreign = Vec::new();
        PayloadU16::encode_slice(&[1; 32], &mut foreign);
        PayloadU16::encode_slice(&[0xfe, 0x0a, 0x00, 0x01, 0xff], &mut foreign);
        foreign.extend(key.marshal());
        let parsed = EchKey::parse_list(&foreign).unwrap();
        assert_eq!(parsed, vec![key.clone()]);

        let mut short_key = Vec::new();
        PayloadU16::encode_slice(&[1; 31], &mut short_key);
        PayloadU16::encode_slice(key.config().raw(), &mut short_key);
        assert_eq!(
            EchKey::parse_list(&short_key).unwrap_err(),
            Error::InvalidEncryptedClientHello(EncryptedClientHelloError::InvalidKeyList)
        );

        let mut truncated = key.marshal();
        truncated.pop();
        assert!(EchKey::parse_list(&truncated).is_err());
    }

    #[test]
    fn default_pem_round_trip() {
        let (configs_pem, keys_pem) =
            generate_default_pem(b"public.example", HPKE_PROVIDER, &OsRandom).unwrap();
        assert!(configs_pem.starts_with("-----BEGIN ECH CONFIGS-----"));
        assert!(keys_pem.starts_with("-----BEGIN ECH KEYS-----"));

        let configs = configs_from_pem(configs_pem.as_bytes()).unwrap();
        let keys = keys_from_pem(keys_pem.as_bytes()).unwrap();
        assert_eq!(configs.len(), 1);
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].config(), &configs[0]);
        assert_eq!(
            configs[0]
                .contents()
                .key_config
                .symmetric_cipher_suites
                .len(),
            2
        );

        // each reader wants its own block
        assert!(configs_from_pem(keys_pem.as_bytes()).is_err());
        assert!(keys_from_pem(configs_pem.as_bytes()).is_err());
        assert!(keys_from_pem(b"not pem").is_err());

        let both = alloc::format!("{}{}", keys_pem, configs_pem);
        assert_eq!(configs_from_pem(both.as_bytes()).unwrap(), configs);
    }
}
