mod common;

use common::*;
use tls_ech::client::{EchConfig, EchStatus};
use tls_ech::crypto::hpke_rs::HPKE_PROVIDER;
use tls_ech::ech_key::{self, EchKey};
use tls_ech::msgs::ech::EchConfigPayload;
use tls_ech::server::{EchKeySet, ServerConfig};
use tls_ech::{EncryptedClientHelloError, Error};

#[test]
fn generated_pem_drives_a_handshake() {
    init_logging();
    let (configs_pem, keys_pem) =
        ech_key::generate_default_pem(PUBLIC_NAME, HPKE_PROVIDER, &SeededRandom::new(40)).unwrap();
    assert!(configs_pem.starts_with("-----BEGIN ECH CONFIGS-----"));
    assert!(keys_pem.starts_with("-----BEGIN ECH KEYS-----"));

    let configs = ech_key::configs_from_pem(configs_pem.as_bytes()).unwrap();
    assert_eq!(configs.len(), 1);
    assert_eq!(configs[0].config_id(), 0);
    assert_eq!(configs[0].public_name(), PUBLIC_NAME);

    let keys = ech_key::keys_from_pem(keys_pem.as_bytes()).unwrap();
    assert_eq!(keys[0].config(), &configs[0]);

    let mut server = ServerConfig::new();
    server.random = Arc::new(SeededRandom::new(41));
    server.ech_provider = Some(Arc::new(
        EchKeySet::from_key_list(&EchKey::marshal_list(&keys), HPKE_PROVIDER).unwrap(),
    ));
    let client = EchConfig::new(&EchConfigPayload::marshal_list(&configs), HPKE_PROVIDER).unwrap();

    let (client, server, _) =
        run_handshake(client_with_ech(client, 42), Arc::new(server)).unwrap();
    assert_eq!(client.ech_status(), EchStatus::Accepted);
    assert_eq!(server.server_name().unwrap(), PRIVATE_NAME);
}

#[test]
fn key_set_advertises_every_config() {
    let keys = vec![ech_key(1, 43), ech_key(2, 44), ech_key(3, 45)];
    let set = EchKeySet::new(keys.clone(), HPKE_PROVIDER).unwrap();
    let advertised = EchConfigPayload::parse_list(set.configs()).unwrap();
    assert_eq!(
        advertised
            .iter()
            .map(EchConfigPayload::config_id)
            .collect::<Vec<_>>(),
        vec![1, 2, 3]
    );

    let mut too_many = Vec::new();
    for id in 0..=255u8 {
        too_many.push(ech_key(id, 46));
    }
    too_many.push(ech_key(0, 47));
    assert_eq!(
        EchKeySet::new(too_many, HPKE_PROVIDER).unwrap_err(),
        Error::InvalidEncryptedClientHello(EncryptedClientHelloError::InvalidKeySet)
    );
}

#[test]
fn pem_without_the_block_is_refused() {
    let keys = vec![ech_key(1, 48)];
    let keys_pem = ech_key::keys_to_pem(&keys);
    assert_eq!(
        ech_key::configs_from_pem(keys_pem.as_bytes()).unwrap_err(),
        Error::InvalidEncryptedClientHello(EncryptedClientHelloError::InvalidConfigList)
    );
    assert_eq!(ech_key::keys_from_pem(keys_pem.as_bytes()).unwrap(), keys);
}
