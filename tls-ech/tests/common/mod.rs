#![allow(dead_code)]

pub use std::sync::Arc;
use std::sync::Mutex;

use rand_chacha::ChaCha20Rng;
use rand_core::{RngCore, SeedableRng};
use tls_ech::client::{ClientConfig, ClientHandshake, EchMode, ServerHelloOutcome};
use tls_ech::crypto::hpke::{HpkeKem, HpkeSymmetricCipherSuite};
use tls_ech::crypto::hpke_rs::HPKE_PROVIDER;
use tls_ech::crypto::kx::{X25519, X25519MLKEM768};
use tls_ech::crypto::SecureRandom;
use tls_ech::ech_key::EchKey;
use tls_ech::server::{ClientHelloOutcome, EchKeySet, ServerConfig, ServerHandshake};
use tls_ech::{Error, GetRandomFailed};

/// Deterministic randomness, so failures reproduce.
#[derive(Debug)]
pub struct SeededRandom(Mutex<ChaCha20Rng>);

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self(Mutex::new(ChaCha20Rng::seed_from_u64(seed)))
    }
}

impl SecureRandom for SeededRandom {
    fn fill(&self, buf: &mut [u8]) -> Result<(), GetRandomFailed> {
        self.0
            .lock()
            .map_err(|_| GetRandomFailed)?
            .fill_bytes(buf);
        Ok(())
    }
}

pub fn init_logging() {
    let _ = env_logger::builder()
        .is_test(true)
        .try_init();
}

pub const PUBLIC_NAME: &[u8] = b"public.example";
pub const PRIVATE_NAME: &[u8] = b"secret.example";

pub fn ech_key(config_id: u8, seed: u64) -> EchKey {
    EchKey::generate(
        config_id,
        HpkeKem::DHKEM_X25519_HKDF_SHA256,
        &[HpkeSymmetricCipherSuite::default()],
        PUBLIC_NAME,
        32,
        HPKE_PROVIDER,
        &SeededRandom::new(seed),
    )
    .unwrap()
}

pub fn client_config(seed: u64) -> ClientConfig {
    let mut config = ClientConfig::new();
    config.random = Arc::new(SeededRandom::new(seed));
    config
}

pub fn client_with_ech(mode: impl Into<EchMode>, seed: u64) -> Arc<ClientConfig> {
    Arc::new(client_config(seed).with_ech(mode))
}

pub fn server_config(keys: Option<Vec<EchKey>>, seed: u64) -> ServerConfig {
    let mut config = ServerConfig::new();
    config.random = Arc::new(SeededRandom::new(seed));
    if let Some(keys) = keys {
        config.ech_provider = Some(Arc::new(EchKeySet::new(keys, HPKE_PROVIDER).unwrap()));
    }
    config
}

/// Make the server ask for another key share: the client only sends X25519.
pub fn force_hello_retry(client: &mut ClientConfig, server: &mut ServerConfig) {
    client.kx_groups = vec![X25519, X25519MLKEM768];
    server.kx_groups = vec![X25519MLKEM768];
}

/// What a [`run_handshake`] saw.
pub struct Transcript {
    pub client_hellos: Vec<Vec<u8>>,
    pub retried: bool,
}

/// Drive both sides from the first ClientHello through EncryptedExtensions.
pub fn run_handshake(
    client_config: Arc<ClientConfig>,
    server_config: Arc<ServerConfig>,
) -> Result<(ClientHandshake, ServerHandshake, Transcript), Error> {
    let (mut client, mut msg) = ClientHandshake::start(client_config, Some(PRIVATE_NAME))?;
    let mut server = ServerHandshake::new(server_config);
    let mut transcript = Transcript {
        client_hellos: vec![msg.clone()],
        retried: false,
    };

    loop {
        match server.handle_client_hello(&msg)? {
            ClientHelloOutcome::HelloRetry(hrr) => {
                transcript.retried = true;
                match client.handle_server_hello(&hrr)? {
                    ServerHelloOutcome::HelloRetry(second) => msg = second,
                    ServerHelloOutcome::ServerHello(_) => panic!("HelloRetryRequest taken as ServerHello"),
                }
                transcript.client_hellos.push(msg.clone());
            }
            ClientHelloOutcome::ServerHello { message, secret } => {
                let ServerHelloOutcome::ServerHello(client_secret) =
                    client.handle_server_hello(&message)?
                else {
                    panic!("ServerHello taken as HelloRetryRequest");
                };
                assert_eq!(client_secret.secret_bytes(), secret.secret_bytes());
                break;
            }
        }
    }

    client.handle_encrypted_extensions(&server.encrypted_extensions()?)?;
    assert_eq!(
        client
            .transcript()
            .unwrap()
            .current_hash()
            .as_ref(),
        server
            .transcript()
            .unwrap()
            .current_hash()
            .as_ref()
    );
    Ok((client, server, transcript))
}
