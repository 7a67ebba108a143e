//! # tls-ech
//!
//! Encrypted Client Hello (ECH, draft-ietf-tls-esni) and Delegated Credentials
//! (draft-ietf-tls-subcerts) for a TLS 1.3 handshake engine.
//!
//! The crate does not implement a record layer or a full TLS state machine.
//! It provides the pieces a handshake engine plugs in at the ClientHello,
//! HelloRetryRequest, ServerHello, EncryptedExtensions and Certificate
//! stages:
//!
//! * [`msgs`]: TLS-syntax codecs for the ECH configuration list, the
//!   `encrypted_client_hello` extension and the hello messages it rewrites.
//! * [`crypto`]: HPKE suite assembly (backed by `hpke-rs`) and the hybrid
//!   post-quantum key exchange groups.
//! * [`client`]: the offer/grease engine and the client half of the
//!   handshake integration, including the HelloRetryRequest transcript dance
//!   and the acceptance confirmation check.
//! * [`server`]: the accept/reject engine, the [`server::EchProvider`]
//!   decryption-context interface with its [`server::EchKeySet`]
//!   implementation, and the server half of the handshake integration.
//! * [`delegated_credential`]: creating, marshaling and validating delegated
//!   credentials.
//! * [`ech_key`]: ECH key files and key generation.
//!
//! ## Crate features
//!
//! - `logging` (enabled by default): make the crate output log messages via
//!   the `log` crate.

#![forbid(unsafe_code, unused_must_use)]
#![warn(
    clippy::use_self,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_import_braces,
    unused_qualifications
)]
#![allow(
    clippy::too_many_arguments,
    clippy::new_ret_no_self,
    clippy::single_component_path_imports,
    clippy::new_without_default
)]
#![cfg_attr(docsrs, feature(doc_cfg))]

extern crate alloc;

// log for logging (optional).
#[cfg(feature = "logging")]
use log;

#[cfg(not(feature = "logging"))]
#[macro_use]
mod log {
    macro_rules! trace    ( ($($tt:tt)*) => {{}} );
    macro_rules! debug    ( ($($tt:tt)*) => {{}} );
    macro_rules! warn     ( ($($tt:tt)*) => {{}} );
    macro_rules! error    ( ($($tt:tt)*) => {{}} );
}

#[macro_use]
pub mod msgs;
mod common_state;
pub mod enums;
mod error;
mod hash_hs;
mod key_schedule;
mod rand;
mod sign;
mod time_provider;

pub mod client;
pub mod crypto;
pub mod delegated_credential;
pub mod ech_key;
pub mod server;

pub use crate::common_state::{CommonState, Side};
pub use crate::enums::{
    AlertDescription, CipherSuite, HandshakeType, NamedGroup, ProtocolVersion, SignatureScheme,
};
pub use crate::error::{
    DelegatedCredentialError, EncryptedClientHelloError, Error, InvalidMessage, OtherError,
    PeerIncompatible, PeerMisbehaved, RejectedEch,
};
pub use crate::hash_hs::HandshakeHash;
pub use crate::rand::GetRandomFailed;
pub use crate::sign::{DelegatedKey, DelegatorKey};
pub use crate::time_provider::{DefaultTimeProvider, TimeProvider};
