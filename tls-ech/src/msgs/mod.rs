//! TLS-syntax message codecs for the parts of the handshake ECH touches.

#[macro_use]
mod macros;

pub mod base;
pub mod codec;
pub mod ech;
pub mod enums;
pub mod handshake;
pub mod inner_hello;
