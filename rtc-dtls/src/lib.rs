#![warn(rust_2018_idioms)]

//! A sans-I/O DTLS 1.2 transport with a single cipher suite,
//! TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256 over X25519, authenticating peers
//! by certificate fingerprint.

pub mod alert;
pub mod cipher_suite;
pub mod config;
pub mod conn;
pub mod content;
pub mod crypto;
mod flight;
mod fragment_buffer;
pub mod handshake;
mod handshaker;
pub mod prf;
pub mod record_layer;
mod replay_detector;
pub mod state;

pub use conn::{DTLSConn, DtlsEvent};
