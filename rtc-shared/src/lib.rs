#![warn(rust_2018_idioms)]

#[cfg(feature = "marshal")]
pub mod marshal;

pub mod error;
pub(crate) mod transport;
pub mod util;

pub use transport::{TaggedBytesMut, TransportContext, TransportMessage, TransportProtocol};
