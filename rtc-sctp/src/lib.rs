//! Sans-I/O SCTP association for data channels.
//!
//! The association runs on top of an already secured datagram transport. It
//! multiplexes many streams over one association, each with its own ordering
//! and reliability, and performs no I/O: decrypted packets go in through
//! `handle_read`, packets to encrypt come out of `poll_write`.

#![warn(rust_2018_idioms)]

pub mod association;
pub mod chunk;
pub mod config;
pub mod packet;
pub(crate) mod queue;
pub mod stream;
pub(crate) mod timer;
pub(crate) mod util;

pub use association::{Association, AssociationEvent, AssociationState};
pub use chunk::chunk_payload_data::PayloadProtocolIdentifier;
pub use config::AssociationConfig;
pub use stream::{ReliabilityType, StreamMessage};
