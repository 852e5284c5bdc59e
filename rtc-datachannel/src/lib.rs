#![warn(rust_2018_idioms)]

//! Data channels on top of an SCTP association: the DCEP open/ack exchange
//! (RFC 8832) and the per-channel state and statistics.

pub mod data_channel;
pub mod message;

pub use data_channel::{
    DataChannel, DataChannelConfig, DataChannelEvent, DataChannelMessage, DataChannelState,
    DataChannelStats,
};
