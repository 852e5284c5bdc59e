//! Application messages exchanged through a peer connection.
//!
//! The peer connection does no I/O. Datagrams from the sockets go in through
//! `handle_read` and come back out of `poll_read` as [`RTCMessage`]s once
//! the transports below them are up:
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │      Application Logic               │
//! └────────────┬────────────▲────────────┘
//!   handle_write│            │poll_read
//!    RTCMessage │            │RTCMessage
//! ┌────────────▼────────────┴────────────┐
//! │   Peer Connection (sans-I/O)         │
//! └────────────┬────────────▲────────────┘
//!    poll_write│            │handle_read
//!     datagrams│            │datagrams
//! ┌────────────▼────────────┴────────────┐
//! │   I/O Layer (application-provided)   │
//! └──────────────────────────────────────┘
//! ```
//!
//! ```no_run
//! use rtc::peer_connection::message::RTCMessage;
//!
//! # fn receive(message: RTCMessage) {
//! match message {
//!     RTCMessage::DataChannelMessage(channel_id, message) => {
//!         if message.is_string {
//!             println!("{channel_id}: {}", String::from_utf8_lossy(&message.data));
//!         }
//!     }
//! }
//! # }
//! ```

pub(crate) mod internal;

use crate::data_channel::RTCDataChannelId;
use crate::data_channel::message::RTCDataChannelMessage;

/// A message read from or written to a data channel.
#[derive(Debug, Clone)]
pub enum RTCMessage {
    DataChannelMessage(RTCDataChannelId, RTCDataChannelMessage),
}
