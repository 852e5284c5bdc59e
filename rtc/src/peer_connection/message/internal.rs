//! What the handlers of the pipeline pass to each other.
//!
//! A datagram enters the demuxer as [`Layer::Raw`] and is narrowed on its way
//! up: STUN goes to ICE, DTLS records are decrypted into SCTP packets, SCTP
//! packets become stream messages, and stream messages become channel events
//! for the endpoint. Writes walk the same ladder down.

use crate::data_channel::RTCDataChannelId;
use crate::data_channel::message::RTCDataChannelMessage;
use bytes::BytesMut;
use datachannel::DataChannelMessage;
use shared::TransportContext;
use std::time::Instant;

/// Lifecycle or payload of one data channel, as seen by the endpoint.
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) enum ChannelEvent {
    Open,
    Message(RTCDataChannelMessage),
    Close,
}

#[derive(Debug, Clone)]
pub(crate) struct ChannelMessage {
    pub(crate) data_channel_id: RTCDataChannelId,
    pub(crate) event: ChannelEvent,
}

#[derive(Debug, Clone)]
pub(crate) enum Layer {
    /// Undemuxed datagram, as read from or written to the socket.
    Raw(BytesMut),
    Stun(BytesMut),
    /// DTLS records between ICE and DTLS, plaintext SCTP packets between
    /// DTLS and SCTP.
    Dtls(BytesMut),
    Sctp(DataChannelMessage),
    Channel(ChannelMessage),
}

pub(crate) struct PipelineMessage {
    pub(crate) now: Instant,
    pub(crate) transport: TransportContext,
    pub(crate) message: Layer,
}
