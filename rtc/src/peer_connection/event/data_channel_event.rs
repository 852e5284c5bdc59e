use crate::data_channel::RTCDataChannelId;
use crate::data_channel::message::RTCDataChannelMessage;

/// Lifecycle and data notifications of one data channel.
#[allow(clippy::enum_variant_names)]
#[derive(Debug, Clone)]
pub enum RTCDataChannelEvent {
    /// The channel was acknowledged, negotiated, or accepted from the peer.
    OnOpen(RTCDataChannelId),
    /// The channel's buffered amount fell to its low threshold.
    OnBufferedAmountLow(RTCDataChannelId),
    /// The channel could not be opened, or the peer sent a malformed
    /// control message on it.
    OnError(RTCDataChannelId, String),
    OnClose(RTCDataChannelId),
    OnMessage(RTCDataChannelId, RTCDataChannelMessage),
}

impl RTCDataChannelEvent {
    pub fn data_channel_id(&self) -> RTCDataChannelId {
        match self {
            RTCDataChannelEvent::OnOpen(id)
            | RTCDataChannelEvent::OnBufferedAmountLow(id)
            | RTCDataChannelEvent::OnError(id, _)
            | RTCDataChannelEvent::OnClose(id)
            | RTCDataChannelEvent::OnMessage(id, _) => *id,
        }
    }
}
