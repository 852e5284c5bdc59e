use crate::peer_connection::event::data_channel_event::RTCDataChannelEvent;
use crate::peer_connection::event::ice_event::RTCPeerConnectionIceEvent;
use crate::peer_connection::state::ice_connection_state::RTCIceConnectionState;
use crate::peer_connection::state::ice_gathering_state::RTCIceGatheringState;
use crate::peer_connection::state::peer_connection_state::RTCPeerConnectionState;
use crate::peer_connection::state::signaling_state::RTCSignalingState;
use shared::error::Error;

pub mod data_channel_event;
pub mod ice_event;

/// Events the application raises into the peer connection. None exist yet,
/// every input arrives as a method call or a datagram.
pub enum RTCEvent {}

#[allow(clippy::enum_variant_names)]
#[derive(Debug, Clone)]
pub enum RTCPeerConnectionEvent {
    OnIceCandidateEvent(RTCPeerConnectionIceEvent),
    OnSignalingStateChangeEvent(RTCSignalingState),
    OnIceConnectionStateChangeEvent(RTCIceConnectionState),
    OnIceGatheringStateChangeEvent(RTCIceGatheringState),
    OnConnectionStateChangeEvent(RTCPeerConnectionState),

    // The Peer-to-peer data API extends the RTCPeerConnection interface as described below.
    OnDataChannel(RTCDataChannelEvent),
}

/// Events passed between the handlers of the pipeline. Only
/// `RTCPeerConnectionEvent` leaves it.
#[derive(Debug)]
pub(crate) enum RTCEventInternal {
    ICESelectedCandidatePairChange,
    DTLSHandshakeComplete,
    DTLSFailed(Error),
    DTLSClosed,
    SCTPHandshakeComplete,
    SCTPFailed(Error),
    SCTPStreamClosed(u16),
    SCTPBufferedAmountLow(u16),
    RTCPeerConnectionEvent(RTCPeerConnectionEvent),
}
