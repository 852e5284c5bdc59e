use crate::peer_connection::transport::ice::candidate::RTCIceCandidateInit;

/// A gathered local candidate, ready to be signaled.
///
/// `candidate` is `None` once gathering completed, which is relayed to the
/// peer as end-of-candidates.
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct RTCPeerConnectionIceEvent {
    pub candidate: Option<RTCIceCandidateInit>,
    /// The STUN server a server reflexive candidate was learned from.
    pub url: String,
}
