/// Options for [create_data_channel](crate::peer_connection::RTCPeerConnection::create_data_channel).
///
/// Every field left at None takes the default of an ordered, fully reliable
/// channel announced in-band. At most one of `max_packet_life_time` and
/// `max_retransmits` may be set.
///
/// ## Specifications
///
/// * [W3C]
///
/// [W3C]: https://w3c.github.io/webrtc-pc/#dom-rtcdatachannelinit
#[derive(Default, Debug, Clone)]
pub struct RTCDataChannelInit {
    /// Some(false) lets messages overtake each other.
    pub ordered: Option<bool>,

    /// Milliseconds a message may spend being retransmitted before it is
    /// abandoned.
    pub max_packet_life_time: Option<u16>,

    /// Retransmissions of a message before it is abandoned. Zero sends each
    /// message exactly once.
    pub max_retransmits: Option<u16>,

    /// Sub-protocol name carried in DATA_CHANNEL_OPEN.
    pub protocol: Option<String>,

    /// Stream id both applications agreed on out of band. No DATA_CHANNEL_OPEN
    /// is sent and the peer must create the same channel itself.
    pub negotiated: Option<u16>,
}
