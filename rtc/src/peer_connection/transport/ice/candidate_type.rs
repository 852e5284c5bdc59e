use ice::candidate::CandidateType;
use serde::{Deserialize, Serialize};

/// Indicates how an ICE candidate was obtained.
///
/// ```
/// use rtc::peer_connection::transport::RTCIceCandidateType;
///
/// let srflx: RTCIceCandidateType = "srflx".into();
/// assert_eq!(srflx, RTCIceCandidateType::Srflx);
/// assert_eq!(srflx.to_string(), "srflx");
/// ```
///
/// Relay candidates are parsed when a peer signals them but never gathered
/// locally. See [RFC 8445 Section 5.1.1.1].
///
/// [RFC 8445 Section 5.1.1.1]: https://datatracker.ietf.org/doc/html/rfc8445#section-5.1.1.1
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RTCIceCandidateType {
    #[default]
    #[serde(rename = "Unspecified")]
    Unspecified,

    /// Bound to a local interface.
    Host,

    /// The NAT binding a STUN server saw.
    Srflx,

    /// Learned from an inbound connectivity check.
    Prflx,

    /// Allocated on a TURN server.
    Relay,
}

string_values!(RTCIceCandidateType {
    Host => "host",
    Srflx => "srflx",
    Prflx => "prflx",
    Relay => "relay",
});

impl From<CandidateType> for RTCIceCandidateType {
    fn from(candidate_type: CandidateType) -> Self {
        match candidate_type {
            CandidateType::Host => Self::Host,
            CandidateType::ServerReflexive => Self::Srflx,
            CandidateType::PeerReflexive => Self::Prflx,
            CandidateType::Relay => Self::Relay,
            _ => Self::Unspecified,
        }
    }
}
