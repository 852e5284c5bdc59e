use serde::{Deserialize, Serialize};

/// Describes the type of a session description in the offer/answer model.
///
/// Only [`RTCSdpType::Offer`] and [`RTCSdpType::Answer`] are applied by
/// [`RTCPeerConnection`](crate::peer_connection::RTCPeerConnection). The other
/// values exist so that JSON from a peer that uses them still decodes, and is
/// then rejected with a negotiation error instead of a parse error.
///
/// ```
/// use rtc::peer_connection::sdp::RTCSdpType;
///
/// let parsed: RTCSdpType = "answer".into();
/// assert_eq!(parsed, RTCSdpType::Answer);
/// assert_eq!(RTCSdpType::Offer.to_string(), "offer");
/// assert_eq!(serde_json::to_string(&RTCSdpType::Offer).unwrap(), "\"offer\"");
/// ```
#[derive(Default, Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
pub enum RTCSdpType {
    #[default]
    Unspecified,

    /// The description is an offer: it starts (or restarts) a negotiation.
    #[serde(rename = "offer")]
    Offer,

    /// A provisional answer. Decoded, never applied.
    #[serde(rename = "pranswer")]
    Pranswer,

    /// The final answer completing an offer/answer exchange.
    #[serde(rename = "answer")]
    Answer,

    /// Cancels the current negotiation. Decoded, never applied.
    #[serde(rename = "rollback")]
    Rollback,
}

string_values!(RTCSdpType {
    Offer => "offer",
    Pranswer => "pranswer",
    Answer => "answer",
    Rollback => "rollback",
});

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_sdp_type_strings() {
        assert_string_values!(
            RTCSdpType,
            [
                (Offer, "offer"),
                (Pranswer, "pranswer"),
                (Answer, "answer"),
                (Rollback, "rollback"),
            ]
        );
        assert_eq!(RTCSdpType::from("bye"), RTCSdpType::Unspecified);
    }

    #[test]
    fn test_sdp_type_json() -> serde_json::Result<()> {
        assert_eq!(serde_json::to_string(&RTCSdpType::Pranswer)?, "\"pranswer\"");
        let answer: RTCSdpType = serde_json::from_str("\"answer\"")?;
        assert_eq!(answer, RTCSdpType::Answer);
        assert!(serde_json::from_str::<RTCSdpType>("\"bye\"").is_err());
        Ok(())
    }
}
