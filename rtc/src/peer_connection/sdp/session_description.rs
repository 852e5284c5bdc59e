use std::fmt::Display;

use sdp::SessionDescription;
use serde::{Deserialize, Serialize};

use super::sdp_type::RTCSdpType;
use shared::error::Result;

/// A session description as exchanged over signaling.
///
/// It serializes to the JSON the signaling peers exchange:
///
/// ```
/// use rtc::peer_connection::sdp::{RTCSdpType, RTCSessionDescription};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let desc: RTCSessionDescription =
///     serde_json::from_str(r#"{"type":"offer","sdp":"v=0\r\n"}"#)?;
/// assert_eq!(desc.sdp_type, RTCSdpType::Offer);
/// # Ok(())
/// # }
/// ```
///
/// The parsed form is cached when a description is produced by
/// [`RTCSessionDescription::offer`] or [`RTCSessionDescription::answer`], and is
/// never part of the JSON.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct RTCSessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: RTCSdpType,

    pub sdp: String,

    #[serde(skip)]
    pub(crate) parsed: Option<SessionDescription>,
}

impl PartialEq for RTCSessionDescription {
    fn eq(&self, other: &Self) -> bool {
        self.sdp_type == other.sdp_type && self.sdp == other.sdp
    }
}

impl Display for RTCSessionDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "type: {}, sdp:\n{}",
            self.sdp_type,
            self.sdp.replace("\r\n", "\n")
        )
    }
}

impl RTCSessionDescription {
    /// Wraps answer text, failing if it does not parse.
    pub fn answer(sdp: String) -> Result<RTCSessionDescription> {
        Self::new(RTCSdpType::Answer, sdp)
    }

    /// Wraps offer text, failing if it does not parse.
    pub fn offer(sdp: String) -> Result<RTCSessionDescription> {
        Self::new(RTCSdpType::Offer, sdp)
    }

    fn new(sdp_type: RTCSdpType, sdp: String) -> Result<RTCSessionDescription> {
        let mut desc = RTCSessionDescription {
            sdp_type,
            sdp,
            parsed: None,
        };
        desc.parsed = Some(desc.unmarshal()?);
        Ok(desc)
    }

    pub(crate) fn from_parsed(sdp_type: RTCSdpType, parsed: SessionDescription) -> Self {
        RTCSessionDescription {
            sdp_type,
            sdp: parsed.marshal(),
            parsed: Some(parsed),
        }
    }

    /// Parses the SDP text. Every call parses again; the cached form is only
    /// filled by the constructors.
    pub fn unmarshal(&self) -> Result<SessionDescription> {
        SessionDescription::unmarshal(&self.sdp)
    }

    /// The cached parse, or a fresh one.
    pub(crate) fn parsed(&self) -> Result<SessionDescription> {
        match &self.parsed {
            Some(parsed) => Ok(parsed.clone()),
            None => self.unmarshal(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_session_description_json() {
        let tests = vec![
            (RTCSdpType::Offer, r#"{"type":"offer","sdp":"sdp"}"#),
            (RTCSdpType::Pranswer, r#"{"type":"pranswer","sdp":"sdp"}"#),
            (RTCSdpType::Answer, r#"{"type":"answer","sdp":"sdp"}"#),
            (RTCSdpType::Rollback, r#"{"type":"rollback","sdp":"sdp"}"#),
            (RTCSdpType::Unspecified, r#"{"type":"Unspecified","sdp":"sdp"}"#),
        ];

        for (sdp_type, expected_string) in tests {
            let desc = RTCSessionDescription {
                sdp_type,
                sdp: "sdp".to_owned(),
                parsed: None,
            };
            let desc_data = serde_json::to_string(&desc).unwrap();
            assert_eq!(desc_data, expected_string, "string is not expected");

            let sd = serde_json::from_str::<RTCSessionDescription>(&desc_data).unwrap();
            assert_eq!(sd, desc);
            assert!(sd.parsed.is_none());
        }
    }

    #[test]
    fn test_session_description_constructors_parse() {
        let sdp = "v=0\r\no=- 1 2 IN IP4 0.0.0.0\r\ns=-\r\nt=0 0\r\n".to_owned();

        let offer = RTCSessionDescription::offer(sdp.clone()).unwrap();
        assert_eq!(offer.sdp_type, RTCSdpType::Offer);
        assert!(offer.parsed.is_some());

        let answer = RTCSessionDescription::answer(sdp).unwrap();
        assert_eq!(answer.sdp_type, RTCSdpType::Answer);

        assert!(RTCSessionDescription::offer("not sdp".to_owned()).is_err());
    }
}
