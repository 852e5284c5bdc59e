//! Messages exchanged over the signaling channel.
//!
//! Signaling is line-delimited JSON, one [`SignalMessage`] per line:
//!
//! ```text
//! {"type":"offer","sdp":"v=0\r\n..."}
//! {"type":"candidate","candidate":"candidate:1 1 udp 2130706431 192.168.1.10 50000 typ host","id":"0","label":0}
//! {"type":"candidate","candidate":""}
//! {"type":"bye"}
//! ```
//!
//! An empty `candidate` is end-of-candidates. Carrying the lines is up to the
//! application.

use crate::peer_connection::sdp::{RTCSdpType, RTCSessionDescription};
use crate::peer_connection::transport::RTCIceCandidateInit;
use serde::{Deserialize, Serialize};
use shared::error::{Error, Result};

/// One signaling message.
///
/// ```
/// use rtc::signal::SignalMessage;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bye = SignalMessage::from_json(r#"{"type":"bye"}"#)?;
/// assert_eq!(bye, SignalMessage::Bye);
/// assert_eq!(bye.to_json()?, r#"{"type":"bye"}"#);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum SignalMessage {
    Description(RTCSessionDescription),
    /// `None` signals end-of-candidates.
    Candidate(Option<RTCIceCandidateInit>),
    Bye,
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum WireMessage {
    Offer {
        sdp: String,
    },
    Pranswer {
        sdp: String,
    },
    Answer {
        sdp: String,
    },
    Rollback {
        #[serde(default)]
        sdp: String,
    },
    Candidate {
        #[serde(default)]
        candidate: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<u16>,
        #[serde(
            rename = "usernameFragment",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        username_fragment: Option<String>,
    },
    Bye,
}

impl From<&SignalMessage> for WireMessage {
    fn from(message: &SignalMessage) -> Self {
        match message {
            SignalMessage::Description(desc) => {
                let sdp = desc.sdp.clone();
                match desc.sdp_type {
                    RTCSdpType::Offer => WireMessage::Offer { sdp },
                    RTCSdpType::Pranswer => WireMessage::Pranswer { sdp },
                    RTCSdpType::Rollback => WireMessage::Rollback { sdp },
                    // An unspecified type is sent as an answer, the remote
                    // rejects it if it was not expecting one.
                    RTCSdpType::Answer | RTCSdpType::Unspecified => WireMessage::Answer { sdp },
                }
            }
            SignalMessage::Candidate(Some(init)) => WireMessage::Candidate {
                candidate: init.candidate.clone(),
                id: init.sdp_mid.clone(),
                label: init.sdp_mline_index,
                username_fragment: init.username_fragment.clone(),
            },
            SignalMessage::Candidate(None) => WireMessage::Candidate {
                candidate: String::new(),
                id: None,
                label: None,
                username_fragment: None,
            },
            SignalMessage::Bye => WireMessage::Bye,
        }
    }
}

impl From<WireMessage> for SignalMessage {
    fn from(message: WireMessage) -> Self {
        let description = |sdp_type, sdp| {
            SignalMessage::Description(RTCSessionDescription {
                sdp_type,
                sdp,
                ..Default::default()
            })
        };

        match message {
            WireMessage::Offer { sdp } => description(RTCSdpType::Offer, sdp),
            WireMessage::Pranswer { sdp } => description(RTCSdpType::Pranswer, sdp),
            WireMessage::Answer { sdp } => description(RTCSdpType::Answer, sdp),
            WireMessage::Rollback { sdp } => description(RTCSdpType::Rollback, sdp),
            WireMessage::Candidate {
                candidate,
                id,
                label,
                username_fragment,
            } => {
                if candidate.trim().is_empty() {
                    SignalMessage::Candidate(None)
                } else {
                    SignalMessage::Candidate(Some(RTCIceCandidateInit {
                        candidate,
                        sdp_mid: id,
                        sdp_mline_index: label,
                        username_fragment,
                    }))
                }
            }
            WireMessage::Bye => SignalMessage::Bye,
        }
    }
}

impl SignalMessage {
    /// Decodes one line of signaling.
    pub fn from_json(line: &str) -> Result<Self> {
        let message: WireMessage =
            serde_json::from_str(line.trim()).map_err(|err| Error::Json(err.to_string()))?;
        Ok(message.into())
    }

    /// Encodes the message as a single line, without the trailing newline.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&WireMessage::from(self)).map_err(|err| Error::Json(err.to_string()))
    }
}

impl From<RTCSessionDescription> for SignalMessage {
    fn from(desc: RTCSessionDescription) -> Self {
        SignalMessage::Description(desc)
    }
}

impl From<Option<RTCIceCandidateInit>> for SignalMessage {
    fn from(candidate: Option<RTCIceCandidateInit>) -> Self {
        SignalMessage::Candidate(candidate)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_signal_message_description() -> Result<()> {
        let line = r#"{"type":"offer","sdp":"v=0\r\n"}"#;
        let message = SignalMessage::from_json(line)?;
        let SignalMessage::Description(desc) = &message else {
            panic!("expected a description, got {message:?}");
        };
        assert_eq!(desc.sdp_type, RTCSdpType::Offer);
        assert_eq!(desc.sdp, "v=0\r\n");
        assert_eq!(message.to_json()?, line);

        let answer = SignalMessage::from_json(r#"{"type":"answer","sdp":"v=0\r\n"}"#)?;
        assert!(matches!(
            answer,
            SignalMessage::Description(RTCSessionDescription {
                sdp_type: RTCSdpType::Answer,
                ..
            })
        ));

        Ok(())
    }

    #[test]
    fn test_signal_message_candidate() -> Result<()> {
        let line = r#"{"type":"candidate","candidate":"candidate:1 1 udp 2130706431 10.0.0.1 5000 typ host","id":"0","label":0}"#;
        let message = SignalMessage::from_json(line)?;
        assert_eq!(
            message,
            SignalMessage::Candidate(Some(RTCIceCandidateInit {
                candidate: "candidate:1 1 udp 2130706431 10.0.0.1 5000 typ host".to_owned(),
                sdp_mid: Some("0".to_owned()),
                sdp_mline_index: Some(0),
                username_fragment: None,
            }))
        );
        assert_eq!(message.to_json()?, line);

        Ok(())
    }

    #[test]
    fn test_signal_message_end_of_candidates() -> Result<()> {
        let tests = vec![
            r#"{"type":"candidate","candidate":""}"#,
            r#"{"type":"candidate","candidate":"","id":"0","label":0}"#,
            r#"{"type":"candidate"}"#,
        ];
        for line in tests {
            assert_eq!(
                SignalMessage::from_json(line)?,
                SignalMessage::Candidate(None),
                "{line}"
            );
        }

        assert_eq!(
            SignalMessage::Candidate(None).to_json()?,
            r#"{"type":"candidate","candidate":""}"#
        );

        Ok(())
    }

    #[test]
    fn test_signal_message_invalid() {
        let tests = vec![
            "",
            "not json",
            r#"{"sdp":"v=0"}"#,
            r#"{"type":"video"}"#,
            r#"{"type":"offer"}"#,
        ];
        for line in tests {
            let err = SignalMessage::from_json(line).unwrap_err();
            assert!(matches!(err, Error::Json(_)), "{line}: {err}");
        }
    }
}
