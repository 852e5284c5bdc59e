use serde::{Deserialize, Serialize};
use std::fmt;

use super::candidate_type::RTCIceCandidateType;
use shared::error::{Error, Result};

use ice::candidate::{Candidate, CandidateConfig, CandidateRelatedAddress, CandidateType};

/// ICECandidate represents a ice candidate
///
/// ## Specifications
///
/// * [MDN]
/// * [W3C]
///
/// [MDN]: https://developer.mozilla.org/en-US/docs/Web/API/RTCIceCandidate
/// [W3C]: https://w3c.github.io/webrtc-pc/#rtcicecandidate-interface
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RTCIceCandidate {
    pub stats_id: String,
    pub foundation: String,
    pub priority: u32,
    pub address: String,
    pub protocol: String,
    pub port: u16,
    pub typ: RTCIceCandidateType,
    pub component: u16,
    pub related_address: String,
    pub related_port: u16,
}

impl From<&Candidate> for RTCIceCandidate {
    fn from(c: &Candidate) -> Self {
        let (related_address, related_port) = if let Some(ra) = c.related_address() {
            (ra.address, ra.port)
        } else {
            (String::new(), 0)
        };

        RTCIceCandidate {
            stats_id: c.id().to_owned(),
            foundation: c.foundation(),
            priority: c.priority(),
            address: c.address().to_owned(),
            protocol: c.network_type().network_short(),
            port: c.port(),
            component: c.component(),
            typ: c.candidate_type().into(),
            related_address,
            related_port,
        }
    }
}

impl RTCIceCandidate {
    pub(crate) fn to_ice(&self) -> Result<Candidate> {
        let candidate_type = match self.typ {
            RTCIceCandidateType::Host => CandidateType::Host,
            RTCIceCandidateType::Srflx => CandidateType::ServerReflexive,
            RTCIceCandidateType::Prflx => CandidateType::PeerReflexive,
            RTCIceCandidateType::Relay => CandidateType::Relay,
            RTCIceCandidateType::Unspecified => {
                return Err(Error::Other(format!(
                    "unknown candidate type for {}",
                    self.address
                )));
            }
        };

        CandidateConfig {
            candidate_id: self.stats_id.clone(),
            candidate_type,
            network: self.protocol.clone(),
            address: self.address.clone(),
            port: self.port,
            component: self.component,
            priority: self.priority,
            foundation: self.foundation.clone(),
            related_address: Some(CandidateRelatedAddress {
                address: self.related_address.clone(),
                port: self.related_port,
            }),
        }
        .build()
    }

    /// to_json returns an ICECandidateInit
    /// as indicated by the spec <https://w3c.github.io/webrtc-pc/#dom-rtcicecandidate-tojson>
    ///
    /// The media section fields are left empty; the peer connection fills them
    /// in when it raises the candidate event.
    pub fn to_json(&self) -> Result<RTCIceCandidateInit> {
        let candidate = self.to_ice()?;

        Ok(RTCIceCandidateInit {
            candidate: format!("candidate:{}", candidate.marshal()),
            ..Default::default()
        })
    }
}

impl fmt::Display for RTCIceCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}:{}",
            self.protocol, self.typ, self.address, self.port
        )?;
        if !self.related_address.is_empty() {
            write!(f, " related {}:{}", self.related_address, self.related_port)?;
        }
        Ok(())
    }
}

/// ICECandidateInit is used to serialize ice candidates
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RTCIceCandidateInit {
    pub candidate: String,
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex")]
    pub sdp_mline_index: Option<u16>,
    pub username_fragment: Option<String>,
}

impl RTCIceCandidateInit {
    /// An empty candidate line signals end-of-candidates.
    pub fn is_end_of_candidates(&self) -> bool {
        self.candidate.trim().is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_ice_candidate_serialization() {
        let tests = vec![
            (
                RTCIceCandidateInit {
                    candidate: "candidate:abc123".to_string(),
                    sdp_mid: Some("0".to_string()),
                    sdp_mline_index: Some(0),
                    username_fragment: Some("def".to_string()),
                },
                r#"{"candidate":"candidate:abc123","sdpMid":"0","sdpMLineIndex":0,"usernameFragment":"def"}"#,
            ),
            (
                RTCIceCandidateInit {
                    candidate: "candidate:abc123".to_string(),
                    sdp_mid: None,
                    sdp_mline_index: None,
                    username_fragment: None,
                },
                r#"{"candidate":"candidate:abc123","sdpMid":null,"sdpMLineIndex":null,"usernameFragment":null}"#,
            ),
        ];

        for (candidate_init, expected_string) in tests {
            let result = serde_json::to_string(&candidate_init);
            assert!(result.is_ok(), "testCase: marshal err: {result:?}");
            let candidate_data = result.unwrap();
            assert_eq!(candidate_data, expected_string, "string is not expected");

            let result = serde_json::from_str::<RTCIceCandidateInit>(&candidate_data);
            assert!(result.is_ok(), "testCase: unmarshal err: {result:?}");
            if let Ok(actual_candidate_init) = result {
                assert_eq!(actual_candidate_init, candidate_init);
            }
        }
    }

    #[test]
    fn test_ice_candidate_to_json_round_trip() -> Result<()> {
        let host = CandidateConfig {
            candidate_type: CandidateType::Host,
            network: "udp".to_owned(),
            address: "192.168.1.10".to_owned(),
            port: 50000,
            component: 1,
            priority: Candidate::compute_priority(CandidateType::Host, 65535, 1),
            ..Default::default()
        }
        .build()?;

        let rtc_candidate = RTCIceCandidate::from(&host);
        assert_eq!(rtc_candidate.typ, RTCIceCandidateType::Host);
        assert_eq!(rtc_candidate.protocol, "udp");
        assert_eq!(rtc_candidate.to_string(), "udp host 192.168.1.10:50000");

        let init = rtc_candidate.to_json()?;
        assert!(init.candidate.starts_with("candidate:"));
        assert!(!init.is_end_of_candidates());

        let parsed = ice::candidate::unmarshal_candidate(&init.candidate)?;
        assert_eq!(parsed.addr(), host.addr());
        assert_eq!(parsed.priority(), host.priority());

        Ok(())
    }

    #[test]
    fn test_ice_candidate_to_ice_related_address() -> Result<()> {
        let srflx = RTCIceCandidate {
            foundation: "42".to_owned(),
            priority: 1694498815,
            address: "203.0.113.9".to_owned(),
            protocol: "udp".to_owned(),
            port: 61000,
            typ: RTCIceCandidateType::Srflx,
            component: 1,
            related_address: "192.168.1.10".to_owned(),
            related_port: 50000,
            ..Default::default()
        };
        let candidate = srflx.to_ice()?;
        assert_eq!(candidate.candidate_type(), CandidateType::ServerReflexive);
        assert_eq!(RTCIceCandidate::from(&candidate).related_port, 50000);
        assert_eq!(candidate.foundation(), "42");

        let host = RTCIceCandidate {
            typ: RTCIceCandidateType::Host,
            ..srflx.clone()
        };
        assert_eq!(host.to_ice()?.related_address(), None);

        let unknown = RTCIceCandidate {
            typ: RTCIceCandidateType::Unspecified,
            ..srflx
        };
        assert!(unknown.to_ice().is_err());

        Ok(())
    }

    #[test]
    fn test_ice_candidate_init_end_of_candidates() {
        assert!(RTCIceCandidateInit::default().is_end_of_candidates());
        assert!(
            RTCIceCandidateInit {
                candidate: "  ".to_owned(),
                ..Default::default()
            }
            .is_end_of_candidates()
        );
    }
}
