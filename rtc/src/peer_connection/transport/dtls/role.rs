use std::fmt;

use sdp::SessionDescription;
use serde::{Deserialize, Serialize};

use crate::peer_connection::state::UNSPECIFIED_STR;

/// Which side of the DTLS handshake this endpoint plays.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RTCDtlsRole {
    #[default]
    #[serde(rename = "Unspecified")]
    Unspecified,
    /// Not decided yet, the answer settles it (`actpass`).
    Auto,
    /// Sends the ClientHello (`active`).
    Client,
    /// Waits for the ClientHello (`passive`).
    Server,
}

/// An answerer picks `active` so the handshake can start with the answer
/// (RFC 5763 section 5).
pub(crate) const DEFAULT_DTLS_ROLE_ANSWER: RTCDtlsRole = RTCDtlsRole::Client;

/// An offerer announces `actpass` and must accept a ClientHello before the
/// answer arrives.
pub(crate) const DEFAULT_DTLS_ROLE_OFFER: RTCDtlsRole = RTCDtlsRole::Auto;

const SETUP_ACTIVE: &str = "active";
const SETUP_PASSIVE: &str = "passive";
const SETUP_ACTPASS: &str = "actpass";

impl fmt::Display for RTCDtlsRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RTCDtlsRole::Unspecified => UNSPECIFIED_STR,
            RTCDtlsRole::Auto => "auto",
            RTCDtlsRole::Client => "client",
            RTCDtlsRole::Server => "server",
        })
    }
}

/// Maps an `a=setup` value to the role the sender of that value takes.
impl From<&str> for RTCDtlsRole {
    fn from(setup: &str) -> Self {
        match setup {
            SETUP_ACTIVE => RTCDtlsRole::Client,
            SETUP_PASSIVE => RTCDtlsRole::Server,
            _ => RTCDtlsRole::Auto,
        }
    }
}

/// The role a remote description asks for with its first `a=setup`, media
/// level before session level. Auto when there is none.
impl From<&SessionDescription> for RTCDtlsRole {
    fn from(session_description: &SessionDescription) -> Self {
        session_description
            .media_descriptions
            .iter()
            .find_map(|media| media.attribute("setup"))
            .or_else(|| session_description.attribute("setup"))
            .flatten()
            .map(RTCDtlsRole::from)
            .unwrap_or(RTCDtlsRole::Auto)
    }
}

impl RTCDtlsRole {
    /// The `a=setup` value announcing this role.
    pub(crate) fn to_connection_role(self) -> String {
        match self {
            RTCDtlsRole::Client => SETUP_ACTIVE,
            RTCDtlsRole::Server => SETUP_PASSIVE,
            _ => SETUP_ACTPASS,
        }
        .to_owned()
    }

    /// The local role given the role the remote side announced.
    ///
    /// An `actpass` remote leaves the choice to us and we answer as client.
    pub(crate) fn complement(self) -> RTCDtlsRole {
        match self {
            RTCDtlsRole::Client => RTCDtlsRole::Server,
            RTCDtlsRole::Server => RTCDtlsRole::Client,
            _ => DEFAULT_DTLS_ROLE_ANSWER,
        }
    }
}
