#[cfg(test)]
mod signaling_state_test;

use crate::peer_connection::sdp::sdp_type::RTCSdpType;
use shared::error::{Error, Result};
use std::fmt;

#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum StateChangeOp {
    #[default]
    SetLocal,
    SetRemote,
}

impl fmt::Display for StateChangeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SetLocal => "SetLocal",
            Self::SetRemote => "SetRemote",
        })
    }
}

/// Progress of the offer/answer exchange.
///
/// Only full offers and answers are exchanged, so the provisional answer
/// states of JSEP never occur:
///
/// ```text
///            SetLocal(offer)              SetRemote(answer)
///  stable ------------------> have-local-offer ------------------> stable
///  stable ------------------> have-remote-offer -----------------> stable
///            SetRemote(offer)             SetLocal(answer)
/// ```
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RTCSignalingState {
    Unspecified,

    /// No exchange in progress. This is the initial state.
    #[default]
    Stable,

    /// A local offer was applied, the answer is pending.
    HaveLocalOffer,

    /// A remote offer was applied, the local answer is pending.
    HaveRemoteOffer,

    /// The peer connection was closed.
    Closed,
}

string_values!(RTCSignalingState {
    Stable => "stable",
    HaveLocalOffer => "have-local-offer",
    HaveRemoteOffer => "have-remote-offer",
    Closed => "closed",
});

/// Validates a proposed transition and returns the state to move to.
pub(crate) fn check_next_signaling_state(
    cur: RTCSignalingState,
    next: RTCSignalingState,
    op: StateChangeOp,
    sdp_type: RTCSdpType,
) -> Result<RTCSignalingState> {
    let allowed = match (cur, op, sdp_type) {
        // stable->SetLocal(offer)->have-local-offer
        (RTCSignalingState::Stable, StateChangeOp::SetLocal, RTCSdpType::Offer) => {
            next == RTCSignalingState::HaveLocalOffer
        }
        // stable->SetRemote(offer)->have-remote-offer
        (RTCSignalingState::Stable, StateChangeOp::SetRemote, RTCSdpType::Offer) => {
            next == RTCSignalingState::HaveRemoteOffer
        }
        // have-local-offer->SetLocal(offer)->have-local-offer
        (RTCSignalingState::HaveLocalOffer, StateChangeOp::SetLocal, RTCSdpType::Offer) => {
            next == RTCSignalingState::HaveLocalOffer
        }
        // have-local-offer->SetRemote(answer)->stable
        (RTCSignalingState::HaveLocalOffer, StateChangeOp::SetRemote, RTCSdpType::Answer) => {
            next == RTCSignalingState::Stable
        }
        // have-remote-offer->SetLocal(answer)->stable
        (RTCSignalingState::HaveRemoteOffer, StateChangeOp::SetLocal, RTCSdpType::Answer) => {
            next == RTCSignalingState::Stable
        }
        _ => false,
    };

    if allowed {
        Ok(next)
    } else {
        Err(Error::ErrSignalingStateProposedTransitionInvalid(format!(
            "from {cur} applying {op}({sdp_type})"
        )))
    }
}
