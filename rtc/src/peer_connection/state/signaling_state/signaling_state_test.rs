use super::*;

const STATES: [RTCSignalingState; 4] = [
    RTCSignalingState::Stable,
    RTCSignalingState::HaveLocalOffer,
    RTCSignalingState::HaveRemoteOffer,
    RTCSignalingState::Closed,
];

const SDP_TYPES: [RTCSdpType; 4] = [
    RTCSdpType::Offer,
    RTCSdpType::Pranswer,
    RTCSdpType::Answer,
    RTCSdpType::Rollback,
];

/// The only moves an offer/answer exchange without provisional answers has.
fn allowed_next(
    cur: RTCSignalingState,
    op: StateChangeOp,
    sdp_type: RTCSdpType,
) -> Option<RTCSignalingState> {
    use RTCSdpType::{Answer, Offer};
    use RTCSignalingState::*;
    use StateChangeOp::*;

    match (cur, op, sdp_type) {
        (Stable, SetLocal, Offer) | (HaveLocalOffer, SetLocal, Offer) => Some(HaveLocalOffer),
        (Stable, SetRemote, Offer) => Some(HaveRemoteOffer),
        (HaveLocalOffer, SetRemote, Answer) | (HaveRemoteOffer, SetLocal, Answer) => Some(Stable),
        _ => None,
    }
}

#[test]
fn test_signaling_state_strings() {
    assert_string_values!(
        RTCSignalingState,
        [
            (Stable, "stable"),
            (HaveLocalOffer, "have-local-offer"),
            (HaveRemoteOffer, "have-remote-offer"),
            (Closed, "closed"),
        ]
    );
}

#[test]
fn test_signaling_state_transitions() {
    for cur in STATES {
        for op in [StateChangeOp::SetLocal, StateChangeOp::SetRemote] {
            for sdp_type in SDP_TYPES {
                let expected = allowed_next(cur, op, sdp_type);
                for next in STATES {
                    let result = check_next_signaling_state(cur, next, op, sdp_type);
                    if expected == Some(next) {
                        assert_eq!(result, Ok(next), "{cur} {op}({sdp_type}) -> {next}");
                    } else {
                        assert!(
                            matches!(
                                result,
                                Err(Error::ErrSignalingStateProposedTransitionInvalid(_))
                            ),
                            "{cur} {op}({sdp_type}) -> {next} must be rejected"
                        );
                    }
                }
            }
        }
    }
}

#[test]
fn test_signaling_state_error_names_the_move() {
    let err = check_next_signaling_state(
        RTCSignalingState::Stable,
        RTCSignalingState::Stable,
        StateChangeOp::SetRemote,
        RTCSdpType::Answer,
    )
    .unwrap_err();
    assert_eq!(
        err,
        Error::ErrSignalingStateProposedTransitionInvalid(
            "from stable applying SetRemote(answer)".to_owned()
        )
    );
}
