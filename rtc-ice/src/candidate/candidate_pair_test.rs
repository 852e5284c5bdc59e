use super::*;
use crate::candidate::candidate_pair::{CandidatePair, CandidatePairState};

fn unspecified_address(candidate_type: CandidateType) -> Result<Candidate> {
    CandidateConfig {
        candidate_type,
        network: "udp".to_owned(),
        address: "0.0.0.0".to_owned(),
        component: COMPONENT_RTP,
        ..Default::default()
    }
    .build()
}

#[test]
fn test_candidate_pair_priority() -> Result<()> {
    const HOST_INDEX: usize = 0;
    const PRFLX_INDEX: usize = 1;
    const SRFLX_INDEX: usize = 2;
    const RELAY_INDEX: usize = 3;

    let candidates = [
        unspecified_address(CandidateType::Host)?,
        unspecified_address(CandidateType::PeerReflexive)?,
        unspecified_address(CandidateType::ServerReflexive)?,
        unspecified_address(CandidateType::Relay)?,
    ];

    let pair = |remote: usize, controlling: bool| {
        CandidatePair::new(
            HOST_INDEX,
            remote,
            candidates[HOST_INDEX].priority(),
            candidates[remote].priority(),
            controlling,
        )
    };

    let tests = vec![
        (pair(HOST_INDEX, false), 9151314442783293438),
        (pair(HOST_INDEX, true), 9151314442783293438),
        (pair(PRFLX_INDEX, true), 7998392938176446463),
        (pair(PRFLX_INDEX, false), 7998392938176446462),
        (pair(SRFLX_INDEX, true), 7277816997797167103),
        (pair(SRFLX_INDEX, false), 7277816997797167102),
        (pair(RELAY_INDEX, true), 72057594004373503),
        (pair(RELAY_INDEX, false), 72057594004373502),
    ];

    for (pair, want) in tests {
        let got = pair.priority();
        assert_eq!(
            got, want,
            "CandidatePair({pair}).Priority() = {got}, want {want}"
        );
    }

    Ok(())
}

#[test]
fn test_candidate_pair_priority_formula() {
    // G is the controlling side's candidate priority, D the controlled side's
    let (g, d) = (100u32, 7u32);
    let controlling = CandidatePair::new(0, 0, g, d, true);
    let controlled = CandidatePair::new(0, 0, d, g, false);

    let want = (1u64 << 32) * 7 + 2 * 100 + 1;
    assert_eq!(controlling.priority(), want);
    // both agents agree on the priority of the same pair
    assert_eq!(controlled.priority(), want);

    let tie = CandidatePair::new(0, 0, 5, 5, true);
    assert_eq!(tie.priority(), (1u64 << 32) * 5 + 10);

    let max = CandidatePair::new(0, 0, u32::MAX, u32::MAX, true);
    assert_eq!(max.priority(), u64::MAX);
}

#[test]
fn test_candidate_pair_equality() -> Result<()> {
    let candidates = [unspecified_address(CandidateType::Host)?, unspecified_address(CandidateType::ServerReflexive)?];

    let pair_a = CandidatePair::new(0, 1, candidates[0].priority(), candidates[1].priority(), true);
    let pair_b = CandidatePair::new(
        0,
        1,
        candidates[0].priority(),
        candidates[1].priority(),
        false,
    );

    assert_eq!(pair_a, pair_b, "Expected {pair_a} to equal {pair_b}");
    assert_eq!(pair_a.state(), CandidatePairState::Waiting);
    assert!(!pair_a.nominated());

    Ok(())
}

#[test]
fn test_candidate_pair_state_names() {
    let states = [
        (CandidatePairState::Frozen, "frozen"),
        (CandidatePairState::Waiting, "waiting"),
        (CandidatePairState::InProgress, "in-progress"),
        (CandidatePairState::Failed, "failed"),
        (CandidatePairState::Succeeded, "succeeded"),
    ];
    for (state, name) in states {
        assert_eq!(state.to_string(), name);
    }

    let mut pair = CandidatePair::new(1, 2, 7, 100, true);
    assert_eq!(
        pair.to_string(),
        format!("1 <-> 2 (prio {}, local 7, remote 100)", pair.priority())
    );
    pair.state = CandidatePairState::Succeeded;
    pair.nominated = true;
    assert!(format!("{pair:?}").ends_with("succeeded nominated"));
}
