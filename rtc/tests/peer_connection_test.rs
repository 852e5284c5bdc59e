mod common;

use anyhow::Result;
use common::{Link, Pair, Peer, init_log, setting_engine};
use rtc::peer_connection::sdp::RTCSessionDescription;
use rtc::peer_connection::state::{
    RTCIceConnectionState, RTCIceGatheringState, RTCPeerConnectionState, RTCSignalingState,
};
use rtc::peer_connection::transport::RTCIceCandidate;
use rtc::sansio::Protocol;
use rtc::shared::error::{Error, ErrorKind};
use std::time::Duration;

fn candidate_lines(desc: &RTCSessionDescription) -> Result<(Vec<String>, bool)> {
    let parsed = desc.unmarshal()?;
    let media = &parsed.media_descriptions[0];
    let candidates = media
        .attribute_values("candidate")
        .map(str::to_owned)
        .collect();
    Ok((candidates, media.attribute("end-of-candidates").is_some()))
}

fn highest_priority(candidates: &[RTCIceCandidate]) -> Option<&RTCIceCandidate> {
    candidates.iter().max_by_key(|c| c.priority)
}

#[test]
fn test_offer_round_trips_and_collects_candidates() -> Result<()> {
    init_log();

    let mut pair = Pair::new(
        Peer::new(&["127.0.0.1:5000", "127.0.0.3:5001"], setting_engine())?,
        Peer::new(&["127.0.0.2:6000"], setting_engine())?,
    );
    let pc = &mut pair.offer.pc;
    pc.create_data_channel("chat", None)?;

    let offer = pc.create_offer()?;
    assert_eq!(offer.unmarshal()?.marshal(), offer.sdp);
    let (candidates, end_of_candidates) = candidate_lines(&offer)?;
    assert!(candidates.is_empty());
    assert!(!end_of_candidates);

    pc.set_local_description(offer)?;
    assert_eq!(pc.signaling_state(), RTCSignalingState::HaveLocalOffer);

    let gathered = pair.run_until(Duration::from_secs(10), |pair| {
        pair.offer.pc.ice_gathering_state() == RTCIceGatheringState::Complete
    })?;
    assert!(gathered, "gathering never completed");

    let augmented = pair
        .offer
        .pc
        .local_description()
        .cloned()
        .ok_or(Error::ErrNoRemoteDescription)?;
    let (augmented_candidates, augmented_end) = candidate_lines(&augmented)?;
    assert_eq!(augmented_candidates.len(), 2);
    assert!(augmented_end);

    // every candidate trickled through an event is also in the description
    let trickled: Vec<String> = pair
        .offer
        .events
        .iter()
        .filter_map(|event| match event {
            rtc::peer_connection::event::RTCPeerConnectionEvent::OnIceCandidateEvent(e) => {
                e.candidate.as_ref().map(|c| c.candidate.clone())
            }
            _ => None,
        })
        .collect();
    assert_eq!(trickled.len(), 2);
    for line in &trickled {
        let value = line.trim_start_matches("candidate:");
        assert!(augmented_candidates.iter().any(|c| c == value), "{line}");
    }

    // an offer created now carries the same candidates up front
    let up_front = pair.offer.pc.create_offer()?;
    assert_eq!(candidate_lines(&up_front)?, (augmented_candidates, true));

    Ok(())
}

#[test]
fn test_selected_pair_has_highest_priority() -> Result<()> {
    init_log();

    // the interface order decides the order candidates are trickled in
    let orders = [
        (
            ["127.0.0.1:5000", "127.0.0.3:5001"],
            ["127.0.0.2:6000", "127.0.0.4:6001"],
        ),
        (
            ["127.0.0.3:5001", "127.0.0.1:5000"],
            ["127.0.0.4:6001", "127.0.0.2:6000"],
        ),
    ];
    for (offer_addrs, answer_addrs) in orders {
        let mut pair = Pair::new(
            Peer::new(&offer_addrs, setting_engine())?,
            Peer::new(&answer_addrs, setting_engine())?,
        );
        assert!(pair.connect()?, "peers did not connect");

        let completed = pair.run_until(Duration::from_secs(30), |pair| {
            pair.offer.pc.ice_connection_state() == RTCIceConnectionState::Completed
        })?;
        assert!(completed, "checks never completed");

        let local = pair.offer.pc.local_candidates();
        let remote = pair.answer.pc.local_candidates();
        assert_eq!(local.len(), 2);
        assert_eq!(remote.len(), 2);
        let best_local = highest_priority(&local).ok_or(Error::ErrNoCandidatePairs)?;
        let best_remote = highest_priority(&remote).ok_or(Error::ErrNoCandidatePairs)?;

        let (selected_local, selected_remote) = pair
            .offer
            .pc
            .selected_candidate_pair()
            .ok_or(Error::ErrNoCandidatePairs)?;
        assert_eq!(selected_local.address, best_local.address);
        assert_eq!(selected_local.port, best_local.port);
        assert_eq!(selected_remote.address, best_remote.address);
        assert_eq!(selected_remote.port, best_remote.port);

        let (answer_local, answer_remote) = pair
            .answer
            .pc
            .selected_candidate_pair()
            .ok_or(Error::ErrNoCandidatePairs)?;
        assert_eq!(answer_local.port, best_remote.port);
        assert_eq!(answer_remote.port, best_local.port);
    }

    Ok(())
}

#[test]
fn test_close_during_handshake() -> Result<()> {
    init_log();

    let mut pair = Pair::loopback()?;
    let id = pair.offer.pc.create_data_channel("chat", None)?;
    pair.negotiate()?;

    let handshaking = pair.run_until(Duration::from_secs(10), |pair| {
        matches!(
            pair.offer.pc.ice_connection_state(),
            RTCIceConnectionState::Connected | RTCIceConnectionState::Completed
        ) && pair.offer.pc.connection_state() == RTCPeerConnectionState::Connecting
    })?;
    assert!(handshaking, "never observed the secure handshake in progress");

    pair.offer.pc.close()?;
    assert_eq!(
        pair.offer.pc.connection_state(),
        RTCPeerConnectionState::Closed
    );
    assert_eq!(pair.offer.pc.signaling_state(), RTCSignalingState::Closed);

    let mut dc = pair
        .offer
        .pc
        .data_channel(id)
        .ok_or(Error::ErrDataChannelNotExisted(id))?;
    assert_eq!(dc.send_text("too late"), Err(Error::ErrConnectionClosed));
    assert_eq!(
        pair.offer.pc.create_data_channel("later", None),
        Err(Error::ErrConnectionClosed)
    );
    assert_eq!(pair.offer.pc.create_offer(), Err(Error::ErrConnectionClosed));

    // closing twice is fine
    pair.offer.pc.close()?;
    assert!(pair.offer.opened().is_empty());

    Ok(())
}

#[test]
fn test_fingerprint_mismatch_fails_connection() -> Result<()> {
    init_log();

    let mut pair = Pair::loopback()?;
    pair.offer.pc.create_data_channel("chat", None)?;

    let offer = pair.offer.pc.create_offer()?;
    pair.offer.pc.set_local_description(offer.clone())?;
    pair.answer.pc.set_remote_description(offer)?;
    let answer = pair.answer.pc.create_answer()?;
    pair.answer.pc.set_local_description(answer.clone())?;

    let forged_value = vec!["00"; 32].join(":");
    let forged = answer
        .sdp
        .split("\r\n")
        .map(|line| match line.strip_prefix("a=fingerprint:") {
            Some(value) => {
                let algorithm = value.split_whitespace().next().unwrap_or("sha-256");
                format!("a=fingerprint:{algorithm} {forged_value}")
            }
            None => line.to_owned(),
        })
        .collect::<Vec<_>>()
        .join("\r\n");
    assert_ne!(forged, answer.sdp);
    pair.offer
        .pc
        .set_remote_description(RTCSessionDescription::answer(forged)?)?;

    let failed = pair.run_until(Duration::from_secs(30), |pair| {
        pair.offer.pc.connection_state() == RTCPeerConnectionState::Failed
    })?;
    assert!(failed, "connection did not fail");

    let err = pair
        .offer
        .pc
        .transport_error()
        .cloned()
        .ok_or(Error::ErrNoRemoteDescription)?;
    assert_eq!(err.kind(), ErrorKind::Security, "{err}");
    assert!(
        pair.offer
            .connection_states()
            .contains(&RTCPeerConnectionState::Failed)
    );

    pair.run_until(Duration::from_secs(5), |_| false)?;
    assert!(pair.offer.opened().is_empty());
    assert!(pair.answer.opened().is_empty());

    Ok(())
}

#[test]
fn test_lost_path_disconnects_then_fails() -> Result<()> {
    init_log();

    let quick_ice = || {
        let mut setting_engine = setting_engine();
        setting_engine.set_ice_timeouts(
            Some(Duration::from_secs(2)),
            Some(Duration::from_secs(5)),
            Some(Duration::from_millis(500)),
        );
        setting_engine
    };
    let mut pair = Pair::new(
        Peer::new(&["127.0.0.1:5000"], quick_ice())?,
        Peer::new(&["127.0.0.2:6000"], quick_ice())?,
    );
    assert!(pair.connect()?, "peers did not connect");

    pair.link = Link::Drop;
    let failed = pair.run_until(Duration::from_secs(30), |pair| {
        pair.offer.pc.connection_state() == RTCPeerConnectionState::Failed
    })?;
    assert!(failed, "connection did not fail");

    let ice_states = pair.offer.ice_connection_states();
    let disconnected = ice_states
        .iter()
        .position(|s| *s == RTCIceConnectionState::Disconnected)
        .ok_or(Error::ErrIceConnectivityFailed)?;
    let failed = ice_states
        .iter()
        .position(|s| *s == RTCIceConnectionState::Failed)
        .ok_or(Error::ErrIceConnectivityFailed)?;
    assert!(disconnected < failed, "{ice_states:?}");

    let states = pair.offer.connection_states();
    let tail: Vec<_> = states
        .iter()
        .skip_while(|s| **s != RTCPeerConnectionState::Connected)
        .copied()
        .collect();
    assert_eq!(
        tail,
        vec![
            RTCPeerConnectionState::Connected,
            RTCPeerConnectionState::Disconnected,
            RTCPeerConnectionState::Failed,
        ]
    );

    pair.offer.pc.close()?;
    assert_eq!(
        pair.offer.pc.connection_state(),
        RTCPeerConnectionState::Closed
    );

    Ok(())
}

#[test]
fn test_remote_description_rejections() -> Result<()> {
    init_log();

    let mut pair = Pair::loopback()?;
    let garbage: RTCSessionDescription =
        serde_json::from_str(r#"{"type":"offer","sdp":"this is not sdp"}"#)?;
    let err = pair
        .answer
        .pc
        .set_remote_description(garbage)
        .err()
        .ok_or(Error::ErrNoRemoteDescription)?;
    assert!(
        matches!(err, Error::ErrInvalidSessionDescription(_)),
        "{err}"
    );
    assert_eq!(pair.answer.pc.signaling_state(), RTCSignalingState::Stable);

    assert_eq!(
        pair.answer.pc.create_answer(),
        Err(Error::ErrIncorrectSignalingState)
    );
    assert_eq!(
        pair.answer.pc.add_ice_candidate(None),
        Err(Error::ErrNoRemoteDescription)
    );

    Ok(())
}
