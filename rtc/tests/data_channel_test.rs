mod common;

use anyhow::Result;
use common::{Link, Pair, init_log};
use rtc::data_channel::{RTCDataChannelId, RTCDataChannelInit, RTCDataChannelState};
use rtc::peer_connection::RTCPeerConnection;
use rtc::peer_connection::event::data_channel_event::RTCDataChannelEvent;
use rtc::shared::error::Error;
use std::time::Duration;

fn ready_state(pc: &mut RTCPeerConnection, id: RTCDataChannelId) -> Result<RTCDataChannelState> {
    let dc = pc
        .data_channel(id)
        .ok_or(Error::ErrDataChannelNotExisted(id))?;
    Ok(dc.ready_state()?)
}

fn send_text(pc: &mut RTCPeerConnection, id: RTCDataChannelId, text: &str) -> Result<()> {
    let mut dc = pc
        .data_channel(id)
        .ok_or(Error::ErrDataChannelNotExisted(id))?;
    dc.send_text(text)?;
    Ok(())
}

fn saw_close(events: Vec<&RTCDataChannelEvent>, id: RTCDataChannelId) -> bool {
    events
        .iter()
        .any(|event| matches!(event, RTCDataChannelEvent::OnClose(closed) if *closed == id))
}

/// Connects a pair whose offerer created `label` up front and waits until
/// both sides see the channel open. Returns the ids on (offer, answer).
fn connected_channel(
    pair: &mut Pair,
    label: &str,
    init: Option<RTCDataChannelInit>,
) -> Result<(RTCDataChannelId, RTCDataChannelId)> {
    let offer_id = pair.offer.pc.create_data_channel(label, init)?;
    assert_eq!(
        ready_state(&mut pair.offer.pc, offer_id)?,
        RTCDataChannelState::Connecting
    );
    assert!(pair.connect()?, "peers did not connect");

    let opened = pair.run_until(Duration::from_secs(10), |pair| {
        !pair.offer.opened().is_empty() && !pair.answer.opened().is_empty()
    })?;
    assert!(opened, "channel did not open");
    assert_eq!(pair.offer.opened(), vec![offer_id]);
    let answer_id = pair.answer.opened()[0];
    Ok((offer_id, answer_id))
}

#[test]
fn test_ping_pong() -> Result<()> {
    init_log();

    let mut pair = Pair::loopback()?;
    let (offer_id, answer_id) = connected_channel(&mut pair, "chat", None)?;
    assert_eq!(
        ready_state(&mut pair.offer.pc, offer_id)?,
        RTCDataChannelState::Open
    );
    assert_eq!(
        ready_state(&mut pair.answer.pc, answer_id)?,
        RTCDataChannelState::Open
    );

    // both sides were open before anything was sent
    assert!(pair.offer.messages.is_empty());
    assert!(pair.answer.messages.is_empty());

    send_text(&mut pair.offer.pc, offer_id, "ping")?;
    send_text(&mut pair.offer.pc, offer_id, "pong")?;
    let delivered = pair.run_until(Duration::from_secs(5), |pair| {
        pair.answer.texts(answer_id).len() == 2
    })?;
    assert!(delivered);
    assert_eq!(pair.answer.texts(answer_id), vec!["ping", "pong"]);

    send_text(&mut pair.answer.pc, answer_id, "pong")?;
    let replied = pair.run_until(Duration::from_secs(5), |pair| {
        !pair.offer.texts(offer_id).is_empty()
    })?;
    assert!(replied);
    assert_eq!(pair.offer.texts(offer_id), vec!["pong"]);

    let (_, message) = &pair.offer.messages[0];
    assert!(message.is_string);

    Ok(())
}

#[test]
fn test_ordered_delivery_under_reordering() -> Result<()> {
    init_log();

    let mut pair = Pair::loopback()?;
    let (offer_id, answer_id) = connected_channel(&mut pair, "ordered", None)?;

    pair.link = Link::Reverse;
    let sent: Vec<String> = (0..20)
        .map(|i| format!("{i:02}{}", "x".repeat(998)))
        .collect();
    for text in &sent {
        send_text(&mut pair.offer.pc, offer_id, text)?;
    }

    let delivered = pair.run_until(Duration::from_secs(30), |pair| {
        pair.answer.texts(answer_id).len() == sent.len()
    })?;
    assert!(delivered, "got {} messages", pair.answer.texts(answer_id).len());
    assert_eq!(pair.answer.texts(answer_id), sent);

    Ok(())
}

#[test]
fn test_stream_id_parity_follows_dtls_role() -> Result<()> {
    init_log();

    let mut pair = Pair::loopback()?;
    let (offer_id, answer_id) = connected_channel(&mut pair, "first", None)?;

    // the answerer is the DTLS client and takes even stream ids
    let offer_stream = pair
        .offer
        .pc
        .data_channel(offer_id)
        .ok_or(Error::ErrDataChannelNotExisted(offer_id))?
        .stream_id()?
        .ok_or(Error::ErrDataChannelNotOpen)?;
    assert_eq!(offer_stream % 2, 1);
    let answer_side_stream = pair
        .answer
        .pc
        .data_channel(answer_id)
        .ok_or(Error::ErrDataChannelNotExisted(answer_id))?
        .stream_id()?;
    assert_eq!(answer_side_stream, Some(offer_stream));

    let second = pair.answer.pc.create_data_channel("second", None)?;
    let opened = pair.run_until(Duration::from_secs(10), |pair| {
        pair.offer.opened().len() == 2 && pair.answer.opened().len() == 2
    })?;
    assert!(opened);
    let second_stream = pair
        .answer
        .pc
        .data_channel(second)
        .ok_or(Error::ErrDataChannelNotExisted(second))?
        .stream_id()?
        .ok_or(Error::ErrDataChannelNotOpen)?;
    assert_eq!(second_stream % 2, 0);

    Ok(())
}

#[test]
fn test_open_message_carries_channel_options() -> Result<()> {
    init_log();

    let mut pair = Pair::loopback()?;
    let init = RTCDataChannelInit {
        ordered: Some(false),
        max_retransmits: Some(3),
        protocol: Some("json".to_owned()),
        ..Default::default()
    };
    let (_, answer_id) = connected_channel(&mut pair, "telemetry", Some(init))?;

    let dc = pair
        .answer
        .pc
        .data_channel(answer_id)
        .ok_or(Error::ErrDataChannelNotExisted(answer_id))?;
    assert_eq!(dc.label()?, "telemetry");
    assert_eq!(dc.protocol()?, "json");
    assert!(!dc.ordered()?);
    assert_eq!(dc.max_retransmits()?, Some(3));
    assert_eq!(dc.max_packet_life_time()?, None);
    assert_eq!(dc.negotiated()?, None);

    Ok(())
}

#[test]
fn test_negotiated_channel_opens_without_handshake() -> Result<()> {
    init_log();

    let mut pair = Pair::loopback()?;
    let init = || RTCDataChannelInit {
        negotiated: Some(7),
        ..Default::default()
    };
    let offer_id = pair.offer.pc.create_data_channel("side", Some(init()))?;
    let answer_id = pair.answer.pc.create_data_channel("side", Some(init()))?;
    assert!(pair.connect()?, "peers did not connect");

    let opened = pair.run_until(Duration::from_secs(10), |pair| {
        !pair.offer.opened().is_empty() && !pair.answer.opened().is_empty()
    })?;
    assert!(opened);
    assert_eq!(pair.offer.opened(), vec![offer_id]);
    assert_eq!(pair.answer.opened(), vec![answer_id]);

    send_text(&mut pair.offer.pc, offer_id, "hello")?;
    let delivered = pair.run_until(Duration::from_secs(5), |pair| {
        !pair.answer.texts(answer_id).is_empty()
    })?;
    assert!(delivered);
    assert_eq!(pair.answer.texts(answer_id), vec!["hello"]);

    let stream_id = pair
        .answer
        .pc
        .data_channel(answer_id)
        .ok_or(Error::ErrDataChannelNotExisted(answer_id))?
        .stream_id()?;
    assert_eq!(stream_id, Some(7));
    assert_eq!(
        pair.offer
            .pc
            .create_data_channel("again", Some(init())),
        Err(Error::ErrDataChannelIdInUse(7))
    );

    Ok(())
}

#[test]
fn test_close_reaches_both_sides() -> Result<()> {
    init_log();

    let mut pair = Pair::loopback()?;
    let (offer_id, answer_id) = connected_channel(&mut pair, "short-lived", None)?;

    pair.offer
        .pc
        .data_channel(offer_id)
        .ok_or(Error::ErrDataChannelNotExisted(offer_id))?
        .close()?;

    let done = pair.run_until(Duration::from_secs(10), |pair| {
        saw_close(pair.offer.data_channel_events(), offer_id)
            && saw_close(pair.answer.data_channel_events(), answer_id)
    })?;
    assert!(done, "close was not observed on both sides");

    Ok(())
}
