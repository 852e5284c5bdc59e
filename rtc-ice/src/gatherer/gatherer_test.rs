use bytes::BytesMut;
use shared::{TransportContext, TransportMessage};

use super::*;

fn addr(s: &str) -> SocketAddr {
    s.parse().unwrap()
}

fn drain_events(g: &mut CandidateGatherer) -> Vec<GathererEvent> {
    let mut events = vec![];
    while let Some(e) = g.poll_event() {
        events.push(e);
    }
    events
}

fn candidates(events: &[GathererEvent]) -> Vec<Candidate> {
    events
        .iter()
        .filter_map(|e| match e {
            GathererEvent::Candidate(c) => Some(c.clone()),
            GathererEvent::Complete => None,
        })
        .collect()
}

fn completions(events: &[GathererEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, GathererEvent::Complete))
        .count()
}

/// Answers a queued binding request the way a STUN server would.
fn answer(request: &TaggedBytesMut, mapped: SocketAddr, now: Instant) -> Result<TaggedBytesMut> {
    let mut m = Message::new();
    m.unmarshal_binary(&request.message)?;
    assert_eq!(m.typ, BINDING_REQUEST);

    let mut resp = Message::new();
    resp.build(&[
        Box::new(BINDING_SUCCESS),
        Box::new(m.transaction_id),
        Box::new(XorMappedAddress {
            ip: mapped.ip(),
            port: mapped.port(),
        }),
    ])?;

    Ok(TransportMessage {
        now,
        transport: TransportContext {
            local_addr: request.transport.local_addr,
            peer_addr: request.transport.peer_addr,
            transport_protocol: TransportProtocol::UDP,
        },
        message: BytesMut::from(&resp.raw[..]),
    })
}

/// Fires timeouts until the gatherer has nothing left to wait for.
fn run_timeouts(g: &mut CandidateGatherer) -> Result<()> {
    for _ in 0..100 {
        let Some(deadline) = g.poll_timeout() else {
            return Ok(());
        };
        g.handle_timeout(deadline)?;
        while g.poll_write().is_some() {}
    }
    panic!("gatherer never went quiet");
}

#[test]
fn test_host_only_gathering_completes_immediately() -> Result<()> {
    let mut g = CandidateGatherer::new(GathererConfig {
        local_addrs: vec![addr("192.168.1.10:5000"), addr("10.0.0.2:5001")],
        ..Default::default()
    });
    assert_eq!(g.state(), GatheringState::New);

    g.gather(Instant::now())?;
    assert_eq!(g.state(), GatheringState::Complete);

    let events = drain_events(&mut g);
    let cands = candidates(&events);
    assert_eq!(cands.len(), 2);
    assert!(cands.iter().all(|c| c.candidate_type() == CandidateType::Host));
    assert!(cands[0].priority() > cands[1].priority());
    assert!(matches!(events.last(), Some(GathererEvent::Complete)));
    assert_eq!(completions(&events), 1);
    assert!(g.poll_timeout().is_none());

    Ok(())
}

#[test]
fn test_gather_twice_is_rejected() -> Result<()> {
    let mut g = CandidateGatherer::new(GathererConfig {
        local_addrs: vec![addr("192.168.1.10:5000")],
        ..Default::default()
    });
    g.gather(Instant::now())?;
    assert_eq!(
        g.gather(Instant::now()).unwrap_err(),
        Error::ErrMultipleGatherAttempted
    );
    Ok(())
}

#[test]
fn test_server_reflexive_candidate_from_response() -> Result<()> {
    let local = addr("192.168.1.10:5000");
    let server = addr("203.0.113.1:3478");
    let mapped = addr("198.51.100.7:61000");
    let now = Instant::now();

    let mut g = CandidateGatherer::new(GathererConfig {
        local_addrs: vec![local],
        stun_servers: vec![server],
        ..Default::default()
    });
    g.gather(now)?;
    assert_eq!(g.state(), GatheringState::Gathering);

    let events = drain_events(&mut g);
    assert_eq!(candidates(&events).len(), 1);
    assert_eq!(completions(&events), 0);

    let request = g.poll_write().expect("binding request");
    assert_eq!(request.transport.local_addr, local);
    assert_eq!(request.transport.peer_addr, server);
    assert!(g.poll_write().is_none());

    let mut m = Message::new();
    m.unmarshal_binary(&request.message)?;
    assert!(g.owns_transaction(&m.transaction_id));

    g.handle_read(answer(&request, mapped, now)?)?;
    assert!(!g.owns_transaction(&m.transaction_id));

    let events = drain_events(&mut g);
    let cands = candidates(&events);
    assert_eq!(cands.len(), 1);
    assert_eq!(cands[0].candidate_type(), CandidateType::ServerReflexive);
    assert_eq!(cands[0].addr(), mapped);
    let rel = cands[0].related_address().expect("related address");
    assert_eq!(rel.address, "192.168.1.10");
    assert_eq!(rel.port, 5000);
    assert_eq!(completions(&events), 1);
    assert_eq!(g.state(), GatheringState::Complete);

    // a late duplicate must not produce anything
    g.handle_read(answer(&request, mapped, now)?)?;
    assert!(g.poll_event().is_none());

    Ok(())
}

#[test]
fn test_server_reflexive_equal_to_host_is_suppressed() -> Result<()> {
    let local = addr("203.0.113.50:5000");
    let server = addr("203.0.113.1:3478");
    let now = Instant::now();

    let mut g = CandidateGatherer::new(GathererConfig {
        local_addrs: vec![local],
        stun_servers: vec![server],
        ..Default::default()
    });
    g.gather(now)?;

    let request = g.poll_write().expect("binding request");
    g.handle_read(answer(&request, local, now)?)?;

    let events = drain_events(&mut g);
    let cands = candidates(&events);
    assert_eq!(cands.len(), 1);
    assert_eq!(cands[0].candidate_type(), CandidateType::Host);
    assert_eq!(completions(&events), 1);

    Ok(())
}

#[test]
fn test_unresponsive_server_is_omitted() -> Result<()> {
    let local = addr("192.168.1.10:5000");
    let good = addr("203.0.113.1:3478");
    let silent = addr("203.0.113.2:3478");
    let mapped = addr("198.51.100.7:61000");
    let now = Instant::now();

    let mut g = CandidateGatherer::new(GathererConfig {
        local_addrs: vec![local],
        stun_servers: vec![good, silent],
        stun_rto: Some(Duration::from_millis(10)),
    });
    g.gather(now)?;

    let mut requests = vec![];
    while let Some(t) = g.poll_write() {
        requests.push(t);
    }
    assert_eq!(requests.len(), 2);

    let to_good = requests
        .iter()
        .find(|t| t.transport.peer_addr == good)
        .expect("request to responsive server");
    g.handle_read(answer(to_good, mapped, now)?)?;
    assert_eq!(g.state(), GatheringState::Gathering);

    run_timeouts(&mut g)?;
    assert_eq!(g.state(), GatheringState::Complete);

    let events = drain_events(&mut g);
    let cands = candidates(&events);
    assert_eq!(cands.len(), 2);
    assert_eq!(
        cands
            .iter()
            .filter(|c| c.candidate_type() == CandidateType::ServerReflexive)
            .count(),
        1
    );
    assert_eq!(completions(&events), 1);

    Ok(())
}

#[test]
fn test_servers_only_queried_from_same_family() -> Result<()> {
    let mut g = CandidateGatherer::new(GathererConfig {
        local_addrs: vec![addr("192.168.1.10:5000"), addr("[2001:db8::1]:5002")],
        stun_servers: vec![addr("203.0.113.1:3478")],
        ..Default::default()
    });
    g.gather(Instant::now())?;

    let mut requests = vec![];
    while let Some(t) = g.poll_write() {
        requests.push(t);
    }
    assert_eq!(requests.len(), 1);
    assert!(requests[0].transport.local_addr.is_ipv4());

    g.close()?;
    assert!(g.poll_timeout().is_none());

    Ok(())
}

#[test]
fn test_datagram_from_unknown_server_is_ignored() -> Result<()> {
    let local = addr("192.168.1.10:5000");
    let now = Instant::now();
    let mut g = CandidateGatherer::new(GathererConfig {
        local_addrs: vec![local],
        stun_servers: vec![addr("203.0.113.1:3478")],
        ..Default::default()
    });
    g.gather(now)?;
    let mut request = g.poll_write().expect("binding request");
    request.transport.peer_addr = addr("203.0.113.99:3478");

    g.handle_read(answer(&request, addr("198.51.100.7:61000"), now)?)?;
    let events = drain_events(&mut g);
    assert_eq!(candidates(&events).len(), 1);
    assert_eq!(g.state(), GatheringState::Gathering);

    Ok(())
}
