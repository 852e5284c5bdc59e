use super::*;

#[test]
fn test_candidate_priority() -> Result<()> {
    let host = CandidateConfig {
        candidate_type: CandidateType::Host,
        network: "udp".to_owned(),
        address: "10.0.0.1".to_owned(),
        port: 5000,
        component: COMPONENT_RTP,
        ..Default::default()
    }
    .build()?;
    assert_eq!(host.priority(), 2130706431);

    assert_eq!(
        Candidate::compute_priority(CandidateType::ServerReflexive, 65535, COMPONENT_RTP),
        1694498815
    );
    assert_eq!(
        Candidate::compute_priority(CandidateType::Host, 65534, COMPONENT_RTP),
        2130706431 - 256
    );

    Ok(())
}

#[test]
fn test_candidate_marshal() -> Result<()> {
    let tests = vec![
        (
            "host",
            "750 1 udp 2130706431 10.0.75.1 53634 typ host",
            CandidateType::Host,
            "10.0.75.1:53634",
            None,
        ),
        (
            "srflx",
            "4273957277 1 udp 1694498815 191.228.238.68 53991 typ srflx raddr 192.168.0.274 rport 53991",
            CandidateType::ServerReflexive,
            "191.228.238.68:53991",
            Some(("192.168.0.274", 53991)),
        ),
        (
            "prflx",
            "4273957277 1 udp 1862270975 191.228.238.68 53991 typ prflx raddr 10.0.0.1 rport 53991",
            CandidateType::PeerReflexive,
            "191.228.238.68:53991",
            Some(("10.0.0.1", 53991)),
        ),
        (
            "relay",
            "848194626 1 udp 16777215 50.0.0.1 5000 typ relay raddr 192.168.0.1 rport 5001",
            CandidateType::Relay,
            "50.0.0.1:5000",
            Some(("192.168.0.1", 5001)),
        ),
        (
            "ipv6 host",
            "candidate:1 1 UDP 2130706431 fcd9:e3b8:12ce:9fc5:74a5:c6bb:d8b:e08a 53987 typ host",
            CandidateType::Host,
            "[fcd9:e3b8:12ce:9fc5:74a5:c6bb:d8b:e08a]:53987",
            None,
        ),
    ];

    for (name, raw, typ, addr, related) in tests {
        let c = unmarshal_candidate(raw)?;
        assert_eq!(c.candidate_type(), typ, "{name}");
        assert_eq!(c.addr().to_string(), addr, "{name}");
        assert_eq!(
            c.related_address()
                .map(|r| (r.address.clone(), r.port)),
            related.map(|(a, p): (&str, u16)| (a.to_owned(), p)),
            "{name}"
        );

        // marshal is the inverse of unmarshal up to the optional prefix and case
        let again = unmarshal_candidate(&c.marshal())?;
        assert!(again.equal(&c), "{name}");
        assert_eq!(again.priority(), c.priority(), "{name}");
        assert_eq!(again.foundation(), c.foundation(), "{name}");
    }

    Ok(())
}

#[test]
fn test_candidate_unmarshal_errors() {
    let tests = vec![
        ("too short", "750 1 udp 2130706431 10.0.75.1 53634 typ"),
        ("bad component", "750 x udp 2130706431 10.0.75.1 53634 typ host"),
        ("bad priority", "750 1 udp -5 10.0.75.1 53634 typ host"),
        ("bad port", "750 1 udp 2130706431 10.0.75.1 99999 typ host"),
        ("bad type", "750 1 udp 2130706431 10.0.75.1 53634 typ nat"),
        ("mdns", "750 1 udp 2130706431 abc.local 53634 typ host"),
        ("bad network", "750 1 sctp 2130706431 10.0.75.1 53634 typ host"),
        (
            "bad rport",
            "750 1 udp 1694498815 1.2.3.4 53634 typ srflx raddr 10.0.0.1 rport x",
        ),
    ];

    for (name, raw) in tests {
        assert!(unmarshal_candidate(raw).is_err(), "{name} should fail");
    }
}

#[test]
fn test_candidate_foundation() -> Result<()> {
    let a = unmarshal_candidate("1 1 udp 1 10.0.0.1 1000 typ host")?;
    let mut b = a.clone();
    b.foundation = String::new();
    let mut c = b.clone();
    c.port = 2000;
    // same type and address share a foundation regardless of port
    assert_eq!(b.foundation(), c.foundation());
    assert_eq!(a.foundation(), "1");

    Ok(())
}

#[test]
fn test_candidate_config_build() -> Result<()> {
    let related = || {
        Some(CandidateRelatedAddress {
            address: "192.168.0.2".to_owned(),
            port: 4000,
        })
    };
    let config = |candidate_type, related_address| CandidateConfig {
        candidate_type,
        network: "udp".to_owned(),
        address: "1.2.3.4".to_owned(),
        port: 5000,
        component: COMPONENT_RTP,
        related_address,
        ..Default::default()
    };

    let host = config(CandidateType::Host, related()).build()?;
    assert_eq!(host.related_address(), None);
    assert!(host.id().starts_with("candidate:"));

    let relay = config(CandidateType::Relay, related()).build()?;
    assert_eq!(relay.related_address(), related());
    assert_ne!(relay.id(), host.id());

    let empty = config(
        CandidateType::ServerReflexive,
        Some(CandidateRelatedAddress {
            address: String::new(),
            port: 0,
        }),
    )
    .build()?;
    assert_eq!(empty.related_address(), None);

    assert_eq!(
        config(CandidateType::Unspecified, None).build().err(),
        Some(Error::ErrUnknownCandidateType)
    );

    let mut unparsable = config(CandidateType::Host, None);
    unparsable.address = "not-an-ip".to_owned();
    assert_eq!(unparsable.build().err(), Some(Error::ErrAddressParseFailed));

    Ok(())
}

#[test]
fn test_candidate_equal_and_activity() -> Result<()> {
    let a = unmarshal_candidate("1 1 udp 2130706431 10.0.0.1 1000 typ host")?;
    let mut b = unmarshal_candidate("7 1 udp 99 10.0.0.1 1000 typ host")?;
    // foundation and priority do not make a different address
    assert!(a.equal(&b));
    b.port = 1001;
    assert!(!a.equal(&b));

    let mut c = a.clone();
    let later = a.last_received() + std::time::Duration::from_secs(3);
    c.mark_received(later);
    assert_eq!(c.last_received(), later);
    assert_eq!(c.last_sent(), a.last_sent());
    c.mark_sent(later);
    assert_eq!(c.last_sent(), later);
    assert_eq!(c.to_string(), "udp4 host 10.0.0.1:1000");

    Ok(())
}
