use super::*;
use crate::fingerprint::FINGERPRINT;
use crate::xoraddr::XorMappedAddress;
use sansio::Protocol;

fn binding_request() -> Result<Message> {
    let mut m = Message::new();
    m.build(&[
        Box::new(BINDING_REQUEST),
        Box::new(TransactionId::new()),
        Box::new(FINGERPRINT),
    ])?;
    Ok(m)
}

fn addrs() -> (SocketAddr, SocketAddr) {
    (
        "192.168.1.2:50000".parse().expect("local"),
        "203.0.113.7:3478".parse().expect("server"),
    )
}

#[test]
fn test_client_binding_success() -> Result<()> {
    let now = Instant::now();
    let (local, server) = addrs();
    let mut client = ClientBuilder::new().build(local, server, TransportProtocol::UDP, now)?;

    let request = binding_request()?;
    let id = request.transaction_id;
    client.handle_write(request)?;
    assert!(client.owns_transaction(&id));

    let out = client.poll_write().expect("request transmitted");
    assert_eq!(out.transport.peer_addr, server);
    assert_eq!(out.transport.local_addr, local);

    let mut received = Message::new();
    received.unmarshal_binary(&out.message)?;
    assert_eq!(received.typ, BINDING_REQUEST);
    FINGERPRINT.check(&received)?;

    let mut response = Message::new();
    response.build(&[
        Box::new(received.clone()),
        Box::new(BINDING_SUCCESS),
        Box::new(XorMappedAddress {
            ip: "198.51.100.1".parse()?,
            port: 61000,
        }),
    ])?;

    client.handle_read(TransportMessage {
        now: now + Duration::from_millis(20),
        transport: out.transport,
        message: BytesMut::from(&response.raw[..]),
    })?;

    let event = client.poll_event().expect("transaction event");
    assert_eq!(event.id, id);
    let msg = event.result?;
    let mut mapped = XorMappedAddress::default();
    mapped.get_from(&msg)?;
    assert_eq!(mapped.port, 61000);
    assert!(!client.owns_transaction(&id));

    Ok(())
}

#[test]
fn test_client_retransmits_until_timeout() -> Result<()> {
    let now = Instant::now();
    let (local, server) = addrs();
    let rto = Duration::from_millis(100);
    let mut client = ClientBuilder::new()
        .with_rto(rto)
        .build(local, server, TransportProtocol::UDP, now)?;

    let request = binding_request()?;
    let raw = request.raw.clone();
    client.handle_write(request)?;
    assert!(client.poll_write().is_some());

    let mut sent = 1;
    let mut waits = vec![];
    let mut t = now;
    let event = loop {
        let deadline = client.poll_timeout().expect("pending transaction");
        assert!(deadline > t);
        waits.push(deadline - t);
        t = deadline;
        client.handle_timeout(t)?;
        if let Some(event) = client.poll_event() {
            break event;
        }
        let out = client.poll_write().expect("retransmission");
        assert_eq!(&out.message[..], &raw[..]);
        sent += 1;
    };

    assert_eq!(event.result.err(), Some(Error::ErrTransactionTimeOut));
    assert_eq!(sent, DEFAULT_MAX_REQUESTS);
    // 100, 200, 400, ... then Rm times the initial rto after the last request
    let mut expected: Vec<Duration> = (0..DEFAULT_MAX_REQUESTS - 1)
        .map(|i| rto * 2u32.pow(i))
        .collect();
    expected.push(rto * LAST_REQUEST_WAIT);
    assert_eq!(waits, expected);
    assert!(client.poll_timeout().is_none());

    Ok(())
}

#[test]
fn test_client_single_request() -> Result<()> {
    let now = Instant::now();
    let (local, server) = addrs();
    let mut client = ClientBuilder::new()
        .with_max_requests(1)
        .build(local, server, TransportProtocol::UDP, now)?;

    client.handle_write(binding_request()?)?;
    assert!(client.poll_write().is_some());
    assert_eq!(client.poll_timeout(), Some(now + DEFAULT_RTO));

    client.handle_timeout(now + DEFAULT_RTO)?;
    let event = client.poll_event().expect("timed out");
    assert_eq!(event.result.err(), Some(Error::ErrTransactionTimeOut));
    assert!(client.poll_write().is_none());

    Ok(())
}

#[test]
fn test_client_duplicate_transaction() -> Result<()> {
    let now = Instant::now();
    let (local, server) = addrs();
    let mut client = ClientBuilder::new().build(local, server, TransportProtocol::UDP, now)?;

    let request = binding_request()?;
    client.handle_write(request.clone())?;
    assert_eq!(client.handle_write(request), Err(Error::ErrTransactionExists));
    assert!(client.poll_write().is_some());
    assert!(client.poll_write().is_none());

    Ok(())
}

#[test]
fn test_client_zero_rto() {
    let (local, server) = addrs();
    assert!(
        ClientBuilder::new()
            .with_rto(Duration::ZERO)
            .build(local, server, TransportProtocol::UDP, Instant::now())
            .is_err()
    );
}

#[test]
fn test_client_close() -> Result<()> {
    let now = Instant::now();
    let (local, server) = addrs();
    let mut client = ClientBuilder::new().build(local, server, TransportProtocol::UDP, now)?;

    client.handle_write(binding_request()?)?;
    client.close()?;

    let event = client.poll_event().expect("cancelled");
    assert_eq!(event.result.err(), Some(Error::ErrClientClosed));
    assert!(client.poll_write().is_none());
    assert!(client.poll_timeout().is_none());
    assert_eq!(client.close(), Err(Error::ErrClientClosed));
    assert_eq!(
        client.handle_write(binding_request()?),
        Err(Error::ErrClientClosed)
    );

    Ok(())
}
