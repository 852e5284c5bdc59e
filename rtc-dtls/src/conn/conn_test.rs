use super::*;
use crate::crypto::Certificate;

use sansio::Protocol;
use std::net::SocketAddr;
use std::time::Duration;

struct Pair {
    client: DTLSConn,
    server: DTLSConn,
    client_certificate: Certificate,
    server_certificate: Certificate,
    now: Instant,
}

fn transport(local: &str, peer: &str) -> TransportContext {
    TransportContext {
        local_addr: local.parse::<SocketAddr>().unwrap(),
        peer_addr: peer.parse::<SocketAddr>().unwrap(),
        ..Default::default()
    }
}

fn client_transport() -> TransportContext {
    transport("10.0.0.1:5000", "10.0.0.2:6000")
}

fn server_transport() -> TransportContext {
    transport("10.0.0.2:6000", "10.0.0.1:5000")
}

fn new_pair_with(
    client_fingerprints: Option<Vec<String>>,
    server_fingerprints: Option<Vec<String>>,
    customize: impl Fn(ConfigBuilder) -> ConfigBuilder,
) -> Result<Pair> {
    let client_certificate = Certificate::generate_self_signed(vec!["client".to_owned()])?;
    let server_certificate = Certificate::generate_self_signed(vec!["server".to_owned()])?;

    let client_cfg = customize(
        ConfigBuilder::default()
            .with_certificate(client_certificate.clone())
            .with_remote_fingerprints(
                client_fingerprints.unwrap_or_else(|| vec![server_certificate.fingerprint()]),
            ),
    )
    .build(true)?;
    let server_cfg = customize(
        ConfigBuilder::default()
            .with_certificate(server_certificate.clone())
            .with_remote_fingerprints(
                server_fingerprints.unwrap_or_else(|| vec![client_certificate.fingerprint()]),
            ),
    )
    .build(false)?;

    Ok(Pair {
        client: DTLSConn::new(client_cfg),
        server: DTLSConn::new(server_cfg),
        client_certificate,
        server_certificate,
        now: Instant::now(),
    })
}

fn new_pair() -> Result<Pair> {
    new_pair_with(None, None, |b| b)
}

impl Pair {
    fn start(&mut self) -> Result<()> {
        self.client.start(self.now, client_transport())?;
        self.server.start(self.now, server_transport())
    }

    fn pump(&mut self) -> Result<()> {
        loop {
            let a = deliver(&mut self.client, &mut self.server, self.now, server_transport())?;
            let b = deliver(&mut self.server, &mut self.client, self.now, client_transport())?;
            if a + b == 0 {
                return Ok(());
            }
        }
    }

    fn handshake(&mut self) -> Result<()> {
        self.start()?;
        self.pump()?;
        assert_eq!(events(&mut self.client), vec![DtlsEvent::HandshakeComplete]);
        assert_eq!(events(&mut self.server), vec![DtlsEvent::HandshakeComplete]);
        Ok(())
    }
}

fn deliver(
    from: &mut DTLSConn,
    to: &mut DTLSConn,
    now: Instant,
    transport: TransportContext,
) -> Result<usize> {
    let mut n = 0;
    while let Some(msg) = from.poll_write() {
        to.handle_read(TransportMessage {
            now,
            transport,
            message: msg.message,
        })?;
        n += 1;
    }
    Ok(n)
}

fn drop_all(conn: &mut DTLSConn) -> usize {
    let mut n = 0;
    while conn.poll_write().is_some() {
        n += 1;
    }
    n
}

fn events(conn: &mut DTLSConn) -> Vec<DtlsEvent> {
    let mut out = vec![];
    while let Some(e) = conn.poll_event() {
        out.push(e);
    }
    out
}

#[test]
fn test_handshake_completes() -> Result<()> {
    let mut p = new_pair()?;
    p.handshake()?;

    assert!(p.client.is_handshake_completed());
    assert!(p.server.is_handshake_completed());
    assert_eq!(
        p.client.connection_state().peer_certificate(),
        Some(p.server_certificate.certificate.as_slice())
    );
    assert_eq!(
        p.server.connection_state().peer_certificate(),
        Some(p.client_certificate.certificate.as_slice())
    );
    assert_eq!(p.client.connection_state().local_epoch(), 1);
    assert_eq!(p.server.connection_state().remote_epoch(), 1);
    assert!(p.client.poll_timeout().is_none());
    assert!(p.server.poll_timeout().is_none());
    Ok(())
}

#[test]
fn test_application_data() -> Result<()> {
    let mut p = new_pair()?;
    p.handshake()?;

    p.client.handle_write(BytesMut::from(&b"ping"[..]))?;
    p.pump()?;
    assert_eq!(p.server.poll_read(), Some(BytesMut::from(&b"ping"[..])));
    assert_eq!(p.server.poll_read(), None);

    p.server.handle_write(BytesMut::from(&b"pong"[..]))?;
    p.pump()?;
    assert_eq!(p.client.poll_read(), Some(BytesMut::from(&b"pong"[..])));
    Ok(())
}

#[test]
fn test_application_data_before_handshake_is_queued() -> Result<()> {
    let mut p = new_pair()?;
    p.client.handle_write(BytesMut::from(&b"early"[..]))?;
    assert!(p.client.poll_write().is_none());

    p.handshake()?;
    assert_eq!(p.server.poll_read(), Some(BytesMut::from(&b"early"[..])));
    Ok(())
}

#[test]
fn test_handshake_with_fragmentation() -> Result<()> {
    let mut p = new_pair_with(None, None, |b| b.with_mtu(Some(150)))?;
    p.start()?;

    let mut largest = 0;
    loop {
        let mut moved = 0;
        while let Some(msg) = p.client.poll_write() {
            largest = largest.max(msg.message.len());
            p.server.handle_read(TransportMessage {
                now: p.now,
                transport: server_transport(),
                message: msg.message,
            })?;
            moved += 1;
        }
        while let Some(msg) = p.server.poll_write() {
            largest = largest.max(msg.message.len());
            p.client.handle_read(TransportMessage {
                now: p.now,
                transport: client_transport(),
                message: msg.message,
            })?;
            moved += 1;
        }
        if moved == 0 {
            break;
        }
    }

    assert!(largest <= 150, "datagram of {largest} bytes");
    assert!(p.client.is_handshake_completed());
    assert!(p.server.is_handshake_completed());
    Ok(())
}

#[test]
fn test_handshake_retransmit_lost_server_hello() -> Result<()> {
    let mut p = new_pair()?;
    p.start()?;

    deliver(&mut p.client, &mut p.server, p.now, server_transport())?;
    assert!(drop_all(&mut p.server) > 0);

    let timeout = p.client.poll_timeout().expect("retransmit timer");
    assert_eq!(timeout, p.now + DEFAULT_RETRANSMIT_INTERVAL);
    p.now = timeout;
    p.client.handle_timeout(p.now)?;

    // the repeated ClientHello makes the server resend its flight
    p.pump()?;
    assert_eq!(events(&mut p.client), vec![DtlsEvent::HandshakeComplete]);
    assert_eq!(events(&mut p.server), vec![DtlsEvent::HandshakeComplete]);
    Ok(())
}

#[test]
fn test_handshake_retransmit_lost_server_finished() -> Result<()> {
    let mut p = new_pair()?;
    p.start()?;

    // ClientHello, server flight, client flight
    deliver(&mut p.client, &mut p.server, p.now, server_transport())?;
    deliver(&mut p.server, &mut p.client, p.now, client_transport())?;
    deliver(&mut p.client, &mut p.server, p.now, server_transport())?;
    assert!(p.server.is_handshake_completed());
    assert!(drop_all(&mut p.server) > 0);
    assert!(!p.client.is_handshake_completed());

    let timeout = p.client.poll_timeout().expect("retransmit timer");
    p.now = timeout;
    p.client.handle_timeout(p.now)?;
    p.pump()?;

    assert_eq!(events(&mut p.client), vec![DtlsEvent::HandshakeComplete]);
    assert_eq!(events(&mut p.server), vec![DtlsEvent::HandshakeComplete]);
    Ok(())
}

#[test]
fn test_retransmit_backoff() -> Result<()> {
    let mut p = new_pair()?;
    let start = p.now;
    p.client.start(start, client_transport())?;
    assert_eq!(drop_all(&mut p.client), 1);

    let mut expected = start;
    for interval in [1, 2, 4, 8] {
        expected += Duration::from_secs(interval);
        assert_eq!(p.client.poll_timeout(), Some(expected));
        p.client.handle_timeout(expected)?;
        assert_eq!(drop_all(&mut p.client), 1);
    }
    Ok(())
}

#[test]
fn test_handshake_fails_after_max_retransmits() -> Result<()> {
    let mut p = new_pair_with(None, None, |b| b.with_maximum_retransmit_number(Some(2)))?;
    p.client.start(p.now, client_transport())?;

    let mut sent = drop_all(&mut p.client);
    while let Some(timeout) = p.client.poll_timeout() {
        p.client.handle_timeout(timeout)?;
        sent += drop_all(&mut p.client);
    }

    assert_eq!(sent, 3);
    assert_eq!(
        events(&mut p.client),
        vec![DtlsEvent::HandshakeFailed(Error::ErrHandshakeTimeout)]
    );
    assert!(p.client.is_closed());
    Ok(())
}

#[test]
fn test_handshake_deadline() -> Result<()> {
    let mut p = new_pair_with(None, None, |b| {
        b.with_handshake_timeout(Some(Duration::from_secs(2)))
    })?;
    let start = p.now;
    p.client.start(start, client_transport())?;

    let mut last = start;
    while let Some(timeout) = p.client.poll_timeout() {
        last = timeout;
        p.client.handle_timeout(timeout)?;
    }

    assert_eq!(last, start + Duration::from_secs(2));
    assert_eq!(
        events(&mut p.client),
        vec![DtlsEvent::HandshakeFailed(Error::ErrHandshakeTimeout)]
    );
    Ok(())
}

#[test]
fn test_client_rejects_server_fingerprint() -> Result<()> {
    let wrong = Certificate::generate_self_signed(vec!["other".to_owned()])?;
    let mut p = new_pair_with(Some(vec![wrong.fingerprint()]), None, |b| b)?;
    p.start()?;
    p.pump()?;

    assert_eq!(
        events(&mut p.client),
        vec![DtlsEvent::HandshakeFailed(Error::ErrFingerprintMismatch)]
    );
    assert_eq!(
        events(&mut p.server),
        vec![DtlsEvent::HandshakeFailed(Error::ErrAlertFatalOrClose)]
    );
    assert_eq!(
        p.client.handle_write(BytesMut::from(&b"x"[..])),
        Err(Error::ErrConnClosed)
    );
    assert!(p.client.connection_state().peer_certificate().is_none());
    Ok(())
}

#[test]
fn test_server_rejects_client_fingerprint() -> Result<()> {
    let mut p = new_pair_with(None, Some(vec!["AA:BB".to_owned()]), |b| b)?;
    p.start()?;
    p.pump()?;

    assert_eq!(
        events(&mut p.server),
        vec![DtlsEvent::HandshakeFailed(Error::ErrFingerprintMismatch)]
    );
    assert_eq!(
        events(&mut p.client),
        vec![DtlsEvent::HandshakeFailed(Error::ErrAlertFatalOrClose)]
    );
    Ok(())
}

#[test]
fn test_empty_remote_fingerprints_fail() -> Result<()> {
    let mut p = new_pair_with(Some(vec![]), None, |b| b)?;
    p.start()?;
    p.pump()?;

    assert_eq!(
        events(&mut p.client),
        vec![DtlsEvent::HandshakeFailed(Error::ErrFingerprintMismatch)]
    );
    Ok(())
}

#[test]
fn test_close_notify() -> Result<()> {
    let mut p = new_pair()?;
    p.handshake()?;

    p.client.close()?;
    assert!(p.client.is_closed());
    p.pump()?;

    assert_eq!(events(&mut p.server), vec![DtlsEvent::Closed]);
    assert!(p.server.is_closed());
    assert!(p.server.poll_timeout().is_none());
    assert_eq!(
        p.server.handle_write(BytesMut::from(&b"x"[..])),
        Err(Error::ErrConnClosed)
    );
    assert_eq!(
        p.client.handle_write(BytesMut::from(&b"x"[..])),
        Err(Error::ErrConnClosed)
    );
    assert!(events(&mut p.client).is_empty());
    Ok(())
}

#[test]
fn test_replayed_record_is_discarded() -> Result<()> {
    let mut p = new_pair()?;
    p.handshake()?;

    p.client.handle_write(BytesMut::from(&b"once"[..]))?;
    let datagram = p.client.poll_write().expect("datagram");

    p.server.handle_read(datagram.clone())?;
    p.server.handle_read(datagram)?;

    assert_eq!(p.server.poll_read(), Some(BytesMut::from(&b"once"[..])));
    assert_eq!(p.server.poll_read(), None);
    assert!(events(&mut p.server).is_empty());
    Ok(())
}

#[test]
fn test_tampered_record_is_fatal() -> Result<()> {
    let mut p = new_pair()?;
    p.handshake()?;

    p.client.handle_write(BytesMut::from(&b"secret"[..]))?;
    let mut datagram = p.client.poll_write().expect("datagram");
    let last = datagram.message.len() - 1;
    datagram.message[last] ^= 0xff;

    p.server.handle_read(datagram)?;
    assert_eq!(p.server.poll_read(), None);
    assert_eq!(
        events(&mut p.server),
        vec![DtlsEvent::Failed(Error::ErrInvalidMac)]
    );

    // the fatal alert reaches the client
    p.pump()?;
    assert_eq!(
        events(&mut p.client),
        vec![DtlsEvent::Failed(Error::ErrAlertFatalOrClose)]
    );
    Ok(())
}

#[test]
fn test_garbage_is_ignored() -> Result<()> {
    let mut p = new_pair()?;
    p.start()?;

    p.server.handle_read(TransportMessage {
        now: p.now,
        transport: server_transport(),
        message: BytesMut::from(&[0x16u8, 0xfe, 0xfd, 0x00][..]),
    })?;
    assert!(events(&mut p.server).is_empty());

    p.pump()?;
    assert_eq!(events(&mut p.client), vec![DtlsEvent::HandshakeComplete]);
    Ok(())
}

#[test]
fn test_config_requires_certificate() {
    assert_eq!(
        ConfigBuilder::default().build(true).unwrap_err(),
        Error::ErrNoCertificates
    );
}
