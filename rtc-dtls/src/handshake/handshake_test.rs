use super::handshake_cache::*;
use super::*;
use crate::record_layer::record_layer_header::PROTOCOL_VERSION1_2;

fn client_hello() -> Handshake {
    Handshake::new(
        HandshakeMessage::ClientHello(HandshakeMessageClientHello {
            version: PROTOCOL_VERSION1_2,
            random: [7u8; HANDSHAKE_RANDOM_LENGTH],
            cipher_suites: vec![0xc02b],
        }),
        0,
    )
}

#[test]
fn test_handshake_client_hello() -> Result<()> {
    let h = client_hello();
    let raw = h.marshal()?;

    let header = HandshakeHeader::unmarshal(&raw)?;
    assert_eq!(header.handshake_type, HandshakeType::ClientHello);
    assert_eq!(header.length as usize, raw.len() - HANDSHAKE_HEADER_LENGTH);
    assert_eq!(header.fragment_length, header.length);

    let parsed = Handshake::unmarshal(&raw)?;
    assert_eq!(parsed.handshake_message, h.handshake_message);
    Ok(())
}

#[test]
fn test_handshake_client_hello_with_session_and_extensions() -> Result<()> {
    let mut body = vec![0xfe, 0xfd];
    body.extend_from_slice(&[1u8; 32]);
    body.extend_from_slice(&[2, 0xaa, 0xbb]); // session id
    body.extend_from_slice(&[0]); // cookie
    body.extend_from_slice(&[0, 4, 0xc0, 0x2b, 0xc0, 0x2f]);
    body.extend_from_slice(&[1, 0]);
    body.extend_from_slice(&[0, 4, 0x00, 0x17, 0x00, 0x00]); // extensions

    let m = HandshakeMessageClientHello::unmarshal(&body)?;
    assert_eq!(m.cipher_suites, vec![0xc02b, 0xc02f]);
    assert_eq!(m.random, [1u8; 32]);
    Ok(())
}

#[test]
fn test_handshake_server_key_exchange() -> Result<()> {
    let m = HandshakeMessageServerKeyExchange {
        named_curve: NAMED_CURVE_X25519,
        public_key: vec![9u8; 32],
        signature: vec![1, 2, 3, 4],
    };
    let mut raw = vec![];
    m.marshal(&mut raw)?;

    assert_eq!(&raw[..4], &[ELLIPTIC_CURVE_TYPE_NAMED_CURVE, 0x00, 0x1d, 32]);
    assert_eq!(m.params(), raw[..36].to_vec());
    assert_eq!(HandshakeMessageServerKeyExchange::unmarshal(&raw)?, m);
    Ok(())
}

#[test]
fn test_handshake_certificate_chain() -> Result<()> {
    let m = HandshakeMessageCertificate {
        certificate: vec![vec![0x30, 0x01, 0x00], vec![0x30, 0x00]],
    };
    let mut raw = vec![];
    m.marshal(&mut raw)?;
    assert_eq!(&raw[..3], &[0, 0, 11]);
    assert_eq!(HandshakeMessageCertificate::unmarshal(&raw)?, m);

    assert_eq!(
        HandshakeMessageCertificate::unmarshal(&raw[..raw.len() - 1]),
        Err(Error::ErrBufferTooSmall)
    );
    Ok(())
}

#[test]
fn test_handshake_finished_length() {
    assert_eq!(
        HandshakeMessage::unmarshal(HandshakeType::Finished, &[0u8; 11]),
        Err(Error::ErrLengthMismatch)
    );
    assert!(HandshakeMessage::unmarshal(HandshakeType::Finished, &[0u8; 12]).is_ok());
}

#[test]
fn test_handshake_rejects_fragment() -> Result<()> {
    let mut raw = client_hello().marshal()?;
    // lower fragment_length by one
    raw[11] -= 1;
    raw.pop();
    assert_eq!(Handshake::unmarshal(&raw), Err(Error::ErrLengthMismatch));
    Ok(())
}

#[test]
fn test_handshake_unknown_type() {
    assert_eq!(
        HandshakeMessage::unmarshal(HandshakeType::HelloVerifyRequest, &[]),
        Err(Error::ErrInvalidHandshakeType)
    );
}

#[test]
fn test_handshake_cache() -> Result<()> {
    let mut cache = HandshakeCache::new();

    let ch = client_hello().marshal()?;
    let done = Handshake::new(HandshakeMessage::ServerHelloDone, 0).marshal()?;

    cache.push(ch.clone(), 0, HandshakeType::ClientHello, true);
    // retransmitted copy
    cache.push(ch.clone(), 0, HandshakeType::ClientHello, true);
    cache.push(done.clone(), 0, HandshakeType::ServerHelloDone, false);

    let rules = [
        rule(HandshakeType::ClientHello, true),
        rule(HandshakeType::ServerHelloDone, false),
    ];
    let merged = cache.pull_and_merge(&rules);
    assert_eq!(merged, [ch.as_slice(), done.as_slice()].concat());

    let pulled = cache.pull(&rules)?.expect("all messages present");
    assert_eq!(pulled.len(), 2);
    assert_eq!(
        pulled[1].handshake_message,
        HandshakeMessage::ServerHelloDone
    );

    assert!(cache
        .pull(&[rule(HandshakeType::Finished, true)])?
        .is_none());
    // absent messages are skipped when merging
    assert_eq!(
        cache.pull_and_merge(&[rule(HandshakeType::Finished, true)]),
        Vec::<u8>::new()
    );
    Ok(())
}
