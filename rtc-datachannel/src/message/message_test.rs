use super::*;
use bytes::{Bytes, BytesMut};

#[test]
fn test_channel_type_unmarshal_success() -> Result<()> {
    let tests = vec![
        ("ReliableUnordered", 0x80, ChannelType::ReliableUnordered),
        ("PartialReliableRexmit", 0x01, ChannelType::PartialReliableRexmit),
        (
            "PartialReliableRexmitUnordered",
            0x81,
            ChannelType::PartialReliableRexmitUnordered,
        ),
        ("PartialReliableTimed", 0x02, ChannelType::PartialReliableTimed),
        (
            "PartialReliableTimedUnordered",
            0x82,
            ChannelType::PartialReliableTimedUnordered,
        ),
        ("Reliable", 0x00, ChannelType::Reliable),
    ];

    for (name, binary, want) in tests {
        let mut buf = Bytes::from(vec![binary]);
        let got = ChannelType::unmarshal(&mut buf)?;
        assert_eq!(got, want, "{name}");
        assert_eq!(got.is_unordered(), binary & 0x80 != 0, "{name}");
    }

    Ok(())
}

#[test]
fn test_channel_type_unmarshal_invalid() {
    let mut buf = Bytes::from_static(&[0x11]);
    assert_eq!(
        ChannelType::unmarshal(&mut buf),
        Err(Error::InvalidChannelType(0x11))
    );

    let mut buf = Bytes::new();
    assert_eq!(
        ChannelType::unmarshal(&mut buf),
        Err(Error::UnexpectedEndOfBuffer {
            expected: 1,
            actual: 0
        })
    );
}

#[test]
fn test_message_type_from_byte() {
    assert_eq!(MessageType::try_from(0x02), Ok(MessageType::Ack));
    assert_eq!(MessageType::try_from(0x03), Ok(MessageType::Open));
    assert_eq!(
        MessageType::try_from(0x04),
        Err(Error::InvalidMessageType(0x04))
    );
    assert_eq!(u8::from(MessageType::Open), 0x03);
}

#[test]
fn test_message_unmarshal_unknown_type() {
    let mut bytes = Bytes::from_static(&[0x01, 0x00]);
    assert_eq!(
        Message::unmarshal(&mut bytes),
        Err(Error::InvalidMessageType(0x01))
    );
}

#[test]
fn test_message_unmarshal_open() -> Result<()> {
    let mut bytes = Bytes::from_static(&[
        0x03, // message type
        0x00, // channel type
        0x00, 0x0f, // priority
        0x00, 0x00, 0x00, 0x00, // reliability parameter
        0x00, 0x03, // label length
        0x00, 0x03, // protocol length
        0x66, 0x6f, 0x6f, // label
        0x62, 0x61, 0x72, // protocol
    ]);

    let actual = Message::unmarshal(&mut bytes)?;
    let expected = Message::Open(DataChannelOpen {
        channel_type: ChannelType::Reliable,
        priority: 15,
        reliability_parameter: 0,
        label: b"foo".to_vec(),
        protocol: b"bar".to_vec(),
    });

    assert_eq!(actual, expected);
    assert_eq!(actual.message_type(), MessageType::Open);

    Ok(())
}

#[test]
fn test_message_unmarshal_ack() -> Result<()> {
    let mut bytes = Bytes::from_static(&[0x02]);
    let actual = Message::unmarshal(&mut bytes)?;
    assert_eq!(actual, Message::Ack);
    Ok(())
}

#[test]
fn test_message_unmarshal_truncated_open() {
    // Label length says 5 but only 2 bytes follow.
    let mut bytes = Bytes::from_static(&[
        0x03, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03, 0x00, 0x05, 0x00, 0x00, 0x61, 0x62,
    ]);
    assert_eq!(
        Message::unmarshal(&mut bytes),
        Err(Error::UnexpectedEndOfBuffer {
            expected: 5,
            actual: 2
        })
    );

    let mut empty = Bytes::new();
    assert!(Message::unmarshal(&mut empty).is_err());
}

#[test]
fn test_message_marshal_open() -> Result<()> {
    let msg = Message::Open(DataChannelOpen {
        channel_type: ChannelType::PartialReliableTimedUnordered,
        priority: CHANNEL_PRIORITY_NORMAL,
        reliability_parameter: 1500,
        label: b"chat".to_vec(),
        protocol: vec![],
    });

    let raw = msg.marshal()?;
    assert_eq!(raw.len(), msg.marshal_size());
    assert_eq!(
        &raw[..],
        &[
            0x03, 0x82, 0x01, 0x00, 0x00, 0x00, 0x05, 0xdc, 0x00, 0x04, 0x00, 0x00, b'c', b'h',
            b'a', b't',
        ]
    );

    let mut small = BytesMut::zeroed(4);
    assert!(msg.marshal_to(&mut small).is_err());
    let mut empty = BytesMut::new();
    assert!(Message::Ack.marshal_to(&mut empty).is_err());

    Ok(())
}

#[test]
fn test_message_marshal_ack() -> Result<()> {
    let raw = Message::Ack.marshal()?;
    assert_eq!(&raw[..], &[0x02]);
    Ok(())
}
