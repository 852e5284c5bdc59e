use super::*;
use crate::textattrs::TextAttribute;

#[test]
fn test_message_type_value() {
    let tests = vec![
        (BINDING_REQUEST, 0x0001u16),
        (BINDING_SUCCESS, 0x0101),
        (BINDING_ERROR, 0x0111),
        (MessageType::new(METHOD_BINDING, CLASS_INDICATION), 0x0011),
        (MessageType::new(Method(0xb6d), MessageClass(0x3)), 0x2ddd),
    ];

    for (input, output) in tests {
        assert_eq!(input.value(), output, "{input}");
        let mut decoded = MessageType::default();
        decoded.read_value(output);
        assert_eq!(decoded, input, "{output:#06x}");
    }
}

#[test]
fn test_message_build_and_decode() -> Result<()> {
    let mut m = Message::new();
    m.build(&[
        Box::new(BINDING_REQUEST),
        Box::new(TransactionId::new()),
        Box::new(TextAttribute::new(ATTR_USERNAME, "abc".to_owned())),
        Box::new(RawAttribute {
            typ: ATTR_PRIORITY,
            length: 0,
            value: vec![0, 0, 0, 42],
        }),
    ])?;

    // username is padded to four bytes
    assert_eq!(m.length as usize, (4 + 4) + (4 + 4));
    assert_eq!(m.raw.len(), MESSAGE_HEADER_SIZE + m.length as usize);
    assert!(is_message(&m.raw));

    let mut decoded = Message::new();
    decoded.unmarshal_binary(&m.raw)?;
    assert_eq!(decoded, m);
    assert_eq!(decoded.get(ATTR_USERNAME)?, b"abc".to_vec());
    assert!(decoded.contains(ATTR_PRIORITY));
    assert!(!decoded.contains(ATTR_USE_CANDIDATE));
    assert_eq!(decoded.get(ATTR_SOFTWARE), Err(Error::ErrAttributeNotFound));

    Ok(())
}

#[test]
fn test_message_decode_errors() {
    let mut m = Message::new();
    assert_eq!(
        m.unmarshal_binary(&[0, 1, 0, 0]),
        Err(Error::ErrUnexpectedHeaderEof)
    );

    let mut bad_cookie = [0u8; MESSAGE_HEADER_SIZE];
    bad_cookie[4] = 0xff;
    assert_eq!(
        m.unmarshal_binary(&bad_cookie),
        Err(Error::ErrInvalidMagicCookie)
    );

    // header announces more attribute bytes than present
    let mut truncated = Message::new();
    truncated.add(ATTR_USERNAME, b"user");
    truncated.write_header();
    let raw = truncated.raw[..truncated.raw.len() - 2].to_vec();
    assert!(m.unmarshal_binary(&raw).is_err());
}

#[test]
fn test_is_message() {
    assert!(!is_message(&[0x16, 0xfe, 0xfd]));
    let mut m = Message::new();
    m.write_header();
    assert!(is_message(&m.raw));
}
