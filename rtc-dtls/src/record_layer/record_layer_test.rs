use super::*;
use crate::alert::*;
use bytes::BytesMut;

#[test]
fn test_record_layer_header() -> Result<()> {
    let raw = [
        0x14, 0xfe, 0xfd, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x01,
    ];
    let h = RecordLayerHeader::unmarshal(&raw)?;
    assert_eq!(
        h,
        RecordLayerHeader {
            content_type: ContentType::ChangeCipherSpec,
            protocol_version: PROTOCOL_VERSION1_2,
            epoch: 1,
            sequence_number: 2,
            content_len: 1,
        }
    );

    let mut out = vec![];
    h.marshal(&mut out)?;
    assert_eq!(out, raw);

    Ok(())
}

#[test]
fn test_record_layer_rejects_other_versions() {
    let raw = [
        0x16, 0xfe, 0xff, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    ];
    assert_eq!(
        RecordLayerHeader::unmarshal(&raw).unwrap_err(),
        Error::ErrUnsupportedProtocolVersion
    );
    assert_eq!(
        RecordLayerHeader::unmarshal(&raw[..5]).unwrap_err(),
        Error::ErrBufferTooSmall
    );
}

#[test]
fn test_sequence_number_overflow() {
    let h = RecordLayerHeader {
        content_type: ContentType::ApplicationData,
        protocol_version: PROTOCOL_VERSION1_2,
        epoch: 1,
        sequence_number: MAX_SEQUENCE_NUMBER + 1,
        content_len: 0,
    };
    let mut out = vec![];
    assert_eq!(
        h.marshal(&mut out).unwrap_err(),
        Error::ErrSequenceNumberOverflow
    );
}

#[test]
fn test_unpack_datagram() -> Result<()> {
    let mut alert = RecordLayer::new(
        PROTOCOL_VERSION1_2,
        0,
        Content::Alert(Alert::fatal(AlertDescription::InternalError)),
    );
    alert.record_layer_header.sequence_number = 4;
    let data = RecordLayer::new(
        PROTOCOL_VERSION1_2,
        1,
        Content::ApplicationData(BytesMut::from(&b"hello"[..])),
    );

    let mut datagram = alert.marshal()?;
    datagram.extend_from_slice(&data.marshal()?);

    let records = unpack_datagram(&datagram)?;
    assert_eq!(records.len(), 2);

    let first = RecordLayer::unmarshal(&records[0])?;
    assert_eq!(first.record_layer_header.sequence_number, 4);
    assert_eq!(first.content, alert.content);

    let second = RecordLayer::unmarshal(&records[1])?;
    assert_eq!(second.record_layer_header.epoch, 1);
    assert_eq!(
        second.content,
        Content::ApplicationData(BytesMut::from(&b"hello"[..]))
    );

    assert_eq!(
        unpack_datagram(&datagram[..datagram.len() - 1]).unwrap_err(),
        Error::ErrLengthMismatch
    );

    Ok(())
}
