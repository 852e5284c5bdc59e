use super::chunk_forward_tsn::ChunkForwardTsnStream;
use super::chunk_payload_data::PayloadProtocolIdentifier;
use super::chunk_reconfig::{ReconfigParam, ReconfigResult};
use super::chunk_selective_ack::GapAckBlock;
use super::*;
use crate::packet::Packet;

use bytes::Bytes;

fn marshal(c: &Chunk) -> BytesMut {
    let mut buf = BytesMut::new();
    c.marshal_to(&mut buf);
    buf
}

#[test]
fn test_chunk_payload_data_unmarshal() {
    let raw = [
        0x00, 0x03, 0x00, 0x14, // DATA, B|E, length 20
        0x00, 0x00, 0x00, 0x01, // tsn
        0x00, 0x02, 0x00, 0x03, // stream 2, ssn 3
        0x00, 0x00, 0x00, 0x35, // ppi 53
        b'A', b'B', b'C', b'D',
    ];

    let (chunk, consumed) = Chunk::unmarshal(&raw).unwrap();
    assert_eq!(consumed, 20);
    let Some(Chunk::PayloadData(d)) = chunk else {
        panic!("expected DATA, got {chunk:?}");
    };
    assert!(d.beginning_fragment);
    assert!(d.ending_fragment);
    assert!(!d.unordered);
    assert_eq!(d.tsn, 1);
    assert_eq!(d.stream_identifier, 2);
    assert_eq!(d.stream_sequence_number, 3);
    assert_eq!(d.payload_type, PayloadProtocolIdentifier::Binary);
    assert_eq!(&d.user_data[..], b"ABCD");

    assert_eq!(&marshal(&Chunk::PayloadData(d))[..], &raw[..]);
}

#[test]
fn test_chunk_payload_data_padding() {
    let c = Chunk::PayloadData(ChunkPayloadData {
        unordered: true,
        beginning_fragment: true,
        ending_fragment: false,
        tsn: 7,
        stream_identifier: 1,
        payload_type: PayloadProtocolIdentifier::String,
        user_data: Bytes::from_static(b"abc"),
        ..Default::default()
    });
    let raw = marshal(&c);

    assert_eq!(c.marshal_size(), 20);
    assert_eq!(raw.len(), 20);
    // The length field excludes padding.
    assert_eq!(u16::from_be_bytes([raw[2], raw[3]]), 19);
    assert_eq!(raw[1], 0x06);
    assert_eq!(raw[19], 0);

    let (parsed, consumed) = Chunk::unmarshal(&raw).unwrap();
    assert_eq!(consumed, 20);
    assert_eq!(parsed, Some(c));
}

#[test]
fn test_chunk_selective_ack_unmarshal() {
    let raw = [
        0x03, 0x00, 0x00, 0x18, // SACK, length 24
        0x00, 0x00, 0x00, 0x64, // cumulative tsn ack 100
        0x00, 0x00, 0x03, 0xe8, // a_rwnd 1000
        0x00, 0x01, 0x00, 0x01, // one gap, one dup
        0x00, 0x02, 0x00, 0x03, // gap 2..3
        0x00, 0x00, 0x00, 0x63, // dup 99
    ];

    let (chunk, consumed) = Chunk::unmarshal(&raw).unwrap();
    assert_eq!(consumed, 24);
    let Some(Chunk::SelectiveAck(sack)) = chunk else {
        panic!("expected SACK");
    };
    assert_eq!(sack.cumulative_tsn_ack, 100);
    assert_eq!(sack.advertised_receiver_window_credit, 1000);
    assert_eq!(sack.gap_ack_blocks, vec![GapAckBlock { start: 2, end: 3 }]);
    assert_eq!(sack.duplicate_tsn, vec![99]);
}

#[test]
fn test_chunk_init_parameters() {
    let init = ChunkInit {
        is_ack: true,
        initiate_tag: 0x1234_5678,
        advertised_receiver_window_credit: 1024 * 1024,
        num_outbound_streams: u16::MAX,
        num_inbound_streams: u16::MAX,
        initial_tsn: 42,
        state_cookie: Some(Bytes::from_static(&[9u8; 32])),
        ..Default::default()
    }
    .with_extensions();
    let raw = marshal(&Chunk::Init(init.clone()));
    assert_eq!(raw[0], CT_INIT_ACK.0);

    let (parsed, _) = Chunk::unmarshal(&raw).unwrap();
    let Some(Chunk::Init(parsed)) = parsed else {
        panic!("expected INIT ACK");
    };
    assert!(parsed.is_ack);
    assert!(parsed.forward_tsn_supported);
    assert!(parsed.supported_extensions.contains(&CT_RECONFIG.0));
    assert!(parsed.supported_extensions.contains(&CT_FORWARD_TSN.0));
    assert_eq!(parsed.state_cookie, init.state_cookie);
    assert_eq!(parsed.initial_tsn, 42);
}

#[test]
fn test_chunk_forward_tsn_and_reconfig() {
    let fwd = Chunk::ForwardTsn(ChunkForwardTsn {
        new_cumulative_tsn: 3,
        streams: vec![ChunkForwardTsnStream {
            identifier: 1,
            sequence: 7,
        }],
    });
    assert_eq!(
        &marshal(&fwd)[..],
        &[0xc0, 0x00, 0x00, 0x0c, 0, 0, 0, 3, 0, 1, 0, 7]
    );

    let reconfig = Chunk::Reconfig(ChunkReconfig {
        params: vec![
            ReconfigParam::OutgoingResetRequest {
                reconfig_request_sequence_number: 10,
                reconfig_response_sequence_number: 9,
                sender_last_tsn: 8,
                stream_identifiers: vec![1, 3, 5],
            },
            ReconfigParam::Response {
                reconfig_response_sequence_number: 4,
                result: ReconfigResult::InProgress,
            },
        ],
    });
    let raw = marshal(&reconfig);
    assert_eq!(raw.len() % 4, 0);
    let (parsed, consumed) = Chunk::unmarshal(&raw).unwrap();
    assert_eq!(consumed, raw.len());
    assert_eq!(parsed, Some(reconfig));
}

#[test]
fn test_reconfig_result_values() {
    assert_eq!(u32::from(ReconfigResult::SuccessPerformed), 1);
    assert_eq!(ReconfigResult::from(6), ReconfigResult::InProgress);
    assert_eq!(ReconfigResult::from(99), ReconfigResult::Unknown(99));
    assert_eq!(u32::from(ReconfigResult::Unknown(99)), 99);
}

#[test]
fn test_chunk_unknown_types() {
    // High bit set: skipped.
    let skippable = [0x85, 0x00, 0x00, 0x06, 0xaa, 0xbb, 0x00, 0x00];
    let (chunk, consumed) = Chunk::unmarshal(&skippable).unwrap();
    assert!(chunk.is_none());
    assert_eq!(consumed, 8);

    let fatal = [0x45, 0x00, 0x00, 0x04];
    assert_eq!(
        Chunk::unmarshal(&fatal),
        Err(Error::ErrUnmarshalUnknownChunkType)
    );
}

#[test]
fn test_chunk_header_errors() {
    assert_eq!(
        Chunk::unmarshal(&[0x00, 0x03]),
        Err(Error::ErrChunkHeaderTooSmall)
    );
    assert_eq!(
        Chunk::unmarshal(&[0x0b, 0x00, 0x00, 0x02]),
        Err(Error::ErrChunkHeaderInvalidLength)
    );
    assert_eq!(
        Chunk::unmarshal(&[0x0b, 0x00, 0x00, 0x08, 0x00]),
        Err(Error::ErrChunkHeaderNotEnoughSpace)
    );
}

#[test]
fn test_packet_checksum() {
    let p = Packet {
        source_port: 5000,
        destination_port: 5000,
        verification_tag: 0xdead_beef,
        chunks: vec![Chunk::CookieAck],
    };
    let mut raw = p.marshal();
    assert_eq!(raw.len(), 16);
    assert_eq!(Packet::unmarshal(&raw).unwrap(), p);

    raw[13] ^= 0x01;
    assert_eq!(Packet::unmarshal(&raw), Err(Error::ErrChecksumMismatch));
    assert_eq!(
        Packet::unmarshal(&raw[..8]),
        Err(Error::ErrPacketRawTooSmall)
    );
}

#[test]
fn test_packet_skips_unknown_chunk() {
    let mut raw = BytesMut::new();
    raw.put_u16(5000);
    raw.put_u16(5000);
    raw.put_u32(1);
    raw.put_u32(0);
    raw.put_slice(&[0x85, 0x00, 0x00, 0x04]);
    Chunk::CookieAck.marshal_to(&mut raw);
    let checksum = crate::util::generate_packet_checksum(&raw);
    raw[8..12].copy_from_slice(&checksum.to_le_bytes());

    let p = Packet::unmarshal(&raw).unwrap();
    assert_eq!(p.chunks, vec![Chunk::CookieAck]);
}
