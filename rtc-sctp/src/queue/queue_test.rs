use super::payload_queue::{OutboundChunk, PayloadQueue};
use super::reassembly_queue::ReassemblyQueue;
use crate::chunk::chunk_payload_data::{ChunkPayloadData, PayloadProtocolIdentifier};
use crate::stream::ReliabilityType;

use bytes::Bytes;
use std::time::Instant;

fn data(tsn: u32, ssn: u16, b: bool, e: bool, payload: &'static [u8]) -> ChunkPayloadData {
    ChunkPayloadData {
        unordered: false,
        beginning_fragment: b,
        ending_fragment: e,
        tsn,
        stream_identifier: 0,
        stream_sequence_number: ssn,
        payload_type: PayloadProtocolIdentifier::Binary,
        user_data: Bytes::from_static(payload),
    }
}

fn unordered(tsn: u32, b: bool, e: bool, payload: &'static [u8]) -> ChunkPayloadData {
    ChunkPayloadData {
        unordered: true,
        ..data(tsn, 0, b, e, payload)
    }
}

fn outbound(tsn: u32, nsent: u32) -> OutboundChunk {
    OutboundChunk {
        chunk: data(tsn, 0, true, true, b"xyz"),
        message_id: tsn as u64,
        since: Instant::now(),
        sent_at: None,
        nsent,
        acked: false,
        abandoned: false,
        retransmit: false,
        reliability_type: ReliabilityType::Reliable,
        reliability_value: 0,
    }
}

#[test]
fn test_reassembly_queue_ordered_fragments() {
    let mut q = ReassemblyQueue::default();

    assert!(q.push(data(11, 0, false, true, b"world")));
    assert!(q.read().is_none());
    assert!(q.push(data(10, 0, true, false, b"hello ")));
    assert_eq!(q.buffered_amount(), 11);

    let (ppi, payload) = q.read().unwrap();
    assert_eq!(ppi, PayloadProtocolIdentifier::Binary);
    assert_eq!(&payload[..], b"hello world");
    assert_eq!(q.buffered_amount(), 0);
    assert_eq!(q.next_ssn, 1);
}

#[test]
fn test_reassembly_queue_ordered_waits_for_gap() {
    let mut q = ReassemblyQueue::default();

    assert!(q.push(data(2, 1, true, true, b"b")));
    assert!(q.read().is_none());
    assert!(q.push(data(1, 0, true, true, b"a")));

    assert_eq!(&q.read().unwrap().1[..], b"a");
    assert_eq!(&q.read().unwrap().1[..], b"b");
    assert!(q.read().is_none());

    // Already delivered.
    assert!(!q.push(data(1, 0, true, true, b"a")));
}

#[test]
fn test_reassembly_queue_duplicate_fragment() {
    let mut q = ReassemblyQueue::default();
    assert!(q.push(data(5, 0, true, false, b"ab")));
    assert!(!q.push(data(5, 0, true, false, b"ab")));
    assert_eq!(q.buffered_amount(), 2);
}

#[test]
fn test_reassembly_queue_unordered() {
    let mut q = ReassemblyQueue::default();

    assert!(q.push(unordered(21, false, true, b"2")));
    assert!(q.push(unordered(30, true, true, b"solo")));
    assert_eq!(&q.read().unwrap().1[..], b"solo");
    assert!(q.read().is_none());

    assert!(q.push(unordered(20, true, false, b"1")));
    assert_eq!(&q.read().unwrap().1[..], b"12");
    assert_eq!(q.buffered_amount(), 0);
}

#[test]
fn test_reassembly_queue_forward_tsn() {
    let mut q = ReassemblyQueue::default();

    assert!(q.push(data(3, 0, true, false, b"partial")));
    assert!(q.push(data(6, 2, true, true, b"later")));
    q.forward_tsn_for_ordered(1);

    assert_eq!(q.next_ssn, 2);
    assert_eq!(&q.read().unwrap().1[..], b"later");
    assert_eq!(q.buffered_amount(), 0);

    assert!(q.push(unordered(8, true, false, b"frag")));
    assert!(q.push(unordered(12, true, false, b"keep")));
    q.forward_tsn_for_unordered(10);
    assert_eq!(q.buffered_amount(), 4);
}

#[test]
fn test_reassembly_queue_reset() {
    let mut q = ReassemblyQueue::default();
    assert!(q.push(data(1, 0, true, true, b"a")));
    assert!(q.push(data(3, 2, true, true, b"c")));
    assert_eq!(&q.read().unwrap().1[..], b"a");

    q.reset();
    assert_eq!(q.next_ssn, 0);
    assert_eq!(q.buffered_amount(), 0);
    assert!(q.push(data(9, 0, true, true, b"new")));
    assert_eq!(&q.read().unwrap().1[..], b"new");
}

#[test]
fn test_payload_queue_pop_through() {
    let mut q = PayloadQueue::default();
    for tsn in 1..=4 {
        q.push(outbound(tsn, 1));
    }
    assert_eq!(q.outstanding_bytes(), 12);

    let popped = q.pop_through(2);
    assert_eq!(
        popped.iter().map(|c| c.chunk.tsn).collect::<Vec<_>>(),
        vec![1, 2]
    );
    assert_eq!(q.len(), 2);
    assert_eq!(q.iter().next().map(|c| c.chunk.tsn), Some(3));
}

#[test]
fn test_payload_queue_wraparound() {
    let mut q = PayloadQueue::default();
    q.push(outbound(u32::MAX, 1));
    q.push(outbound(0, 1));
    q.push(outbound(1, 1));

    assert_eq!(q.pop_through(0).len(), 2);
    assert_eq!(q.len(), 1);
}

#[test]
fn test_payload_queue_mark_acked() {
    let mut q = PayloadQueue::default();
    for tsn in 10..15 {
        q.push(outbound(tsn, 1));
    }
    q.push(outbound(15, 0));

    assert_eq!(q.mark_acked(12, 13).len(), 2);
    assert!(q.mark_acked(12, 13).is_empty());
    assert_eq!(q.outstanding_bytes(), 9);

    for c in q.iter_mut().filter(|c| c.chunk.tsn == 10) {
        c.abandoned = true;
    }
    assert_eq!(q.outstanding_bytes(), 6);
    assert!(q.has_outstanding());

    q.clear();
    assert!(q.is_empty());
    assert!(!q.has_outstanding());
}
