use super::*;
use crate::chunk::chunk_payload_data::PayloadProtocolIdentifier;
use crate::config::DEFAULT_MAX_MESSAGE_SIZE;

use sansio::Protocol;
use shared::{TaggedBytesMut, TransportContext, TransportMessage};

struct Pair {
    client: Association,
    server: Association,
    now: Instant,
}

impl Pair {
    fn new(config: AssociationConfig) -> Self {
        let now = Instant::now();
        Pair {
            client: Association::new(config.clone(), true, now),
            server: Association::new(config, false, now),
            now,
        }
    }

    fn established(config: AssociationConfig) -> Self {
        let mut pair = Pair::new(config);
        pair.client.connect(pair.now).unwrap();
        pair.pump();
        assert_eq!(pair.client.state(), AssociationState::Established);
        assert_eq!(pair.server.state(), AssociationState::Established);
        assert_eq!(events(&mut pair.client), vec![AssociationEvent::Connected]);
        assert_eq!(events(&mut pair.server), vec![AssociationEvent::Connected]);
        pair
    }

    fn to_server(&mut self, packets: Vec<BytesMut>) {
        for message in packets {
            self.server.handle_read(tagged(self.now, message)).unwrap();
        }
    }

    fn to_client(&mut self, packets: Vec<BytesMut>) {
        for message in packets {
            self.client.handle_read(tagged(self.now, message)).unwrap();
        }
    }

    fn pump(&mut self) {
        for _ in 0..100 {
            let c = written(&mut self.client);
            let s = written(&mut self.server);
            if c.is_empty() && s.is_empty() {
                return;
            }
            self.to_server(c);
            self.to_client(s);
        }
        panic!("associations did not go quiet");
    }

    fn fire_client_timer(&mut self) {
        self.now = self.client.poll_timeout().expect("client timer armed");
        self.client.handle_timeout(self.now).unwrap();
    }
}

fn tagged(now: Instant, message: BytesMut) -> TaggedBytesMut {
    TransportMessage {
        now,
        transport: TransportContext::default(),
        message,
    }
}

fn written(a: &mut Association) -> Vec<BytesMut> {
    std::iter::from_fn(|| a.poll_write()).collect()
}

fn events(a: &mut Association) -> Vec<AssociationEvent> {
    std::iter::from_fn(|| a.poll_event()).collect()
}

fn read_all(a: &mut Association) -> Vec<StreamMessage> {
    std::iter::from_fn(|| a.poll_read()).collect()
}

fn msg(stream_id: u16, data: &[u8]) -> StreamMessage {
    StreamMessage {
        stream_id,
        ppi: PayloadProtocolIdentifier::Binary,
        payload: BytesMut::from(data),
    }
}

fn sacks(packets: &[BytesMut]) -> Vec<ChunkSelectiveAck> {
    packets
        .iter()
        .flat_map(|p| Packet::unmarshal(p).unwrap().chunks)
        .filter_map(|c| match c {
            Chunk::SelectiveAck(s) => Some(s),
            _ => None,
        })
        .collect()
}

#[test]
fn test_association_handshake() {
    let mut pair = Pair::established(AssociationConfig::default());
    assert!(pair.client.is_client());
    assert!(!pair.server.is_client());
    assert_eq!(pair.client.poll_timeout(), None);
    assert_eq!(pair.server.poll_timeout(), None);
}

#[test]
fn test_association_init_is_sent_with_zero_tag() {
    let mut pair = Pair::new(AssociationConfig::default());
    pair.client.connect(pair.now).unwrap();
    assert_eq!(pair.client.state(), AssociationState::CookieWait);

    let packets = written(&mut pair.client);
    assert_eq!(packets.len(), 1);
    let p = Packet::unmarshal(&packets[0]).unwrap();
    assert_eq!(p.verification_tag, 0);
    assert!(matches!(&p.chunks[0], Chunk::Init(init) if !init.is_ack));
}

#[test]
fn test_association_init_retransmit_failure() {
    let config = AssociationConfig::default().with_max_init_retransmits(2);
    let mut pair = Pair::new(config);
    pair.client.connect(pair.now).unwrap();

    let mut n_inits = written(&mut pair.client).len();
    while pair.client.poll_timeout().is_some() {
        pair.fire_client_timer();
        n_inits += written(&mut pair.client).len();
    }

    assert_eq!(n_inits, 3);
    assert_eq!(pair.client.state(), AssociationState::Closed);
    assert_eq!(
        events(&mut pair.client),
        vec![AssociationEvent::Failed(Error::ErrHandshakeInitAck)]
    );
}

#[test]
fn test_association_lost_init_ack_is_recovered() {
    let mut pair = Pair::new(AssociationConfig::default());
    pair.client.connect(pair.now).unwrap();
    let init = written(&mut pair.client);
    pair.to_server(init);
    // INIT ACK lost
    assert_eq!(written(&mut pair.server).len(), 1);

    pair.fire_client_timer();
    pair.pump();
    assert!(pair.client.is_established());
    assert!(pair.server.is_established());
}

#[test]
fn test_association_write_before_established() {
    let mut pair = Pair::new(AssociationConfig::default());
    assert_eq!(
        pair.client.handle_write(msg(1, b"early")),
        Err(Error::ErrAssociationNotEstablished)
    );
}

#[test]
fn test_association_ordered_delivery_under_reorder() {
    let mut pair = Pair::established(AssociationConfig::default());

    for i in 0..3u8 {
        pair.client.handle_write(msg(1, &[i; 10])).unwrap();
    }
    let mut packets = written(&mut pair.client);
    assert_eq!(packets.len(), 3);
    packets.reverse();

    pair.to_server(vec![packets.remove(0)]);
    assert!(read_all(&mut pair.server).is_empty());
    pair.to_server(packets);

    let got = read_all(&mut pair.server);
    assert_eq!(got.len(), 3);
    for (i, m) in got.iter().enumerate() {
        assert_eq!(m.stream_id, 1);
        assert_eq!(m.ppi, PayloadProtocolIdentifier::Binary);
        assert_eq!(&m.payload[..], &[i as u8; 10]);
    }

    pair.pump();
    assert_eq!(pair.client.buffered_amount(), 0);
}

#[test]
fn test_association_unordered_delivery() {
    let mut pair = Pair::established(AssociationConfig::default());
    pair.client
        .set_reliability_params(2, true, ReliabilityType::Reliable, 0)
        .unwrap();

    pair.client.handle_write(msg(2, b"first")).unwrap();
    pair.client.handle_write(msg(2, b"second")).unwrap();
    let mut packets = written(&mut pair.client);
    packets.reverse();
    pair.to_server(packets);

    let got = read_all(&mut pair.server);
    assert_eq!(got.len(), 2);
    assert_eq!(&got[0].payload[..], b"second");
    assert_eq!(&got[1].payload[..], b"first");
}

#[test]
fn test_association_fragmentation() {
    let mut pair = Pair::established(AssociationConfig::default());
    let data: Vec<u8> = (0..3000u32).map(|i| (i % 251) as u8).collect();

    pair.client.handle_write(msg(3, &data)).unwrap();
    let packets = written(&mut pair.client);
    assert_eq!(packets.len(), 3);
    assert!(packets.iter().all(|p| p.len() <= 1228));

    pair.to_server(packets);
    let got = read_all(&mut pair.server);
    assert_eq!(got.len(), 1);
    assert_eq!(&got[0].payload[..], &data[..]);
}

#[test]
fn test_association_message_size_limit() {
    let mut pair = Pair::established(AssociationConfig::default());

    pair.client.set_remote_max_message_size(1000);
    assert_eq!(pair.client.max_message_size(), 1000);
    assert_eq!(
        pair.client.handle_write(msg(1, &[0u8; 1001])),
        Err(Error::ErrOutboundPacketTooLarge)
    );
    assert!(pair.client.handle_write(msg(1, &[0u8; 1000])).is_ok());

    pair.client.set_remote_max_message_size(0);
    assert_eq!(pair.client.max_message_size(), DEFAULT_MAX_MESSAGE_SIZE);
    pair.client.set_remote_max_message_size(u32::MAX);
    assert_eq!(pair.client.max_message_size(), DEFAULT_MAX_MESSAGE_SIZE);
}

#[test]
fn test_association_buffer_full() {
    let config = AssociationConfig::default().with_max_stream_buffered_amount(2000);
    let mut pair = Pair::established(config);

    // A single oversized write into an empty buffer is accepted.
    pair.client.handle_write(msg(1, &[1u8; 2500])).unwrap();
    assert_eq!(pair.client.stream_buffered_amount(1), 2500);
    assert_eq!(
        pair.client.handle_write(msg(1, &[2u8; 10])),
        Err(Error::ErrBufferFull)
    );
    // Other streams have their own budget.
    assert!(pair.client.handle_write(msg(2, &[3u8; 10])).is_ok());
    assert_eq!(pair.client.buffered_amount(), 2510);

    pair.pump();
    assert_eq!(pair.client.buffered_amount(), 0);
    assert!(pair.client.handle_write(msg(1, &[2u8; 10])).is_ok());
}

#[test]
fn test_association_buffered_amount_low() {
    let mut pair = Pair::established(AssociationConfig::default());
    pair.client.set_buffered_amount_low_threshold(4, 1000);

    pair.client.handle_write(msg(4, &[0u8; 1500])).unwrap();
    assert_eq!(pair.client.stream_buffered_amount(4), 1500);
    pair.pump();

    assert_eq!(pair.client.stream_buffered_amount(4), 0);
    assert_eq!(
        events(&mut pair.client),
        vec![AssociationEvent::BufferedAmountLow(4)]
    );

    // Staying under the threshold does not raise it again.
    pair.client.handle_write(msg(4, &[0u8; 500])).unwrap();
    pair.pump();
    assert!(events(&mut pair.client).is_empty());
}

#[test]
fn test_association_retransmit_on_t3() {
    let mut pair = Pair::established(AssociationConfig::default());

    pair.client.handle_write(msg(1, b"lost once")).unwrap();
    let lost = written(&mut pair.client);
    assert_eq!(lost.len(), 1);
    assert!(pair.client.poll_timeout().is_some());

    pair.fire_client_timer();
    pair.pump();

    let got = read_all(&mut pair.server);
    assert_eq!(got.len(), 1);
    assert_eq!(&got[0].payload[..], b"lost once");
    assert_eq!(pair.client.buffered_amount(), 0);
    assert_eq!(pair.client.poll_timeout(), None);
}

#[test]
fn test_association_rexmit_abandon_skips_message() {
    let mut pair = Pair::established(AssociationConfig::default());
    pair.client
        .set_reliability_params(5, false, ReliabilityType::Rexmit, 0)
        .unwrap();

    pair.client.handle_write(msg(5, b"dropped")).unwrap();
    let _lost = written(&mut pair.client);
    pair.client.handle_write(msg(5, b"kept")).unwrap();
    pair.pump();

    // The second message waits behind the missing first one.
    assert!(read_all(&mut pair.server).is_empty());

    pair.fire_client_timer();
    assert_eq!(pair.client.buffered_amount(), 4);
    pair.pump();

    let got = read_all(&mut pair.server);
    assert_eq!(got.len(), 1);
    assert_eq!(&got[0].payload[..], b"kept");
    assert_eq!(pair.client.buffered_amount(), 0);
    assert_eq!(pair.client.poll_timeout(), None);

    pair.client.handle_write(msg(5, b"next")).unwrap();
    pair.pump();
    let got = read_all(&mut pair.server);
    assert_eq!(got.len(), 1);
    assert_eq!(&got[0].payload[..], b"next");
}

#[test]
fn test_association_timed_abandon() {
    let mut pair = Pair::established(AssociationConfig::default());
    pair.client
        .set_reliability_params(6, true, ReliabilityType::Timed, 100)
        .unwrap();

    pair.client.handle_write(msg(6, b"stale")).unwrap();
    let _lost = written(&mut pair.client);

    pair.fire_client_timer();
    pair.pump();

    assert!(read_all(&mut pair.server).is_empty());
    assert_eq!(pair.client.buffered_amount(), 0);
    assert_eq!(pair.client.poll_timeout(), None);

    pair.client.handle_write(msg(6, b"fresh")).unwrap();
    pair.pump();
    let got = read_all(&mut pair.server);
    assert_eq!(got.len(), 1);
    assert_eq!(&got[0].payload[..], b"fresh");
}

#[test]
fn test_association_duplicate_data() {
    let mut pair = Pair::established(AssociationConfig::default());

    pair.client.handle_write(msg(1, b"once")).unwrap();
    let packets = written(&mut pair.client);
    pair.to_server(packets.clone());
    let first_acks = written(&mut pair.server);
    pair.to_server(packets);
    let second_acks = written(&mut pair.server);

    assert_eq!(read_all(&mut pair.server).len(), 1);

    let first = sacks(&first_acks);
    let second = sacks(&second_acks);
    assert_eq!(first.len(), 1);
    assert!(first[0].duplicate_tsn.is_empty());
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].duplicate_tsn.len(), 1);
    assert_eq!(second[0].cumulative_tsn_ack, first[0].cumulative_tsn_ack);
}

#[test]
fn test_association_sack_gap_blocks() {
    let mut pair = Pair::established(AssociationConfig::default());

    for i in 0..3u8 {
        pair.client.handle_write(msg(1, &[i])).unwrap();
    }
    let mut packets = written(&mut pair.client);
    let first = packets.remove(0);
    pair.to_server(packets);

    let acks = sacks(&written(&mut pair.server));
    let last = acks.last().unwrap();
    assert_eq!(last.gap_ack_blocks, vec![GapAckBlock { start: 2, end: 3 }]);

    pair.to_server(vec![first]);
    let acks = sacks(&written(&mut pair.server));
    assert!(acks[0].gap_ack_blocks.is_empty());
    assert_eq!(read_all(&mut pair.server).len(), 3);
}

#[test]
fn test_association_stream_reset() {
    let mut pair = Pair::established(AssociationConfig::default());

    pair.client.handle_write(msg(7, b"before reset")).unwrap();
    pair.pump();
    assert_eq!(read_all(&mut pair.server).len(), 1);
    // the acked message drained the stream buffer
    assert_eq!(
        events(&mut pair.client),
        vec![AssociationEvent::BufferedAmountLow(7)]
    );

    pair.client.reset_stream(7).unwrap();
    assert_eq!(
        pair.client.handle_write(msg(7, b"after")),
        Err(Error::ErrStreamClosed)
    );
    pair.pump();
    assert_eq!(
        events(&mut pair.server),
        vec![AssociationEvent::StreamReset(7)]
    );

    pair.server.reset_stream(7).unwrap();
    pair.pump();
    assert_eq!(
        events(&mut pair.client),
        vec![AssociationEvent::StreamReset(7)]
    );
    assert!(pair.client.stream(7).is_none());
    assert!(pair.server.stream(7).is_none());
    assert_eq!(pair.client.poll_timeout(), None);
}

#[test]
fn test_association_reset_waits_for_data() {
    let mut pair = Pair::established(AssociationConfig::default());

    pair.client.handle_write(msg(8, b"in flight")).unwrap();
    let data = written(&mut pair.client);
    pair.client.reset_stream(8).unwrap();
    let reset = written(&mut pair.client);

    pair.to_server(reset);
    assert!(events(&mut pair.server).is_empty());

    pair.to_server(data);
    assert_eq!(read_all(&mut pair.server).len(), 1);
    assert_eq!(
        events(&mut pair.server),
        vec![AssociationEvent::StreamReset(8)]
    );
}

#[test]
fn test_association_reset_unknown_stream() {
    let mut pair = Pair::established(AssociationConfig::default());
    assert_eq!(pair.client.reset_stream(9), Err(Error::ErrStreamNotExisted));
}

#[test]
fn test_association_abort() {
    let mut pair = Pair::established(AssociationConfig::default());

    pair.client.close().unwrap();
    assert_eq!(pair.client.state(), AssociationState::Closed);
    pair.pump();

    assert!(events(&mut pair.client).is_empty());
    assert_eq!(pair.server.state(), AssociationState::Closed);
    assert_eq!(
        events(&mut pair.server),
        vec![AssociationEvent::Failed(Error::ErrAssociationAborted)]
    );

    // Closing twice is harmless.
    pair.client.close().unwrap();
    assert!(written(&mut pair.client).is_empty());
}

#[test]
fn test_association_drops_foreign_verification_tag() {
    let mut pair = Pair::established(AssociationConfig::default());

    let forged = Packet {
        source_port: 5000,
        destination_port: 5000,
        verification_tag: pair.server.my_verification_tag.wrapping_add(1),
        chunks: vec![Association::abort_chunk()],
    };
    pair.to_server(vec![forged.marshal()]);

    assert!(pair.server.is_established());
    assert!(events(&mut pair.server).is_empty());
}

#[test]
fn test_association_drops_corrupted_packet() {
    let mut pair = Pair::established(AssociationConfig::default());

    pair.client.handle_write(msg(1, b"payload")).unwrap();
    let mut packets = written(&mut pair.client);
    let last = packets[0].len() - 1;
    packets[0][last] ^= 0xff;
    pair.to_server(packets);

    assert!(read_all(&mut pair.server).is_empty());
    assert!(written(&mut pair.server).is_empty());
}

#[test]
fn test_association_application_backlog_closes_window() {
    let config = AssociationConfig::default().with_max_receive_buffer_size(2048);
    let mut pair = Pair::established(config);

    pair.client.handle_write(msg(2, &[1u8; 1500])).unwrap();
    pair.pump();
    assert_eq!(read_all(&mut pair.server).len(), 1);
    pair.server.set_application_backlog(1500);

    // 548 bytes of window left, the next message is dropped
    pair.client.handle_write(msg(2, &[2u8; 600])).unwrap();
    let packets = written(&mut pair.client);
    pair.to_server(packets);
    assert!(read_all(&mut pair.server).is_empty());
    let acks = sacks(&written(&mut pair.server));
    assert_eq!(acks.last().unwrap().advertised_receiver_window_credit, 548);

    // the application caught up, the window update goes out unprompted
    pair.server.set_application_backlog(0);
    let update = written(&mut pair.server);
    let acks = sacks(&update);
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0].advertised_receiver_window_credit, 2048);
    pair.to_client(update);

    pair.fire_client_timer();
    pair.pump();
    let delivered = read_all(&mut pair.server);
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].payload.len(), 600);
}
