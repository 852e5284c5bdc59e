#[cfg(test)]
mod association_test;

mod association_proto;

use crate::chunk::Chunk;
use crate::chunk::chunk_abort::{ChunkAbort, ErrorCause, USER_INITIATED_ABORT};
use crate::chunk::chunk_cookie::ChunkCookieEcho;
use crate::chunk::chunk_forward_tsn::{ChunkForwardTsn, ChunkForwardTsnStream};
use crate::chunk::chunk_init::ChunkInit;
use crate::chunk::chunk_payload_data::ChunkPayloadData;
use crate::chunk::chunk_reconfig::{ChunkReconfig, ReconfigParam, ReconfigResult};
use crate::chunk::chunk_selective_ack::{ChunkSelectiveAck, GapAckBlock};
use crate::config::AssociationConfig;
use crate::packet::{PACKET_HEADER_SIZE, Packet};
use crate::queue::payload_queue::{OutboundChunk, PayloadQueue};
use crate::stream::{ReliabilityType, Stream, StreamMessage};
use crate::timer::rtx_timer::{RtoManager, RtxTimer, RtxTimerId, TimerOutcome};
use crate::util::*;

use bytes::{Bytes, BytesMut};
use log::{debug, trace, warn};
use shared::error::{Error, Result};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::time::{Duration, Instant};

const COOKIE_LENGTH: usize = 32;
const MAX_STREAMS: u16 = u16::MAX;

/// Association states, reduced to what a DTLS-carried association needs.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum AssociationState {
    #[default]
    Closed,
    CookieWait,
    CookieEchoed,
    Established,
}

impl fmt::Display for AssociationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            AssociationState::Closed => "Closed",
            AssociationState::CookieWait => "CookieWait",
            AssociationState::CookieEchoed => "CookieEchoed",
            AssociationState::Established => "Established",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, PartialEq)]
pub enum AssociationEvent {
    /// The four-way setup completed.
    Connected,
    /// A stream's buffered amount fell to its low threshold.
    BufferedAmountLow(u16),
    /// The peer reset the incoming half of a stream.
    StreamReset(u16),
    /// The association is gone: setup timed out or the peer aborted.
    Failed(Error),
}

#[derive(Debug, Clone)]
struct OutgoingResetRequest {
    request_sequence_number: u32,
    sender_last_tsn: u32,
    stream_identifiers: Vec<u16>,
}

/// A sans-I/O SCTP association over a secured datagram transport.
///
/// The DTLS client side calls [`Association::connect`]; the other side waits for INIT.
pub struct Association {
    config: AssociationConfig,
    is_client: bool,
    state: AssociationState,
    now: Instant,

    my_verification_tag: u32,
    peer_verification_tag: u32,
    my_next_tsn: u32,
    peer_last_tsn: u32,
    received_tsns: HashSet<u32>,
    duplicate_tsns: Vec<u32>,
    my_cookie: Option<Bytes>,
    stored_init: Option<ChunkInit>,
    stored_cookie_echo: Option<ChunkCookieEcho>,
    peer_rwnd: u32,
    max_message_size: u32,
    use_forward_tsn: bool,

    streams: HashMap<u16, Stream>,
    inflight: PayloadQueue,
    next_message_id: u64,
    cumulative_tsn_ack_point: u32,
    advanced_peer_tsn_ack_point: u32,
    buffered_amount: usize,
    application_backlog: usize,

    rto_mgr: RtoManager,
    t1_init: RtxTimer,
    t1_cookie: RtxTimer,
    t3_rtx: RtxTimer,
    t_reconfig: RtxTimer,

    ack_needed: bool,
    will_send_forward_tsn: bool,

    my_next_rsn: u32,
    peer_next_rsn: u32,
    streams_to_reset: Vec<u16>,
    outgoing_reset_request: Option<OutgoingResetRequest>,
    incoming_reset_requests: Vec<OutgoingResetRequest>,

    control_queue: VecDeque<Chunk>,
    readable_streams: Vec<u16>,
    read_outs: VecDeque<StreamMessage>,
    write_outs: VecDeque<BytesMut>,
    event_outs: VecDeque<AssociationEvent>,
}

impl fmt::Debug for Association {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Association")
            .field("is_client", &self.is_client)
            .field("state", &self.state)
            .field("my_verification_tag", &self.my_verification_tag)
            .field("peer_verification_tag", &self.peer_verification_tag)
            .field("my_next_tsn", &self.my_next_tsn)
            .field("peer_last_tsn", &self.peer_last_tsn)
            .field("streams", &self.streams.len())
            .field("inflight", &self.inflight.len())
            .finish()
    }
}

impl Association {
    pub fn new(config: AssociationConfig, is_client: bool, now: Instant) -> Self {
        let my_verification_tag = rand::random_range(1..=u32::MAX);
        let my_next_tsn = rand::random::<u32>();
        let rto_mgr = RtoManager::new(config.rto_initial(), config.rto_min(), config.rto_max());
        let max_init_retransmits = config.max_init_retransmits();
        let max_message_size = config.max_message_size();

        Association {
            config,
            is_client,
            state: AssociationState::Closed,
            now,

            my_verification_tag,
            peer_verification_tag: 0,
            my_next_tsn,
            peer_last_tsn: 0,
            received_tsns: HashSet::new(),
            duplicate_tsns: vec![],
            my_cookie: None,
            stored_init: None,
            stored_cookie_echo: None,
            peer_rwnd: 0,
            max_message_size,
            use_forward_tsn: false,

            streams: HashMap::new(),
            inflight: PayloadQueue::default(),
            next_message_id: 0,
            cumulative_tsn_ack_point: my_next_tsn.wrapping_sub(1),
            advanced_peer_tsn_ack_point: my_next_tsn.wrapping_sub(1),
            buffered_amount: 0,
            application_backlog: 0,

            rto_mgr,
            t1_init: RtxTimer::new(Some(max_init_retransmits)),
            t1_cookie: RtxTimer::new(Some(max_init_retransmits)),
            t3_rtx: RtxTimer::new(None),
            t_reconfig: RtxTimer::new(None),

            ack_needed: false,
            will_send_forward_tsn: false,

            my_next_rsn: my_next_tsn,
            peer_next_rsn: 0,
            streams_to_reset: vec![],
            outgoing_reset_request: None,
            incoming_reset_requests: vec![],

            control_queue: VecDeque::new(),
            readable_streams: vec![],
            read_outs: VecDeque::new(),
            write_outs: VecDeque::new(),
            event_outs: VecDeque::new(),
        }
    }

    pub fn state(&self) -> AssociationState {
        self.state
    }

    pub fn is_client(&self) -> bool {
        self.is_client
    }

    pub fn is_established(&self) -> bool {
        self.state == AssociationState::Established
    }

    /// The negotiated maximum message size.
    pub fn max_message_size(&self) -> u32 {
        self.max_message_size
    }

    /// Applies the peer's advertised `a=max-message-size`; zero means unlimited.
    pub fn set_remote_max_message_size(&mut self, remote: u32) {
        if remote > 0 {
            self.max_message_size = self.config.max_message_size().min(remote);
        } else {
            self.max_message_size = self.config.max_message_size();
        }
    }

    /// Total bytes queued or in flight across all streams.
    pub fn buffered_amount(&self) -> usize {
        self.buffered_amount
    }

    pub fn stream(&self, stream_identifier: u16) -> Option<&Stream> {
        self.streams.get(&stream_identifier)
    }

    pub fn stream_buffered_amount(&self, stream_identifier: u16) -> usize {
        self.streams
            .get(&stream_identifier)
            .map_or(0, |s| s.buffered_amount)
    }

    /// Sets how many bytes of messages already returned by `poll_read` the
    /// application still holds. They count against the receive window, so a
    /// reader that falls behind slows the peer down instead of growing the
    /// backlog. Reopening a closed window is announced with a SACK.
    pub fn set_application_backlog(&mut self, bytes: usize) {
        let window_before = self.receive_window();
        self.application_backlog = bytes;

        let reopen_at = self.config.max_receive_buffer_size() as usize / 2;
        if self.state == AssociationState::Established
            && window_before < reopen_at
            && self.receive_window() >= reopen_at
        {
            trace!(
                "[{}] receive window reopened to {}",
                self.side(),
                self.receive_window()
            );
            self.ack_needed = true;
            self.flush();
        }
    }

    pub fn set_buffered_amount_low_threshold(&mut self, stream_identifier: u16, threshold: usize) {
        self.get_or_create_stream(stream_identifier)
            .buffered_amount_low = threshold;
    }

    /// Sets how messages written on a stream from now on are ordered and retransmitted.
    pub fn set_reliability_params(
        &mut self,
        stream_identifier: u16,
        unordered: bool,
        reliability_type: ReliabilityType,
        reliability_value: u32,
    ) -> Result<()> {
        let s = self.get_or_create_stream(stream_identifier);
        if s.local_reset {
            return Err(Error::ErrStreamClosed);
        }
        debug!(
            "[{}] reliability params: sid={} unordered={} type={} value={}",
            self.side(),
            stream_identifier,
            unordered,
            reliability_type,
            reliability_value
        );
        let s = self.get_or_create_stream(stream_identifier);
        s.unordered = unordered;
        s.reliability_type = reliability_type;
        s.reliability_value = reliability_value;
        Ok(())
    }

    /// Starts the four-way setup by sending INIT.
    pub fn connect(&mut self, now: Instant) -> Result<()> {
        if self.state != AssociationState::Closed || self.stored_init.is_some() {
            return Ok(());
        }
        self.now = now;

        let init = ChunkInit {
            is_ack: false,
            initiate_tag: self.my_verification_tag,
            advertised_receiver_window_credit: self.config.max_receive_buffer_size(),
            num_outbound_streams: MAX_STREAMS,
            num_inbound_streams: MAX_STREAMS,
            initial_tsn: self.my_next_tsn,
            ..Default::default()
        }
        .with_extensions();
        self.stored_init = Some(init);

        self.set_state(AssociationState::CookieWait);
        self.send_init();
        self.t1_init
            .start(self.now, self.rto_mgr.get_rto(), self.rto_mgr.rto_max());
        Ok(())
    }

    /// Resets the outgoing half of a stream. Further writes on it fail.
    pub fn reset_stream(&mut self, stream_identifier: u16) -> Result<()> {
        if self.state != AssociationState::Established {
            return Err(Error::ErrAssociationNotEstablished);
        }
        let s = self
            .streams
            .get_mut(&stream_identifier)
            .ok_or(Error::ErrStreamNotExisted)?;
        if s.local_reset {
            return Ok(());
        }
        s.local_reset = true;
        self.streams_to_reset.push(stream_identifier);
        self.send_reset_request();
        self.flush();
        Ok(())
    }

    fn side(&self) -> &'static str {
        if self.is_client { "client" } else { "server" }
    }

    fn set_state(&mut self, state: AssociationState) {
        if self.state != state {
            debug!("[{}] state change: '{}' => '{}'", self.side(), self.state, state);
            self.state = state;
        }
    }

    fn get_or_create_stream(&mut self, stream_identifier: u16) -> &mut Stream {
        self.streams
            .entry(stream_identifier)
            .or_insert_with(|| Stream::new(stream_identifier))
    }

    fn send_init(&mut self) {
        if let Some(init) = self.stored_init.clone() {
            debug!("[{}] sending INIT", self.side());
            self.write_outs.push_back(
                Packet {
                    source_port: self.config.sctp_port(),
                    destination_port: self.config.sctp_port(),
                    verification_tag: 0,
                    chunks: vec![Chunk::Init(init)],
                }
                .marshal(),
            );
        }
    }

    fn send_cookie_echo(&mut self) {
        if let Some(cookie_echo) = self.stored_cookie_echo.clone() {
            debug!("[{}] sending COOKIE-ECHO", self.side());
            self.control_queue.push_back(Chunk::CookieEcho(cookie_echo));
        }
    }

    fn init_ack(&self) -> ChunkInit {
        ChunkInit {
            is_ack: true,
            initiate_tag: self.my_verification_tag,
            advertised_receiver_window_credit: self.config.max_receive_buffer_size(),
            num_outbound_streams: MAX_STREAMS,
            num_inbound_streams: MAX_STREAMS,
            initial_tsn: self.my_next_tsn,
            state_cookie: self.my_cookie.clone(),
            ..Default::default()
        }
        .with_extensions()
    }

    fn handle_chunk(&mut self, chunk: Chunk) -> Result<()> {
        trace!("[{}] recv {}", self.side(), chunk);
        match chunk {
            Chunk::Init(init) if !init.is_ack => self.handle_init(init),
            Chunk::Init(init_ack) => self.handle_init_ack(init_ack),
            Chunk::CookieEcho(cookie_echo) => self.handle_cookie_echo(cookie_echo),
            Chunk::CookieAck => self.handle_cookie_ack(),
            Chunk::PayloadData(d) => self.handle_data(d),
            Chunk::SelectiveAck(s) => self.handle_sack(s),
            Chunk::ForwardTsn(f) => self.handle_forward_tsn(f),
            Chunk::Reconfig(r) => self.handle_reconfig(r),
            Chunk::Abort(_) => self.handle_abort(),
        }
    }

    fn handle_init(&mut self, init: ChunkInit) -> Result<()> {
        if self.is_client {
            debug!("[{}] ignoring INIT, the client initiates", self.side());
            return Ok(());
        }

        match self.state {
            AssociationState::Closed => {
                if self.peer_verification_tag != init.initiate_tag || self.my_cookie.is_none() {
                    let cookie: [u8; COOKIE_LENGTH] = rand::random();
                    self.my_cookie = Some(Bytes::copy_from_slice(&cookie));
                }
                self.peer_verification_tag = init.initiate_tag;
                self.peer_last_tsn = init.initial_tsn.wrapping_sub(1);
                self.peer_next_rsn = init.initial_tsn;
                self.peer_rwnd = init.advertised_receiver_window_credit;
                self.use_forward_tsn = init.forward_tsn_supported;
            }
            AssociationState::Established if init.initiate_tag == self.peer_verification_tag => {
                debug!("[{}] duplicate INIT, resending INIT-ACK", self.side());
            }
            _ => {
                debug!("[{}] ignoring INIT in state {}", self.side(), self.state);
                return Ok(());
            }
        }

        self.control_queue.push_back(Chunk::Init(self.init_ack()));
        Ok(())
    }

    fn handle_init_ack(&mut self, init_ack: ChunkInit) -> Result<()> {
        if self.state != AssociationState::CookieWait {
            trace!("[{}] ignoring INIT-ACK in state {}", self.side(), self.state);
            return Ok(());
        }
        let cookie = init_ack.state_cookie.ok_or(Error::ErrHandshakeInitAck)?;

        self.t1_init.stop();
        self.stored_init = None;
        self.peer_verification_tag = init_ack.initiate_tag;
        self.peer_last_tsn = init_ack.initial_tsn.wrapping_sub(1);
        self.peer_next_rsn = init_ack.initial_tsn;
        self.peer_rwnd = init_ack.advertised_receiver_window_credit;
        self.use_forward_tsn = init_ack.forward_tsn_supported;

        self.stored_cookie_echo = Some(ChunkCookieEcho { cookie });
        self.send_cookie_echo();
        self.set_state(AssociationState::CookieEchoed);
        self.t1_cookie
            .start(self.now, self.rto_mgr.get_rto(), self.rto_mgr.rto_max());
        Ok(())
    }

    fn handle_cookie_echo(&mut self, cookie_echo: ChunkCookieEcho) -> Result<()> {
        if self.my_cookie.as_ref() != Some(&cookie_echo.cookie) {
            debug!("[{}] COOKIE-ECHO does not match, dropped", self.side());
            return Ok(());
        }

        match self.state {
            AssociationState::Closed => {
                self.set_state(AssociationState::Established);
                self.event_outs.push_back(AssociationEvent::Connected);
            }
            AssociationState::Established => {
                debug!("[{}] duplicate COOKIE-ECHO, resending COOKIE-ACK", self.side());
            }
            _ => return Ok(()),
        }

        self.control_queue.push_back(Chunk::CookieAck);
        Ok(())
    }

    fn handle_cookie_ack(&mut self) -> Result<()> {
        if self.state != AssociationState::CookieEchoed {
            return Ok(());
        }
        self.t1_cookie.stop();
        self.stored_cookie_echo = None;
        self.set_state(AssociationState::Established);
        self.event_outs.push_back(AssociationEvent::Connected);
        Ok(())
    }

    fn handle_abort(&mut self) -> Result<()> {
        warn!("[{}] association aborted by peer", self.side());
        self.teardown();
        self.event_outs
            .push_back(AssociationEvent::Failed(Error::ErrAssociationAborted));
        Ok(())
    }

    fn receive_buffer_used(&self) -> usize {
        self.streams
            .values()
            .map(|s| s.reassembly_queue.buffered_amount())
            .sum::<usize>()
            + self.application_backlog
    }

    fn receive_window(&self) -> usize {
        (self.config.max_receive_buffer_size() as usize).saturating_sub(self.receive_buffer_used())
    }

    fn handle_data(&mut self, d: ChunkPayloadData) -> Result<()> {
        if self.state != AssociationState::Established {
            return Err(Error::ErrAssociationNotEstablished);
        }
        self.ack_needed = true;

        if sna32lte(d.tsn, self.peer_last_tsn) || self.received_tsns.contains(&d.tsn) {
            trace!("[{}] duplicate tsn={}", self.side(), d.tsn);
            self.duplicate_tsns.push(d.tsn);
            return Ok(());
        }

        if self.receive_buffer_used() + d.user_data.len()
            > self.config.max_receive_buffer_size() as usize
        {
            debug!("[{}] receive buffer full, dropping tsn={}", self.side(), d.tsn);
            return Ok(());
        }

        let tsn = d.tsn;
        let stream_identifier = d.stream_identifier;
        let s = self.get_or_create_stream(stream_identifier);
        s.reassembly_queue.push(d);
        if !self.readable_streams.contains(&stream_identifier) {
            self.readable_streams.push(stream_identifier);
        }

        self.received_tsns.insert(tsn);
        self.advance_peer_last_tsn();
        Ok(())
    }

    fn advance_peer_last_tsn(&mut self) {
        while self
            .received_tsns
            .remove(&self.peer_last_tsn.wrapping_add(1))
        {
            self.peer_last_tsn = self.peer_last_tsn.wrapping_add(1);
        }
        self.process_incoming_reset_requests();
    }

    fn handle_sack(&mut self, sack: ChunkSelectiveAck) -> Result<()> {
        if self.state != AssociationState::Established {
            return Ok(());
        }
        if sna32lt(sack.cumulative_tsn_ack, self.cumulative_tsn_ack_point) {
            trace!(
                "[{}] stale SACK cumTsnAck={} < {}",
                self.side(),
                sack.cumulative_tsn_ack,
                self.cumulative_tsn_ack_point
            );
            return Ok(());
        }
        if sna32gte(sack.cumulative_tsn_ack, self.my_next_tsn) {
            return Err(Error::Other(format!(
                "SACK acknowledges unsent tsn {}",
                sack.cumulative_tsn_ack
            )));
        }

        let now = self.now;
        let mut rtt = None;
        let mut released: Vec<(u16, usize)> = vec![];

        for c in self.inflight.pop_through(sack.cumulative_tsn_ack) {
            if rtt.is_none() && !c.acked && c.nsent == 1 {
                rtt = c.sent_at.map(|t| now.saturating_duration_since(t));
            }
            if !c.abandoned {
                released.push((c.chunk.stream_identifier, c.len()));
            }
        }

        for g in &sack.gap_ack_blocks {
            let start = sack.cumulative_tsn_ack.wrapping_add(g.start as u32);
            let end = sack.cumulative_tsn_ack.wrapping_add(g.end as u32);
            for c in self.inflight.mark_acked(start, end) {
                if rtt.is_none() && c.nsent == 1 {
                    rtt = c.sent_at.map(|t| now.saturating_duration_since(t));
                }
            }
        }

        if let Some(rtt) = rtt {
            let srtt = self.rto_mgr.set_new_rtt(rtt);
            trace!(
                "[{}] SACK: measured-rtt={:?} srtt={} new-rto={:?}",
                self.side(),
                rtt,
                srtt,
                self.rto_mgr.get_rto()
            );
        }

        for (stream_identifier, n) in released {
            self.release_buffered_amount(stream_identifier, n);
        }

        let advanced = sna32gt(sack.cumulative_tsn_ack, self.cumulative_tsn_ack_point);
        self.cumulative_tsn_ack_point = sack.cumulative_tsn_ack;
        if sna32lt(self.advanced_peer_tsn_ack_point, self.cumulative_tsn_ack_point) {
            self.advanced_peer_tsn_ack_point = self.cumulative_tsn_ack_point;
        }

        let outstanding = self.inflight.outstanding_bytes() as u32;
        self.peer_rwnd = sack
            .advertised_receiver_window_credit
            .saturating_sub(outstanding);

        self.update_advanced_peer_ack_point();

        if self.inflight.has_outstanding() {
            if advanced {
                self.t3_rtx
                    .restart(self.now, self.rto_mgr.get_rto(), self.rto_mgr.rto_max());
            }
        } else if self.inflight.is_empty() {
            self.t3_rtx.stop();
        } else {
            // Only abandoned chunks remain; keep the timer for FORWARD TSN.
            self.t3_rtx
                .start(self.now, self.rto_mgr.get_rto(), self.rto_mgr.rto_max());
        }
        Ok(())
    }

    fn release_buffered_amount(&mut self, stream_identifier: u16, n: usize) {
        self.buffered_amount = self.buffered_amount.saturating_sub(n);
        if let Some(s) = self.streams.get_mut(&stream_identifier) {
            if s.release(n) {
                self.event_outs
                    .push_back(AssociationEvent::BufferedAmountLow(stream_identifier));
            }
        }
    }

    /// Whether the chunk's message should no longer be (re)transmitted.
    fn should_abandon(&self, c: &OutboundChunk) -> bool {
        match c.reliability_type {
            ReliabilityType::Reliable => false,
            ReliabilityType::Rexmit => c.nsent > c.reliability_value,
            ReliabilityType::Timed => {
                self.now.saturating_duration_since(c.since)
                    >= Duration::from_millis(c.reliability_value as u64)
            }
        }
    }

    fn abandon_message(&mut self, message_id: u64) {
        let mut released: Vec<(u16, usize)> = vec![];
        for c in self.inflight.iter_mut() {
            if c.message_id == message_id && !c.abandoned && !c.acked {
                c.abandoned = true;
                c.retransmit = false;
                released.push((c.chunk.stream_identifier, c.len()));
            }
        }
        if !released.is_empty() {
            debug!("[{}] abandoned message {}", self.side(), message_id);
        }
        for (stream_identifier, n) in released {
            self.release_buffered_amount(stream_identifier, n);
        }
    }

    /// Moves the advanced peer ack point over abandoned chunks (RFC 3758 C2).
    fn update_advanced_peer_ack_point(&mut self) {
        if !self.use_forward_tsn {
            return;
        }
        for c in self.inflight.iter() {
            if c.chunk.tsn != self.advanced_peer_tsn_ack_point.wrapping_add(1) {
                if sna32lte(c.chunk.tsn, self.advanced_peer_tsn_ack_point) {
                    continue;
                }
                break;
            }
            if !c.abandoned {
                break;
            }
            self.advanced_peer_tsn_ack_point = c.chunk.tsn;
        }
        if sna32gt(
            self.advanced_peer_tsn_ack_point,
            self.cumulative_tsn_ack_point,
        ) {
            self.will_send_forward_tsn = true;
        }
    }

    fn create_forward_tsn(&self) -> ChunkForwardTsn {
        // RFC 3758 C4: report the largest skipped SSN of each ordered stream.
        let mut last_ssns: HashMap<u16, u16> = HashMap::new();
        for c in self.inflight.iter() {
            if sna32gt(c.chunk.tsn, self.advanced_peer_tsn_ack_point) {
                break;
            }
            if !c.abandoned || c.chunk.unordered {
                continue;
            }
            let ssn = c.chunk.stream_sequence_number;
            last_ssns
                .entry(c.chunk.stream_identifier)
                .and_modify(|s| {
                    if sna16lt(*s, ssn) {
                        *s = ssn;
                    }
                })
                .or_insert(ssn);
        }

        let mut streams: Vec<ChunkForwardTsnStream> = last_ssns
            .into_iter()
            .map(|(identifier, sequence)| ChunkForwardTsnStream {
                identifier,
                sequence,
            })
            .collect();
        streams.sort_by_key(|s| s.identifier);

        ChunkForwardTsn {
            new_cumulative_tsn: self.advanced_peer_tsn_ack_point,
            streams,
        }
    }

    fn handle_forward_tsn(&mut self, f: ChunkForwardTsn) -> Result<()> {
        if self.state != AssociationState::Established {
            return Ok(());
        }
        self.ack_needed = true;

        if sna32lte(f.new_cumulative_tsn, self.peer_last_tsn) {
            trace!("[{}] stale FORWARD-TSN {}", self.side(), f.new_cumulative_tsn);
            return Ok(());
        }

        debug!(
            "[{}] FORWARD-TSN {} => {}",
            self.side(),
            self.peer_last_tsn,
            f.new_cumulative_tsn
        );
        let new_cumulative_tsn = f.new_cumulative_tsn;
        self.received_tsns
            .retain(|tsn| sna32gt(*tsn, new_cumulative_tsn));
        self.peer_last_tsn = new_cumulative_tsn;

        for fs in &f.streams {
            if let Some(s) = self.streams.get_mut(&fs.identifier) {
                s.reassembly_queue.forward_tsn_for_ordered(fs.sequence);
            }
        }
        let mut stream_ids: Vec<u16> = self.streams.keys().copied().collect();
        stream_ids.sort_unstable();
        for id in stream_ids {
            if let Some(s) = self.streams.get_mut(&id) {
                s.reassembly_queue
                    .forward_tsn_for_unordered(new_cumulative_tsn);
            }
            if !self.readable_streams.contains(&id) {
                self.readable_streams.push(id);
            }
        }

        self.advance_peer_last_tsn();
        Ok(())
    }

    fn send_reset_request(&mut self) {
        if self.outgoing_reset_request.is_some() || self.streams_to_reset.is_empty() {
            return;
        }
        let request = OutgoingResetRequest {
            request_sequence_number: self.my_next_rsn,
            sender_last_tsn: self.my_next_tsn.wrapping_sub(1),
            stream_identifiers: std::mem::take(&mut self.streams_to_reset),
        };
        self.my_next_rsn = self.my_next_rsn.wrapping_add(1);
        debug!(
            "[{}] sending reset request rsn={} streams={:?}",
            self.side(),
            request.request_sequence_number,
            request.stream_identifiers
        );
        self.outgoing_reset_request = Some(request);
        self.queue_reset_request();
        self.t_reconfig
            .start(self.now, self.rto_mgr.get_rto(), self.rto_mgr.rto_max());
    }

    fn queue_reset_request(&mut self) {
        if let Some(request) = &self.outgoing_reset_request {
            self.control_queue.push_back(Chunk::Reconfig(ChunkReconfig {
                params: vec![ReconfigParam::OutgoingResetRequest {
                    reconfig_request_sequence_number: request.request_sequence_number,
                    reconfig_response_sequence_number: self.peer_next_rsn.wrapping_sub(1),
                    sender_last_tsn: request.sender_last_tsn,
                    stream_identifiers: request.stream_identifiers.clone(),
                }],
            }));
        }
    }

    fn handle_reconfig(&mut self, r: ChunkReconfig) -> Result<()> {
        if self.state != AssociationState::Established {
            return Ok(());
        }
        for param in r.params {
            match param {
                ReconfigParam::OutgoingResetRequest {
                    reconfig_request_sequence_number,
                    sender_last_tsn,
                    stream_identifiers,
                    ..
                } => self.handle_reset_request(OutgoingResetRequest {
                    request_sequence_number: reconfig_request_sequence_number,
                    sender_last_tsn,
                    stream_identifiers,
                }),
                ReconfigParam::Response {
                    reconfig_response_sequence_number,
                    result,
                } => self.handle_reconfig_response(reconfig_response_sequence_number, result),
            }
        }
        Ok(())
    }

    fn handle_reset_request(&mut self, request: OutgoingResetRequest) {
        let rsn = request.request_sequence_number;

        if sna32lt(rsn, self.peer_next_rsn) {
            trace!("[{}] duplicate reset request rsn={}", self.side(), rsn);
            self.queue_reconfig_response(rsn, ReconfigResult::SuccessPerformed);
            return;
        }
        if rsn != self.peer_next_rsn {
            self.queue_reconfig_response(rsn, ReconfigResult::ErrorBadSequenceNumber);
            return;
        }

        if !self
            .incoming_reset_requests
            .iter()
            .any(|r| r.request_sequence_number == rsn)
        {
            self.incoming_reset_requests.push(request);
        }
        if !self.process_incoming_reset_requests() {
            self.queue_reconfig_response(rsn, ReconfigResult::InProgress);
        }
    }

    /// Performs queued incoming resets whose data has fully arrived.
    /// Returns whether any request was performed.
    fn process_incoming_reset_requests(&mut self) -> bool {
        let mut performed = false;
        while let Some(pos) = self.incoming_reset_requests.iter().position(|r| {
            r.request_sequence_number == self.peer_next_rsn
                && sna32lte(r.sender_last_tsn, self.peer_last_tsn)
        }) {
            let request = self.incoming_reset_requests.remove(pos);
            for id in &request.stream_identifiers {
                if let Some(s) = self.streams.get_mut(id) {
                    while let Some((ppi, payload)) = s.reassembly_queue.read() {
                        self.read_outs.push_back(StreamMessage {
                            stream_id: *id,
                            ppi,
                            payload,
                        });
                    }
                    s.reassembly_queue.reset();
                    s.remote_reset = true;
                }
                debug!("[{}] stream {} reset by peer", self.side(), id);
                self.event_outs.push_back(AssociationEvent::StreamReset(*id));
                self.remove_stream_if_closed(*id);
            }
            self.queue_reconfig_response(
                request.request_sequence_number,
                ReconfigResult::SuccessPerformed,
            );
            self.peer_next_rsn = self.peer_next_rsn.wrapping_add(1);
            performed = true;
        }
        performed
    }

    fn queue_reconfig_response(&mut self, rsn: u32, result: ReconfigResult) {
        self.control_queue.push_back(Chunk::Reconfig(ChunkReconfig {
            params: vec![ReconfigParam::Response {
                reconfig_response_sequence_number: rsn,
                result,
            }],
        }));
    }

    fn handle_reconfig_response(&mut self, rsn: u32, result: ReconfigResult) {
        let Some(request) = self.outgoing_reset_request.as_ref() else {
            return;
        };
        if request.request_sequence_number != rsn {
            return;
        }

        match result {
            ReconfigResult::SuccessPerformed | ReconfigResult::SuccessNop => {
                let stream_identifiers = request.stream_identifiers.clone();
                self.outgoing_reset_request = None;
                self.t_reconfig.stop();
                for id in stream_identifiers {
                    if let Some(s) = self.streams.get_mut(&id) {
                        s.next_ssn = 0;
                    }
                    self.remove_stream_if_closed(id);
                }
                self.send_reset_request();
            }
            ReconfigResult::InProgress => {
                trace!("[{}] reset request rsn={} in progress", self.side(), rsn);
            }
            other => {
                warn!("[{}] reset request rsn={} failed: {:?}", self.side(), rsn, other);
                self.outgoing_reset_request = None;
                self.t_reconfig.stop();
                self.send_reset_request();
            }
        }
    }

    fn remove_stream_if_closed(&mut self, stream_identifier: u16) {
        let done = self.streams.get(&stream_identifier).is_some_and(|s| {
            s.local_reset
                && s.remote_reset
                && s.buffered_amount == 0
                && !self
                    .outgoing_reset_request
                    .as_ref()
                    .is_some_and(|r| r.stream_identifiers.contains(&stream_identifier))
        });
        if done {
            debug!("[{}] stream {} closed", self.side(), stream_identifier);
            self.streams.remove(&stream_identifier);
        }
    }

    fn write_message(&mut self, msg: StreamMessage) -> Result<()> {
        if self.state != AssociationState::Established {
            return Err(Error::ErrAssociationNotEstablished);
        }
        let len = msg.payload.len();
        if len > self.max_message_size as usize {
            return Err(Error::ErrOutboundPacketTooLarge);
        }

        let max_stream_buffered_amount = self.config.max_stream_buffered_amount();
        let max_association_buffered_amount = self.config.max_association_buffered_amount();
        let association_buffered_amount = self.buffered_amount;

        let s = self.get_or_create_stream(msg.stream_id);
        if s.local_reset {
            return Err(Error::ErrStreamClosed);
        }
        if (s.buffered_amount > 0 && s.buffered_amount + len > max_stream_buffered_amount)
            || (association_buffered_amount > 0
                && association_buffered_amount + len > max_association_buffered_amount)
        {
            return Err(Error::ErrBufferFull);
        }

        let unordered = s.unordered;
        let reliability_type = s.reliability_type;
        let reliability_value = s.reliability_value;
        let ssn = if unordered {
            0
        } else {
            let ssn = s.next_ssn;
            s.next_ssn = s.next_ssn.wrapping_add(1);
            ssn
        };
        s.buffered_amount += len;
        self.buffered_amount += len;

        let message_id = self.next_message_id;
        self.next_message_id += 1;

        let payload = msg.payload.freeze();
        let max_payload_size = self.config.max_payload_size();
        let mut offset = 0;
        loop {
            let end = (offset + max_payload_size).min(len);
            let chunk = ChunkPayloadData {
                unordered,
                beginning_fragment: offset == 0,
                ending_fragment: end == len,
                tsn: self.my_next_tsn,
                stream_identifier: msg.stream_id,
                stream_sequence_number: ssn,
                payload_type: msg.ppi,
                user_data: payload.slice(offset..end),
            };
            self.my_next_tsn = self.my_next_tsn.wrapping_add(1);
            self.inflight.push(OutboundChunk {
                chunk,
                message_id,
                since: self.now,
                sent_at: None,
                nsent: 0,
                acked: false,
                abandoned: false,
                retransmit: false,
                reliability_type,
                reliability_value,
            });
            offset = end;
            if offset >= len {
                break;
            }
        }

        self.flush();
        Ok(())
    }

    fn create_selective_ack(&mut self) -> ChunkSelectiveAck {
        let mut offsets: Vec<u32> = self
            .received_tsns
            .iter()
            .map(|tsn| tsn.wrapping_sub(self.peer_last_tsn))
            .filter(|off| *off <= u16::MAX as u32)
            .collect();
        offsets.sort_unstable();

        let mut gap_ack_blocks: Vec<GapAckBlock> = vec![];
        for off in offsets {
            let off = off as u16;
            match gap_ack_blocks.last_mut() {
                Some(b) if b.end.wrapping_add(1) == off => b.end = off,
                _ => gap_ack_blocks.push(GapAckBlock {
                    start: off,
                    end: off,
                }),
            }
        }

        let a_rwnd = self.receive_window() as u32;

        ChunkSelectiveAck {
            cumulative_tsn_ack: self.peer_last_tsn,
            advertised_receiver_window_credit: a_rwnd,
            gap_ack_blocks,
            duplicate_tsn: std::mem::take(&mut self.duplicate_tsns),
        }
    }

    /// Drains readable streams into the read queue.
    fn deliver(&mut self) {
        for id in std::mem::take(&mut self.readable_streams) {
            if let Some(s) = self.streams.get_mut(&id) {
                while let Some((ppi, payload)) = s.reassembly_queue.read() {
                    self.read_outs.push_back(StreamMessage {
                        stream_id: id,
                        ppi,
                        payload,
                    });
                }
            }
        }
    }

    /// Collects DATA chunks to (re)transmit now, applying partial reliability.
    fn pop_data_chunks(&mut self) -> Vec<ChunkPayloadData> {
        if self.state != AssociationState::Established {
            return vec![];
        }

        let mut to_abandon = vec![];
        for c in self.inflight.iter() {
            let candidate = c.retransmit || c.nsent == 0;
            if candidate && !c.abandoned && !c.acked && self.should_abandon(c) {
                to_abandon.push(c.message_id);
            }
        }
        to_abandon.dedup();
        for message_id in to_abandon {
            self.abandon_message(message_id);
        }
        self.update_advanced_peer_ack_point();

        let now = self.now;
        let mut outstanding = self.inflight.outstanding_bytes();
        let mut peer_rwnd = self.peer_rwnd as usize;
        let mut chunks = vec![];

        // Retransmissions first, ignoring the receiver window.
        for c in self.inflight.iter_mut() {
            if c.retransmit && !c.abandoned && !c.acked {
                c.retransmit = false;
                c.nsent += 1;
                c.sent_at = Some(now);
                chunks.push(c.chunk.clone());
            }
        }

        for c in self.inflight.iter_mut() {
            if c.nsent != 0 || c.abandoned {
                continue;
            }
            if outstanding > 0 && c.len() > peer_rwnd {
                break;
            }
            c.nsent = 1;
            c.sent_at = Some(now);
            outstanding += c.len();
            peer_rwnd = peer_rwnd.saturating_sub(c.len());
            chunks.push(c.chunk.clone());
        }
        self.peer_rwnd = peer_rwnd as u32;

        if !chunks.is_empty() {
            self.t3_rtx
                .start(self.now, self.rto_mgr.get_rto(), self.rto_mgr.rto_max());
        }
        chunks
    }

    /// Bundles pending control and data chunks into packets.
    pub(crate) fn flush(&mut self) {
        let mut chunks: Vec<Chunk> = self.control_queue.drain(..).collect();

        if self.state == AssociationState::Established {
            if self.ack_needed {
                self.ack_needed = false;
                chunks.push(Chunk::SelectiveAck(self.create_selective_ack()));
            }
            let data = self.pop_data_chunks();
            if self.will_send_forward_tsn {
                self.will_send_forward_tsn = false;
                if sna32gt(
                    self.advanced_peer_tsn_ack_point,
                    self.cumulative_tsn_ack_point,
                ) {
                    chunks.push(Chunk::ForwardTsn(self.create_forward_tsn()));
                }
            }
            chunks.extend(data.into_iter().map(Chunk::PayloadData));
        }

        if chunks.is_empty() {
            return;
        }

        let max_packet_size = self.config.max_packet_size();
        let mut packet = self.new_packet();
        let mut size = PACKET_HEADER_SIZE;
        for c in chunks {
            trace!("[{}] send {}", self.side(), c);
            let n = c.marshal_size();
            if !packet.chunks.is_empty() && size + n > max_packet_size {
                self.write_outs.push_back(packet.marshal());
                packet = self.new_packet();
                size = PACKET_HEADER_SIZE;
            }
            size += n;
            packet.chunks.push(c);
        }
        self.write_outs.push_back(packet.marshal());
    }

    fn new_packet(&self) -> Packet {
        Packet {
            source_port: self.config.sctp_port(),
            destination_port: self.config.sctp_port(),
            verification_tag: self.peer_verification_tag,
            chunks: vec![],
        }
    }

    fn on_retransmission_timeout(&mut self, id: RtxTimerId, n_rtos: usize) {
        debug!("[{}] {:?} timeout n_rtos={}", self.side(), id, n_rtos);
        match id {
            RtxTimerId::T1Init => self.send_init(),
            RtxTimerId::T1Cookie => self.send_cookie_echo(),
            RtxTimerId::T3RTX => {
                // RFC 4960 6.3.3 E3: mark everything outstanding for retransmission.
                for c in self.inflight.iter_mut() {
                    if c.is_outstanding() {
                        c.retransmit = true;
                    }
                }
                if sna32gt(
                    self.advanced_peer_tsn_ack_point,
                    self.cumulative_tsn_ack_point,
                ) {
                    self.will_send_forward_tsn = true;
                }
            }
            RtxTimerId::Reconfig => self.queue_reset_request(),
        }
    }

    fn on_retransmission_failure(&mut self, id: RtxTimerId) {
        let err = match id {
            RtxTimerId::T1Init => Error::ErrHandshakeInitAck,
            RtxTimerId::T1Cookie => Error::ErrHandshakeCookieEcho,
            _ => return,
        };
        warn!("[{}] {:?} retransmission failure: {}", self.side(), id, err);
        self.teardown();
        self.event_outs.push_back(AssociationEvent::Failed(err));
    }

    fn teardown(&mut self) {
        self.set_state(AssociationState::Closed);
        self.t1_init.stop();
        self.t1_cookie.stop();
        self.t3_rtx.stop();
        self.t_reconfig.stop();
        self.inflight.clear();
        self.streams.clear();
        self.control_queue.clear();
        self.buffered_amount = 0;
        self.stored_init = None;
        self.stored_cookie_echo = None;
        self.outgoing_reset_request = None;
        self.incoming_reset_requests.clear();
        self.streams_to_reset.clear();
    }

    fn abort_chunk() -> Chunk {
        Chunk::Abort(ChunkAbort {
            error_causes: vec![ErrorCause {
                code: USER_INITIATED_ABORT,
                raw: Bytes::new(),
            }],
        })
    }
}
