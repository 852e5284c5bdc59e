#[cfg(test)]
mod conn_test;

use crate::alert::*;
use crate::config::*;
use crate::content::*;
use crate::flight::flight0::*;
use crate::flight::flight1::*;
use crate::flight::*;
use crate::fragment_buffer::*;
use crate::handshake::handshake_cache::*;
use crate::handshake::handshake_header::*;
use crate::handshake::*;
use crate::handshaker::*;
use crate::record_layer::record_layer_header::*;
use crate::record_layer::*;
use crate::replay_detector::*;
use crate::state::*;
use shared::error::*;
use shared::{TaggedBytesMut, TransportContext, TransportMessage};

use bytes::BytesMut;
use log::*;
use std::collections::VecDeque;
use std::time::Instant;

// Records of the next epoch that arrive before the keys exist.
const MAX_QUEUED_ENCRYPTED_PACKETS: usize = 64;

// explicit nonce + tag
const GCM_RECORD_OVERHEAD: usize = 8 + 16;

/// Events raised by [DTLSConn], see [sansio::Protocol::poll_event].
#[derive(Debug, PartialEq)]
pub enum DtlsEvent {
    HandshakeComplete,
    /// The handshake was aborted, no keys were established.
    HandshakeFailed(Error),
    /// A fatal error on an established connection.
    Failed(Error),
    /// The peer sent close_notify.
    Closed,
}

/// A sans-I/O DTLS 1.2 connection.
///
/// Datagrams from the peer go in through `handle_read`, application data
/// through `handle_write`. Records to transmit come out of `poll_write`,
/// decrypted application data out of `poll_read`.
pub struct DTLSConn {
    is_client: bool,
    maximum_transmission_unit: usize,
    replay_protection_window: usize,
    replay_detector: Vec<ReplayDetector>,
    incoming_decrypted_packets: VecDeque<BytesMut>,
    incoming_encrypted_packets: VecDeque<Vec<u8>>,
    fragment_buffer: FragmentBuffer,
    pub(crate) cache: HandshakeCache,
    pub(crate) outgoing_packets: VecDeque<Packet>,
    outgoing_queued_packets: VecDeque<Packet>,
    outgoing_compacted_raw_packets: VecDeque<BytesMut>,
    events: VecDeque<DtlsEvent>,

    pub(crate) state: State,

    started: bool,
    handshake_completed: bool,
    closed: bool,
    fatal_alert_sent: bool,

    pub(crate) current_handshake_state: HandshakeState,
    pub(crate) current_retransmit_timer: Option<Instant>,
    pub(crate) current_retransmit_count: usize,
    handshake_deadline: Option<Instant>,

    pub(crate) current_flight: Box<dyn Flight + Send + Sync>,
    pub(crate) flights: Option<Vec<Packet>>,
    pub(crate) cfg: HandshakeConfig,
    pub(crate) retransmit: bool,
    pub(crate) handshake_rx: Option<()>,

    pub(crate) now: Instant,
    transport: TransportContext,
}

impl DTLSConn {
    pub fn new(handshake_config: HandshakeConfig) -> Self {
        let is_client = handshake_config.is_client;
        let flight = if is_client {
            Box::new(Flight1 {}) as Box<dyn Flight + Send + Sync>
        } else {
            Box::new(Flight0 {}) as Box<dyn Flight + Send + Sync>
        };

        Self {
            is_client,
            maximum_transmission_unit: handshake_config.maximum_transmission_unit,
            replay_protection_window: handshake_config.replay_protection_window,
            replay_detector: vec![],
            incoming_decrypted_packets: VecDeque::new(),
            incoming_encrypted_packets: VecDeque::new(),
            fragment_buffer: FragmentBuffer::new(),
            cache: HandshakeCache::new(),
            outgoing_packets: VecDeque::new(),
            outgoing_queued_packets: VecDeque::new(),
            outgoing_compacted_raw_packets: VecDeque::new(),
            events: VecDeque::new(),

            state: State::new(is_client),

            started: false,
            handshake_completed: false,
            closed: false,
            fatal_alert_sent: false,

            current_handshake_state: HandshakeState::Preparing,
            current_retransmit_timer: None,
            current_retransmit_count: 0,
            handshake_deadline: None,

            current_flight: flight,
            flights: None,
            cfg: handshake_config,
            retransmit: false,
            handshake_rx: None,

            now: Instant::now(),
            transport: TransportContext::default(),
        }
    }

    /// Starts the handshake. The client sends its ClientHello, the server
    /// waits for one. Arms the overall handshake deadline.
    pub fn start(&mut self, now: Instant, transport: TransportContext) -> Result<()> {
        if self.closed {
            return Err(Error::ErrConnClosed);
        }
        if self.started {
            return Ok(());
        }
        self.started = true;
        self.now = now;
        self.transport = transport;
        self.handshake_deadline = Some(now + self.cfg.handshake_timeout);

        debug!(
            "[handshake:{}] start, timeout in {:?}",
            srv_cli_str(self.is_client),
            self.cfg.handshake_timeout
        );
        if let Err(err) = self.handshake() {
            self.fail(err);
        }
        self.flush();
        Ok(())
    }

    pub fn is_handshake_completed(&self) -> bool {
        self.handshake_completed
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Basic details about the connection. Key material is not exposed.
    pub fn connection_state(&self) -> &State {
        &self.state
    }

    pub(crate) fn set_handshake_completed(&mut self) {
        self.handshake_completed = true;
        self.handshake_deadline = None;
        self.events.push_back(DtlsEvent::HandshakeComplete);
    }

    pub(crate) fn set_local_epoch(&mut self, epoch: u16) {
        self.state.local_epoch = epoch;
    }

    pub(crate) fn get_local_epoch(&self) -> u16 {
        self.state.local_epoch
    }

    pub(crate) fn notify(&mut self, level: AlertLevel, desc: AlertDescription) {
        if level == AlertLevel::Fatal {
            self.fatal_alert_sent = true;
        }
        let epoch = self.get_local_epoch();
        self.write_packets(vec![Packet {
            record: RecordLayer::new(
                PROTOCOL_VERSION1_2,
                epoch,
                Content::Alert(Alert {
                    alert_level: level,
                    alert_description: desc,
                }),
            ),
            should_encrypt: epoch > 0,
        }]);
    }

    pub(crate) fn write_packets(&mut self, pkts: Vec<Packet>) {
        self.outgoing_packets.extend(pkts);
    }

    fn write(&mut self, p: BytesMut) -> Result<()> {
        if self.closed {
            return Err(Error::ErrConnClosed);
        }

        let pkt = Packet {
            record: RecordLayer::new(
                PROTOCOL_VERSION1_2,
                self.get_local_epoch(),
                Content::ApplicationData(p),
            ),
            should_encrypt: true,
        };

        if self.is_handshake_completed() {
            self.write_packets(vec![pkt]);
        } else {
            self.outgoing_queued_packets.push_back(pkt);
        }

        Ok(())
    }

    /// Turns pending packets into datagrams while the keys that protect them
    /// still exist.
    fn flush(&mut self) {
        if let Err(err) = self.handle_outgoing_packets() {
            self.fail(err);
        }
    }

    /// Aborts the connection: sends a fatal alert unless one was already
    /// exchanged, drops the session keys and raises the failure event.
    fn fail(&mut self, err: Error) {
        if self.closed {
            return;
        }
        warn!("[handshake:{}] fatal: {}", srv_cli_str(self.is_client), err);

        if !self.fatal_alert_sent {
            if let Some(desc) = alert_description_for(&err) {
                self.notify(AlertLevel::Fatal, desc);
            }
        }
        self.outgoing_queued_packets.clear();
        if let Err(flush_err) = self.handle_outgoing_packets() {
            debug!(
                "[handshake:{}] unable to send alert: {}",
                srv_cli_str(self.is_client),
                flush_err
            );
        }

        self.shutdown();
        self.events.push_back(if self.handshake_completed {
            DtlsEvent::Failed(err)
        } else {
            DtlsEvent::HandshakeFailed(err)
        });
    }

    fn shutdown(&mut self) {
        self.closed = true;
        self.state.clear_secrets();
        self.current_handshake_state = HandshakeState::Errored;
        self.current_retransmit_timer = None;
        self.handshake_deadline = None;
        self.flights = None;
        self.outgoing_packets.clear();
        self.outgoing_queued_packets.clear();
        self.incoming_encrypted_packets.clear();
    }

    fn handle_outgoing_packets(&mut self) -> Result<()> {
        if self.is_handshake_completed() {
            while let Some(mut pkt) = self.outgoing_queued_packets.pop_front() {
                pkt.record.record_layer_header.epoch = self.get_local_epoch();
                self.outgoing_packets.push_back(pkt);
            }
        }

        let mut raw_packets = vec![];
        while let Some(p) = self.outgoing_packets.pop_front() {
            if let Content::Handshake(h) = &p.record.content {
                trace!(
                    "Send [handshake:{}] -> {} (epoch: {}, seq: {})",
                    srv_cli_str(self.is_client),
                    h.handshake_header.handshake_type,
                    p.record.record_layer_header.epoch,
                    h.handshake_header.message_sequence
                );
                self.cache.push(
                    h.marshal()?,
                    h.handshake_header.message_sequence,
                    h.handshake_header.handshake_type,
                    self.is_client,
                );

                let raw_handshake_packets = self.process_handshake_packet(&p, h)?;
                raw_packets.extend(raw_handshake_packets);
            } else {
                raw_packets.push(self.process_packet(p)?);
            }
        }

        if !raw_packets.is_empty() {
            self.outgoing_compacted_raw_packets
                .extend(compact_raw_packets(&raw_packets, self.maximum_transmission_unit));
        }

        Ok(())
    }

    fn next_sequence_number(&mut self, epoch: u16) -> Result<u64> {
        let epoch = epoch as usize;
        while self.state.local_sequence_number.len() <= epoch {
            self.state.local_sequence_number.push(0);
        }

        let seq = self.state.local_sequence_number[epoch];
        // RFC 6347 Section 4.1: abandon the association rather than wrap.
        if seq > MAX_SEQUENCE_NUMBER {
            return Err(Error::ErrSequenceNumberOverflow);
        }
        self.state.local_sequence_number[epoch] += 1;
        Ok(seq)
    }

    fn protect(&self, should_encrypt: bool, header: &RecordLayerHeader, raw: Vec<u8>) -> Result<Vec<u8>> {
        if should_encrypt {
            match &self.state.cipher_suite {
                Some(cipher_suite) => cipher_suite.encrypt(header, &raw),
                None => Err(Error::ErrDtlsProtocol(
                    "no keys to protect an encrypted record".to_owned(),
                )),
            }
        } else {
            Ok(raw)
        }
    }

    fn process_packet(&mut self, mut p: Packet) -> Result<Vec<u8>> {
        p.record.record_layer_header.sequence_number =
            self.next_sequence_number(p.record.record_layer_header.epoch)?;

        let raw_packet = p.record.marshal()?;
        let header = RecordLayerHeader::unmarshal(&raw_packet)?;
        self.protect(p.should_encrypt, &header, raw_packet)
    }

    fn process_handshake_packet(&mut self, p: &Packet, h: &Handshake) -> Result<Vec<Vec<u8>>> {
        let mut raw_packets = vec![];

        let fragment_size = self
            .maximum_transmission_unit
            .saturating_sub(RECORD_LAYER_HEADER_SIZE + HANDSHAKE_HEADER_LENGTH + GCM_RECORD_OVERHEAD)
            .max(1);
        let handshake_fragments = fragment_handshake(fragment_size, h)?;

        for handshake_fragment in handshake_fragments {
            let record_layer_header = RecordLayerHeader {
                protocol_version: p.record.record_layer_header.protocol_version,
                content_type: p.record.record_layer_header.content_type,
                content_len: handshake_fragment.len() as u16,
                epoch: p.record.record_layer_header.epoch,
                sequence_number: self.next_sequence_number(p.record.record_layer_header.epoch)?,
            };

            let mut raw_packet = Vec::with_capacity(RECORD_LAYER_HEADER_SIZE + handshake_fragment.len());
            record_layer_header.marshal(&mut raw_packet)?;
            raw_packet.extend_from_slice(&handshake_fragment);

            raw_packets.push(self.protect(p.should_encrypt, &record_layer_header, raw_packet)?);
        }

        Ok(raw_packets)
    }

    fn read(&mut self, buf: &[u8]) -> Result<()> {
        let pkts = match unpack_datagram(buf) {
            Ok(pkts) => pkts,
            Err(err) => {
                // Decode error must be silently discarded
                // [RFC6347 Section-4.1.2.7]
                debug!(
                    "{}: discarded broken datagram: {}",
                    srv_cli_str(self.is_client),
                    err
                );
                return Ok(());
            }
        };

        for pkt in pkts {
            self.handle_incoming_packet(pkt, true)?;
            if self.closed {
                return Ok(());
            }
        }

        self.process_handshake_progress()
    }

    /// Runs the handshake until neither newly received nor queued records
    /// move it forward.
    fn process_handshake_progress(&mut self) -> Result<()> {
        loop {
            if self.fragment_buffer.take_retransmit_seen() {
                self.handshake_retransmit_requested();
            }
            if self.handshake_rx.is_some() {
                self.handshake()?;
            }
            if !self.handle_incoming_queued_packets()? {
                return Ok(());
            }
        }
    }

    /// Returns true if a queued record carried new handshake data.
    fn handle_incoming_queued_packets(&mut self) -> Result<bool> {
        let initialized = self
            .state
            .cipher_suite
            .as_ref()
            .is_some_and(|c| c.is_initialized());
        if !initialized || self.incoming_encrypted_packets.is_empty() {
            return Ok(false);
        }

        let queued: Vec<Vec<u8>> = self.incoming_encrypted_packets.drain(..).collect();
        for pkt in queued {
            self.handle_incoming_packet(pkt, true)?;
            if self.closed {
                return Ok(false);
            }
        }

        Ok(self.handshake_rx.is_some())
    }

    fn enqueue(&mut self, pkt: Vec<u8>) {
        if self.incoming_encrypted_packets.len() < MAX_QUEUED_ENCRYPTED_PACKETS {
            self.incoming_encrypted_packets.push_back(pkt);
        }
    }

    fn handle_incoming_packet(&mut self, mut pkt: Vec<u8>, enqueue: bool) -> Result<()> {
        let h = match RecordLayerHeader::unmarshal(&pkt) {
            Ok(h) => h,
            Err(err) => {
                debug!(
                    "{}: discarded broken packet: {}",
                    srv_cli_str(self.is_client),
                    err
                );
                return Ok(());
            }
        };

        // Validate epoch
        let epoch = self.state.remote_epoch;
        if h.epoch > epoch {
            if h.epoch > epoch + 1 {
                debug!(
                    "{}: discarded future packet (epoch: {}, seq: {})",
                    srv_cli_str(self.is_client),
                    h.epoch,
                    h.sequence_number,
                );
                return Ok(());
            }
            if enqueue {
                trace!(
                    "{}: received packet of next epoch, queuing packet",
                    srv_cli_str(self.is_client)
                );
                self.enqueue(pkt);
            }
            return Ok(());
        }

        // Anti-replay protection
        while self.replay_detector.len() <= h.epoch as usize {
            self.replay_detector
                .push(ReplayDetector::new(self.replay_protection_window));
        }
        if !self.replay_detector[h.epoch as usize].check(h.sequence_number) {
            debug!(
                "{}: discarded duplicated packet (epoch: {}, seq: {})",
                srv_cli_str(self.is_client),
                h.epoch,
                h.sequence_number,
            );
            return Ok(());
        }

        // Decrypt
        if h.epoch != 0 {
            let Some(cipher_suite) = self
                .state
                .cipher_suite
                .as_ref()
                .filter(|c| c.is_initialized())
            else {
                if enqueue {
                    trace!(
                        "{}: handshake not finished, queuing packet",
                        srv_cli_str(self.is_client)
                    );
                    self.enqueue(pkt);
                }
                return Ok(());
            };

            // keys exist, so an unauthenticated record is fatal
            pkt = cipher_suite.decrypt(&pkt)?;
        }

        let is_handshake = match self.fragment_buffer.push(&pkt) {
            Ok(is_handshake) => is_handshake,
            Err(err) => {
                debug!(
                    "{}: defragment failed: {}",
                    srv_cli_str(self.is_client),
                    err
                );
                return Ok(());
            }
        };
        if is_handshake {
            self.replay_detector[h.epoch as usize].accept();
            while let Some(out) = self.fragment_buffer.pop() {
                let raw_handshake = match HandshakeHeader::unmarshal(&out) {
                    Ok(header) => header,
                    Err(err) => {
                        debug!(
                            "{}: handshake parse failed: {}",
                            srv_cli_str(self.is_client),
                            err
                        );
                        continue;
                    }
                };
                trace!(
                    "Recv [handshake:{}] -> {} (epoch: {}, seq: {})",
                    srv_cli_str(self.is_client),
                    raw_handshake.handshake_type,
                    h.epoch,
                    raw_handshake.message_sequence
                );

                self.cache.push(
                    out,
                    raw_handshake.message_sequence,
                    raw_handshake.handshake_type,
                    !self.is_client,
                );
            }
            self.handshake_rx = Some(());

            return Ok(());
        }

        let r = match RecordLayer::unmarshal(&pkt) {
            Ok(r) => r,
            Err(err) => {
                self.notify(AlertLevel::Fatal, AlertDescription::DecodeError);
                return Err(err);
            }
        };

        match r.content {
            Content::Alert(a) => {
                self.replay_detector[h.epoch as usize].accept();
                debug!("{}: <- {}", srv_cli_str(self.is_client), a);
                if a.is_close_notify() {
                    self.handle_close_notify();
                } else if a.alert_level == AlertLevel::Fatal {
                    // never answer a fatal alert with another one
                    self.fatal_alert_sent = true;
                    return Err(Error::ErrAlertFatalOrClose);
                }
            }
            Content::ChangeCipherSpec => {
                let initialized = self
                    .state
                    .cipher_suite
                    .as_ref()
                    .is_some_and(|c| c.is_initialized());
                if !initialized {
                    if enqueue {
                        trace!(
                            "{}: CipherSuite not initialized, queuing packet",
                            srv_cli_str(self.is_client)
                        );
                        self.enqueue(pkt);
                    }
                    return Ok(());
                }

                let new_remote_epoch = h.epoch + 1;
                debug!(
                    "{}: <- ChangeCipherSpec (epoch: {})",
                    srv_cli_str(self.is_client),
                    new_remote_epoch
                );

                if epoch + 1 == new_remote_epoch {
                    self.state.remote_epoch = new_remote_epoch;
                    self.replay_detector[h.epoch as usize].accept();
                }
            }
            Content::ApplicationData(data) => {
                if h.epoch == 0 {
                    self.notify(AlertLevel::Fatal, AlertDescription::UnexpectedMessage);
                    return Err(Error::ErrDtlsProtocol(
                        "application data with epoch 0".to_owned(),
                    ));
                }

                self.replay_detector[h.epoch as usize].accept();
                self.incoming_decrypted_packets.push_back(data);
            }
            Content::Handshake(_) => {
                self.notify(AlertLevel::Fatal, AlertDescription::UnexpectedMessage);
                return Err(Error::ErrInvalidContentType);
            }
        };

        Ok(())
    }

    fn handle_close_notify(&mut self) {
        // Respond with a close_notify [RFC5246 Section 7.2.1]
        if !self.closed {
            self.notify(AlertLevel::Warning, AlertDescription::CloseNotify);
            self.flush();
            self.shutdown();
            self.events.push_back(DtlsEvent::Closed);
        }
    }
}

impl sansio::Protocol<TaggedBytesMut, BytesMut, ()> for DTLSConn {
    type Rout = BytesMut;
    type Wout = TaggedBytesMut;
    type Eout = DtlsEvent;
    type Error = Error;
    type Time = Instant;

    /// Feeds a datagram from the peer. Protocol failures do not surface here,
    /// they close the connection and raise an event.
    fn handle_read(&mut self, msg: TaggedBytesMut) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        if msg.now > self.now {
            self.now = msg.now;
        }
        if !self.started {
            self.start(msg.now, msg.transport)?;
        }
        self.transport = msg.transport;

        if let Err(err) = self.read(&msg.message) {
            self.fail(err);
        }
        self.flush();
        Ok(())
    }

    /// Decrypted application data, available once the handshake completed.
    fn poll_read(&mut self) -> Option<Self::Rout> {
        if self.is_handshake_completed() {
            self.incoming_decrypted_packets.pop_front()
        } else {
            None
        }
    }

    /// Application data written before the handshake completed is queued.
    fn handle_write(&mut self, msg: BytesMut) -> Result<()> {
        self.write(msg)?;
        self.flush();
        Ok(())
    }

    fn poll_write(&mut self) -> Option<Self::Wout> {
        self.outgoing_compacted_raw_packets
            .pop_front()
            .map(|message| TransportMessage {
                now: self.now,
                transport: self.transport,
                message,
            })
    }

    fn handle_event(&mut self, _evt: ()) -> Result<()> {
        Ok(())
    }

    fn poll_event(&mut self) -> Option<Self::Eout> {
        self.events.pop_front()
    }

    fn handle_timeout(&mut self, now: Instant) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        if now > self.now {
            self.now = now;
        }

        if self
            .handshake_deadline
            .is_some_and(|deadline| now >= deadline)
        {
            self.fail(Error::ErrHandshakeTimeout);
            return Ok(());
        }

        if let Err(err) = self.handshake_timeout(now) {
            self.fail(err);
        }
        self.flush();
        Ok(())
    }

    fn poll_timeout(&mut self) -> Option<Self::Time> {
        if self.closed {
            return None;
        }
        match (self.current_retransmit_timer, self.handshake_deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Sends close_notify and drops the session keys.
    fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.notify(AlertLevel::Warning, AlertDescription::CloseNotify);
            if let Err(err) = self.handle_outgoing_packets() {
                debug!(
                    "[handshake:{}] unable to send close_notify: {}",
                    srv_cli_str(self.is_client),
                    err
                );
            }
            self.shutdown();
        }
        Ok(())
    }
}

fn alert_description_for(err: &Error) -> Option<AlertDescription> {
    match err {
        Error::ErrAlertFatalOrClose | Error::ErrHandshakeTimeout => None,
        Error::ErrInvalidMac => Some(AlertDescription::BadRecordMac),
        Error::ErrFingerprintMismatch
        | Error::ErrInvalidCertificate
        | Error::ErrCertificateVerifyNoCertificate => Some(AlertDescription::BadCertificate),
        Error::ErrKeySignatureMismatch | Error::ErrVerifyDataMismatch => {
            Some(AlertDescription::DecryptError)
        }
        Error::ErrUnsupportedProtocolVersion => Some(AlertDescription::ProtocolVersion),
        Error::ErrCipherSuiteNoIntersection => Some(AlertDescription::InsufficientSecurity),
        _ => Some(AlertDescription::InternalError),
    }
}

/// Splits a handshake message into fragments of at most `fragment_size` body
/// bytes, each with its own handshake header.
fn fragment_handshake(fragment_size: usize, h: &Handshake) -> Result<Vec<Vec<u8>>> {
    let mut content = vec![];
    h.handshake_message.marshal(&mut content)?;

    let mut content_fragments: Vec<&[u8]> = content.chunks(fragment_size).collect();
    if content_fragments.is_empty() {
        content_fragments.push(&[]);
    }

    let mut fragmented_handshakes = vec![];
    let mut offset = 0;
    for content_fragment in content_fragments {
        let handshake_header_fragment = HandshakeHeader {
            handshake_type: h.handshake_header.handshake_type,
            length: content.len() as u32,
            message_sequence: h.handshake_header.message_sequence,
            fragment_offset: offset as u32,
            fragment_length: content_fragment.len() as u32,
        };
        offset += content_fragment.len();

        let mut fragmented_handshake = Vec::with_capacity(HANDSHAKE_HEADER_LENGTH + content_fragment.len());
        handshake_header_fragment.marshal(&mut fragmented_handshake)?;
        fragmented_handshake.extend_from_slice(content_fragment);

        fragmented_handshakes.push(fragmented_handshake);
    }

    Ok(fragmented_handshakes)
}

fn compact_raw_packets(raw_packets: &[Vec<u8>], maximum_transmission_unit: usize) -> Vec<BytesMut> {
    let mut combined_raw_packets = vec![];
    let mut current_combined_raw_packet = BytesMut::new();

    for raw_packet in raw_packets {
        if !current_combined_raw_packet.is_empty()
            && current_combined_raw_packet.len() + raw_packet.len() > maximum_transmission_unit
        {
            combined_raw_packets.push(current_combined_raw_packet);
            current_combined_raw_packet = BytesMut::new();
        }
        current_combined_raw_packet.extend_from_slice(raw_packet);
    }

    if !current_combined_raw_packet.is_empty() {
        combined_raw_packets.push(current_combined_raw_packet);
    }

    combined_raw_packets
}
