use super::*;
use crate::chunk::chunk_type::CT_INIT;
use shared::TaggedBytesMut;

impl sansio::Protocol<TaggedBytesMut, StreamMessage, ()> for Association {
    type Rout = StreamMessage;
    type Wout = BytesMut;
    type Eout = AssociationEvent;
    type Error = Error;
    type Time = Instant;

    /// Feeds one decrypted SCTP packet. Packets with a bad checksum or a
    /// foreign verification tag are dropped.
    fn handle_read(&mut self, msg: TaggedBytesMut) -> Result<()> {
        if msg.now > self.now {
            self.now = msg.now;
        }

        let packet = match Packet::unmarshal(&msg.message) {
            Ok(packet) => packet,
            Err(err) => {
                debug!("[{}] dropping malformed packet: {}", self.side(), err);
                return Ok(());
            }
        };

        let is_init = packet
            .chunks
            .first()
            .is_some_and(|c| c.chunk_type() == CT_INIT);
        if is_init {
            if packet.verification_tag != 0 || packet.chunks.len() != 1 {
                debug!("[{}] dropping INIT packet with bad framing", self.side());
                return Ok(());
            }
        } else if packet.verification_tag != self.my_verification_tag {
            debug!(
                "[{}] dropping packet with verification tag {} (expected {})",
                self.side(),
                packet.verification_tag,
                self.my_verification_tag
            );
            return Ok(());
        }

        let mut result = Ok(());
        for chunk in packet.chunks {
            if let Err(err) = self.handle_chunk(chunk) {
                warn!("[{}] failed to handle chunk: {}", self.side(), err);
                result = Err(err);
                break;
            }
            if self.state == AssociationState::Closed && self.stored_init.is_none() {
                break;
            }
        }

        self.deliver();
        self.flush();
        result
    }

    fn poll_read(&mut self) -> Option<Self::Rout> {
        self.read_outs.pop_front()
    }

    /// Queues a user message. The caller picks the stream, its reliability
    /// is whatever was last set with `set_reliability_params`.
    fn handle_write(&mut self, msg: StreamMessage) -> Result<()> {
        self.write_message(msg)
    }

    fn poll_write(&mut self) -> Option<Self::Wout> {
        self.write_outs.pop_front()
    }

    fn handle_event(&mut self, _evt: ()) -> Result<()> {
        Ok(())
    }

    fn poll_event(&mut self) -> Option<Self::Eout> {
        self.event_outs.pop_front()
    }

    fn handle_timeout(&mut self, now: Instant) -> Result<()> {
        if now > self.now {
            self.now = now;
        }
        let rto = self.rto_mgr.get_rto();
        let rto_max = self.rto_mgr.rto_max();

        let outcomes = [
            (RtxTimerId::T1Init, self.t1_init.handle_timeout(now, rto, rto_max)),
            (RtxTimerId::T1Cookie, self.t1_cookie.handle_timeout(now, rto, rto_max)),
            (RtxTimerId::T3RTX, self.t3_rtx.handle_timeout(now, rto, rto_max)),
            (RtxTimerId::Reconfig, self.t_reconfig.handle_timeout(now, rto, rto_max)),
        ];

        for (id, outcome) in outcomes {
            match outcome {
                TimerOutcome::NotExpired => {}
                TimerOutcome::Expired(n_rtos) => self.on_retransmission_timeout(id, n_rtos),
                TimerOutcome::Failure => self.on_retransmission_failure(id),
            }
        }

        if self.t3_rtx.is_running()
            && self.inflight.is_empty()
            && !self.will_send_forward_tsn
        {
            self.t3_rtx.stop();
        }

        self.flush();
        Ok(())
    }

    fn poll_timeout(&mut self) -> Option<Self::Time> {
        [
            self.t1_init.poll_timeout(),
            self.t1_cookie.poll_timeout(),
            self.t3_rtx.poll_timeout(),
            self.t_reconfig.poll_timeout(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Aborts the association. No local event is raised.
    fn close(&mut self) -> Result<()> {
        if self.state == AssociationState::Closed && self.stored_init.is_none() {
            return Ok(());
        }
        if self.state != AssociationState::Closed {
            self.control_queue.clear();
            let mut packet = self.new_packet();
            packet.chunks.push(Self::abort_chunk());
            self.write_outs.push_back(packet.marshal());
        }
        self.teardown();
        Ok(())
    }
}
