use super::*;

impl sansio::Protocol<TransportMessage<Message>, (), ()> for Agent {
    type Rout = ();
    type Wout = TransportMessage<BytesMut>;
    type Eout = Event;
    type Error = Error;
    type Time = Instant;

    fn handle_read(&mut self, msg: TransportMessage<Message>) -> Result<()> {
        if self.connection_state == ConnectionState::Closed {
            return Err(Error::ErrAgentClosed);
        }
        if msg.now > self.now {
            self.now = msg.now;
        }

        if let Some(local_index) = self.find_local_candidate(msg.transport.local_addr) {
            self.handle_inbound(&msg.message, local_index, msg.transport.peer_addr)
        } else {
            warn!(
                "[{}]: Discarded message, not a valid local candidate from {:?}:{}",
                self.get_name(),
                msg.transport.transport_protocol,
                msg.transport.local_addr,
            );
            Err(Error::ErrUnhandledStunpacket)
        }
    }

    fn poll_read(&mut self) -> Option<Self::Rout> {
        None
    }

    fn handle_write(&mut self, _msg: ()) -> Result<()> {
        Ok(())
    }

    fn poll_write(&mut self) -> Option<Self::Wout> {
        self.transmits.pop_front()
    }

    fn handle_event(&mut self, _evt: ()) -> Result<()> {
        Ok(())
    }

    fn poll_event(&mut self) -> Option<Self::Eout> {
        self.events.pop_front()
    }

    fn handle_timeout(&mut self, now: Instant) -> Result<()> {
        if now > self.now {
            self.now = now;
        }
        self.contact();
        Ok(())
    }

    fn poll_timeout(&mut self) -> Option<Instant> {
        if matches!(
            self.connection_state,
            ConnectionState::New | ConnectionState::Failed | ConnectionState::Closed
        ) || self.ufrag_pwd.remote_ufrag.is_empty()
        {
            return None;
        }

        let mut deadlines: Vec<Instant> = self
            .candidate_pairs
            .iter()
            .filter(|p| p.state == CandidatePairState::InProgress)
            .filter_map(|p| p.next_retransmit)
            .collect();

        if self.has_checks_to_start() {
            deadlines.push(
                self.last_check
                    .map_or(self.now, |last_check| last_check + self.check_interval),
            );
        }

        if let Some(pair_index) = self.selected_pair {
            let p = &self.candidate_pairs[pair_index];
            let last_sent = self.local_candidates[p.local_index].last_sent();
            let last_received = self.remote_candidates[p.remote_index].last_received();

            if self.keepalive_interval != Duration::ZERO {
                deadlines.push(last_sent + self.keepalive_interval);
            }
            if self.disconnected_timeout != Duration::ZERO
                && self.connection_state != ConnectionState::Disconnected
            {
                deadlines.push(last_received + self.disconnected_timeout);
            }
            if self.failed_timeout != Duration::ZERO {
                deadlines.push(last_received + self.failed_timeout);
            }
        } else if let Some(checking_start) = self.checking_start {
            if self.failed_timeout != Duration::ZERO {
                deadlines.push(checking_start + self.failed_timeout);
            }
        }

        deadlines.into_iter().min()
    }

    /// Cancels all in-flight checks and moves the agent to closed.
    fn close(&mut self) -> Result<()> {
        if self.connection_state == ConnectionState::Closed {
            return Ok(());
        }

        self.pending_binding_requests.clear();
        self.triggered_checks.clear();
        self.candidate_pairs.clear();
        self.set_selected_pair(None);
        self.delete_all_candidates(false);
        self.update_connection_state(ConnectionState::Closed);

        Ok(())
    }
}
