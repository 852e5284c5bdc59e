use super::*;
use crate::attributes::use_candidate::*;

trait ControllingSelector {
    fn ping_candidate(&mut self, local: usize, remote: usize);
    fn handle_success_response(&mut self, pair_index: usize, is_use_candidate: bool);
    fn handle_binding_request(&mut self, m: &Message, local: usize, remote: usize);
}

trait ControlledSelector {
    fn ping_candidate(&mut self, local: usize, remote: usize);
    fn handle_success_response(&mut self, pair_index: usize, is_use_candidate: bool);
    fn handle_binding_request(&mut self, m: &Message, local: usize, remote: usize);
}

impl Agent {
    pub(crate) fn ping_candidate(&mut self, local: usize, remote: usize) {
        if self.is_controlling {
            ControllingSelector::ping_candidate(self, local, remote);
        } else {
            ControlledSelector::ping_candidate(self, local, remote);
        }
    }

    pub(crate) fn handle_success_response(&mut self, m: &Message, pending: &BindingRequest) {
        let Some(pair_index) = self.find_pair(pending.local_index, pending.remote_index) else {
            // This shouldn't happen
            log::error!(
                "[{}]: Success response from invalid candidate pair",
                self.get_name()
            );
            return;
        };

        let mut xor_addr = XorMappedAddress::default();
        if xor_addr.get_from(m).is_ok() {
            trace!(
                "[{}]: pair {} mapped to {}",
                self.get_name(),
                self.candidate_pairs[pair_index],
                xor_addr
            );
        }

        if self.is_controlling {
            ControllingSelector::handle_success_response(
                self,
                pair_index,
                pending.is_use_candidate,
            );
        } else {
            ControlledSelector::handle_success_response(self, pair_index, pending.is_use_candidate);
        }
    }

    pub(crate) fn handle_binding_request(&mut self, m: &Message, local: usize, remote: usize) {
        if self.is_controlling {
            ControllingSelector::handle_binding_request(self, m, local, remote);
        } else {
            ControlledSelector::handle_binding_request(self, m, local, remote);
        }
    }

    /// Drives the check list: retransmissions, the next paced check, keepalives and the
    /// liveness of the selected pair.
    pub(crate) fn contact(&mut self) {
        if matches!(
            self.connection_state,
            ConnectionState::New | ConnectionState::Failed | ConnectionState::Closed
        ) || self.ufrag_pwd.remote_ufrag.is_empty()
        {
            return;
        }

        self.invalidate_pending_binding_requests(self.now);
        self.retransmit_checks();

        if self
            .last_check
            .is_none_or(|last_check| last_check + self.check_interval <= self.now)
            && self.has_checks_to_start()
        {
            self.last_check = Some(self.now);
            self.start_next_check();
        }

        self.check_keepalive();
        self.validate_selected_pair();
    }

    pub(crate) fn has_checks_to_start(&self) -> bool {
        !self.triggered_checks.is_empty()
            || self.candidate_pairs.iter().any(|p| {
                p.state == CandidatePairState::Waiting || p.state == CandidatePairState::Frozen
            })
    }

    fn checks_in_progress(&self) -> usize {
        self.candidate_pairs
            .iter()
            .filter(|p| p.state == CandidatePairState::InProgress)
            .count()
    }

    /// Starts at most one check: a triggered one first, else the best waiting pair.
    fn start_next_check(&mut self) {
        if self.checks_in_progress() >= self.max_concurrent_checks {
            trace!(
                "[{}]: {} checks in progress, postponing",
                self.get_name(),
                self.max_concurrent_checks
            );
            return;
        }

        while let Some(pair_index) = self.triggered_checks.pop_front() {
            if pair_index < self.candidate_pairs.len()
                && self.candidate_pairs[pair_index].state == CandidatePairState::Waiting
            {
                self.send_check(pair_index);
                return;
            }
        }

        if !self
            .candidate_pairs
            .iter()
            .any(|p| p.state == CandidatePairState::Waiting)
        {
            for p in &mut self.candidate_pairs {
                if p.state == CandidatePairState::Frozen {
                    p.state = CandidatePairState::Waiting;
                }
            }
        }

        let mut best: Option<usize> = None;
        for (index, p) in self.candidate_pairs.iter().enumerate() {
            if p.state != CandidatePairState::Waiting {
                continue;
            }
            match best {
                Some(b) if self.candidate_pairs[b].priority() >= p.priority() => {}
                _ => best = Some(index),
            }
        }

        let Some(pair_index) = best else {
            return;
        };

        if self.disable_background_checks {
            if let Some(selected) = self.selected_pair {
                if self.candidate_pairs[pair_index].priority()
                    < self.candidate_pairs[selected].priority()
                {
                    return;
                }
            }
        }

        self.send_check(pair_index);
    }

    fn send_check(&mut self, pair_index: usize) {
        let p = &mut self.candidate_pairs[pair_index];
        p.state = CandidatePairState::InProgress;
        p.binding_request_count = 1;
        p.rto = self.initial_rto;
        p.next_retransmit = Some(self.now + p.rto);
        let (local, remote) = (p.local_index, p.remote_index);

        self.ping_candidate(local, remote);
    }

    /// Retransmits in-progress checks whose timer fired, failing the exhausted ones.
    fn retransmit_checks(&mut self) {
        let now = self.now;
        let mut pings = vec![];
        let mut failed_foundations = vec![];

        for p in &mut self.candidate_pairs {
            if p.state != CandidatePairState::InProgress {
                continue;
            }
            let Some(next_retransmit) = p.next_retransmit else {
                continue;
            };
            if next_retransmit > now {
                continue;
            }

            if p.binding_request_count >= self.max_binding_requests {
                trace!("max requests reached for pair {}, marking it as failed", p);
                p.state = CandidatePairState::Failed;
                p.next_retransmit = None;
                failed_foundations.push(p.foundation.clone());
            } else {
                p.binding_request_count += 1;
                p.rto *= 2;
                p.next_retransmit = Some(now + p.rto);
                pings.push((p.local_index, p.remote_index));
            }
        }

        for foundation in failed_foundations {
            self.unfreeze_foundation(&foundation);
        }
        for (local, remote) in pings {
            self.ping_candidate(local, remote);
        }
    }

    /// Sends STUN Binding requests to the selected pair
    /// if no packet has been sent on that pair in the last keepalive_interval.
    fn check_keepalive(&mut self) {
        if self.keepalive_interval == Duration::ZERO {
            return;
        }

        let Some(pair_index) = self.selected_pair else {
            return;
        };
        let (local_index, remote_index) = {
            let p = &self.candidate_pairs[pair_index];
            (p.local_index, p.remote_index)
        };

        let last_sent = self
            .now
            .saturating_duration_since(self.local_candidates[local_index].last_sent());
        if last_sent >= self.keepalive_interval {
            // we use binding request instead of indication to support refresh consent schemas
            // see https://tools.ietf.org/html/rfc7675
            trace!("[{}]: checking keepalive", self.get_name());
            self.ping_candidate(local_index, remote_index);
        }
    }

    /// Checks the selected pair is (still) valid and updates the connection state.
    fn validate_selected_pair(&mut self) {
        let Some(pair_index) = self.selected_pair else {
            let all_failed = !self.candidate_pairs.is_empty()
                && self
                    .candidate_pairs
                    .iter()
                    .all(|p| p.state == CandidatePairState::Failed);
            let checking_expired = self.failed_timeout != Duration::ZERO
                && self
                    .checking_start
                    .is_some_and(|start| start + self.failed_timeout <= self.now);

            if (self.remote_end_of_candidates && all_failed) || checking_expired {
                self.fail();
            }
            return;
        };

        let remote_index = self.candidate_pairs[pair_index].remote_index;
        let disconnected_time = self
            .now
            .saturating_duration_since(self.remote_candidates[remote_index].last_received());

        if self.failed_timeout != Duration::ZERO && disconnected_time >= self.failed_timeout {
            self.fail();
        } else if self.disconnected_timeout != Duration::ZERO
            && disconnected_time >= self.disconnected_timeout
        {
            // path migration to another pair that is still alive
            if let Some(best) = self.get_best_valid_candidate_pair() {
                self.set_selected_pair(Some(best));
                self.update_connected_state();
                return;
            }

            if self.connection_state != ConnectionState::Disconnected {
                self.update_connection_state(ConnectionState::Disconnected);
                self.recheck_alternative_pairs(pair_index);
            }
        } else {
            self.update_connected_state();
        }
    }

    /// Puts every finished pair other than `selected` back to waiting, so a replacement path
    /// can be found.
    fn recheck_alternative_pairs(&mut self, selected: usize) {
        for (index, p) in self.candidate_pairs.iter_mut().enumerate() {
            if index != selected && p.is_finished() {
                p.state = CandidatePairState::Waiting;
                p.binding_request_count = 0;
                p.next_retransmit = None;
            }
        }
    }

    fn fail(&mut self) {
        for p in &mut self.candidate_pairs {
            p.next_retransmit = None;
            if p.state == CandidatePairState::InProgress {
                p.state = CandidatePairState::Failed;
            }
        }
        self.triggered_checks.clear();
        self.pending_binding_requests.clear();
        self.update_connection_state(ConnectionState::Failed);
    }

    fn build_binding_request(&self, local: usize, use_candidate: bool) -> Result<Message> {
        let username = format!(
            "{}:{}",
            self.ufrag_pwd.remote_ufrag, self.ufrag_pwd.local_ufrag
        );
        let local_candidate = &self.local_candidates[local];
        let local_preference = ((local_candidate.priority() >> 8) & 0xFFFF) as u16;
        let prflx_priority = Candidate::compute_priority(
            CandidateType::PeerReflexive,
            local_preference,
            local_candidate.component(),
        );

        let mut setters: Vec<Box<dyn Setter>> = vec![
            Box::new(BINDING_REQUEST),
            Box::new(TransactionId::new()),
            Box::new(Username::new(ATTR_USERNAME, username)),
        ];
        if use_candidate {
            setters.push(Box::new(UseCandidateAttr::new()));
        }
        if self.is_controlling {
            setters.push(Box::new(AttrControlling(self.tie_breaker)));
        } else {
            setters.push(Box::new(AttrControlled(self.tie_breaker)));
        }
        setters.push(Box::new(PriorityAttr(prflx_priority)));
        setters.push(Box::new(MessageIntegrity::new_short_term_integrity(
            self.ufrag_pwd.remote_pwd.clone(),
        )));
        setters.push(Box::new(FINGERPRINT));

        let mut msg = Message::new();
        msg.build(&setters)?;
        Ok(msg)
    }
}

impl ControllingSelector for Agent {
    fn ping_candidate(&mut self, local: usize, remote: usize) {
        // The controlling agent nominates aggressively: every check carries USE-CANDIDATE.
        match self.build_binding_request(local, true) {
            Ok(msg) => self.send_binding_request(&msg, local, remote),
            Err(err) => log::error!("[{}]: {}", self.get_name(), err),
        }
    }

    fn handle_success_response(&mut self, pair_index: usize, is_use_candidate: bool) {
        let name = self.get_name();
        let p = &mut self.candidate_pairs[pair_index];
        p.state = CandidatePairState::Succeeded;
        p.next_retransmit = None;
        if is_use_candidate {
            p.nominated = true;
        }
        trace!(
            "[{}]: Found valid candidate pair: {}, isUseCandidate: {}",
            name,
            p,
            is_use_candidate
        );

        let foundation = p.foundation.clone();
        self.unfreeze_foundation(&foundation);
        self.update_selected_pair();
    }

    fn handle_binding_request(&mut self, m: &Message, local: usize, remote: usize) {
        let remote_addr = self.remote_candidates[remote].addr();
        self.send_binding_success(m, local, remote_addr);

        let pair_index = match self.find_pair(local, remote) {
            Some(index) => index,
            None => {
                trace!("[{}]: addPair", self.get_name());
                let Some(index) = self.add_pair(local, remote) else {
                    return;
                };
                index
            }
        };

        let p = &mut self.candidate_pairs[pair_index];
        let state = p.state;
        match state {
            CandidatePairState::Succeeded | CandidatePairState::InProgress => {}
            _ => {
                p.state = CandidatePairState::Waiting;
                p.binding_request_count = 0;
                self.push_triggered_check(pair_index);
            }
        }
    }
}

impl ControlledSelector for Agent {
    fn ping_candidate(&mut self, local: usize, remote: usize) {
        match self.build_binding_request(local, false) {
            Ok(msg) => self.send_binding_request(&msg, local, remote),
            Err(err) => log::error!("[{}]: {}", self.get_name(), err),
        }
    }

    fn handle_success_response(&mut self, pair_index: usize, _is_use_candidate: bool) {
        let name = self.get_name();
        let p = &mut self.candidate_pairs[pair_index];
        p.state = CandidatePairState::Succeeded;
        p.next_retransmit = None;
        trace!(
            "[{}]: Found valid candidate pair: {}, nominated: {}",
            name,
            p,
            p.nominated
        );

        let foundation = p.foundation.clone();
        self.unfreeze_foundation(&foundation);
        self.update_selected_pair();
    }

    fn handle_binding_request(&mut self, m: &Message, local: usize, remote: usize) {
        let remote_addr = self.remote_candidates[remote].addr();
        self.send_binding_success(m, local, remote_addr);

        let pair_index = match self.find_pair(local, remote) {
            Some(index) => index,
            None => {
                let Some(index) = self.add_pair(local, remote) else {
                    return;
                };
                index
            }
        };

        let p = &mut self.candidate_pairs[pair_index];
        // https://tools.ietf.org/html/rfc8445#section-7.3.1.5
        if UseCandidateAttr::is_set(m) {
            p.nominated = true;
        }

        let state = p.state;
        match state {
            // If the state of this pair is Succeeded, it means that the check
            // previously sent by this pair produced a successful response and
            // generated a valid pair. The nomination makes it selectable.
            CandidatePairState::Succeeded => self.update_selected_pair(),
            CandidatePairState::InProgress => {}
            _ => {
                // Once the triggered check succeeds, the nominated flag makes the pair
                // selectable.
                p.state = CandidatePairState::Waiting;
                p.binding_request_count = 0;
                self.push_triggered_check(pair_index);
            }
        }
    }
}
