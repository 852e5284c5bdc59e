
pub mod agent_config;
mod agent_proto;
mod agent_selector;

use agent_config::*;
use bytes::BytesMut;
use log::{debug, info, trace, warn};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use stun::attributes::*;
use stun::error_code::*;
use stun::fingerprint::*;
use stun::integrity::*;
use stun::message::*;
use stun::textattrs::*;
use stun::xoraddr::*;

use crate::attributes::{control::*, priority::*};
use crate::candidate::{candidate_pair::*, *};
use crate::credentials::Credentials;
use crate::state::*;
use shared::error::*;
use shared::{TransportContext, TransportMessage, TransportProtocol};

/// Events raised by the [Agent], drained with `poll_event`.
#[derive(Debug, Clone)]
pub enum Event {
    ConnectionStateChange(ConnectionState),
    SelectedCandidatePairChange(Box<Candidate>, Box<Candidate>),
}

#[derive(Debug, Clone)]
pub(crate) struct BindingRequest {
    pub(crate) timestamp: Instant,
    pub(crate) transaction_id: TransactionId,
    pub(crate) destination: SocketAddr,
    pub(crate) local_index: usize,
    pub(crate) remote_index: usize,
    pub(crate) is_use_candidate: bool,
    pub(crate) is_controlling: bool,
}

#[derive(Default)]
pub(crate) struct UfragPwd {
    pub(crate) local_ufrag: String,
    pub(crate) local_pwd: String,
    pub(crate) remote_ufrag: String,
    pub(crate) remote_pwd: String,
}

fn assert_inbound_username(m: &Message, expected_username: &str) -> Result<()> {
    let username = Username::get_from_as(m, ATTR_USERNAME)?;

    if username.text != expected_username {
        return Err(Error::Other(format!(
            "{:?} expected({}) actual({})",
            Error::ErrMismatchUsername,
            expected_username,
            username,
        )));
    }

    Ok(())
}

fn assert_inbound_message_integrity(m: &Message, key: &[u8]) -> Result<()> {
    let message_integrity_attr = MessageIntegrity(key.to_vec());
    message_integrity_attr.check(m)
}

/// Represents the ICE agent.
///
/// The agent owns no socket. Inbound STUN goes through `handle_read`, outbound datagrams are
/// drained with `poll_write`, and timers are driven by `poll_timeout`/`handle_timeout`.
pub struct Agent {
    pub(crate) tie_breaker: u64,
    pub(crate) is_controlling: bool,

    pub(crate) now: Instant,
    pub(crate) checking_start: Option<Instant>,
    pub(crate) last_check: Option<Instant>,

    pub(crate) connection_state: ConnectionState,

    pub(crate) ufrag_pwd: UfragPwd,

    pub(crate) local_candidates: Vec<Candidate>,
    pub(crate) remote_candidates: Vec<Candidate>,
    pub(crate) candidate_pairs: Vec<CandidatePair>,
    pub(crate) selected_pair: Option<usize>,
    pub(crate) triggered_checks: VecDeque<usize>,
    pub(crate) remote_end_of_candidates: bool,

    // LRU of outbound Binding request Transaction IDs
    pub(crate) pending_binding_requests: Vec<BindingRequest>,

    // the following variables won't be changed after new()
    pub(crate) max_binding_requests: u16,
    pub(crate) max_concurrent_checks: usize,
    pub(crate) initial_rto: Duration,
    // How long connectivity checks can fail before the ICE Agent
    // goes to disconnected
    pub(crate) disconnected_timeout: Duration,
    // How long connectivity checks can fail before the ICE Agent
    // goes to failed
    pub(crate) failed_timeout: Duration,
    // How often should we send keepalive packets?
    // 0 means never
    pub(crate) keepalive_interval: Duration,
    // Pacing of new checks
    pub(crate) check_interval: Duration,
    pub(crate) disable_background_checks: bool,

    pub(crate) transmits: VecDeque<TransportMessage<BytesMut>>,
    pub(crate) events: VecDeque<Event>,
}

impl Agent {
    /// Creates a new Agent.
    pub fn new(config: AgentConfig) -> Result<Self> {
        let mut agent = Self {
            tie_breaker: rand::random::<u64>(),
            is_controlling: config.is_controlling,

            now: Instant::now(),
            checking_start: None,
            last_check: None,

            connection_state: ConnectionState::New,

            ufrag_pwd: UfragPwd::default(),

            local_candidates: vec![],
            remote_candidates: vec![],
            candidate_pairs: vec![],
            selected_pair: None,
            triggered_checks: VecDeque::new(),
            remote_end_of_candidates: false,

            pending_binding_requests: vec![],

            max_binding_requests: config
                .max_binding_requests
                .unwrap_or(DEFAULT_MAX_BINDING_REQUESTS),
            max_concurrent_checks: config
                .max_concurrent_checks
                .unwrap_or(DEFAULT_MAX_CONCURRENT_CHECKS)
                .max(1),
            initial_rto: config.initial_rto.unwrap_or(DEFAULT_INITIAL_RTO),
            disconnected_timeout: config
                .disconnected_timeout
                .unwrap_or(DEFAULT_DISCONNECTED_TIMEOUT),
            failed_timeout: config.failed_timeout.unwrap_or(DEFAULT_FAILED_TIMEOUT),
            keepalive_interval: config
                .keepalive_interval
                .unwrap_or(DEFAULT_KEEPALIVE_INTERVAL),
            check_interval: match config.check_interval {
                Some(interval) if interval != Duration::ZERO => interval,
                _ => DEFAULT_CHECK_INTERVAL,
            },
            disable_background_checks: config.disable_background_checks,

            transmits: VecDeque::new(),
            events: VecDeque::new(),
        };

        // Restart is also used to initialize the agent for the first time
        agent.restart(config.local_ufrag, config.local_pwd, false)?;

        Ok(agent)
    }

    /// Adds a new local candidate.
    pub fn add_local_candidate(&mut self, c: Candidate) -> Result<()> {
        if self.connection_state == ConnectionState::Closed {
            return Err(Error::ErrAgentClosed);
        }

        if self.local_candidates.iter().any(|cand| cand.equal(&c)) {
            return Ok(());
        }

        self.local_candidates.push(c);
        let local_index = self.local_candidates.len() - 1;

        for remote_index in 0..self.remote_candidates.len() {
            self.add_pair(local_index, remote_index);
        }

        Ok(())
    }

    /// Adds a new remote candidate.
    ///
    /// A signaled candidate replaces a peer-reflexive one learned earlier at the same address.
    pub fn add_remote_candidate(&mut self, c: Candidate) -> Result<()> {
        if self.connection_state == ConnectionState::Closed {
            return Err(Error::ErrAgentClosed);
        }

        if let Some(remote_index) = self.find_remote_candidate(c.addr()) {
            if self.remote_candidates[remote_index].candidate_type()
                == CandidateType::PeerReflexive
                && c.candidate_type() != CandidateType::PeerReflexive
            {
                debug!(
                    "[{}]: signaled candidate {} replaces peer-reflexive {}",
                    self.get_name(),
                    c,
                    self.remote_candidates[remote_index]
                );
                let mut c = c;
                c.last_received = self.remote_candidates[remote_index].last_received;
                let priority = c.priority();
                let foundation = c.foundation();
                self.remote_candidates[remote_index] = c;

                for p in self
                    .candidate_pairs
                    .iter_mut()
                    .filter(|p| p.remote_index == remote_index)
                {
                    p.remote_priority = priority;
                    p.foundation = format!(
                        "{}{}",
                        self.local_candidates[p.local_index].foundation(),
                        foundation
                    );
                }
                self.update_selected_pair();
            }
            return Ok(());
        }

        self.remote_candidates.push(c);
        let remote_index = self.remote_candidates.len() - 1;

        for local_index in 0..self.local_candidates.len() {
            self.add_pair(local_index, remote_index);
        }

        Ok(())
    }

    /// Signals that the remote side will not trickle any more candidates.
    pub fn set_remote_end_of_candidates(&mut self) {
        self.remote_end_of_candidates = true;
    }

    /// Returns the local user credentials.
    pub fn get_local_user_credentials(&self) -> (String, String) {
        (
            self.ufrag_pwd.local_ufrag.clone(),
            self.ufrag_pwd.local_pwd.clone(),
        )
    }

    /// Returns the remote user credentials.
    pub fn get_remote_user_credentials(&self) -> (String, String) {
        (
            self.ufrag_pwd.remote_ufrag.clone(),
            self.ufrag_pwd.remote_pwd.clone(),
        )
    }

    /// Returns the current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.connection_state
    }

    /// Whether the agent currently holds the controlling role.
    pub fn is_controlling(&self) -> bool {
        self.is_controlling
    }

    /// Returns the local candidates.
    pub fn get_local_candidates(&self) -> &[Candidate] {
        &self.local_candidates
    }

    /// Returns the remote candidates.
    pub fn get_remote_candidates(&self) -> &[Candidate] {
        &self.remote_candidates
    }

    /// Returns the candidate pairs of the check list.
    pub fn get_candidate_pairs(&self) -> &[CandidatePair] {
        &self.candidate_pairs
    }

    /// Returns the selected pair as (local, remote) or none if there is none
    pub fn get_selected_candidate_pair(&self) -> Option<(&Candidate, &Candidate)> {
        self.selected_pair.map(|pair_index| {
            let p = &self.candidate_pairs[pair_index];
            (
                &self.local_candidates[p.local_index],
                &self.remote_candidates[p.remote_index],
            )
        })
    }

    /// Sets the credentials of the remote agent.
    pub fn set_remote_credentials(
        &mut self,
        remote_ufrag: String,
        remote_pwd: String,
    ) -> Result<()> {
        if remote_ufrag.is_empty() {
            return Err(Error::ErrRemoteUfragEmpty);
        } else if remote_pwd.is_empty() {
            return Err(Error::ErrRemotePwdEmpty);
        }

        self.ufrag_pwd.remote_ufrag = remote_ufrag;
        self.ufrag_pwd.remote_pwd = remote_pwd;
        Ok(())
    }

    /// Restarts the ICE Agent with the provided ufrag/pwd
    /// If no ufrag/pwd is provided the Agent will generate one itself.
    pub fn restart(
        &mut self,
        ufrag: String,
        pwd: String,
        keep_local_candidates: bool,
    ) -> Result<()> {
        if self.connection_state == ConnectionState::Closed {
            return Err(Error::ErrAgentClosed);
        }
        let local = Credentials::with_defaults(ufrag, pwd)?;

        // Clear all agent needed to take back to fresh state
        self.ufrag_pwd.local_ufrag = local.ufrag;
        self.ufrag_pwd.local_pwd = local.pwd;
        self.ufrag_pwd.remote_ufrag = String::new();
        self.ufrag_pwd.remote_pwd = String::new();

        self.pending_binding_requests.clear();
        self.triggered_checks.clear();
        self.candidate_pairs.clear();
        self.remote_end_of_candidates = false;
        self.last_check = None;
        self.checking_start = None;

        self.set_selected_pair(None);
        self.delete_all_candidates(keep_local_candidates);

        // Restart is used by new(). start_connectivity_checks should be used to move to
        // checking for new Agents
        if self.connection_state != ConnectionState::New {
            self.update_connection_state(ConnectionState::Checking);
        }

        Ok(())
    }

    /// Installs the remote credentials and begins connectivity checks in the given role.
    pub fn start_connectivity_checks(
        &mut self,
        is_controlling: bool,
        remote_ufrag: String,
        remote_pwd: String,
    ) -> Result<()> {
        if self.connection_state == ConnectionState::Closed {
            return Err(Error::ErrAgentClosed);
        }

        debug!(
            "Started agent: isControlling? {}, remoteUfrag: {}",
            is_controlling, remote_ufrag,
        );
        self.set_remote_credentials(remote_ufrag, remote_pwd)?;
        self.set_role(is_controlling);
        self.checking_start = Some(self.now);

        self.update_connection_state(ConnectionState::Checking);

        Ok(())
    }

    /// Processes non STUN traffic from a remote candidate, and returns true if it is an actual
    /// remote candidate.
    pub fn validate_non_stun_traffic(&mut self, remote_addr: SocketAddr) -> bool {
        if let Some(remote_index) = self.find_remote_candidate(remote_addr) {
            self.remote_candidates[remote_index].mark_received(self.now);
            true
        } else {
            false
        }
    }

    pub(crate) fn update_connection_state(&mut self, new_state: ConnectionState) {
        if self.connection_state != new_state {
            info!(
                "[{}]: Setting new connection state: {}",
                self.get_name(),
                new_state
            );
            self.connection_state = new_state;
            self.events
                .push_back(Event::ConnectionStateChange(new_state));
        }
    }

    pub(crate) fn set_selected_pair(&mut self, selected_pair: Option<usize>) {
        if let Some(pair_index) = selected_pair {
            let p = &self.candidate_pairs[pair_index];
            trace!(
                "[{}]: Set selected candidate pair: {:?}",
                self.get_name(),
                p
            );

            let local = self.local_candidates[p.local_index].clone();
            let remote = self.remote_candidates[p.remote_index].clone();
            self.selected_pair = Some(pair_index);
            self.events.push_back(Event::SelectedCandidatePairChange(
                Box::new(local),
                Box::new(remote),
            ));
        } else {
            self.selected_pair = None;
        }
    }

    pub(crate) fn set_role(&mut self, is_controlling: bool) {
        self.is_controlling = is_controlling;
        for p in &mut self.candidate_pairs {
            p.ice_role_controlling = is_controlling;
        }
    }

    pub(crate) fn add_pair(&mut self, local_index: usize, remote_index: usize) -> Option<usize> {
        let local = &self.local_candidates[local_index];
        let remote = &self.remote_candidates[remote_index];

        // server reflexive candidates are redundant with their host base
        if local.candidate_type() == CandidateType::ServerReflexive
            || local.component() != remote.component()
            || local.network_type().is_ipv4() != remote.network_type().is_ipv4()
        {
            return None;
        }

        let mut p = CandidatePair::new(
            local_index,
            remote_index,
            local.priority(),
            remote.priority(),
            self.is_controlling,
        );
        p.foundation = format!("{}{}", local.foundation(), remote.foundation());

        let foundation_busy = self.candidate_pairs.iter().any(|other| {
            other.foundation == p.foundation
                && (other.state == CandidatePairState::Waiting
                    || other.state == CandidatePairState::InProgress)
        });
        if foundation_busy {
            p.state = CandidatePairState::Frozen;
        }

        trace!("[{}]: adding pair {:?}", self.get_name(), p);
        self.candidate_pairs.push(p);
        Some(self.candidate_pairs.len() - 1)
    }

    pub(crate) fn find_pair(&self, local_index: usize, remote_index: usize) -> Option<usize> {
        self.candidate_pairs
            .iter()
            .position(|p| p.local_index == local_index && p.remote_index == remote_index)
    }

    /// Remove all candidates.
    /// This removes both the local and remote candidate lists.
    ///
    /// This is used for restarts and on close.
    pub(crate) fn delete_all_candidates(&mut self, keep_local_candidates: bool) {
        if !keep_local_candidates {
            self.local_candidates.clear();
        }
        self.remote_candidates.clear();
    }

    pub(crate) fn find_local_candidate(&self, addr: SocketAddr) -> Option<usize> {
        self.local_candidates.iter().position(|c| {
            c.candidate_type() != CandidateType::ServerReflexive && c.addr() == addr
        })
    }

    pub(crate) fn find_remote_candidate(&self, addr: SocketAddr) -> Option<usize> {
        self.remote_candidates.iter().position(|c| c.addr() == addr)
    }

    /// Builds and sends a Binding request over the pair, remembering its transaction.
    pub(crate) fn send_binding_request(
        &mut self,
        m: &Message,
        local_index: usize,
        remote_index: usize,
    ) {
        trace!(
            "[{}]: ping STUN from {} to {}",
            self.get_name(),
            self.local_candidates[local_index],
            self.remote_candidates[remote_index],
        );

        self.invalidate_pending_binding_requests(self.now);
        self.pending_binding_requests.push(BindingRequest {
            timestamp: self.now,
            transaction_id: m.transaction_id,
            destination: self.remote_candidates[remote_index].addr(),
            local_index,
            remote_index,
            is_use_candidate: m.contains(ATTR_USE_CANDIDATE),
            is_controlling: m.contains(ATTR_ICE_CONTROLLING),
        });

        let peer_addr = self.remote_candidates[remote_index].addr();
        self.send_stun(m, local_index, peer_addr);
    }

    pub(crate) fn send_binding_success(
        &mut self,
        m: &Message,
        local_index: usize,
        remote_addr: SocketAddr,
    ) {
        let (ip, port) = (remote_addr.ip(), remote_addr.port());
        let local_pwd = self.ufrag_pwd.local_pwd.clone();

        let mut out = Message::new();
        let result = out.build(&[
            Box::new(m.clone()),
            Box::new(BINDING_SUCCESS),
            Box::new(XorMappedAddress { ip, port }),
            Box::new(MessageIntegrity::new_short_term_integrity(local_pwd)),
            Box::new(FINGERPRINT),
        ]);

        if let Err(err) = result {
            warn!(
                "[{}]: Failed to handle inbound ICE from: {} to: {} error: {}",
                self.get_name(),
                remote_addr,
                self.local_candidates[local_index],
                err
            );
        } else {
            self.send_stun(&out, local_index, remote_addr);
        }
    }

    pub(crate) fn send_role_conflict(
        &mut self,
        m: &Message,
        local_index: usize,
        remote_addr: SocketAddr,
    ) {
        let local_pwd = self.ufrag_pwd.local_pwd.clone();

        let mut out = Message::new();
        let result = out.build(&[
            Box::new(m.clone()),
            Box::new(BINDING_ERROR),
            Box::new(CODE_ROLE_CONFLICT),
            Box::new(MessageIntegrity::new_short_term_integrity(local_pwd)),
            Box::new(FINGERPRINT),
        ]);

        match result {
            Ok(()) => self.send_stun(&out, local_index, remote_addr),
            Err(err) => warn!("[{}]: Failed to build 487: {}", self.get_name(), err),
        }
    }

    pub(crate) fn send_stun(&mut self, msg: &Message, local_index: usize, peer_addr: SocketAddr) {
        let local_addr = self.local_candidates[local_index].addr();
        let transport_protocol = if self.local_candidates[local_index].network_type().is_tcp() {
            TransportProtocol::TCP
        } else {
            TransportProtocol::UDP
        };

        self.transmits.push_back(TransportMessage {
            now: self.now,
            transport: TransportContext {
                local_addr,
                peer_addr,
                transport_protocol,
            },
            message: BytesMut::from(&msg.raw[..]),
        });

        self.local_candidates[local_index].mark_sent(self.now);
    }

    /// Removes pending binding requests that are over `MAX_BINDING_REQUEST_TIMEOUT` old.
    ///
    /// reference: (IETF ref-8445)[https://tools.ietf.org/html/rfc8445#appendix-B.1].
    pub(crate) fn invalidate_pending_binding_requests(&mut self, filter_time: Instant) {
        let initial_size = self.pending_binding_requests.len();

        self.pending_binding_requests.retain(|binding_request| {
            filter_time
                .checked_duration_since(binding_request.timestamp)
                .is_none_or(|duration| duration < MAX_BINDING_REQUEST_TIMEOUT)
        });

        let bind_requests_removed = initial_size - self.pending_binding_requests.len();
        if bind_requests_removed > 0 {
            trace!(
                "[{}]: Discarded {} binding requests because they expired",
                self.get_name(),
                bind_requests_removed
            );
        }
    }

    /// Assert that the passed `TransactionID` is in our `pending_binding_requests` and returns
    /// it. If the bindingRequest was valid remove it from our pending cache.
    pub(crate) fn handle_inbound_binding_success(
        &mut self,
        id: TransactionId,
    ) -> Option<BindingRequest> {
        self.invalidate_pending_binding_requests(self.now);

        let index = self
            .pending_binding_requests
            .iter()
            .position(|r| r.transaction_id == id)?;
        Some(self.pending_binding_requests.remove(index))
    }

    /// Processes STUN traffic from a remote candidate.
    pub(crate) fn handle_inbound(
        &mut self,
        m: &Message,
        local_index: usize,
        remote_addr: SocketAddr,
    ) -> Result<()> {
        if m.typ.method != METHOD_BINDING {
            trace!(
                "[{}]: unhandled STUN from {} to {} class({}) method({})",
                self.get_name(),
                remote_addr,
                self.local_candidates[local_index],
                m.typ.class,
                m.typ.method
            );
            return Ok(());
        }

        if m.contains(ATTR_FINGERPRINT) {
            if let Err(err) = FINGERPRINT.check(m) {
                warn!(
                    "[{}]: discard message from ({}), {}",
                    self.get_name(),
                    remote_addr,
                    err
                );
                return Ok(());
            }
        }

        if m.typ.class == CLASS_SUCCESS_RESPONSE || m.typ.class == CLASS_ERROR_RESPONSE {
            if let Err(err) =
                assert_inbound_message_integrity(m, self.ufrag_pwd.remote_pwd.as_bytes())
            {
                warn!(
                    "[{}]: discard message from ({}), {}",
                    self.get_name(),
                    remote_addr,
                    err
                );
                return Ok(());
            }

            let Some(pending_request) = self.handle_inbound_binding_success(m.transaction_id)
            else {
                warn!(
                    "[{}]: discard message from ({}), unknown TransactionID 0x{:?}",
                    self.get_name(),
                    remote_addr,
                    m.transaction_id
                );
                return Ok(());
            };

            // Assert that NAT is not symmetric
            // https://tools.ietf.org/html/rfc8445#section-7.2.5.2.1
            if pending_request.destination != remote_addr {
                debug!(
                    "[{}]: discard message: transaction source and destination does not match expected({}), actual({})",
                    self.get_name(),
                    pending_request.destination,
                    remote_addr
                );
                return Ok(());
            }

            self.remote_candidates[pending_request.remote_index].mark_received(self.now);

            if m.typ.class == CLASS_SUCCESS_RESPONSE {
                trace!(
                    "[{}]: inbound STUN (SuccessResponse) from {} to {}",
                    self.get_name(),
                    remote_addr,
                    self.local_candidates[local_index]
                );
                self.handle_success_response(m, &pending_request);
            } else {
                self.handle_error_response(m, &pending_request);
            }
        } else if m.typ.class == CLASS_REQUEST {
            let username = format!(
                "{}:{}",
                self.ufrag_pwd.local_ufrag, self.ufrag_pwd.remote_ufrag
            );
            if let Err(err) = assert_inbound_username(m, &username) {
                warn!(
                    "[{}]: discard message from ({}), {}",
                    self.get_name(),
                    remote_addr,
                    err
                );
                return Ok(());
            } else if let Err(err) =
                assert_inbound_message_integrity(m, self.ufrag_pwd.local_pwd.as_bytes())
            {
                warn!(
                    "[{}]: discard message from ({}), {}",
                    self.get_name(),
                    remote_addr,
                    err
                );
                return Ok(());
            }

            if !self.resolve_role_conflict(m, local_index, remote_addr) {
                return Ok(());
            }

            let remote_index = match self.find_remote_candidate(remote_addr) {
                Some(remote_index) => remote_index,
                None => self.learn_peer_reflexive(m, local_index, remote_addr)?,
            };

            trace!(
                "[{}]: inbound STUN (Request) from {} to {}",
                self.get_name(),
                remote_addr,
                self.local_candidates[local_index]
            );

            self.remote_candidates[remote_index].mark_received(self.now);
            self.handle_binding_request(m, local_index, remote_index);
        } else if m.typ.class == CLASS_INDICATION {
            if let Some(remote_index) = self.find_remote_candidate(remote_addr) {
                self.remote_candidates[remote_index].mark_received(self.now);
            }
        }

        Ok(())
    }

    /// RFC 8445 7.3.1.1: when both sides claim the same role the larger tie-breaker keeps it.
    /// Returns false if the request was answered with 487 and must not be processed further.
    fn resolve_role_conflict(
        &mut self,
        m: &Message,
        local_index: usize,
        remote_addr: SocketAddr,
    ) -> bool {
        let mut remote_tie_breaker = None;
        if self.is_controlling {
            let mut attr = AttrControlling::default();
            if attr.get_from(m).is_ok() {
                remote_tie_breaker = Some(attr.0);
            }
        } else {
            let mut attr = AttrControlled::default();
            if attr.get_from(m).is_ok() {
                remote_tie_breaker = Some(attr.0);
            }
        }

        let Some(remote_tie_breaker) = remote_tie_breaker else {
            return true;
        };

        if self.tie_breaker >= remote_tie_breaker {
            debug!(
                "[{}]: role conflict with {}, keeping role",
                self.get_name(),
                remote_addr
            );
            self.send_role_conflict(m, local_index, remote_addr);
            false
        } else {
            let is_controlling = !self.is_controlling;
            debug!(
                "[{}]: role conflict with {}, switching role",
                self.get_name(),
                remote_addr
            );
            self.set_role(is_controlling);
            true
        }
    }

    fn learn_peer_reflexive(
        &mut self,
        m: &Message,
        local_index: usize,
        remote_addr: SocketAddr,
    ) -> Result<usize> {
        let mut priority = PriorityAttr::default();
        if priority.get_from(m).is_err() {
            warn!(
                "[{}]: discard request from ({}), no PRIORITY",
                self.get_name(),
                remote_addr
            );
            return Err(Error::ErrInvalidBindingRequest);
        }

        let local = &self.local_candidates[local_index];
        let prflx_candidate = CandidateConfig {
            candidate_type: CandidateType::PeerReflexive,
            network: local.network_type().to_string(),
            address: remote_addr.ip().to_string(),
            port: remote_addr.port(),
            component: local.component(),
            priority: priority.0,
            ..Default::default()
        }
        .build()?;

        debug!(
            "[{}]: adding a new peer-reflexive candidate: {} ",
            self.get_name(),
            remote_addr
        );
        self.remote_candidates.push(prflx_candidate);
        let remote_index = self.remote_candidates.len() - 1;
        for local_index in 0..self.local_candidates.len() {
            self.add_pair(local_index, remote_index);
        }

        Ok(remote_index)
    }

    fn handle_error_response(&mut self, m: &Message, pending_request: &BindingRequest) {
        let Some(pair_index) =
            self.find_pair(pending_request.local_index, pending_request.remote_index)
        else {
            return;
        };

        let mut error_code = ErrorCodeAttribute::default();
        let code = if error_code.get_from(m).is_ok() {
            error_code.code
        } else {
            ErrorCode(0)
        };

        if code == CODE_ROLE_CONFLICT {
            // RFC 8445 7.2.5.1: switch to the role opposite of the one the request claimed
            let is_controlling = !pending_request.is_controlling;
            debug!(
                "[{}]: got 487 from {}, switching role",
                self.get_name(),
                pending_request.destination
            );
            self.set_role(is_controlling);

            let p = &mut self.candidate_pairs[pair_index];
            if p.state != CandidatePairState::Succeeded {
                p.state = CandidatePairState::Waiting;
                p.next_retransmit = None;
                p.transaction_id = None;
                p.binding_request_count = 0;
            }
            self.push_triggered_check(pair_index);
        } else {
            warn!(
                "[{}]: pair {} got error response {}",
                self.get_name(),
                self.candidate_pairs[pair_index],
                code.0
            );
            let p = &mut self.candidate_pairs[pair_index];
            if p.state != CandidatePairState::Succeeded {
                p.state = CandidatePairState::Failed;
                p.next_retransmit = None;
                let foundation = p.foundation.clone();
                self.unfreeze_foundation(&foundation);
            }
        }
    }

    pub(crate) fn push_triggered_check(&mut self, pair_index: usize) {
        if !self.triggered_checks.contains(&pair_index) {
            self.triggered_checks.push_back(pair_index);
        }
    }

    pub(crate) fn unfreeze_foundation(&mut self, foundation: &str) {
        for p in &mut self.candidate_pairs {
            if p.state == CandidatePairState::Frozen && p.foundation == foundation {
                p.state = CandidatePairState::Waiting;
            }
        }
    }

    pub(crate) fn is_alive(&self, pair_index: usize) -> bool {
        if self.disconnected_timeout == Duration::ZERO {
            return true;
        }
        let remote_index = self.candidate_pairs[pair_index].remote_index;
        self.now
            .saturating_duration_since(self.remote_candidates[remote_index].last_received())
            < self.disconnected_timeout
    }

    /// Returns the highest priority pair eligible for selection.
    /// The controlled agent only selects what the controlling agent nominated.
    pub(crate) fn get_best_valid_candidate_pair(&self) -> Option<usize> {
        let mut best_pair_index: Option<usize> = None;

        for (index, p) in self.candidate_pairs.iter().enumerate() {
            if p.state != CandidatePairState::Succeeded
                || !(self.is_controlling || p.nominated)
                || !self.is_alive(index)
            {
                continue;
            }

            match best_pair_index {
                Some(best) if self.candidate_pairs[best].priority() >= p.priority() => {}
                _ => best_pair_index = Some(index),
            }
        }

        best_pair_index
    }

    /// Moves the selection to the best valid pair, if it differs from the current one.
    pub(crate) fn update_selected_pair(&mut self) {
        let Some(best) = self.get_best_valid_candidate_pair() else {
            return;
        };

        if self.selected_pair != Some(best) {
            self.set_selected_pair(Some(best));
        }
        self.update_connected_state();
    }

    /// Moves between connected and completed once a pair is selected.
    pub(crate) fn update_connected_state(&mut self) {
        if self.selected_pair.is_none()
            || matches!(
                self.connection_state,
                ConnectionState::Failed | ConnectionState::Closed
            )
        {
            return;
        }

        let checks_pending = !self.triggered_checks.is_empty()
            || self.candidate_pairs.iter().any(|p| {
                matches!(
                    p.state,
                    CandidatePairState::Waiting
                        | CandidatePairState::Frozen
                        | CandidatePairState::InProgress
                )
            });

        if self.is_controlling && self.remote_end_of_candidates && !checks_pending {
            self.update_connection_state(ConnectionState::Completed);
        } else {
            self.update_connection_state(ConnectionState::Connected);
        }
    }

    pub(crate) fn get_name(&self) -> &'static str {
        if self.is_controlling {
            "controlling"
        } else {
            "controlled"
        }
    }
}
