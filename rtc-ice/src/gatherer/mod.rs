#[cfg(test)]
mod gatherer_test;

use log::{debug, trace, warn};
use std::collections::{HashSet, VecDeque};
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

use shared::error::*;
use sansio::Protocol;
use shared::{TaggedBytesMut, TransportProtocol};
use stun::client::{Client, ClientBuilder};
use stun::message::*;
use stun::xoraddr::XorMappedAddress;

use crate::candidate::*;
use crate::state::GatheringState;

/// Initial retransmission timeout of the server reflexive binding requests.
pub(crate) const DEFAULT_STUN_RTO: Duration = Duration::from_millis(200);

/// Lists the addresses of the interfaces that are up.
/// Link-local IPv6 addresses are skipped, loopback only on request.
pub fn local_interfaces(include_loopback: bool) -> Result<Vec<IpAddr>> {
    let ips: Vec<IpAddr> = if_addrs::get_if_addrs()?
        .into_iter()
        .filter(|iface| include_loopback || !iface.is_loopback())
        .map(|iface| iface.ip())
        .filter(|ip| match ip {
            IpAddr::V4(_) => true,
            IpAddr::V6(ipv6) => (ipv6.segments()[0] & 0xffc0) != 0xfe80,
        })
        .collect();

    if ips.is_empty() {
        Err(Error::ErrNoInterface)
    } else {
        Ok(ips)
    }
}

/// Configures a [CandidateGatherer].
#[derive(Default, Clone)]
pub struct GathererConfig {
    /// Bound local sockets, one host candidate each.
    pub local_addrs: Vec<SocketAddr>,
    /// STUN servers queried from every local socket of the same address family.
    pub stun_servers: Vec<SocketAddr>,
    /// Defaults to 200 milliseconds.
    pub stun_rto: Option<Duration>,
}

/// Output of the gatherer.
#[derive(Debug, Clone)]
pub enum GathererEvent {
    Candidate(Candidate),
    Complete,
}

/// Collects host and server reflexive candidates without doing any I/O itself.
pub struct CandidateGatherer {
    local_addrs: Vec<SocketAddr>,
    stun_servers: Vec<SocketAddr>,
    stun_rto: Duration,

    state: GatheringState,
    clients: Vec<Client>,
    emitted: HashSet<SocketAddr>,

    transmits: VecDeque<TaggedBytesMut>,
    events: VecDeque<GathererEvent>,
}

impl CandidateGatherer {
    pub fn new(config: GathererConfig) -> Self {
        Self {
            local_addrs: config.local_addrs,
            stun_servers: config.stun_servers,
            stun_rto: config.stun_rto.unwrap_or(DEFAULT_STUN_RTO),

            state: GatheringState::New,
            clients: vec![],
            emitted: HashSet::new(),

            transmits: VecDeque::new(),
            events: VecDeque::new(),
        }
    }

    pub fn state(&self) -> GatheringState {
        self.state
    }

    /// Starts gathering. Host candidates are available from `poll_event` right away,
    /// server reflexive ones once their STUN server answered.
    pub fn gather(&mut self, now: Instant) -> Result<()> {
        if self.state != GatheringState::New {
            return Err(Error::ErrMultipleGatherAttempted);
        }
        self.state = GatheringState::Gathering;

        for (index, local_addr) in self.local_addrs.clone().into_iter().enumerate() {
            let host = CandidateConfig {
                candidate_type: CandidateType::Host,
                network: "udp".to_owned(),
                address: local_addr.ip().to_string(),
                port: local_addr.port(),
                component: COMPONENT_RTP,
                priority: Candidate::compute_priority(
                    CandidateType::Host,
                    local_preference(index),
                    COMPONENT_RTP,
                ),
                ..Default::default()
            };

            match host.build() {
                Ok(candidate) => self.emit(candidate),
                Err(err) => warn!("failed to create host candidate for {local_addr}: {err}"),
            }
        }

        for local_addr in self.local_addrs.clone() {
            for server in self.stun_servers.clone() {
                if local_addr.is_ipv4() != server.is_ipv4() {
                    continue;
                }
                if let Err(err) = self.query_server(local_addr, server, now) {
                    warn!("failed to query STUN server {server} from {local_addr}: {err}");
                }
            }
        }

        self.check_complete();
        Ok(())
    }

    /// Whether a STUN response with this transaction id belongs to the gatherer.
    pub fn owns_transaction(&self, id: &TransactionId) -> bool {
        self.clients.iter().any(|c| c.owns_transaction(id))
    }

    fn query_server(
        &mut self,
        local_addr: SocketAddr,
        server: SocketAddr,
        now: Instant,
    ) -> Result<()> {
        let mut client = ClientBuilder::new().with_rto(self.stun_rto).build(
            local_addr,
            server,
            TransportProtocol::UDP,
            now,
        )?;

        let mut msg = Message::new();
        msg.build(&[Box::new(BINDING_REQUEST), Box::new(TransactionId::new())])?;
        client.handle_write(msg)?;

        trace!("STUN binding request from {local_addr} to {server}");
        self.clients.push(client);
        Ok(())
    }

    fn emit(&mut self, candidate: Candidate) {
        if !self.emitted.insert(candidate.addr()) {
            trace!("suppressing duplicate candidate {candidate}");
            return;
        }
        debug!("gathered candidate {candidate}");
        self.events.push_back(GathererEvent::Candidate(candidate));
    }

    /// Collects finished transactions into candidates, dropping their clients.
    fn process_clients(&mut self) {
        let mut finished = vec![];
        for (index, client) in self.clients.iter_mut().enumerate() {
            while let Some(transmit) = client.poll_write() {
                self.transmits.push_back(transmit);
            }
            if let Some(event) = client.poll_event() {
                finished.push((index, client.local_addr(), client.peer_addr(), event.result));
            }
            while let Some(transmit) = client.poll_write() {
                self.transmits.push_back(transmit);
            }
        }

        for (_, local_addr, server, result) in &finished {
            match result {
                Ok(m) if m.typ == BINDING_SUCCESS => {
                    let mut xor_addr = XorMappedAddress::default();
                    if let Err(err) = xor_addr.get_from(m) {
                        warn!("STUN server {server} sent no mapped address: {err}");
                        continue;
                    }
                    self.add_server_reflexive(*local_addr, xor_addr);
                }
                Ok(m) => warn!("STUN server {server} answered {}", m.typ),
                Err(err) => warn!("STUN request from {local_addr} to {server} failed: {err}"),
            }
        }

        for (index, _, _, _) in finished.into_iter().rev() {
            let mut client = self.clients.remove(index);
            let _ = client.close();
        }

        self.check_complete();
    }

    fn add_server_reflexive(&mut self, base: SocketAddr, mapped: XorMappedAddress) {
        let index = self
            .local_addrs
            .iter()
            .position(|addr| *addr == base)
            .unwrap_or_default();
        let srflx = CandidateConfig {
            candidate_type: CandidateType::ServerReflexive,
            network: "udp".to_owned(),
            address: mapped.ip.to_string(),
            port: mapped.port,
            component: COMPONENT_RTP,
            priority: Candidate::compute_priority(
                CandidateType::ServerReflexive,
                local_preference(index),
                COMPONENT_RTP,
            ),
            related_address: Some(CandidateRelatedAddress {
                address: base.ip().to_string(),
                port: base.port(),
            }),
            ..Default::default()
        };

        match srflx.build() {
            Ok(candidate) => self.emit(candidate),
            Err(err) => warn!("failed to create server reflexive candidate: {err}"),
        }
    }

    fn check_complete(&mut self) {
        if self.state == GatheringState::Gathering && self.clients.is_empty() {
            self.state = GatheringState::Complete;
            self.events.push_back(GathererEvent::Complete);
        }
    }
}

fn local_preference(index: usize) -> u16 {
    u16::MAX.saturating_sub(u16::try_from(index).unwrap_or(u16::MAX))
}

impl sansio::Protocol<TaggedBytesMut, (), ()> for CandidateGatherer {
    type Rout = ();
    type Wout = TaggedBytesMut;
    type Eout = GathererEvent;
    type Error = Error;
    type Time = Instant;

    fn handle_read(&mut self, msg: TaggedBytesMut) -> Result<()> {
        let Some(client) = self.clients.iter_mut().find(|c| {
            c.local_addr() == msg.transport.local_addr && c.peer_addr() == msg.transport.peer_addr
        }) else {
            trace!("gatherer dropped datagram from {}", msg.transport.peer_addr);
            return Ok(());
        };

        client.handle_read(msg)?;
        self.process_clients();
        Ok(())
    }

    fn poll_read(&mut self) -> Option<Self::Rout> {
        None
    }

    fn handle_write(&mut self, _msg: ()) -> Result<()> {
        Ok(())
    }

    fn poll_write(&mut self) -> Option<Self::Wout> {
        if let Some(transmit) = self.transmits.pop_front() {
            return Some(transmit);
        }
        self.clients.iter_mut().find_map(|c| c.poll_write())
    }

    fn handle_event(&mut self, _evt: ()) -> Result<()> {
        Ok(())
    }

    fn poll_event(&mut self) -> Option<Self::Eout> {
        self.events.pop_front()
    }

    fn handle_timeout(&mut self, now: Instant) -> Result<()> {
        for client in &mut self.clients {
            client.handle_timeout(now)?;
        }
        self.process_clients();
        Ok(())
    }

    fn poll_timeout(&mut self) -> Option<Instant> {
        self.clients.iter_mut().filter_map(|c| c.poll_timeout()).min()
    }

    fn close(&mut self) -> Result<()> {
        for mut client in self.clients.drain(..) {
            let _ = client.close();
        }
        self.transmits.clear();
        Ok(())
    }
}

