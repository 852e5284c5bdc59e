//! Two sans-I/O peers wired back to back through an in-memory network and a
//! virtual clock.
#![allow(dead_code)]

use anyhow::Result;
use rtc::data_channel::{RTCDataChannelId, RTCDataChannelMessage};
use rtc::peer_connection::RTCPeerConnection;
use rtc::peer_connection::configuration::RTCConfigurationBuilder;
use rtc::peer_connection::configuration::setting_engine::SettingEngine;
use rtc::peer_connection::event::RTCPeerConnectionEvent;
use rtc::peer_connection::event::data_channel_event::RTCDataChannelEvent;
use rtc::peer_connection::message::RTCMessage;
use rtc::peer_connection::state::{RTCIceConnectionState, RTCPeerConnectionState};
use rtc::peer_connection::transport::RTCIceCandidateInit;
use rtc::sansio::Protocol;
use rtc::shared::{TaggedBytesMut, TransportContext, TransportProtocol};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

const MAX_STEPS: usize = 200_000;

pub fn init_log() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init()
        .ok();
}

/// Loopback candidates are all the in-memory network has.
pub fn setting_engine() -> SettingEngine {
    let mut setting_engine = SettingEngine::default();
    setting_engine.set_include_loopback_candidate(true);
    setting_engine
}

pub struct Peer {
    pub pc: RTCPeerConnection,
    pub addrs: Vec<SocketAddr>,
    pub events: Vec<RTCPeerConnectionEvent>,
    pub messages: Vec<(RTCDataChannelId, RTCDataChannelMessage)>,
    outgoing_candidates: VecDeque<Option<RTCIceCandidateInit>>,
}

impl Peer {
    pub fn new(addrs: &[&str], setting_engine: SettingEngine) -> Result<Self> {
        let addrs = addrs
            .iter()
            .map(|addr| addr.parse())
            .collect::<std::result::Result<Vec<SocketAddr>, _>>()?;
        let config = RTCConfigurationBuilder::new()
            .with_local_addrs(addrs.clone())
            .with_setting_engine(setting_engine)
            .build();
        Ok(Peer {
            pc: RTCPeerConnection::new(config)?,
            addrs,
            events: vec![],
            messages: vec![],
            outgoing_candidates: VecDeque::new(),
        })
    }

    pub fn drain(&mut self) {
        while let Some(event) = self.pc.poll_event() {
            if let RTCPeerConnectionEvent::OnIceCandidateEvent(ice_event) = &event {
                self.outgoing_candidates
                    .push_back(ice_event.candidate.clone());
            }
            self.events.push(event);
        }
        while let Some(RTCMessage::DataChannelMessage(id, message)) = self.pc.poll_read() {
            self.messages.push((id, message));
        }
    }

    pub fn connection_states(&self) -> Vec<RTCPeerConnectionState> {
        self.events
            .iter()
            .filter_map(|event| match event {
                RTCPeerConnectionEvent::OnConnectionStateChangeEvent(state) => Some(*state),
                _ => None,
            })
            .collect()
    }

    pub fn ice_connection_states(&self) -> Vec<RTCIceConnectionState> {
        self.events
            .iter()
            .filter_map(|event| match event {
                RTCPeerConnectionEvent::OnIceConnectionStateChangeEvent(state) => Some(*state),
                _ => None,
            })
            .collect()
    }

    pub fn data_channel_events(&self) -> Vec<&RTCDataChannelEvent> {
        self.events
            .iter()
            .filter_map(|event| match event {
                RTCPeerConnectionEvent::OnDataChannel(event) => Some(event),
                _ => None,
            })
            .collect()
    }

    pub fn opened(&self) -> Vec<RTCDataChannelId> {
        self.data_channel_events()
            .into_iter()
            .filter_map(|event| match event {
                RTCDataChannelEvent::OnOpen(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    pub fn texts(&self, id: RTCDataChannelId) -> Vec<String> {
        self.messages
            .iter()
            .filter(|(channel_id, _)| *channel_id == id)
            .map(|(_, message)| String::from_utf8_lossy(&message.data).into_owned())
            .collect()
    }
}

/// What happens to the datagrams of one step.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Link {
    Pass,
    /// Delivers each batch in reverse order.
    Reverse,
    Drop,
}

pub struct Pair {
    pub offer: Peer,
    pub answer: Peer,
    pub now: Instant,
    pub link: Link,
}

impl Pair {
    pub fn new(offer: Peer, answer: Peer) -> Self {
        Pair {
            offer,
            answer,
            now: Instant::now(),
            link: Link::Pass,
        }
    }

    /// Default peers on 127.0.0.1 and 127.0.0.2.
    pub fn loopback() -> Result<Self> {
        Ok(Pair::new(
            Peer::new(&["127.0.0.1:5000"], setting_engine())?,
            Peer::new(&["127.0.0.2:6000"], setting_engine())?,
        ))
    }

    /// Full offer/answer exchange; candidates trickle while stepping.
    pub fn negotiate(&mut self) -> Result<()> {
        let offer = self.offer.pc.create_offer()?;
        self.offer.pc.set_local_description(offer.clone())?;
        self.answer.pc.set_remote_description(offer)?;
        let answer = self.answer.pc.create_answer()?;
        self.answer.pc.set_local_description(answer.clone())?;
        self.offer.pc.set_remote_description(answer)?;
        Ok(())
    }

    /// Moves candidates and datagrams, or fires the next timer when nothing
    /// is in flight. Returns false once both peers are idle.
    pub fn step(&mut self) -> Result<bool> {
        self.offer.drain();
        self.answer.drain();

        let mut progressed = trickle(&mut self.offer, &mut self.answer);
        progressed |= trickle(&mut self.answer, &mut self.offer);

        let to_answer = collect_writes(&mut self.offer);
        let to_offer = collect_writes(&mut self.answer);
        progressed |= !to_answer.is_empty() || !to_offer.is_empty();
        deliver(self.link, self.now, to_answer, &mut self.answer);
        deliver(self.link, self.now, to_offer, &mut self.offer);
        if progressed {
            return Ok(true);
        }

        let next = [self.offer.pc.poll_timeout(), self.answer.pc.poll_timeout()]
            .into_iter()
            .flatten()
            .min();
        let Some(next) = next else {
            return Ok(false);
        };
        self.now = self.now.max(next);
        for peer in [&mut self.offer, &mut self.answer] {
            if let Err(err) = peer.pc.handle_timeout(self.now) {
                log::debug!("handle_timeout: {err}");
            }
        }
        Ok(true)
    }

    /// Steps until `done` holds or `limit` of virtual time passed.
    pub fn run_until(&mut self, limit: Duration, done: impl Fn(&Pair) -> bool) -> Result<bool> {
        let deadline = self.now + limit;
        for _ in 0..MAX_STEPS {
            self.offer.drain();
            self.answer.drain();
            if done(self) {
                return Ok(true);
            }
            if self.now > deadline || !self.step()? {
                break;
            }
        }
        self.offer.drain();
        self.answer.drain();
        Ok(done(self))
    }

    pub fn connect(&mut self) -> Result<bool> {
        self.negotiate()?;
        self.run_until(Duration::from_secs(30), |pair| {
            pair.offer.pc.connection_state() == RTCPeerConnectionState::Connected
                && pair.answer.pc.connection_state() == RTCPeerConnectionState::Connected
        })
    }
}

fn trickle(from: &mut Peer, to: &mut Peer) -> bool {
    let mut progressed = false;
    while let Some(candidate) = from.outgoing_candidates.pop_front() {
        progressed = true;
        if let Err(err) = to.pc.add_ice_candidate(candidate) {
            log::debug!("add_ice_candidate: {err}");
        }
    }
    progressed
}

fn collect_writes(peer: &mut Peer) -> Vec<TaggedBytesMut> {
    let mut writes = vec![];
    while let Some(msg) = peer.pc.poll_write() {
        writes.push(msg);
    }
    writes
}

fn deliver(link: Link, now: Instant, mut datagrams: Vec<TaggedBytesMut>, to: &mut Peer) {
    match link {
        Link::Drop => return,
        Link::Reverse => datagrams.reverse(),
        Link::Pass => {}
    }
    for msg in datagrams {
        if !to.addrs.contains(&msg.transport.peer_addr) {
            continue;
        }
        let result = to.pc.handle_read(TaggedBytesMut {
            now,
            transport: TransportContext {
                local_addr: msg.transport.peer_addr,
                peer_addr: msg.transport.local_addr,
                transport_protocol: TransportProtocol::UDP,
            },
            message: msg.message,
        });
        if let Err(err) = result {
            log::debug!("handle_read: {err}");
        }
    }
}
