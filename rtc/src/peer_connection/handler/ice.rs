use crate::peer_connection::event::RTCEventInternal;
use crate::peer_connection::event::RTCPeerConnectionEvent;
use crate::peer_connection::event::ice_event::RTCPeerConnectionIceEvent;
use crate::peer_connection::message::internal::{Layer, PipelineMessage};
use crate::peer_connection::state::ice_gathering_state::RTCIceGatheringState;
use crate::peer_connection::transport::ice::RTCIceTransport;
use crate::peer_connection::transport::ice::candidate::RTCIceCandidateInit;
use ::ice::agent::Event;
use ::ice::gatherer::GathererEvent;
use log::{debug, info, trace, warn};
use sansio::Protocol;
use shared::error::{Error, Result};
use shared::{TransportContext, TransportMessage};
use std::collections::VecDeque;
use std::time::Instant;
use stun::message::Message;

pub(crate) struct IceHandlerContext {
    pub(crate) ice_transport: RTCIceTransport,

    pub(crate) read_outs: VecDeque<PipelineMessage>,
    pub(crate) write_outs: VecDeque<PipelineMessage>,
    pub(crate) event_outs: VecDeque<RTCEventInternal>,
}

impl IceHandlerContext {
    pub(crate) fn new(ice_transport: RTCIceTransport) -> Self {
        Self {
            ice_transport,

            read_outs: VecDeque::new(),
            write_outs: VecDeque::new(),
            event_outs: VecDeque::new(),
        }
    }
}

/// IceHandler implements ICE Protocol handling
///
/// STUN answers to the gatherer's server requests go to the gatherer, every
/// other STUN message to the connectivity check agent.
pub(crate) struct IceHandler<'a> {
    ctx: &'a mut IceHandlerContext,
}

impl<'a> IceHandler<'a> {
    pub(crate) fn new(ctx: &'a mut IceHandlerContext) -> Self {
        IceHandler { ctx }
    }

    pub(crate) fn name(&self) -> &'static str {
        "IceHandler"
    }

    fn handle_agent_event(&mut self, evt: Event) {
        match evt {
            Event::ConnectionStateChange(state) => {
                let ice_connection_state = state.into();
                if self.ctx.ice_transport.ice_connection_state == ice_connection_state {
                    return;
                }
                info!("ICE connection state changed: {ice_connection_state}");
                self.ctx.ice_transport.ice_connection_state = ice_connection_state;
                self.ctx
                    .event_outs
                    .push_back(RTCEventInternal::RTCPeerConnectionEvent(
                        RTCPeerConnectionEvent::OnIceConnectionStateChangeEvent(
                            ice_connection_state,
                        ),
                    ));
            }
            Event::SelectedCandidatePairChange(local, remote) => {
                debug!(
                    "ice selected candidate pair {:?} <-> {:?}",
                    local.addr(),
                    remote.addr()
                );
                self.ctx
                    .event_outs
                    .push_back(RTCEventInternal::ICESelectedCandidatePairChange);
            }
        }
    }

    fn handle_gatherer_event(&mut self, evt: GathererEvent) {
        match evt {
            GathererEvent::Candidate(candidate) => {
                let init = RTCIceCandidateInit {
                    candidate: format!("candidate:{}", candidate.marshal()),
                    ..Default::default()
                };
                if let Err(err) = self.ctx.ice_transport.agent.add_local_candidate(candidate) {
                    warn!("failed to add local candidate: {err}");
                    return;
                }
                self.ctx
                    .event_outs
                    .push_back(RTCEventInternal::RTCPeerConnectionEvent(
                        RTCPeerConnectionEvent::OnIceCandidateEvent(RTCPeerConnectionIceEvent {
                            candidate: Some(init),
                            url: String::new(),
                        }),
                    ));
            }
            GathererEvent::Complete => {
                debug!("ICE gathering complete");
                self.ctx.ice_transport.ice_gathering_state = RTCIceGatheringState::Complete;
                self.ctx
                    .event_outs
                    .push_back(RTCEventInternal::RTCPeerConnectionEvent(
                        RTCPeerConnectionEvent::OnIceGatheringStateChangeEvent(
                            RTCIceGatheringState::Complete,
                        ),
                    ));
                self.ctx
                    .event_outs
                    .push_back(RTCEventInternal::RTCPeerConnectionEvent(
                        RTCPeerConnectionEvent::OnIceCandidateEvent(
                            RTCPeerConnectionIceEvent::default(),
                        ),
                    ));
            }
        }
    }
}

impl<'a> sansio::Protocol<PipelineMessage, PipelineMessage, RTCEventInternal>
    for IceHandler<'a>
{
    type Rout = PipelineMessage;
    type Wout = PipelineMessage;
    type Eout = RTCEventInternal;
    type Error = Error;
    type Time = Instant;

    fn handle_read(&mut self, mut msg: PipelineMessage) -> Result<()> {
        match msg.message {
            Layer::Stun(message) => {
                let mut stun_message = Message::new();
                stun_message.unmarshal_binary(&message)?;

                if self
                    .ctx
                    .ice_transport
                    .gatherer
                    .owns_transaction(&stun_message.transaction_id)
                {
                    self.ctx.ice_transport.gatherer.handle_read(TransportMessage {
                        now: msg.now,
                        transport: msg.transport,
                        message,
                    })
                } else {
                    self.ctx.ice_transport.agent.handle_read(TransportMessage {
                        now: msg.now,
                        transport: msg.transport,
                        message: stun_message,
                    })
                }
            }
            Layer::Dtls(_) => {
                if self
                    .ctx
                    .ice_transport
                    .agent
                    .validate_non_stun_traffic(msg.transport.peer_addr)
                {
                    trace!("bypass ice read {:?}", msg.transport.peer_addr);
                    // DTLS is bound to the ICE transport, not to one 5-tuple,
                    // so a new selected pair does not disturb it.
                    msg.transport = TransportContext::default();
                    self.ctx.read_outs.push_back(msg);
                } else {
                    trace!(
                        "drop message from unknown remote {:?} to {:?}",
                        msg.transport.peer_addr, msg.transport.local_addr
                    );
                }
                Ok(())
            }
            _ => {
                self.ctx.read_outs.push_back(msg);
                Ok(())
            }
        }
    }

    fn poll_read(&mut self) -> Option<Self::Rout> {
        self.ctx.read_outs.pop_front()
    }

    fn handle_write(&mut self, mut msg: PipelineMessage) -> Result<()> {
        if let Some((local, remote)) = self.ctx.ice_transport.agent.get_selected_candidate_pair() {
            // use ICE selected candidate pair to replace local/peer addr
            msg.transport.local_addr = local.addr();
            msg.transport.peer_addr = remote.addr();
            trace!("bypass ice write {:?}", msg.transport.peer_addr);
            self.ctx.write_outs.push_back(msg);
            Ok(())
        } else {
            Err(Error::ErrNoCandidatePairs)
        }
    }

    fn poll_write(&mut self) -> Option<Self::Wout> {
        while let Some(transmit) = self.ctx.ice_transport.agent.poll_write() {
            self.ctx.write_outs.push_back(PipelineMessage {
                now: transmit.now,
                transport: transmit.transport,
                message: Layer::Stun(transmit.message),
            });
        }
        while let Some(transmit) = self.ctx.ice_transport.gatherer.poll_write() {
            self.ctx.write_outs.push_back(PipelineMessage {
                now: transmit.now,
                transport: transmit.transport,
                message: Layer::Stun(transmit.message),
            });
        }

        self.ctx.write_outs.pop_front()
    }

    fn handle_event(&mut self, evt: RTCEventInternal) -> Result<()> {
        self.ctx.event_outs.push_back(evt);
        Ok(())
    }

    fn poll_event(&mut self) -> Option<Self::Eout> {
        while let Some(evt) = self.ctx.ice_transport.agent.poll_event() {
            self.handle_agent_event(evt);
        }
        while let Some(evt) = self.ctx.ice_transport.gatherer.poll_event() {
            self.handle_gatherer_event(evt);
        }

        self.ctx.event_outs.pop_front()
    }

    fn handle_timeout(&mut self, now: Instant) -> Result<()> {
        self.ctx.ice_transport.gatherer.handle_timeout(now)?;
        self.ctx.ice_transport.agent.handle_timeout(now)
    }

    fn poll_timeout(&mut self) -> Option<Instant> {
        let gatherer_timeout = self.ctx.ice_transport.gatherer.poll_timeout();
        let agent_timeout = self.ctx.ice_transport.agent.poll_timeout();
        match (gatherer_timeout, agent_timeout) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.ctx.ice_transport.gatherer.close()?;
        self.ctx.ice_transport.agent.close()
    }
}
