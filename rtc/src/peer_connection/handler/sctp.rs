use crate::peer_connection::event::RTCEventInternal;
use crate::peer_connection::message::internal::{Layer, PipelineMessage};
use crate::peer_connection::transport::sctp::RTCSctpTransport;
use crate::peer_connection::transport::sctp::state::RTCSctpTransportState;
use datachannel::DataChannelMessage;
use log::{debug, error, trace, warn};
use sansio::Protocol;
use sctp::{AssociationEvent, StreamMessage};
use shared::TransportMessage;
use shared::error::{Error, Result};
use std::collections::VecDeque;
use std::time::Instant;

pub(crate) struct SctpHandlerContext {
    pub(crate) sctp_transport: RTCSctpTransport,

    pub(crate) read_outs: VecDeque<PipelineMessage>,
    pub(crate) write_outs: VecDeque<PipelineMessage>,
    pub(crate) event_outs: VecDeque<RTCEventInternal>,
}

impl SctpHandlerContext {
    pub(crate) fn new(sctp_transport: RTCSctpTransport) -> Self {
        Self {
            sctp_transport,
            read_outs: VecDeque::new(),
            write_outs: VecDeque::new(),
            event_outs: VecDeque::new(),
        }
    }
}

/// SctpHandler carries data channel messages over the association.
pub(crate) struct SctpHandler<'a> {
    ctx: &'a mut SctpHandlerContext,
}

impl<'a> SctpHandler<'a> {
    pub(crate) fn new(ctx: &'a mut SctpHandlerContext) -> Self {
        SctpHandler { ctx }
    }

    pub(crate) fn name(&self) -> &'static str {
        "SctpHandler"
    }

    fn handle_association_event(&mut self, evt: AssociationEvent) {
        match evt {
            AssociationEvent::Connected => {
                self.ctx
                    .sctp_transport
                    .state_change(RTCSctpTransportState::Connected);
                self.ctx
                    .event_outs
                    .push_back(RTCEventInternal::SCTPHandshakeComplete);
            }
            AssociationEvent::BufferedAmountLow(stream_id) => {
                self.ctx
                    .event_outs
                    .push_back(RTCEventInternal::SCTPBufferedAmountLow(stream_id));
            }
            AssociationEvent::StreamReset(stream_id) => {
                self.ctx
                    .event_outs
                    .push_back(RTCEventInternal::SCTPStreamClosed(stream_id));
            }
            AssociationEvent::Failed(err) => {
                error!("sctp association failed: {err}");
                self.ctx.sctp_transport.stop();
                self.ctx
                    .event_outs
                    .push_back(RTCEventInternal::SCTPFailed(err));
            }
        }
    }
}

impl<'a> sansio::Protocol<PipelineMessage, PipelineMessage, RTCEventInternal>
    for SctpHandler<'a>
{
    type Rout = PipelineMessage;
    type Wout = PipelineMessage;
    type Eout = RTCEventInternal;
    type Error = Error;
    type Time = Instant;

    fn handle_read(&mut self, msg: PipelineMessage) -> Result<()> {
        if let Layer::Dtls(message) = msg.message {
            let association = self
                .ctx
                .sctp_transport
                .association
                .as_mut()
                .ok_or(Error::ErrAssociationNotEstablished)?;

            let result = association.handle_read(TransportMessage {
                now: msg.now,
                transport: msg.transport,
                message,
            });
            while let Some(stream_message) = association.poll_read() {
                trace!(
                    "sctp read {} bytes on stream {}",
                    stream_message.payload.len(),
                    stream_message.stream_id
                );
                self.ctx.read_outs.push_back(PipelineMessage {
                    now: msg.now,
                    transport: msg.transport,
                    message: Layer::Sctp(DataChannelMessage::from(stream_message)),
                });
            }

            if let Err(err) = result {
                error!("try_read with error {}", err);
                return Err(err);
            }
        } else {
            // bypass
            debug!("bypass sctp read {:?}", msg.transport.peer_addr);
            self.ctx.read_outs.push_back(msg);
        }

        Ok(())
    }

    fn poll_read(&mut self) -> Option<Self::Rout> {
        self.ctx.read_outs.pop_front()
    }

    fn handle_write(&mut self, msg: PipelineMessage) -> Result<()> {
        if let Layer::Sctp(message) = msg.message {
            let association = self
                .ctx
                .sctp_transport
                .association
                .as_mut()
                .ok_or(Error::ErrAssociationNotEstablished)?;
            association.handle_write(StreamMessage::from(message))
        } else {
            // bypass
            debug!("bypass sctp write {:?}", msg.transport.peer_addr);
            self.ctx.write_outs.push_back(msg);
            Ok(())
        }
    }

    fn poll_write(&mut self) -> Option<Self::Wout> {
        if let Some(association) = self.ctx.sctp_transport.association.as_mut() {
            while let Some(packet) = association.poll_write() {
                self.ctx.write_outs.push_back(PipelineMessage {
                    now: Instant::now(),
                    transport: Default::default(),
                    message: Layer::Dtls(packet),
                });
            }
        }

        self.ctx.write_outs.pop_front()
    }

    fn handle_event(&mut self, evt: RTCEventInternal) -> Result<()> {
        if let RTCEventInternal::DTLSHandshakeComplete = &evt {
            if let Err(err) = self.ctx.sctp_transport.connect(Instant::now()) {
                warn!("failed to connect sctp association: {err}");
            }
        }
        self.ctx.event_outs.push_back(evt);
        Ok(())
    }

    fn poll_event(&mut self) -> Option<Self::Eout> {
        let mut association_events = vec![];
        if let Some(association) = self.ctx.sctp_transport.association.as_mut() {
            while let Some(evt) = association.poll_event() {
                association_events.push(evt);
            }
        }
        for evt in association_events {
            self.handle_association_event(evt);
        }

        self.ctx.event_outs.pop_front()
    }

    fn handle_timeout(&mut self, now: Instant) -> Result<()> {
        if let Some(association) = self.ctx.sctp_transport.association.as_mut() {
            association.handle_timeout(now)?;
        }
        Ok(())
    }

    fn poll_timeout(&mut self) -> Option<Instant> {
        self.ctx
            .sctp_transport
            .association
            .as_mut()
            .and_then(|association| association.poll_timeout())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(association) = self.ctx.sctp_transport.association.as_mut() {
            association.close()?;
        }
        self.ctx.sctp_transport.stop();
        Ok(())
    }
}
