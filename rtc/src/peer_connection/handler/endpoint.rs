use crate::peer_connection::event::RTCEventInternal;
use crate::peer_connection::event::RTCPeerConnectionEvent;
use crate::peer_connection::event::data_channel_event::RTCDataChannelEvent;
use crate::peer_connection::message::internal::{
    ChannelEvent, ChannelMessage, Layer, PipelineMessage,
};
use log::{debug, warn};
use shared::TransportContext;
use shared::error::{Error, Result};
use std::collections::VecDeque;
use std::time::Instant;

#[derive(Default)]
pub(crate) struct EndpointHandlerContext {
    pub(crate) read_outs: VecDeque<PipelineMessage>,
    pub(crate) write_outs: VecDeque<PipelineMessage>,
    pub(crate) event_outs: VecDeque<RTCEventInternal>,
}

/// EndpointHandler turns data channel traffic into application events
pub(crate) struct EndpointHandler<'a> {
    ctx: &'a mut EndpointHandlerContext,
}

impl<'a> EndpointHandler<'a> {
    pub(crate) fn new(ctx: &'a mut EndpointHandlerContext) -> Self {
        EndpointHandler { ctx }
    }

    pub(crate) fn name(&self) -> &'static str {
        "EndpointHandler"
    }

    fn handle_dtls_message(
        &mut self,
        now: Instant,
        transport: TransportContext,
        message: ChannelMessage,
    ) -> Result<()> {
        let id = message.data_channel_id;
        let evt = match &message.event {
            ChannelEvent::Open => {
                debug!("data channel {id} open");
                RTCDataChannelEvent::OnOpen(id)
            }
            ChannelEvent::Message(data_channel_message) => {
                RTCDataChannelEvent::OnMessage(id, data_channel_message.clone())
            }
            ChannelEvent::Close => {
                debug!("data channel {id} closed");
                RTCDataChannelEvent::OnClose(id)
            }
        };
        self.ctx
            .event_outs
            .push_back(RTCEventInternal::RTCPeerConnectionEvent(
                RTCPeerConnectionEvent::OnDataChannel(evt),
            ));

        if let ChannelEvent::Message(_) = message.event {
            self.ctx.read_outs.push_back(PipelineMessage {
                now,
                transport,
                message: Layer::Channel(message),
            });
        }
        Ok(())
    }
}

// Implement Protocol trait for message processing
impl<'a> sansio::Protocol<PipelineMessage, PipelineMessage, RTCEventInternal>
    for EndpointHandler<'a>
{
    type Rout = PipelineMessage;
    type Wout = PipelineMessage;
    type Eout = RTCEventInternal;
    type Error = Error;
    type Time = Instant;

    fn handle_read(&mut self, msg: PipelineMessage) -> Result<()> {
        match msg.message {
            Layer::Channel(message) => {
                self.handle_dtls_message(msg.now, msg.transport, message)
            }
            _ => {
                warn!("drop unsupported message from {}", msg.transport.peer_addr);
                Ok(())
            }
        }
    }

    fn poll_read(&mut self) -> Option<Self::Rout> {
        self.ctx.read_outs.pop_front()
    }

    fn handle_write(&mut self, msg: PipelineMessage) -> Result<()> {
        self.ctx.write_outs.push_back(msg);
        Ok(())
    }

    fn poll_write(&mut self) -> Option<Self::Wout> {
        self.ctx.write_outs.pop_front()
    }

    fn handle_event(&mut self, evt: RTCEventInternal) -> Result<()> {
        self.ctx.event_outs.push_back(evt);
        Ok(())
    }

    fn poll_event(&mut self) -> Option<Self::Eout> {
        self.ctx.event_outs.pop_front()
    }

    fn handle_timeout(&mut self, _now: Instant) -> Result<()> {
        Ok(())
    }

    fn poll_timeout(&mut self) -> Option<Instant> {
        None
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
