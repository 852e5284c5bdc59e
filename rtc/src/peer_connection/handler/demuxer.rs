use crate::peer_connection::event::RTCEventInternal;
use crate::peer_connection::message::internal::{Layer, PipelineMessage};
use log::{debug, error};
use shared::error::Error;
use shared::util::PacketKind;
use std::collections::VecDeque;
use std::time::Instant;

#[derive(Default)]
pub(crate) struct DemuxerHandlerContext {
    pub(crate) read_outs: VecDeque<PipelineMessage>,
    pub(crate) write_outs: VecDeque<PipelineMessage>,
    pub(crate) event_outs: VecDeque<RTCEventInternal>,
}

/// Splits raw datagrams into STUN and DTLS, drops everything else.
pub(crate) struct DemuxerHandler<'a> {
    ctx: &'a mut DemuxerHandlerContext,
}

impl<'a> DemuxerHandler<'a> {
    pub(crate) fn new(ctx: &'a mut DemuxerHandlerContext) -> Self {
        DemuxerHandler { ctx }
    }

    pub(crate) fn name(&self) -> &'static str {
        "DemuxerHandler"
    }
}

impl<'a> sansio::Protocol<PipelineMessage, PipelineMessage, RTCEventInternal>
    for DemuxerHandler<'a>
{
    type Rout = PipelineMessage;
    type Wout = PipelineMessage;
    type Eout = RTCEventInternal;
    type Error = Error;
    type Time = Instant;

    fn handle_read(&mut self, msg: PipelineMessage) -> Result<(), Self::Error> {
        let message = match msg.message {
            Layer::Raw(message) => message,
            other => {
                debug!("drop non-RAW packet {other:?}");
                return Ok(());
            }
        };

        let layer = match PacketKind::classify(&message) {
            PacketKind::Stun => Layer::Stun(message),
            PacketKind::Dtls => Layer::Dtls(message),
            PacketKind::Empty => {
                error!("drop invalid packet due to zero length");
                return Ok(());
            }
            PacketKind::Other(first) => {
                debug!(
                    "drop unsupported packet with first byte {} from {}",
                    first, msg.transport.peer_addr
                );
                return Ok(());
            }
        };
        self.ctx.read_outs.push_back(PipelineMessage {
            now: msg.now,
            transport: msg.transport,
            message: layer,
        });
        Ok(())
    }

    fn poll_read(&mut self) -> Option<Self::Rout> {
        self.ctx.read_outs.pop_front()
    }

    fn handle_write(&mut self, msg: PipelineMessage) -> Result<(), Self::Error> {
        match msg.message {
            Layer::Raw(message) | Layer::Stun(message) | Layer::Dtls(message) => {
                self.ctx.write_outs.push_back(PipelineMessage {
                    now: msg.now,
                    transport: msg.transport,
                    message: Layer::Raw(message),
                });
            }
            _ => {
                debug!("drop non-RAW packet {:?}", msg.message);
            }
        }
        Ok(())
    }

    fn poll_write(&mut self) -> Option<Self::Wout> {
        self.ctx.write_outs.pop_front()
    }

    fn handle_event(&mut self, evt: RTCEventInternal) -> Result<(), Self::Error> {
        self.ctx.event_outs.push_back(evt);
        Ok(())
    }

    fn poll_event(&mut self) -> Option<Self::Eout> {
        self.ctx.event_outs.pop_front()
    }

    fn handle_timeout(&mut self, _now: Instant) -> Result<(), Self::Error> {
        Ok(())
    }

    fn poll_timeout(&mut self) -> Option<Instant> {
        None
    }

    fn close(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
