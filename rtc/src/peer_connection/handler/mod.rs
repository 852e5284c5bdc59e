pub(crate) mod datachannel;
pub(crate) mod demuxer;
pub(crate) mod dtls;
pub(crate) mod endpoint;
pub(crate) mod ice;
pub(crate) mod sctp;

use crate::peer_connection::RTCPeerConnection;
use crate::peer_connection::event::RTCPeerConnectionEvent;
use crate::peer_connection::event::{RTCEvent, RTCEventInternal};
use crate::peer_connection::handler::datachannel::{DataChannelHandler, DataChannelHandlerContext};
use crate::peer_connection::handler::demuxer::{DemuxerHandler, DemuxerHandlerContext};
use crate::peer_connection::handler::dtls::{DtlsHandler, DtlsHandlerContext};
use crate::peer_connection::handler::endpoint::{EndpointHandler, EndpointHandlerContext};
use crate::peer_connection::handler::ice::{IceHandler, IceHandlerContext};
use crate::peer_connection::handler::sctp::{SctpHandler, SctpHandlerContext};
use crate::peer_connection::message::{
    RTCMessage,
    internal::{ChannelEvent, ChannelMessage, Layer, PipelineMessage},
};
use crate::peer_connection::sdp::candidate_attribute_value;
use crate::peer_connection::state::signaling_state::RTCSignalingState;
use log::{debug, warn};
use sansio::Protocol;
use shared::TaggedBytesMut;
use shared::error::{Error, flatten_errs};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

pub(crate) const DEFAULT_TIMEOUT_DURATION: Duration = Duration::from_secs(86400); // 1 day duration

/// Runs `$code` once per layer with `$h` bound to that layer's handler,
/// bottom up for `up` and top down for `down`.
macro_rules! through_layers {
    (up, $self:expr, |$h:ident| $code:block) => {
        through_layers!(@each $self, $h, $code, [
            get_demuxer_handler,
            get_ice_handler,
            get_dtls_handler,
            get_sctp_handler,
            get_datachannel_handler,
            get_endpoint_handler
        ])
    };
    (down, $self:expr, |$h:ident| $code:block) => {
        through_layers!(@each $self, $h, $code, [
            get_endpoint_handler,
            get_datachannel_handler,
            get_sctp_handler,
            get_dtls_handler,
            get_ice_handler,
            get_demuxer_handler
        ])
    };
    (@each $self:expr, $h:ident, $code:block, [$($getter:ident),+]) => {{
        $({
            let mut $h = $self.$getter();
            $code
        })+
    }};
}

pub(crate) struct PipelineContext {
    pub(crate) demuxer_handler_context: DemuxerHandlerContext,
    pub(crate) ice_handler_context: IceHandlerContext,
    pub(crate) dtls_handler_context: DtlsHandlerContext,
    pub(crate) sctp_handler_context: SctpHandlerContext,
    pub(crate) datachannel_handler_context: DataChannelHandlerContext,
    pub(crate) endpoint_handler_context: EndpointHandlerContext,

    pub(crate) read_outs: VecDeque<RTCMessage>,
    pub(crate) read_outs_bytes: usize,
    pub(crate) write_outs: VecDeque<TaggedBytesMut>,
    pub(crate) event_outs: VecDeque<RTCPeerConnectionEvent>,
}

impl PipelineContext {
    pub(crate) fn new(
        ice_handler_context: IceHandlerContext,
        dtls_handler_context: DtlsHandlerContext,
        sctp_handler_context: SctpHandlerContext,
    ) -> Self {
        Self {
            demuxer_handler_context: DemuxerHandlerContext::default(),
            ice_handler_context,
            dtls_handler_context,
            sctp_handler_context,
            datachannel_handler_context: DataChannelHandlerContext::default(),
            endpoint_handler_context: EndpointHandlerContext::default(),

            read_outs: VecDeque::new(),
            read_outs_bytes: 0,
            write_outs: VecDeque::new(),
            event_outs: VecDeque::new(),
        }
    }
}

impl RTCPeerConnection {
    pub(crate) fn get_demuxer_handler(&mut self) -> DemuxerHandler<'_> {
        DemuxerHandler::new(&mut self.pipeline_context.demuxer_handler_context)
    }

    pub(crate) fn get_ice_handler(&mut self) -> IceHandler<'_> {
        IceHandler::new(&mut self.pipeline_context.ice_handler_context)
    }

    pub(crate) fn get_dtls_handler(&mut self) -> DtlsHandler<'_> {
        DtlsHandler::new(&mut self.pipeline_context.dtls_handler_context)
    }

    pub(crate) fn get_sctp_handler(&mut self) -> SctpHandler<'_> {
        SctpHandler::new(&mut self.pipeline_context.sctp_handler_context)
    }

    pub(crate) fn get_datachannel_handler(&mut self) -> DataChannelHandler<'_> {
        DataChannelHandler::new(
            &mut self.pipeline_context.datachannel_handler_context,
            &mut self.data_channels,
            &mut self.pipeline_context.sctp_handler_context.sctp_transport,
            &mut self.next_data_channel_id,
        )
    }

    pub(crate) fn get_endpoint_handler(&mut self) -> EndpointHandler<'_> {
        EndpointHandler::new(&mut self.pipeline_context.endpoint_handler_context)
    }

    /// Runs the write path from the endpoint down to the wire, leaving the
    /// datagrams in the pipeline's write queue.
    pub(crate) fn flush_writes(&mut self) {
        let mut intermediate_wouts = VecDeque::new();

        through_layers!(down, self, |handler| {
            while let Some(msg) = intermediate_wouts.pop_front() {
                if let Err(err) = handler.handle_write(msg) {
                    warn!("{} write: {err}", handler.name());
                }
            }
            while let Some(msg) = handler.poll_write() {
                intermediate_wouts.push_back(msg);
            }
        });

        while let Some(msg) = intermediate_wouts.pop_front() {
            if let Layer::Raw(message) = msg.message {
                self.pipeline_context.write_outs.push_back(TaggedBytesMut {
                    now: msg.now,
                    transport: msg.transport,
                    message,
                });
            }
        }
    }

    fn handle_pipeline_event(&mut self, evt_internal: RTCEventInternal) {
        match evt_internal {
            RTCEventInternal::RTCPeerConnectionEvent(
                RTCPeerConnectionEvent::OnIceCandidateEvent(mut ice_event),
            ) => {
                match ice_event.candidate.as_mut() {
                    Some(init) => {
                        self.describe_local_candidate(init);
                        self.add_local_candidate_to_description(&candidate_attribute_value(
                            &init.candidate,
                        ));
                    }
                    None => self.add_local_end_of_candidates_to_description(),
                }
                self.pipeline_context
                    .event_outs
                    .push_back(RTCPeerConnectionEvent::OnIceCandidateEvent(ice_event));
            }
            RTCEventInternal::RTCPeerConnectionEvent(evt) => {
                let is_ice_state_change = matches!(
                    evt,
                    RTCPeerConnectionEvent::OnIceConnectionStateChangeEvent(_)
                );
                self.pipeline_context.event_outs.push_back(evt);
                if is_ice_state_change {
                    self.update_connection_state(false);
                }
            }
            RTCEventInternal::DTLSFailed(err) | RTCEventInternal::SCTPFailed(err) => {
                debug!("transport failed: {err}");
                if self.transport_error.is_none() {
                    self.transport_error = Some(err);
                }
                self.update_connection_state(false);
            }
            RTCEventInternal::DTLSHandshakeComplete | RTCEventInternal::DTLSClosed => {
                self.update_connection_state(false);
            }
            _ => {}
        }
    }
}

impl sansio::Protocol<TaggedBytesMut, RTCMessage, RTCEvent> for RTCPeerConnection {
    type Rout = RTCMessage;
    type Wout = TaggedBytesMut;
    type Eout = RTCPeerConnectionEvent;
    type Error = Error;
    type Time = Instant;

    fn handle_read(&mut self, msg: TaggedBytesMut) -> Result<(), Self::Error> {
        if self.is_closed {
            return Err(Error::ErrConnectionClosed);
        }
        self.last_now = self.last_now.max(msg.now);

        let mut intermediate_routs = VecDeque::new();
        intermediate_routs.push_back(PipelineMessage {
            now: msg.now,
            transport: msg.transport,
            message: Layer::Raw(msg.message),
        });

        through_layers!(up, self, |handler| {
            while let Some(msg) = intermediate_routs.pop_front() {
                if let Err(err) = handler.handle_read(msg) {
                    warn!("{} read: {err}", handler.name());
                }
            }
            while let Some(msg) = handler.poll_read() {
                intermediate_routs.push_back(msg);
            }
        });

        while let Some(msg) = intermediate_routs.pop_front() {
            if let Layer::Channel(ChannelMessage {
                data_channel_id,
                event: ChannelEvent::Message(data_channel_message),
            }) = msg.message
            {
                self.pipeline_context.read_outs_bytes += data_channel_message.data.len();
                self.pipeline_context
                    .read_outs
                    .push_back(RTCMessage::DataChannelMessage(
                        data_channel_id,
                        data_channel_message,
                    ));
            }
        }
        self.update_receive_window();

        Ok(())
    }

    fn poll_read(&mut self) -> Option<Self::Rout> {
        let message = self.pipeline_context.read_outs.pop_front()?;
        let RTCMessage::DataChannelMessage(_, data_channel_message) = &message;
        self.pipeline_context.read_outs_bytes = self
            .pipeline_context
            .read_outs_bytes
            .saturating_sub(data_channel_message.data.len());
        self.update_receive_window();
        Some(message)
    }

    /// Sends one message down to the association synchronously, so a full
    /// send buffer is reported to the caller instead of being logged.
    fn handle_write(&mut self, msg: RTCMessage) -> Result<(), Self::Error> {
        if self.is_closed {
            return Err(Error::ErrConnectionClosed);
        }

        let layer = match msg {
            RTCMessage::DataChannelMessage(data_channel_id, data_channel_message) => {
                Layer::Channel(ChannelMessage {
                    data_channel_id,
                    event: ChannelEvent::Message(data_channel_message),
                })
            }
        };
        let now = self.now();

        // Only endpoint can handle user write message
        let mut pending = VecDeque::new();
        {
            let mut endpoint_handler = self.get_endpoint_handler();
            endpoint_handler.handle_write(PipelineMessage {
                now,
                transport: Default::default(),
                message: layer,
            })?;
            while let Some(msg) = endpoint_handler.poll_write() {
                pending.push_back(msg);
            }
        }
        {
            let mut datachannel_handler = self.get_datachannel_handler();
            while let Some(msg) = pending.pop_front() {
                datachannel_handler.handle_write(msg)?;
            }
            while let Some(msg) = datachannel_handler.poll_write() {
                pending.push_back(msg);
            }
        }
        {
            let mut sctp_handler = self.get_sctp_handler();
            while let Some(msg) = pending.pop_front() {
                sctp_handler.handle_write(msg)?;
            }
        }

        Ok(())
    }

    fn poll_write(&mut self) -> Option<Self::Wout> {
        self.flush_writes();
        self.pipeline_context.write_outs.pop_front()
    }

    fn handle_event(&mut self, evt: RTCEvent) -> Result<(), Self::Error> {
        match evt {}
    }

    fn poll_event(&mut self) -> Option<Self::Eout> {
        let mut intermediate_eouts = VecDeque::new();

        through_layers!(up, self, |handler| {
            while let Some(evt) = intermediate_eouts.pop_front() {
                if let Err(err) = handler.handle_event(evt) {
                    warn!("{} event: {err}", handler.name());
                }
            }
            while let Some(msg) = handler.poll_event() {
                intermediate_eouts.push_back(msg);
            }
        });

        while let Some(evt_internal) = intermediate_eouts.pop_front() {
            self.handle_pipeline_event(evt_internal);
        }

        self.pipeline_context.event_outs.pop_front()
    }

    fn handle_timeout(&mut self, now: Instant) -> Result<(), Self::Error> {
        if self.is_closed {
            return Err(Error::ErrConnectionClosed);
        }
        self.last_now = self.last_now.max(now);

        through_layers!(up, self, |handler| {
            handler.handle_timeout(now)?;
        });
        Ok(())
    }

    fn poll_timeout(&mut self) -> Option<Instant> {
        if self.is_closed {
            return None;
        }

        let mut earliest: Option<Instant> = None;
        through_layers!(up, self, |handler| {
            earliest = earliest.into_iter().chain(handler.poll_timeout()).min();
        });
        earliest
    }

    fn close(&mut self) -> Result<(), Self::Error> {
        // https://www.w3.org/TR/webrtc/#dom-rtcpeerconnection-close (step #1)
        if self.is_closed {
            return Ok(());
        }

        // https://www.w3.org/TR/webrtc/#dom-rtcpeerconnection-close (step #2, #3)
        self.is_closed = true;
        self.signaling_state = RTCSignalingState::Closed;
        self.do_signaling_state_change(RTCSignalingState::Closed);

        // Channels and the association go first so their close records are
        // flushed through the secure transport before it shuts down.
        let mut close_errs: Vec<Error> = vec![];
        {
            let mut endpoint_handler = self.get_endpoint_handler();
            if let Err(err) = sansio::Protocol::close(&mut endpoint_handler) {
                close_errs.push(err);
            }
        }
        // https://www.w3.org/TR/webrtc/#dom-rtcpeerconnection-close (step #5)
        {
            let mut datachannel_handler = self.get_datachannel_handler();
            if let Err(err) = sansio::Protocol::close(&mut datachannel_handler) {
                close_errs.push(Error::Other(format!("data_channels: {err}")));
            }
        }
        // https://www.w3.org/TR/webrtc/#dom-rtcpeerconnection-close (step #6)
        {
            let mut sctp_handler = self.get_sctp_handler();
            if let Err(err) = sansio::Protocol::close(&mut sctp_handler) {
                close_errs.push(Error::Other(format!("sctp_transport: {err}")));
            }
        }
        self.flush_writes();

        // https://www.w3.org/TR/webrtc/#dom-rtcpeerconnection-close (step #7)
        {
            let mut dtls_handler = self.get_dtls_handler();
            if let Err(err) = sansio::Protocol::close(&mut dtls_handler) {
                close_errs.push(Error::Other(format!("dtls_transport: {err}")));
            }
        }
        self.flush_writes();

        // https://www.w3.org/TR/webrtc/#dom-rtcpeerconnection-close (step #8, #9, #10)
        {
            let mut ice_handler = self.get_ice_handler();
            if let Err(err) = sansio::Protocol::close(&mut ice_handler) {
                close_errs.push(Error::Other(format!("ice_transport: {err}")));
            }
        }
        {
            let mut demuxer_handler = self.get_demuxer_handler();
            if let Err(err) = sansio::Protocol::close(&mut demuxer_handler) {
                close_errs.push(err);
            }
        }

        self.update_connection_state(true);

        flatten_errs(close_errs)
    }
}
