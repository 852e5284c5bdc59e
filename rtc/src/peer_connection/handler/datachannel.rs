use crate::data_channel::RTCDataChannelId;
use crate::data_channel::internal::RTCDataChannelInternal;
use crate::data_channel::message::RTCDataChannelMessage;
use crate::data_channel::state::RTCDataChannelState;
use crate::peer_connection::event::RTCEventInternal;
use crate::peer_connection::event::RTCPeerConnectionEvent;
use crate::peer_connection::event::data_channel_event::RTCDataChannelEvent;
use crate::peer_connection::message::internal::{
    ChannelEvent, ChannelMessage, Layer, PipelineMessage,
};
use crate::peer_connection::transport::sctp::RTCSctpTransport;
use bytes::BytesMut;
use datachannel::DataChannelMessage;
use log::{debug, warn};
use sansio::Protocol;
use sctp::PayloadProtocolIdentifier;
use shared::TransportContext;
use shared::error::{Error, Result};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Instant;

#[derive(Default)]
pub(crate) struct DataChannelHandlerContext {
    pub(crate) read_outs: VecDeque<PipelineMessage>,
    pub(crate) write_outs: VecDeque<PipelineMessage>,
    pub(crate) event_outs: VecDeque<RTCEventInternal>,
}

/// DataChannelHandler implements DataChannel Protocol handling
///
/// It maps SCTP streams to data channel handles, runs the DCEP open/ack
/// exchange and assigns stream ids once the association is up.
pub(crate) struct DataChannelHandler<'a> {
    ctx: &'a mut DataChannelHandlerContext,
    data_channels: &'a mut HashMap<RTCDataChannelId, RTCDataChannelInternal>,
    sctp_transport: &'a mut RTCSctpTransport,
    next_data_channel_id: &'a mut RTCDataChannelId,
}

impl<'a> DataChannelHandler<'a> {
    pub(crate) fn new(
        ctx: &'a mut DataChannelHandlerContext,
        data_channels: &'a mut HashMap<RTCDataChannelId, RTCDataChannelInternal>,
        sctp_transport: &'a mut RTCSctpTransport,
        next_data_channel_id: &'a mut RTCDataChannelId,
    ) -> Self {
        DataChannelHandler {
            ctx,
            data_channels,
            sctp_transport,
            next_data_channel_id,
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        "DataChannelHandler"
    }

    fn find_by_stream_id(&self, stream_id: u16) -> Option<RTCDataChannelId> {
        self.data_channels
            .values()
            .find(|dc| dc.stream_id == Some(stream_id))
            .map(|dc| dc.id)
    }

    /// Picks the next free stream id of our parity: even for the DTLS client,
    /// odd for the DTLS server.
    fn generate_stream_id(&self, used: &HashSet<u16>) -> Result<u16> {
        let max_channels = self.sctp_transport.max_channels();
        let mut stream_id: u16 = if self.sctp_transport.is_client() { 0 } else { 1 };
        while used.contains(&stream_id) {
            stream_id = stream_id
                .checked_add(2)
                .filter(|id| *id < max_channels)
                .ok_or(Error::ErrMaxDataChannelId)?;
        }
        Ok(stream_id)
    }

    /// Dials every channel created before the association was up.
    pub(crate) fn dial_pending_data_channels(&mut self) {
        let mut used: HashSet<u16> = self
            .data_channels
            .values()
            .filter(|dc| dc.data_channel.is_some())
            .filter_map(|dc| dc.stream_id)
            .collect();

        let mut pending: Vec<RTCDataChannelId> = self
            .data_channels
            .values()
            .filter(|dc| {
                dc.ready_state == RTCDataChannelState::Connecting && dc.data_channel.is_none()
            })
            .map(|dc| dc.id)
            .collect();
        pending.sort_unstable();

        for id in pending {
            let negotiated = self.data_channels.get(&id).and_then(|dc| dc.negotiated);
            let stream_id = match negotiated {
                Some(stream_id) if used.contains(&stream_id) => {
                    Err(Error::ErrDataChannelIdInUse(stream_id))
                }
                Some(stream_id) => Ok(stream_id),
                None => self.generate_stream_id(&used),
            };

            let Some(dc) = self.data_channels.get_mut(&id) else {
                continue;
            };
            let result = stream_id.and_then(|stream_id| {
                let association = self
                    .sctp_transport
                    .association
                    .as_mut()
                    .ok_or(Error::ErrAssociationNotEstablished)?;
                dc.dial(stream_id, association)?;
                Ok(stream_id)
            });

            match result {
                Ok(stream_id) => {
                    debug!("data channel {} dialed on stream {}", dc.label, stream_id);
                    used.insert(stream_id);
                    let (events, messages) =
                        poll_data_channel(dc, Instant::now(), &mut self.ctx.write_outs);
                    for event in events {
                        self.ctx
                            .event_outs
                            .push_back(lifecycle_event(id, event));
                    }
                    for message in messages {
                        self.ctx.read_outs.push_back(message);
                    }
                }
                Err(err) => {
                    warn!("failed to open data channel {}: {}", dc.label, err);
                    dc.ready_state = RTCDataChannelState::Closed;
                    self.ctx
                        .event_outs
                        .push_back(RTCEventInternal::RTCPeerConnectionEvent(
                            RTCPeerConnectionEvent::OnDataChannel(RTCDataChannelEvent::OnError(
                                id,
                                err.to_string(),
                            )),
                        ));
                }
            }
        }
    }

    fn handle_stream_closed(&mut self, stream_id: u16) {
        let Some(id) = self.find_by_stream_id(stream_id) else {
            debug!("reset of unknown stream {stream_id}");
            return;
        };
        let Some(mut dc) = self.data_channels.remove(&id) else {
            return;
        };

        if let Some(data_channel) = dc.data_channel.as_mut() {
            data_channel.handle_stream_reset();
            while data_channel.poll_event().is_some() {}
        }
        // Closing is initiated by either side, answer with our own reset.
        if let Some(association) = self.sctp_transport.association.as_mut() {
            if let Err(err) = association.reset_stream(stream_id) {
                warn!("failed to reset outgoing stream {stream_id}: {err}");
            }
        }
        dc.ready_state = RTCDataChannelState::Closed;
        self.ctx
            .event_outs
            .push_back(RTCEventInternal::RTCPeerConnectionEvent(
                RTCPeerConnectionEvent::OnDataChannel(RTCDataChannelEvent::OnClose(id)),
            ));
    }

    fn close_all_data_channels(&mut self) {
        let mut ids: Vec<RTCDataChannelId> = self.data_channels.keys().copied().collect();
        ids.sort_unstable();
        for id in ids {
            if let Some(dc) = self.data_channels.get_mut(&id) {
                if dc.ready_state == RTCDataChannelState::Closed {
                    continue;
                }
                dc.ready_state = RTCDataChannelState::Closed;
                if let Some(data_channel) = dc.data_channel.as_mut() {
                    data_channel.handle_stream_reset();
                    while data_channel.poll_event().is_some() {}
                }
                self.ctx
                    .event_outs
                    .push_back(RTCEventInternal::RTCPeerConnectionEvent(
                        RTCPeerConnectionEvent::OnDataChannel(RTCDataChannelEvent::OnClose(id)),
                    ));
            }
        }
    }

    fn accept_data_channel(
        &mut self,
        now: Instant,
        transport: TransportContext,
        stream_id: u16,
        ppi: PayloadProtocolIdentifier,
        payload: &[u8],
    ) -> Result<()> {
        let remote_is_client = !self.sctp_transport.is_client();
        if (stream_id % 2 == 0) != remote_is_client {
            debug!("remote opened stream {stream_id} of the wrong parity");
        }

        let association = self
            .sctp_transport
            .association
            .as_mut()
            .ok_or(Error::ErrAssociationNotEstablished)?;
        let id = *self.next_data_channel_id;
        let mut dc = RTCDataChannelInternal::accept(id, stream_id, ppi, payload, association)?;
        *self.next_data_channel_id = id.wrapping_add(1);
        debug!(
            "accepted data channel {} as {} on stream {}",
            dc.label, id, stream_id
        );

        let (events, messages) = poll_data_channel(&mut dc, now, &mut self.ctx.write_outs);
        self.data_channels.insert(id, dc);
        self.push_reads(now, transport, id, events, messages);

        Ok(())
    }

    fn push_reads(
        &mut self,
        now: Instant,
        transport: TransportContext,
        id: RTCDataChannelId,
        events: Vec<ChannelEvent>,
        messages: Vec<PipelineMessage>,
    ) {
        for event in events {
            self.ctx.read_outs.push_back(PipelineMessage {
                now,
                transport,
                message: Layer::Channel(ChannelMessage {
                    data_channel_id: id,
                    event,
                }),
            });
        }
        self.ctx.read_outs.extend(messages);
    }
}

/// Drains one channel: lifecycle changes first, then received user data.
/// Outgoing DCEP and user messages land in `write_outs`.
fn poll_data_channel(
    dc: &mut RTCDataChannelInternal,
    now: Instant,
    write_outs: &mut VecDeque<PipelineMessage>,
) -> (Vec<ChannelEvent>, Vec<PipelineMessage>) {
    let mut events = vec![];
    let mut messages = vec![];
    let Some(data_channel) = dc.data_channel.as_mut() else {
        return (events, messages);
    };

    while let Some(evt) = data_channel.poll_event() {
        match evt {
            datachannel::DataChannelEvent::Open => {
                dc.ready_state = RTCDataChannelState::Open;
                events.push(ChannelEvent::Open);
            }
            datachannel::DataChannelEvent::Close => {
                dc.ready_state = RTCDataChannelState::Closed;
                events.push(ChannelEvent::Close);
            }
        }
    }

    while let Some(message) = data_channel.poll_read() {
        messages.push(PipelineMessage {
            now,
            transport: TransportContext::default(),
            message: Layer::Channel(ChannelMessage {
                data_channel_id: dc.id,
                event: ChannelEvent::Message(RTCDataChannelMessage {
                    is_string: message.is_string(),
                    data: message.payload.freeze(),
                }),
            }),
        });
    }

    while let Some(message) = data_channel.poll_write() {
        write_outs.push_back(PipelineMessage {
            now,
            transport: TransportContext::default(),
            message: Layer::Sctp(message),
        });
    }

    (events, messages)
}

fn lifecycle_event(id: RTCDataChannelId, event: ChannelEvent) -> RTCEventInternal {
    let event = match event {
        ChannelEvent::Open => RTCDataChannelEvent::OnOpen(id),
        ChannelEvent::Close => RTCDataChannelEvent::OnClose(id),
        ChannelEvent::Message(message) => RTCDataChannelEvent::OnMessage(id, message),
    };
    RTCEventInternal::RTCPeerConnectionEvent(RTCPeerConnectionEvent::OnDataChannel(event))
}

impl<'a> sansio::Protocol<PipelineMessage, PipelineMessage, RTCEventInternal>
    for DataChannelHandler<'a>
{
    type Rout = PipelineMessage;
    type Wout = PipelineMessage;
    type Eout = RTCEventInternal;
    type Error = Error;
    type Time = Instant;

    fn handle_read(&mut self, msg: PipelineMessage) -> Result<()> {
        if let Layer::Sctp(message) = msg.message {
            let stream_id = message.stream_id;

            let Some(id) = self.find_by_stream_id(stream_id) else {
                if message.ppi == PayloadProtocolIdentifier::Dcep {
                    return self.accept_data_channel(
                        msg.now,
                        msg.transport,
                        stream_id,
                        message.ppi,
                        &message.payload,
                    );
                }
                debug!(
                    "drop {} bytes on unknown stream {}",
                    message.payload.len(),
                    stream_id
                );
                return Ok(());
            };

            let dc = self
                .data_channels
                .get_mut(&id)
                .ok_or(Error::ErrDataChannelNotExisted(id))?;
            let Some(data_channel) = dc.data_channel.as_mut() else {
                debug!("drop message on stream {stream_id} before the channel was dialed");
                return Ok(());
            };
            let result = data_channel.handle_read(message);
            let (events, messages) = poll_data_channel(dc, msg.now, &mut self.ctx.write_outs);
            self.push_reads(msg.now, msg.transport, id, events, messages);

            if let Err(err) = result {
                self.ctx
                    .event_outs
                    .push_back(RTCEventInternal::RTCPeerConnectionEvent(
                        RTCPeerConnectionEvent::OnDataChannel(RTCDataChannelEvent::OnError(
                            id,
                            err.to_string(),
                        )),
                    ));
                return Err(err);
            }
        } else {
            // Bypass
            debug!("bypass DataChannel read {:?}", msg.transport.peer_addr);
            self.ctx.read_outs.push_back(msg);
        }
        Ok(())
    }

    fn poll_read(&mut self) -> Option<Self::Rout> {
        self.ctx.read_outs.pop_front()
    }

    fn handle_write(&mut self, msg: PipelineMessage) -> Result<()> {
        if let Layer::Channel(message) = msg.message {
            let ChannelEvent::Message(RTCDataChannelMessage { is_string, data }) =
                message.event
            else {
                warn!(
                    "drop unsupported DATACHANNEL message to {}",
                    msg.transport.peer_addr
                );
                return Ok(());
            };

            let max_message_size = self.sctp_transport.max_message_size() as usize;
            let dc = self
                .data_channels
                .get_mut(&message.data_channel_id)
                .ok_or(Error::ErrDataChannelNotExisted(message.data_channel_id))?;
            let data_channel = dc
                .data_channel
                .as_mut()
                .ok_or(Error::ErrDataChannelNotOpen)?;
            if max_message_size > 0 && data.len() > max_message_size {
                return Err(Error::ErrOutboundPacketTooLarge);
            }

            data_channel.handle_write(DataChannelMessage::framed(
                is_string,
                BytesMut::from(&data[..]),
            ))?;
            while let Some(message) = data_channel.poll_write() {
                self.ctx.write_outs.push_back(PipelineMessage {
                    now: msg.now,
                    transport: TransportContext::default(),
                    message: Layer::Sctp(message),
                });
            }
        } else {
            // Bypass
            debug!("bypass DataChannel write {:?}", msg.transport.peer_addr);
            self.ctx.write_outs.push_back(msg);
        }
        Ok(())
    }

    fn poll_write(&mut self) -> Option<Self::Wout> {
        for dc in self.data_channels.values_mut() {
            if let Some(data_channel) = dc.data_channel.as_mut() {
                while let Some(message) = data_channel.poll_write() {
                    self.ctx.write_outs.push_back(PipelineMessage {
                        now: Instant::now(),
                        transport: TransportContext::default(),
                        message: Layer::Sctp(message),
                    });
                }
            }
        }

        self.ctx.write_outs.pop_front()
    }

    fn handle_event(&mut self, evt: RTCEventInternal) -> Result<()> {
        match evt {
            RTCEventInternal::SCTPHandshakeComplete => {
                self.dial_pending_data_channels();
                self.ctx.event_outs.push_back(evt);
            }
            RTCEventInternal::SCTPStreamClosed(stream_id) => {
                self.handle_stream_closed(stream_id);
            }
            RTCEventInternal::SCTPBufferedAmountLow(stream_id) => {
                if let Some(id) = self.find_by_stream_id(stream_id) {
                    self.ctx
                        .event_outs
                        .push_back(RTCEventInternal::RTCPeerConnectionEvent(
                            RTCPeerConnectionEvent::OnDataChannel(
                                RTCDataChannelEvent::OnBufferedAmountLow(id),
                            ),
                        ));
                }
            }
            RTCEventInternal::SCTPFailed(_) | RTCEventInternal::DTLSFailed(_) => {
                self.close_all_data_channels();
                self.ctx.event_outs.push_back(evt);
            }
            _ => {
                self.ctx.event_outs.push_back(evt);
            }
        }
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
        for dc in self.data_channels.values_mut() {
            if let Err(err) = dc.close(self.sctp_transport.association.as_mut()) {
                debug!("data channel {} close: {}", dc.label, err);
            }
            dc.ready_state = RTCDataChannelState::Closed;
        }
        Ok(())
    }
}
