use super::PeerConnectionEvent;
use super::data_channel::DataChannel;
use crate::data_channel::{RTCDataChannelId, RTCDataChannelInit, RTCDataChannelMessage};
use crate::peer_connection::RTCPeerConnection;
use crate::peer_connection::event::RTCPeerConnectionEvent;
use crate::peer_connection::event::data_channel_event::RTCDataChannelEvent;
use crate::peer_connection::handler::DEFAULT_TIMEOUT_DURATION;
use crate::peer_connection::message::RTCMessage;
use crate::peer_connection::sdp::RTCSessionDescription;
use crate::peer_connection::state::RTCPeerConnectionState;
use crate::peer_connection::transport::RTCIceCandidateInit;
use bytes::BytesMut;
use log::{debug, error, info, trace, warn};
use sansio::Protocol;
use shared::error::{Error, Result};
use shared::{TaggedBytesMut, TransportContext, TransportProtocol};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::UdpSocket;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Notify, mpsc, oneshot};
use tokio::task::JoinHandle;

/// Messages a channel's handle may hold before the driver keeps them back.
pub(crate) const RECEIVE_QUEUE_CAPACITY: usize = 64;

pub(crate) type Reply<T> = oneshot::Sender<Result<T>>;

pub(crate) struct Datagram {
    pub(crate) local_addr: SocketAddr,
    pub(crate) peer_addr: SocketAddr,
    pub(crate) payload: BytesMut,
}

pub(crate) enum Command {
    CreateOffer(Reply<RTCSessionDescription>),
    CreateAnswer(Reply<RTCSessionDescription>),
    SetLocalDescription(RTCSessionDescription, Reply<()>),
    LocalDescription(Reply<Option<RTCSessionDescription>>),
    SetRemoteDescription(RTCSessionDescription, Reply<()>),
    AddIceCandidate(Option<RTCIceCandidateInit>, Reply<()>),
    RestartIce(Reply<()>),
    CreateDataChannel(String, Option<RTCDataChannelInit>, Reply<DataChannel>),
    Send(RTCDataChannelId, RTCDataChannelMessage, Reply<()>),
    CloseDataChannel(RTCDataChannelId, Reply<()>),
    ConnectionState(Reply<RTCPeerConnectionState>),
    Close(Reply<()>),
}

struct ChannelSlot {
    message_tx: mpsc::Sender<RTCDataChannelMessage>,
    /// Received messages that did not fit into the handle's queue. Their
    /// bytes count against the receive window.
    overflow: VecDeque<RTCDataChannelMessage>,
    /// Sends waiting for the buffered amount to drop, in submission order.
    parked: VecDeque<(RTCDataChannelMessage, Reply<()>)>,
}

impl ChannelSlot {
    fn new(message_tx: mpsc::Sender<RTCDataChannelMessage>) -> Self {
        Self {
            message_tx,
            overflow: VecDeque::new(),
            parked: VecDeque::new(),
        }
    }

    fn deliver(&mut self, id: RTCDataChannelId, message: RTCDataChannelMessage) {
        if !self.overflow.is_empty() {
            self.overflow.push_back(message);
            return;
        }
        match self.message_tx.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(message)) => {
                trace!("data channel {id} reader is behind, holding message");
                self.overflow.push_back(message);
            }
            Err(TrySendError::Closed(_)) => {
                trace!("data channel {id} handle dropped, discarding message");
            }
        }
    }

    /// Moves held messages into the handle's queue while it has room.
    fn flush_overflow(&mut self) {
        while let Some(message) = self.overflow.pop_front() {
            match self.message_tx.try_send(message) {
                Ok(()) => {}
                Err(TrySendError::Full(message)) => {
                    self.overflow.push_front(message);
                    break;
                }
                Err(TrySendError::Closed(_)) => {
                    self.overflow.clear();
                    break;
                }
            }
        }
    }

    fn overflow_bytes(&self) -> usize {
        self.overflow.iter().map(|m| m.data.len()).sum()
    }
}

/// Owns the peer connection and its sockets; runs until the connection is
/// closed or every handle is dropped.
pub(crate) struct Driver {
    peer_connection: RTCPeerConnection,
    sockets: HashMap<SocketAddr, Arc<UdpSocket>>,
    readers: Vec<JoinHandle<()>>,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    cmd_tx: mpsc::WeakUnboundedSender<Command>,
    packet_rx: mpsc::Receiver<Datagram>,
    event_tx: mpsc::UnboundedSender<PeerConnectionEvent>,
    /// Signalled by handles whenever they took a message off their queue.
    reader_progress: Arc<Notify>,
    pending_opens: HashMap<RTCDataChannelId, Reply<DataChannel>>,
    channels: HashMap<RTCDataChannelId, ChannelSlot>,
    closed: bool,
}

impl Driver {
    pub(crate) fn new(
        peer_connection: RTCPeerConnection,
        sockets: HashMap<SocketAddr, Arc<UdpSocket>>,
        readers: Vec<JoinHandle<()>>,
        cmd_rx: mpsc::UnboundedReceiver<Command>,
        cmd_tx: mpsc::WeakUnboundedSender<Command>,
        packet_rx: mpsc::Receiver<Datagram>,
        event_tx: mpsc::UnboundedSender<PeerConnectionEvent>,
    ) -> Self {
        Self {
            peer_connection,
            sockets,
            readers,
            cmd_rx,
            cmd_tx,
            packet_rx,
            event_tx,
            reader_progress: Arc::new(Notify::new()),
            pending_opens: HashMap::new(),
            channels: HashMap::new(),
            closed: false,
        }
    }

    pub(crate) async fn run(mut self) {
        'EventLoop: loop {
            self.drain_events();
            self.drain_reads();
            self.flush_writes().await;

            if self.closed {
                break 'EventLoop;
            }

            let now = Instant::now();
            let eto = self
                .peer_connection
                .poll_timeout()
                .unwrap_or(now + DEFAULT_TIMEOUT_DURATION);
            let delay_from_now = eto.saturating_duration_since(now);
            if delay_from_now.is_zero() {
                if let Err(err) = self.peer_connection.handle_timeout(now) {
                    warn!("handle_timeout error: {err}");
                }
                continue;
            }

            let timer = tokio::time::sleep(delay_from_now);
            tokio::pin!(timer);
            let reader_behind = self.channels.values().any(|slot| !slot.overflow.is_empty());

            tokio::select! {
                biased;

                command = self.cmd_rx.recv() => {
                    match command {
                        Some(command) => self.handle_command(command),
                        None => {
                            trace!("all handles dropped, closing peer connection");
                            if let Err(err) = self.close() {
                                warn!("close error: {err}");
                            }
                        }
                    }
                }
                datagram = self.packet_rx.recv() => {
                    match datagram {
                        Some(datagram) => self.handle_datagram(datagram),
                        None => {
                            error!("every socket reader stopped, closing peer connection");
                            if let Err(err) = self.close() {
                                warn!("close error: {err}");
                            }
                        }
                    }
                }
                _ = self.reader_progress.notified(), if reader_behind => {
                    trace!("a data channel reader made room");
                }
                _ = timer.as_mut() => {
                    if let Err(err) = self.peer_connection.handle_timeout(Instant::now()) {
                        warn!("handle_timeout error: {err}");
                    }
                }
            }
        }

        // Close records were produced by close(), send them before the
        // sockets go away.
        self.flush_writes().await;
        for reader in self.readers.drain(..) {
            reader.abort();
        }
        debug!("peer connection task exited");
    }

    fn handle_datagram(&mut self, datagram: Datagram) {
        let msg = TaggedBytesMut {
            now: Instant::now(),
            transport: TransportContext {
                local_addr: datagram.local_addr,
                peer_addr: datagram.peer_addr,
                transport_protocol: TransportProtocol::UDP,
            },
            message: datagram.payload,
        };
        if let Err(err) = self.peer_connection.handle_read(msg) {
            debug!("handle_read error: {err}");
        }
    }

    fn handle_command(&mut self, command: Command) {
        let pc = &mut self.peer_connection;
        match command {
            Command::CreateOffer(reply) => {
                let _ = reply.send(pc.create_offer());
            }
            Command::CreateAnswer(reply) => {
                let _ = reply.send(pc.create_answer());
            }
            Command::SetLocalDescription(description, reply) => {
                let _ = reply.send(pc.set_local_description(description));
            }
            Command::LocalDescription(reply) => {
                let _ = reply.send(Ok(pc.local_description().cloned()));
            }
            Command::SetRemoteDescription(description, reply) => {
                let _ = reply.send(pc.set_remote_description(description));
            }
            Command::AddIceCandidate(candidate, reply) => {
                let _ = reply.send(pc.add_ice_candidate(candidate));
            }
            Command::RestartIce(reply) => {
                let _ = reply.send(pc.restart_ice());
            }
            Command::CreateDataChannel(label, options, reply) => {
                match pc.create_data_channel(&label, options) {
                    Ok(id) => {
                        debug!("data channel {id} ({label}) waits for open");
                        self.pending_opens.insert(id, reply);
                    }
                    Err(err) => {
                        let _ = reply.send(Err(err));
                    }
                }
            }
            Command::Send(id, message, reply) => self.send(id, message, reply),
            Command::CloseDataChannel(id, reply) => {
                let result = match pc.data_channel(id) {
                    Some(mut dc) => dc.close(),
                    None => Err(Error::ErrDataChannelNotExisted(id)),
                };
                let _ = reply.send(result);
            }
            Command::ConnectionState(reply) => {
                let _ = reply.send(Ok(pc.connection_state()));
            }
            Command::Close(reply) => {
                let _ = reply.send(self.close());
            }
        }
    }

    fn send(&mut self, id: RTCDataChannelId, message: RTCDataChannelMessage, reply: Reply<()>) {
        if let Some(slot) = self.channels.get_mut(&id) {
            if !slot.parked.is_empty() {
                slot.parked.push_back((message, reply));
                return;
            }
        }

        match self.try_send(id, &message) {
            Err(Error::ErrBufferFull) if self.waits_when_full(id) => {
                if let Some(slot) = self.channels.get_mut(&id) {
                    trace!("data channel {id} is full, parking send");
                    slot.parked.push_back((message, reply));
                } else {
                    let _ = reply.send(Err(Error::ErrBufferFull));
                }
            }
            result => {
                let _ = reply.send(result);
            }
        }
    }

    fn try_send(&mut self, id: RTCDataChannelId, message: &RTCDataChannelMessage) -> Result<()> {
        let mut dc = self
            .peer_connection
            .data_channel(id)
            .ok_or(Error::ErrDataChannelNotExisted(id))?;
        dc.send_message(message.clone())
    }

    /// Ordered reliable channels apply backpressure, every other kind of
    /// channel reports a full buffer to the caller.
    fn waits_when_full(&mut self, id: RTCDataChannelId) -> bool {
        let Some(dc) = self.peer_connection.data_channel(id) else {
            return false;
        };
        matches!(
            (dc.ordered(), dc.max_retransmits(), dc.max_packet_life_time()),
            (Ok(true), Ok(None), Ok(None))
        )
    }

    fn retry_parked_sends(&mut self) {
        let ids: Vec<RTCDataChannelId> = self
            .channels
            .iter()
            .filter(|(_, slot)| !slot.parked.is_empty())
            .map(|(id, _)| *id)
            .collect();

        for id in ids {
            loop {
                let Some((message, reply)) = self
                    .channels
                    .get_mut(&id)
                    .and_then(|slot| slot.parked.pop_front())
                else {
                    break;
                };
                match self.try_send(id, &message) {
                    Err(Error::ErrBufferFull) => {
                        if let Some(slot) = self.channels.get_mut(&id) {
                            slot.parked.push_front((message, reply));
                        }
                        break;
                    }
                    result => {
                        let _ = reply.send(result);
                    }
                }
            }
        }
    }

    async fn flush_writes(&mut self) {
        while let Some(msg) = self.peer_connection.poll_write() {
            let socket = self.sockets.get(&msg.transport.local_addr).or_else(|| {
                self.sockets
                    .iter()
                    .find(|(addr, _)| addr.is_ipv4() == msg.transport.peer_addr.is_ipv4())
                    .map(|(_, socket)| socket)
            });
            let Some(socket) = socket else {
                warn!(
                    "no socket for {} -> {}",
                    msg.transport.local_addr, msg.transport.peer_addr
                );
                continue;
            };
            match socket.send_to(&msg.message, msg.transport.peer_addr).await {
                Ok(n) => trace!("socket write {n} bytes to {}", msg.transport.peer_addr),
                Err(err) => warn!("socket write to {} error: {err}", msg.transport.peer_addr),
            }
        }
    }

    /// Hands received messages to their channels. Whatever a slow reader
    /// leaves behind is reported as backlog, which closes the receive window
    /// once it grows.
    fn drain_reads(&mut self) {
        for slot in self.channels.values_mut() {
            slot.flush_overflow();
        }
        while let Some(message) = self.peer_connection.poll_read() {
            let RTCMessage::DataChannelMessage(id, message) = message;
            match self.channels.get_mut(&id) {
                Some(slot) => slot.deliver(id, message),
                None => debug!("drop message for unknown data channel {id}"),
            }
        }
        let backlog = self.channels.values().map(ChannelSlot::overflow_bytes).sum();
        self.peer_connection.set_read_backlog(backlog);
    }

    fn drain_events(&mut self) {
        while let Some(event) = self.peer_connection.poll_event() {
            let event = match event {
                RTCPeerConnectionEvent::OnIceCandidateEvent(event) => {
                    PeerConnectionEvent::IceCandidate(event.candidate)
                }
                RTCPeerConnectionEvent::OnSignalingStateChangeEvent(state) => {
                    PeerConnectionEvent::SignalingStateChange(state)
                }
                RTCPeerConnectionEvent::OnIceConnectionStateChangeEvent(state) => {
                    PeerConnectionEvent::IceConnectionStateChange(state)
                }
                RTCPeerConnectionEvent::OnIceGatheringStateChangeEvent(state) => {
                    PeerConnectionEvent::IceGatheringStateChange(state)
                }
                RTCPeerConnectionEvent::OnConnectionStateChangeEvent(state) => {
                    info!("peer connection state changed to {state}");
                    match state {
                        RTCPeerConnectionState::Failed => {
                            let err = self
                                .peer_connection
                                .transport_error()
                                .cloned()
                                .unwrap_or(Error::ErrIceConnectivityFailed);
                            self.fail_pending(&err);
                        }
                        RTCPeerConnectionState::Closed => {
                            self.fail_pending(&Error::ErrConnectionClosed);
                        }
                        _ => {}
                    }
                    PeerConnectionEvent::ConnectionStateChange(state)
                }
                RTCPeerConnectionEvent::OnDataChannel(event) => {
                    match self.handle_data_channel_event(event) {
                        Some(event) => event,
                        None => continue,
                    }
                }
            };
            let _ = self.event_tx.send(event);
        }
    }

    fn handle_data_channel_event(
        &mut self,
        event: RTCDataChannelEvent,
    ) -> Option<PeerConnectionEvent> {
        match event {
            RTCDataChannelEvent::OnOpen(id) => {
                let dc = self.open_handle(id)?;
                match self.pending_opens.remove(&id) {
                    Some(reply) => {
                        if let Err(Ok(dc)) = reply.send(Ok(dc)) {
                            debug!("data channel {} opened after its creator left", dc.id());
                        }
                        None
                    }
                    None => Some(PeerConnectionEvent::DataChannel(dc)),
                }
            }
            RTCDataChannelEvent::OnBufferedAmountLow(_) => {
                // The association limit is shared between streams, any
                // stream draining may unblock the others.
                self.retry_parked_sends();
                None
            }
            RTCDataChannelEvent::OnError(id, reason) => {
                match self.pending_opens.remove(&id) {
                    Some(reply) => {
                        let _ = reply.send(Err(Error::Other(reason)));
                    }
                    None => warn!("data channel {id} error: {reason}"),
                }
                None
            }
            RTCDataChannelEvent::OnClose(id) => {
                if let Some(reply) = self.pending_opens.remove(&id) {
                    let _ = reply.send(Err(Error::ErrDataChannelNotOpen));
                }
                if let Some(slot) = self.channels.remove(&id) {
                    for (_, reply) in slot.parked {
                        let _ = reply.send(Err(Error::ErrDataChannelNotOpen));
                    }
                }
                None
            }
            // Messages are picked up from poll_read.
            RTCDataChannelEvent::OnMessage(_, _) => None,
        }
    }

    fn open_handle(&mut self, id: RTCDataChannelId) -> Option<DataChannel> {
        let cmd_tx = self.cmd_tx.upgrade()?;
        let label = self
            .peer_connection
            .data_channel(id)
            .and_then(|dc| dc.label().ok())
            .unwrap_or_default();
        let (message_tx, message_rx) = mpsc::channel(RECEIVE_QUEUE_CAPACITY);
        self.channels.insert(id, ChannelSlot::new(message_tx));
        Some(DataChannel::new(
            id,
            label,
            cmd_tx,
            message_rx,
            self.reader_progress.clone(),
        ))
    }

    fn fail_pending(&mut self, err: &Error) {
        for (id, reply) in self.pending_opens.drain() {
            debug!("data channel {id} failed to open: {err}");
            let _ = reply.send(Err(err.clone()));
        }
        for slot in self.channels.values_mut() {
            for (_, reply) in slot.parked.drain(..) {
                let _ = reply.send(Err(err.clone()));
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let result = self.peer_connection.close();
        self.drain_events();
        self.fail_pending(&Error::ErrConnectionClosed);
        // Receivers see the end of their channel.
        self.channels.clear();
        result
    }
}
