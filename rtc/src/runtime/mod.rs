//! A tokio driver for [`RTCPeerConnection`].
//!
//! [`PeerConnection::new`] binds one UDP socket per local interface and
//! spawns a single task that owns the sans-I/O peer connection together with
//! those sockets. The returned [`PeerConnection`] is a cheap handle: every
//! call is a command sent to that task, answered through a oneshot.
//!
//! ```no_run
//! use rtc::peer_connection::configuration::RTCConfigurationBuilder;
//! use rtc::runtime::{PeerConnection, PeerConnectionEvent};
//!
//! # async fn example() -> shared::error::Result<()> {
//! let (pc, mut events) = PeerConnection::new(RTCConfigurationBuilder::new().build()).await?;
//!
//! let offer = pc.create_offer().await?;
//! pc.set_local_description(offer).await?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         PeerConnectionEvent::IceCandidate(candidate) => { /* signal it */ }
//!         PeerConnectionEvent::DataChannel(mut dc) => {
//!             while let Some(message) = dc.recv().await {
//!                 dc.send(message.data).await?;
//!             }
//!         }
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod data_channel;
mod driver;

pub use data_channel::DataChannel;

use crate::data_channel::RTCDataChannelInit;
use crate::peer_connection::RTCPeerConnection;
use crate::peer_connection::configuration::RTCConfiguration;
use crate::peer_connection::sdp::RTCSessionDescription;
use crate::peer_connection::state::{
    RTCIceConnectionState, RTCIceGatheringState, RTCPeerConnectionState, RTCSignalingState,
};
use crate::peer_connection::transport::RTCIceCandidateInit;
use driver::{Command, Driver, Reply};
use log::{debug, trace, warn};
use shared::error::{Error, Result};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot};

const RECEIVE_MTU: usize = 8192;
/// Datagrams the socket readers may queue ahead of the driver.
const PACKET_QUEUE_CAPACITY: usize = 256;

/// Notifications from a running [`PeerConnection`].
#[derive(Debug)]
pub enum PeerConnectionEvent {
    /// A local candidate to signal, `None` once gathering completed.
    IceCandidate(Option<RTCIceCandidateInit>),
    SignalingStateChange(RTCSignalingState),
    IceConnectionStateChange(RTCIceConnectionState),
    IceGatheringStateChange(RTCIceGatheringState),
    ConnectionStateChange(RTCPeerConnectionState),
    /// The remote peer opened a channel.
    DataChannel(DataChannel),
}

/// Handle to a peer connection driven by its own tokio task.
#[derive(Clone)]
pub struct PeerConnection {
    cmd_tx: mpsc::UnboundedSender<Command>,
}

impl PeerConnection {
    /// Binds the sockets, starts the driver task and returns the handle
    /// along with the stream of its events.
    ///
    /// Addresses already listed in the configuration are ignored, one
    /// ephemeral port is bound on each local interface instead.
    pub async fn new(
        mut configuration: RTCConfiguration,
    ) -> Result<(Self, mpsc::UnboundedReceiver<PeerConnectionEvent>)> {
        let include_loopback = configuration
            .setting_engine
            .candidates
            .include_loopback_candidate;
        let mut ips = ice::gatherer::local_interfaces(include_loopback).unwrap_or_default();
        if ips.is_empty() {
            debug!("no usable interface found, falling back to loopback");
            ips.push(IpAddr::from([127, 0, 0, 1]));
            configuration
                .setting_engine
                .set_include_loopback_candidate(true);
        }

        let mut sockets = Vec::with_capacity(ips.len());
        for ip in ips {
            match UdpSocket::bind(SocketAddr::new(ip, 0)).await {
                Ok(socket) => {
                    let local_addr = socket.local_addr()?;
                    debug!("bound udp socket on {local_addr}");
                    sockets.push((local_addr, Arc::new(socket)));
                }
                Err(err) => warn!("failed to bind udp socket on {ip}: {err}"),
            }
        }
        if sockets.is_empty() {
            return Err(Error::ErrNoInterface);
        }
        configuration.local_addrs = sockets.iter().map(|(addr, _)| *addr).collect();

        let peer_connection = RTCPeerConnection::new(configuration)?;

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (packet_tx, packet_rx) = mpsc::channel(PACKET_QUEUE_CAPACITY);

        let readers = sockets
            .iter()
            .map(|(local_addr, socket)| {
                tokio::spawn(read_loop(*local_addr, socket.clone(), packet_tx.clone()))
            })
            .collect();

        let driver = Driver::new(
            peer_connection,
            sockets.into_iter().collect(),
            readers,
            cmd_rx,
            cmd_tx.downgrade(),
            packet_rx,
            event_tx,
        );
        tokio::spawn(driver.run());

        Ok((PeerConnection { cmd_tx }, event_rx))
    }

    pub async fn create_offer(&self) -> Result<RTCSessionDescription> {
        request(&self.cmd_tx, Command::CreateOffer).await
    }

    pub async fn create_answer(&self) -> Result<RTCSessionDescription> {
        request(&self.cmd_tx, Command::CreateAnswer).await
    }

    pub async fn set_local_description(&self, description: RTCSessionDescription) -> Result<()> {
        request(&self.cmd_tx, |reply| {
            Command::SetLocalDescription(description, reply)
        })
        .await
    }

    /// The local description including the candidates gathered so far.
    pub async fn local_description(&self) -> Result<Option<RTCSessionDescription>> {
        request(&self.cmd_tx, Command::LocalDescription).await
    }

    pub async fn set_remote_description(&self, description: RTCSessionDescription) -> Result<()> {
        request(&self.cmd_tx, |reply| {
            Command::SetRemoteDescription(description, reply)
        })
        .await
    }

    /// Adds a remote candidate, `None` marks end-of-candidates.
    pub async fn add_ice_candidate(&self, candidate: Option<RTCIceCandidateInit>) -> Result<()> {
        request(&self.cmd_tx, |reply| Command::AddIceCandidate(candidate, reply)).await
    }

    /// Makes the next offer restart ICE.
    pub async fn restart_ice(&self) -> Result<()> {
        request(&self.cmd_tx, Command::RestartIce).await
    }

    /// Creates a data channel and waits until it is open.
    pub async fn create_data_channel(
        &self,
        label: &str,
        options: Option<RTCDataChannelInit>,
    ) -> Result<DataChannel> {
        let label = label.to_owned();
        request(&self.cmd_tx, |reply| {
            Command::CreateDataChannel(label, options, reply)
        })
        .await
    }

    pub async fn connection_state(&self) -> Result<RTCPeerConnectionState> {
        request(&self.cmd_tx, Command::ConnectionState).await
    }

    /// Closes the connection. Pending operations fail with
    /// `ErrConnectionClosed`, and so does every later call.
    pub async fn close(&self) -> Result<()> {
        request(&self.cmd_tx, Command::Close).await
    }
}

async fn request<T>(
    cmd_tx: &mpsc::UnboundedSender<Command>,
    command: impl FnOnce(Reply<T>) -> Command,
) -> Result<T> {
    let (reply_tx, reply_rx) = oneshot::channel();
    cmd_tx
        .send(command(reply_tx))
        .map_err(|_| Error::ErrConnectionClosed)?;
    reply_rx.await.map_err(|_| Error::ErrConnectionClosed)?
}

async fn read_loop(
    local_addr: SocketAddr,
    socket: Arc<UdpSocket>,
    packet_tx: mpsc::Sender<driver::Datagram>,
) {
    let mut buf = vec![0u8; RECEIVE_MTU];
    loop {
        match socket.recv_from(&mut buf).await {
            Ok((n, peer_addr)) => {
                trace!("socket {local_addr} read {n} bytes from {peer_addr}");
                let datagram = driver::Datagram {
                    local_addr,
                    peer_addr,
                    payload: bytes::BytesMut::from(&buf[..n]),
                };
                if packet_tx.send(datagram).await.is_err() {
                    break;
                }
            }
            Err(err) => {
                warn!("socket {local_addr} read error: {err}");
                break;
            }
        }
    }
}
