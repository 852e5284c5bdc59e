use super::driver::Command;
use super::request;
use crate::data_channel::{RTCDataChannelId, RTCDataChannelMessage};
use bytes::Bytes;
use shared::error::Result;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Notify, mpsc};

/// An open data channel of a running [`PeerConnection`](super::PeerConnection).
///
/// Received messages queue up in the handle until [`recv`](Self::recv) picks
/// them up; `recv` returns `None` once the channel or its connection closed.
/// The queue is bounded: a handle that is not read makes the remote sender
/// wait once the receive window is used up.
pub struct DataChannel {
    id: RTCDataChannelId,
    label: String,
    cmd_tx: mpsc::UnboundedSender<Command>,
    message_rx: mpsc::Receiver<RTCDataChannelMessage>,
    reader_progress: Arc<Notify>,
}

impl fmt::Debug for DataChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataChannel")
            .field("id", &self.id)
            .field("label", &self.label)
            .finish()
    }
}

impl DataChannel {
    pub(crate) fn new(
        id: RTCDataChannelId,
        label: String,
        cmd_tx: mpsc::UnboundedSender<Command>,
        message_rx: mpsc::Receiver<RTCDataChannelMessage>,
        reader_progress: Arc<Notify>,
    ) -> Self {
        Self {
            id,
            label,
            cmd_tx,
            message_rx,
            reader_progress,
        }
    }

    pub fn id(&self) -> RTCDataChannelId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Sends a binary message.
    ///
    /// On an ordered reliable channel this waits while the send buffer is
    /// full, on any other channel it fails with `ErrBufferFull` instead.
    pub async fn send(&self, data: impl Into<Bytes>) -> Result<()> {
        self.send_message(RTCDataChannelMessage::binary(data)).await
    }

    /// Sends a text message, see [`send`](Self::send).
    pub async fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.send_message(RTCDataChannelMessage::text(text)).await
    }

    pub async fn send_message(&self, message: RTCDataChannelMessage) -> Result<()> {
        request(&self.cmd_tx, |reply| Command::Send(self.id, message, reply)).await
    }

    /// Waits for the next message.
    pub async fn recv(&mut self) -> Option<RTCDataChannelMessage> {
        let message = self.message_rx.recv().await;
        self.reader_progress.notify_one();
        message
    }

    /// Starts closing the channel; `recv` returns `None` once the peer
    /// reset its side.
    pub async fn close(&self) -> Result<()> {
        request(&self.cmd_tx, |reply| Command::CloseDataChannel(self.id, reply)).await
    }
}
