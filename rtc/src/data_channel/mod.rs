//! Data channels: bidirectional message pipes multiplexed over the peer
//! connection's SCTP association.
//!
//! A [`RTCDataChannel`] is a short-lived handle borrowed from the
//! [`RTCPeerConnection`]; the channel itself is addressed by its
//! [`RTCDataChannelId`] and outlives the handle.
//!
//! ```no_run
//! # use rtc::peer_connection::RTCPeerConnection;
//! # use rtc::data_channel::RTCDataChannelInit;
//! # fn example(pc: &mut RTCPeerConnection) -> shared::error::Result<()> {
//! let init = RTCDataChannelInit {
//!     ordered: Some(false),
//!     max_retransmits: Some(0),
//!     ..Default::default()
//! };
//! let id = pc.create_data_channel("telemetry", Some(init))?;
//!
//! // later, once OnOpen was observed
//! if let Some(mut dc) = pc.data_channel(id) {
//!     dc.send_text("hello")?;
//! }
//! # Ok(())
//! # }
//! ```

use crate::peer_connection::RTCPeerConnection;
use crate::peer_connection::message::RTCMessage;
use bytes::BytesMut;
use sansio::Protocol;
use shared::error::{Error, Result};

pub(crate) mod init;
pub(crate) mod internal;
pub(crate) mod message;
pub(crate) mod parameters;
pub(crate) mod state;

pub use init::RTCDataChannelInit;
pub use message::RTCDataChannelMessage;
pub use state::RTCDataChannelState;

/// Identifier for a data channel within a particular peer connection
pub type RTCDataChannelId = u16;

/// DataChannel represents a WebRTC DataChannel
/// The DataChannel interface represents a network channel
/// which can be used for bidirectional peer-to-peer transfers of arbitrary data
///
/// ## Specifications
///
/// * [MDN]
/// * [W3C]
///
/// [MDN]: https://developer.mozilla.org/en-US/docs/Web/API/RTCDataChannel
/// [W3C]: https://w3c.github.io/webrtc-pc/#dom-rtcdatachannel
pub struct RTCDataChannel<'a> {
    pub(crate) id: RTCDataChannelId,
    pub(crate) peer_connection: &'a mut RTCPeerConnection,
}

impl RTCDataChannel<'_> {
    fn internal(&self) -> Result<&internal::RTCDataChannelInternal> {
        self.peer_connection
            .data_channels
            .get(&self.id)
            .ok_or(Error::ErrDataChannelNotExisted(self.id))
    }

    /// label represents a label that can be used to distinguish this
    /// DataChannel object from other DataChannel objects. Scripts are
    /// allowed to create multiple DataChannel objects with the same label.
    pub fn label(&self) -> Result<String> {
        Ok(self.internal()?.label.clone())
    }

    /// Ordered returns true if the DataChannel is ordered, and false if
    /// out-of-order delivery is allowed.
    pub fn ordered(&self) -> Result<bool> {
        Ok(self.internal()?.ordered)
    }

    /// max_packet_lifetime represents the length of the time window (msec) during
    /// which transmissions and retransmissions may occur in unreliable mode.
    pub fn max_packet_life_time(&self) -> Result<Option<u16>> {
        Ok(self.internal()?.reliability.max_packet_life_time())
    }

    /// max_retransmits represents the maximum number of retransmissions that are
    /// attempted in unreliable mode.
    pub fn max_retransmits(&self) -> Result<Option<u16>> {
        Ok(self.internal()?.reliability.max_retransmits())
    }

    /// protocol represents the name of the sub-protocol used with this
    /// DataChannel.
    pub fn protocol(&self) -> Result<String> {
        Ok(self.internal()?.protocol.clone())
    }

    /// negotiated holds the stream id when this DataChannel was negotiated
    /// by the application, None when it was announced in-band.
    pub fn negotiated(&self) -> Result<Option<u16>> {
        Ok(self.internal()?.negotiated)
    }

    /// id is the handle of this DataChannel within its peer connection.
    pub fn id(&self) -> RTCDataChannelId {
        self.id
    }

    /// stream_id is the SCTP stream carrying this DataChannel. It is None
    /// until the DTLS role is known and the association is up.
    pub fn stream_id(&self) -> Result<Option<u16>> {
        Ok(self.internal()?.stream_id)
    }

    /// ready_state represents the state of the DataChannel object.
    pub fn ready_state(&self) -> Result<RTCDataChannelState> {
        Ok(self.internal()?.ready_state)
    }

    /// buffered_amount represents the number of bytes of application data
    /// that have been queued using send() and not yet acknowledged by the
    /// remote peer.
    pub fn buffered_amount(&self) -> Result<usize> {
        let dc = self.internal()?;
        Ok(dc.buffered_amount(
            self.peer_connection
                .pipeline_context
                .sctp_handler_context
                .sctp_transport
                .association
                .as_ref(),
        ))
    }

    /// buffered_amount_low_threshold represents the threshold at which the
    /// bufferedAmount is considered to be low. When the bufferedAmount decreases
    /// from above this threshold to equal or below it, the bufferedamountlow
    /// event fires.
    /// The threshold is set to 0 by default.
    pub fn buffered_amount_low_threshold(&self) -> Result<usize> {
        Ok(self.internal()?.buffered_amount_low_threshold)
    }

    /// set_buffered_amount_low_threshold sets the threshold at which the
    /// bufferedAmount is considered to be low.
    pub fn set_buffered_amount_low_threshold(&mut self, threshold: usize) -> Result<()> {
        let dc = self
            .peer_connection
            .data_channels
            .get_mut(&self.id)
            .ok_or(Error::ErrDataChannelNotExisted(self.id))?;
        dc.buffered_amount_low_threshold = threshold;
        if let (Some(stream_id), Some(association)) = (
            dc.stream_id,
            self.peer_connection
                .pipeline_context
                .sctp_handler_context
                .sctp_transport
                .association
                .as_mut(),
        ) {
            association.set_buffered_amount_low_threshold(stream_id, threshold);
        }
        Ok(())
    }

    /// send sends the binary message to the DataChannel peer
    pub fn send(&mut self, data: BytesMut) -> Result<()> {
        self.send_message(RTCDataChannelMessage::binary(data.freeze()))
    }

    /// send_text sends the text message to the DataChannel peer
    pub fn send_text(&mut self, s: impl Into<String>) -> Result<()> {
        self.send_message(RTCDataChannelMessage::text(s))
    }

    pub(crate) fn send_message(&mut self, message: RTCDataChannelMessage) -> Result<()> {
        if self.peer_connection.is_closed {
            return Err(Error::ErrConnectionClosed);
        }
        self.internal()?;
        self.peer_connection
            .handle_write(RTCMessage::DataChannelMessage(self.id, message))
    }

    /// close starts the closing procedure. OnClose fires once the remote
    /// peer reset its side of the stream.
    pub fn close(&mut self) -> Result<()> {
        if self.peer_connection.is_closed {
            return Err(Error::ErrConnectionClosed);
        }
        let dc = self
            .peer_connection
            .data_channels
            .get_mut(&self.id)
            .ok_or(Error::ErrDataChannelNotExisted(self.id))?;
        dc.close(
            self.peer_connection
                .pipeline_context
                .sctp_handler_context
                .sctp_transport
                .association
                .as_mut(),
        )
    }
}
