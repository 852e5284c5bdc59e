
use crate::message::{message_channel_open::*, *};
use bytes::{Buf, BytesMut};
use log::{debug, trace};
use sctp::{PayloadProtocolIdentifier, ReliabilityType, StreamMessage};
use shared::error::{Error, Result};
use shared::marshal::*;
use std::collections::VecDeque;
use std::fmt;

/// What a DATA_CHANNEL_OPEN announces, plus whether the channel skips it.
#[derive(Eq, PartialEq, Default, Clone, Debug)]
pub struct DataChannelConfig {
    pub channel_type: ChannelType,
    pub negotiated: bool,
    pub priority: u16,
    pub reliability_parameter: u32,
    pub label: String,
    pub protocol: String,
}

impl DataChannelConfig {
    /// Picks the channel type and parameter for the given ordering and
    /// limits. A retransmit limit wins over a lifetime.
    pub fn set_reliability(
        &mut self,
        ordered: bool,
        max_retransmits: Option<u16>,
        max_packet_life_time: Option<u16>,
    ) {
        let (reliability_type, parameter) = match (max_retransmits, max_packet_life_time) {
            (Some(n), _) => (ReliabilityType::Rexmit, n),
            (None, Some(ms)) => (ReliabilityType::Timed, ms),
            (None, None) => (ReliabilityType::Reliable, 0),
        };
        self.channel_type = ChannelType::new(ordered, reliability_type);
        self.reliability_parameter = u32::from(parameter);
    }
}

/// DataChannelState indicates the state of a data channel.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum DataChannelState {
    /// The OPEN was sent and the ACK has not arrived yet.
    #[default]
    Connecting,
    Open,
    /// Closing was requested locally and the outgoing stream reset is in flight.
    Closing,
    Closed,
}

impl fmt::Display for DataChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            DataChannelState::Connecting => "connecting",
            DataChannelState::Open => "open",
            DataChannelState::Closing => "closing",
            DataChannelState::Closed => "closed",
        };
        write!(f, "{s}")
    }
}

/// Lifecycle notifications raised by a data channel.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DataChannelEvent {
    Open,
    Close,
}

/// One SCTP user message on a channel's stream.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DataChannelMessage {
    pub stream_id: u16,
    pub ppi: PayloadProtocolIdentifier,
    pub payload: BytesMut,
}

impl From<StreamMessage> for DataChannelMessage {
    fn from(msg: StreamMessage) -> Self {
        Self {
            stream_id: msg.stream_id,
            ppi: msg.ppi,
            payload: msg.payload,
        }
    }
}

impl From<DataChannelMessage> for StreamMessage {
    fn from(msg: DataChannelMessage) -> Self {
        Self {
            stream_id: msg.stream_id,
            ppi: msg.ppi,
            payload: msg.payload,
        }
    }
}

impl DataChannelMessage {
    /// Frames user data for the wire. SCTP cannot carry empty user messages,
    /// so an empty one goes out as a single zero byte under the empty PPI.
    pub fn framed(is_string: bool, data: BytesMut) -> Self {
        let (ppi, payload) = match (is_string, data.is_empty()) {
            (true, true) => (PayloadProtocolIdentifier::StringEmpty, BytesMut::from(&[0u8][..])),
            (false, true) => (PayloadProtocolIdentifier::BinaryEmpty, BytesMut::from(&[0u8][..])),
            (true, false) => (PayloadProtocolIdentifier::String, data),
            (false, false) => (PayloadProtocolIdentifier::Binary, data),
        };
        Self {
            stream_id: 0,
            ppi,
            payload,
        }
    }

    /// Whether the payload carries text rather than binary data.
    pub fn is_string(&self) -> bool {
        matches!(
            self.ppi,
            PayloadProtocolIdentifier::String | PayloadProtocolIdentifier::StringEmpty
        )
    }
}

/// User traffic counted on a channel. Empty messages add no bytes.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct DataChannelStats {
    pub messages_sent: usize,
    pub messages_received: usize,
    pub bytes_sent: usize,
    pub bytes_received: usize,
}

/// The DCEP side of one channel: opens it, acknowledges the peer's open and
/// frames user messages for its stream.
#[derive(Debug, Default, Clone)]
pub struct DataChannel {
    config: DataChannelConfig,
    stream_id: u16,
    state: DataChannelState,
    stats: DataChannelStats,
    read_outs: VecDeque<DataChannelMessage>,
    write_outs: VecDeque<DataChannelMessage>,
    event_outs: VecDeque<DataChannelEvent>,
}

impl DataChannel {
    fn new(config: DataChannelConfig, stream_id: u16) -> Self {
        Self {
            config,
            stream_id,
            ..Default::default()
        }
    }

    /// Dial opens a data channel on an established association.
    ///
    /// A negotiated channel is open at once. Otherwise a DATA_CHANNEL_OPEN is
    /// queued and the channel stays connecting until the peer acknowledges it.
    pub fn dial(config: DataChannelConfig, stream_id: u16) -> Result<Self> {
        let negotiated = config.negotiated;
        let mut data_channel = DataChannel::new(config, stream_id);

        if negotiated {
            data_channel.set_open();
        } else {
            let msg = Message::Open(DataChannelOpen {
                channel_type: data_channel.config.channel_type,
                priority: data_channel.config.priority,
                reliability_parameter: data_channel.config.reliability_parameter,
                label: data_channel.config.label.bytes().collect(),
                protocol: data_channel.config.protocol.bytes().collect(),
            })
            .marshal()?;

            data_channel.write_outs.push_back(DataChannelMessage {
                stream_id,
                ppi: PayloadProtocolIdentifier::Dcep,
                payload: BytesMut::from(&msg[..]),
            });
        }

        Ok(data_channel)
    }

    /// Accept is used to accept incoming data channels over SCTP. `buf` must
    /// hold a DATA_CHANNEL_OPEN, which is answered with a DATA_CHANNEL_ACK.
    pub fn accept(
        mut config: DataChannelConfig,
        stream_id: u16,
        ppi: PayloadProtocolIdentifier,
        buf: &[u8],
    ) -> Result<Self> {
        if ppi != PayloadProtocolIdentifier::Dcep {
            return Err(Error::InvalidPayloadProtocolIdentifier(ppi as u32));
        }

        let mut read_buf = buf;
        let msg = Message::unmarshal(&mut read_buf)?;

        if let Message::Open(dco) = msg {
            config.channel_type = dco.channel_type;
            config.priority = dco.priority;
            config.reliability_parameter = dco.reliability_parameter;
            config.label = String::from_utf8(dco.label)?;
            config.protocol = String::from_utf8(dco.protocol)?;
        } else {
            return Err(Error::InvalidMessageType(msg.message_type().into()));
        };

        let mut data_channel = DataChannel::new(config, stream_id);

        data_channel.write_data_channel_ack()?;
        data_channel.set_open();

        Ok(data_channel)
    }

    pub fn state(&self) -> DataChannelState {
        self.state
    }

    pub fn stats(&self) -> DataChannelStats {
        self.stats
    }

    pub fn stream_id(&self) -> u16 {
        self.stream_id
    }

    pub fn config(&self) -> &DataChannelConfig {
        &self.config
    }

    /// Ordering and reliability to install on the channel's SCTP stream.
    pub fn reliability_params(&self) -> (bool, ReliabilityType, u32) {
        let channel_type = self.config.channel_type;
        (
            channel_type.is_unordered(),
            channel_type.reliability_type(),
            self.config.reliability_parameter,
        )
    }

    /// The peer reset the incoming half of the stream, or our own reset
    /// completed. Either way the channel is gone.
    pub fn handle_stream_reset(&mut self) {
        if self.state != DataChannelState::Closed {
            debug!(
                "data channel {} on stream {} closed",
                self.config.label, self.stream_id
            );
            self.state = DataChannelState::Closed;
            self.read_outs.clear();
            self.write_outs.clear();
            self.event_outs.push_back(DataChannelEvent::Close);
        }
    }

    fn set_open(&mut self) {
        if self.state == DataChannelState::Connecting {
            self.state = DataChannelState::Open;
            self.event_outs.push_back(DataChannelEvent::Open);
        }
    }

    fn handle_dcep<B>(&mut self, data: &mut B) -> Result<()>
    where
        B: Buf,
    {
        let msg = Message::unmarshal(data)?;

        match msg {
            Message::Open(_) => {
                // A retransmitted OPEN: the first one was consumed by accept().
                debug!("Received DATA_CHANNEL_OPEN on stream {}", self.stream_id);
                self.write_data_channel_ack()?;
            }
            Message::Ack => {
                debug!("Received DATA_CHANNEL_ACK on stream {}", self.stream_id);
                self.set_open();
            }
        };

        Ok(())
    }

    fn write_data_channel_ack(&mut self) -> Result<()> {
        let ack = Message::Ack.marshal()?;
        self.write_outs.push_back(DataChannelMessage {
            stream_id: self.stream_id,
            ppi: PayloadProtocolIdentifier::Dcep,
            payload: BytesMut::from(&ack[..]),
        });
        Ok(())
    }
}

impl sansio::Protocol<DataChannelMessage, DataChannelMessage, ()> for DataChannel {
    type Rout = DataChannelMessage;
    type Wout = DataChannelMessage;
    type Eout = DataChannelEvent;
    type Error = Error;
    type Time = ();

    /// Feeds one SCTP user message received on this channel's stream. DCEP
    /// messages are consumed here; user data is queued for `poll_read`.
    fn handle_read(&mut self, mut msg: DataChannelMessage) -> Result<()> {
        match msg.ppi {
            PayloadProtocolIdentifier::Dcep => {
                let mut data_buf = &msg.payload[..];
                return self.handle_dcep(&mut data_buf);
            }
            PayloadProtocolIdentifier::String | PayloadProtocolIdentifier::Binary => {}
            PayloadProtocolIdentifier::StringEmpty | PayloadProtocolIdentifier::BinaryEmpty => {
                msg.payload.clear();
            }
            PayloadProtocolIdentifier::Unknown => {
                return Err(Error::InvalidPayloadProtocolIdentifier(msg.ppi as u32));
            }
        }

        match self.state {
            // User data implies the peer saw our OPEN even if its ACK was lost.
            DataChannelState::Connecting => self.set_open(),
            DataChannelState::Open | DataChannelState::Closing => {}
            DataChannelState::Closed => {
                trace!(
                    "dropping {} bytes on closed stream {}",
                    msg.payload.len(),
                    self.stream_id
                );
                return Ok(());
            }
        }

        self.stats.messages_received += 1;
        self.stats.bytes_received += msg.payload.len();
        msg.stream_id = self.stream_id;
        self.read_outs.push_back(msg);
        Ok(())
    }

    fn poll_read(&mut self) -> Option<DataChannelMessage> {
        self.read_outs.pop_front()
    }

    /// Queues a user message framed with [`DataChannelMessage::framed`].
    fn handle_write(&mut self, mut msg: DataChannelMessage) -> Result<()> {
        if self.state != DataChannelState::Open {
            return Err(Error::ErrDataChannelNotOpen);
        }

        self.stats.messages_sent += 1;
        if !matches!(
            msg.ppi,
            PayloadProtocolIdentifier::StringEmpty | PayloadProtocolIdentifier::BinaryEmpty
        ) {
            self.stats.bytes_sent += msg.payload.len();
        }

        msg.stream_id = self.stream_id;
        self.write_outs.push_back(msg);

        Ok(())
    }

    fn poll_write(&mut self) -> Option<DataChannelMessage> {
        self.write_outs.pop_front()
    }

    fn handle_event(&mut self, _evt: ()) -> Result<()> {
        Ok(())
    }

    fn poll_event(&mut self) -> Option<DataChannelEvent> {
        self.event_outs.pop_front()
    }

    /// Starts closing the channel. The owner resets the outgoing SCTP stream;
    /// the channel reaches closed in [`DataChannel::handle_stream_reset`].
    fn close(&mut self) -> Result<()> {
        if matches!(
            self.state,
            DataChannelState::Connecting | DataChannelState::Open
        ) {
            self.state = DataChannelState::Closing;
        }
        Ok(())
    }
}
