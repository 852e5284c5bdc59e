use crate::chunk::chunk_payload_data::PayloadProtocolIdentifier;
use crate::queue::reassembly_queue::ReassemblyQueue;
use bytes::BytesMut;
use std::fmt;

/// ReliabilityType is the enum for reliability types of a stream
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
#[repr(C)]
pub enum ReliabilityType {
    /// ReliabilityTypeReliable is used for reliable transmission
    #[default]
    Reliable = 0,
    /// ReliabilityTypeRexmit is used for partial reliability by retransmission count
    Rexmit = 1,
    /// ReliabilityTypeTimed is used for partial reliability by retransmission duration
    Timed = 2,
}

impl fmt::Display for ReliabilityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            ReliabilityType::Reliable => "Reliable",
            ReliabilityType::Rexmit => "Rexmit",
            ReliabilityType::Timed => "Timed",
        };
        write!(f, "{s}")
    }
}

/// A user message on one stream, either read from or written to the association.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StreamMessage {
    pub stream_id: u16,
    pub ppi: PayloadProtocolIdentifier,
    pub payload: BytesMut,
}

/// Per-stream state of an association.
#[derive(Debug)]
pub struct Stream {
    pub(crate) stream_identifier: u16,
    pub(crate) next_ssn: u16,
    pub(crate) unordered: bool,
    pub(crate) reliability_type: ReliabilityType,
    pub(crate) reliability_value: u32,
    pub(crate) buffered_amount: usize,
    pub(crate) buffered_amount_low: usize,
    pub(crate) reassembly_queue: ReassemblyQueue,
    /// Outgoing half has been reset (or a reset was requested).
    pub(crate) local_reset: bool,
    /// Incoming half has been reset by the peer.
    pub(crate) remote_reset: bool,
}

impl Stream {
    pub(crate) fn new(stream_identifier: u16) -> Self {
        Stream {
            stream_identifier,
            next_ssn: 0,
            unordered: false,
            reliability_type: ReliabilityType::Reliable,
            reliability_value: 0,
            buffered_amount: 0,
            buffered_amount_low: 0,
            reassembly_queue: ReassemblyQueue::default(),
            local_reset: false,
            remote_reset: false,
        }
    }

    pub fn stream_identifier(&self) -> u16 {
        self.stream_identifier
    }

    /// Bytes written on this stream that are queued or in flight.
    pub fn buffered_amount(&self) -> usize {
        self.buffered_amount
    }

    pub fn buffered_amount_low_threshold(&self) -> usize {
        self.buffered_amount_low
    }

    pub fn is_unordered(&self) -> bool {
        self.unordered
    }

    pub fn reliability_type(&self) -> ReliabilityType {
        self.reliability_type
    }

    pub fn reliability_value(&self) -> u32 {
        self.reliability_value
    }

    /// Whether a full buffer drops instead of blocking the writer.
    pub fn drops_when_full(&self) -> bool {
        self.unordered || self.reliability_type != ReliabilityType::Reliable
    }

    /// Lowers the buffered amount. Returns true when it crossed the low threshold.
    pub(crate) fn release(&mut self, n: usize) -> bool {
        let before = self.buffered_amount;
        self.buffered_amount = self.buffered_amount.saturating_sub(n);
        before > self.buffered_amount_low && self.buffered_amount <= self.buffered_amount_low
    }
}
