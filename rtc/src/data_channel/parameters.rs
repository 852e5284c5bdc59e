use crate::data_channel::init::RTCDataChannelInit;
use sctp::ReliabilityType;
use shared::error::{Error, Result};

/// When a stream gives up on a message.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Reliability {
    #[default]
    Reliable,
    /// Abandons a message after this many retransmissions.
    MaxRetransmits(u16),
    /// Abandons a message once it is this many milliseconds old.
    MaxPacketLifeTime(u16),
}

impl Reliability {
    pub(crate) fn max_retransmits(self) -> Option<u16> {
        match self {
            Reliability::MaxRetransmits(n) => Some(n),
            _ => None,
        }
    }

    pub(crate) fn max_packet_life_time(self) -> Option<u16> {
        match self {
            Reliability::MaxPacketLifeTime(ms) => Some(ms),
            _ => None,
        }
    }

    /// Reads back what a remote DATA_CHANNEL_OPEN installed on the stream.
    pub(crate) fn from_stream(reliability_type: ReliabilityType, parameter: u32) -> Self {
        let parameter = u16::try_from(parameter).unwrap_or(u16::MAX);
        match reliability_type {
            ReliabilityType::Reliable => Reliability::Reliable,
            ReliabilityType::Rexmit => Reliability::MaxRetransmits(parameter),
            ReliabilityType::Timed => Reliability::MaxPacketLifeTime(parameter),
        }
    }
}

/// A channel's settings once the application's [RTCDataChannelInit] was
/// checked.
#[derive(Default, Debug, Clone)]
pub(crate) struct DataChannelParameters {
    pub(crate) label: String,
    pub(crate) protocol: String,
    pub(crate) ordered: bool,
    pub(crate) reliability: Reliability,
    /// Stream id agreed out of band. None when the channel is announced in-band.
    pub(crate) negotiated: Option<u16>,
}

impl DataChannelParameters {
    /// Applies `init` on top of an ordered, reliable channel.
    ///
    /// Fails when both retransmit limits are set or the protocol does not fit
    /// the 16 bit length of DATA_CHANNEL_OPEN.
    pub(crate) fn new(label: &str, init: RTCDataChannelInit) -> Result<Self> {
        let reliability = match (init.max_retransmits, init.max_packet_life_time) {
            (Some(_), Some(_)) => return Err(Error::ErrRetransmitsOrPacketLifeTime),
            (Some(n), None) => Reliability::MaxRetransmits(n),
            (None, Some(ms)) => Reliability::MaxPacketLifeTime(ms),
            (None, None) => Reliability::Reliable,
        };

        let protocol = init.protocol.unwrap_or_default();
        if protocol.len() > u16::MAX as usize {
            return Err(Error::ErrProtocolTooLarge);
        }

        Ok(Self {
            label: label.to_owned(),
            protocol,
            ordered: init.ordered.unwrap_or(true),
            reliability,
            negotiated: init.negotiated,
        })
    }
}
