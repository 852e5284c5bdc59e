use crate::data_channel::RTCDataChannelId;
use crate::data_channel::parameters::{DataChannelParameters, Reliability};
use crate::data_channel::state::RTCDataChannelState;
use datachannel::message::message_channel_open::CHANNEL_PRIORITY_NORMAL;
use datachannel::{DataChannel, DataChannelConfig};
use log::{debug, warn};
use sansio::Protocol;
use sctp::{Association, PayloadProtocolIdentifier};
use shared::error::Result;

/// Per-channel bookkeeping kept by the peer connection. The handle `id` is
/// assigned at creation, the SCTP `stream_id` once the association decides it.
#[derive(Default, Clone)]
pub(crate) struct RTCDataChannelInternal {
    pub(crate) id: RTCDataChannelId,
    pub(crate) stream_id: Option<u16>,
    pub(crate) label: String,
    pub(crate) ordered: bool,
    pub(crate) reliability: Reliability,
    pub(crate) protocol: String,
    pub(crate) negotiated: Option<u16>,
    pub(crate) ready_state: RTCDataChannelState,
    pub(crate) buffered_amount_low_threshold: usize,

    pub(crate) data_channel: Option<DataChannel>,
}

impl RTCDataChannelInternal {
    /// create the DataChannel object before the networking is set up.
    pub(crate) fn new(id: RTCDataChannelId, params: DataChannelParameters) -> Self {
        Self {
            id,
            stream_id: params.negotiated,
            label: params.label,
            protocol: params.protocol,
            negotiated: params.negotiated,
            ordered: params.ordered,
            reliability: params.reliability,
            ready_state: RTCDataChannelState::Connecting,
            buffered_amount_low_threshold: 0,
            data_channel: None,
        }
    }

    /// Opens the channel on `stream_id`: installs ordering and reliability on
    /// the stream, then sends DATA_CHANNEL_OPEN unless the channel was negotiated.
    pub(crate) fn dial(&mut self, stream_id: u16, association: &mut Association) -> Result<()> {
        let mut config = DataChannelConfig {
            priority: CHANNEL_PRIORITY_NORMAL,
            label: self.label.clone(),
            protocol: self.protocol.clone(),
            negotiated: self.negotiated.is_some(),
            ..Default::default()
        };
        config.set_reliability(
            self.ordered,
            self.reliability.max_retransmits(),
            self.reliability.max_packet_life_time(),
        );
        let data_channel = DataChannel::dial(config, stream_id)?;

        let (unordered, reliability_type, reliability_parameter) =
            data_channel.reliability_params();
        association.set_reliability_params(
            stream_id,
            unordered,
            reliability_type,
            reliability_parameter,
        )?;
        association.set_buffered_amount_low_threshold(stream_id, self.buffered_amount_low_threshold);

        self.data_channel = Some(data_channel);
        self.stream_id = Some(stream_id);

        Ok(())
    }

    /// Creates the channel announced by a remote DATA_CHANNEL_OPEN in `buf`.
    pub(crate) fn accept(
        id: RTCDataChannelId,
        stream_id: u16,
        ppi: PayloadProtocolIdentifier,
        buf: &[u8],
        association: &mut Association,
    ) -> Result<Self> {
        let data_channel = DataChannel::accept(DataChannelConfig::default(), stream_id, ppi, buf)?;

        let (unordered, reliability_type, reliability_parameter) =
            data_channel.reliability_params();
        association.set_reliability_params(
            stream_id,
            unordered,
            reliability_type,
            reliability_parameter,
        )?;

        let config = data_channel.config();
        let mut data_channel_internal = RTCDataChannelInternal::new(
            id,
            DataChannelParameters {
                label: config.label.clone(),
                protocol: config.protocol.clone(),
                ordered: !unordered,
                reliability: Reliability::from_stream(reliability_type, reliability_parameter),
                negotiated: None,
            },
        );
        data_channel_internal.stream_id = Some(stream_id);
        data_channel_internal.data_channel = Some(data_channel);

        Ok(data_channel_internal)
    }

    pub(crate) fn buffered_amount(&self, association: Option<&Association>) -> usize {
        match (self.stream_id, association) {
            (Some(stream_id), Some(association)) => association.stream_buffered_amount(stream_id),
            _ => 0,
        }
    }

    /// Starts the closing procedure by resetting the outgoing stream. The
    /// channel reaches closed once the peer resets its side as well.
    pub(crate) fn close(&mut self, association: Option<&mut Association>) -> Result<()> {
        if matches!(
            self.ready_state,
            RTCDataChannelState::Closing | RTCDataChannelState::Closed
        ) {
            return Ok(());
        }

        let Some(data_channel) = self.data_channel.as_mut() else {
            debug!("data channel {} closed before it was dialed", self.label);
            self.ready_state = RTCDataChannelState::Closed;
            return Ok(());
        };
        data_channel.close()?;
        self.ready_state = RTCDataChannelState::Closing;

        if let (Some(stream_id), Some(association)) = (self.stream_id, association) {
            if association.is_established() {
                association.reset_stream(stream_id)?;
            } else {
                warn!("data channel {} closing without an association", self.label);
                self.ready_state = RTCDataChannelState::Closed;
            }
        }
        Ok(())
    }
}
