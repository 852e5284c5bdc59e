use crate::peer_connection::configuration::setting_engine::SettingEngine;
use crate::peer_connection::transport::sctp::state::RTCSctpTransportState;
use log::debug;
use sctp::{Association, AssociationConfig};
use shared::error::{Error, Result};
use std::time::Instant;

pub(crate) mod state;

pub(crate) const SCTP_MAX_CHANNELS: u16 = u16::MAX;

/// SCTPTransport provides details about the SCTP transport.
pub(crate) struct RTCSctpTransport {
    pub(crate) association: Option<Association>,

    state: RTCSctpTransportState,
    config: AssociationConfig,

    // The peer's a=max-message-size, 0 when it announced none.
    remote_max_message_size: u32,

    // max_channels represents the maximum amount of DataChannel's that can
    // be used simultaneously.
    max_channels: u16,
}

impl RTCSctpTransport {
    pub(crate) fn new(setting_engine: &SettingEngine) -> Self {
        Self {
            association: None,
            state: RTCSctpTransportState::New,
            config: setting_engine.association_config(),
            remote_max_message_size: 0,
            max_channels: SCTP_MAX_CHANNELS,
        }
    }

    pub(crate) fn state_change(&mut self, state: RTCSctpTransportState) {
        if self.state != state {
            debug!("sctp transport state {} -> {}", self.state, state);
            self.state = state;
        }
    }

    pub(crate) fn max_channels(&self) -> u16 {
        self.max_channels
    }

    /// The size announced in the local description.
    pub(crate) fn local_max_message_size(&self) -> u32 {
        self.config.max_message_size()
    }

    /// The largest message `send` accepts: the smaller of both sides.
    pub(crate) fn max_message_size(&self) -> u32 {
        if let Some(association) = &self.association {
            association.max_message_size()
        } else if self.remote_max_message_size > 0 {
            self.local_max_message_size().min(self.remote_max_message_size)
        } else {
            self.local_max_message_size()
        }
    }

    pub(crate) fn set_remote_max_message_size(&mut self, remote_max_message_size: u32) {
        self.remote_max_message_size = remote_max_message_size;
        if let Some(association) = &mut self.association {
            association.set_remote_max_message_size(remote_max_message_size);
        }
    }

    pub(crate) fn is_client(&self) -> bool {
        self.association.as_ref().is_some_and(|a| a.is_client())
    }

    pub(crate) fn is_established(&self) -> bool {
        self.association.as_ref().is_some_and(|a| a.is_established())
    }

    /// Creates the association once the DTLS role is known. The DTLS client
    /// is also the SCTP client.
    pub(crate) fn start(&mut self, is_client: bool, now: Instant) -> Result<()> {
        if self.association.is_some() {
            return Ok(());
        }
        if self.state == RTCSctpTransportState::Closed {
            return Err(Error::ErrAssociationAborted);
        }

        let mut association = Association::new(self.config.clone(), is_client, now);
        association.set_remote_max_message_size(self.remote_max_message_size);
        self.association = Some(association);
        self.state_change(RTCSctpTransportState::Connecting);

        Ok(())
    }

    /// Sends INIT. Only the client dials, once DTLS is up.
    pub(crate) fn connect(&mut self, now: Instant) -> Result<()> {
        let association = self
            .association
            .as_mut()
            .ok_or(Error::ErrAssociationNotEstablished)?;
        if association.is_client() {
            association.connect(now)?;
        }
        Ok(())
    }

    pub(crate) fn stop(&mut self) {
        self.state_change(RTCSctpTransportState::Closed);
    }
}
