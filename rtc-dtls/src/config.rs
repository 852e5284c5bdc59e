use std::time::Duration;

use crate::crypto::Certificate;
use crate::replay_detector::DEFAULT_REPLAY_PROTECTION_WINDOW;
use shared::error::*;

pub const DEFAULT_RETRANSMIT_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_MAXIMUM_RETRANSMIT_NUMBER: usize = 7;
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MTU: usize = 1200;

/// Everything a connection needs to run the handshake.
#[derive(Clone, Debug)]
pub struct HandshakeConfig {
    pub certificate: Certificate,
    /// Expected SHA-256 fingerprints of the peer certificate, any one may match.
    pub remote_fingerprints: Vec<String>,
    /// Initial flight retransmission interval, doubled after every retransmission.
    pub retransmit_interval: Duration,
    pub maximum_retransmit_number: usize,
    pub handshake_timeout: Duration,
    pub maximum_transmission_unit: usize,
    pub replay_protection_window: usize,
    pub is_client: bool,
}

/// Builder for [HandshakeConfig]. Unset durations fall back to the `DEFAULT_*` constants.
#[derive(Default, Clone, Debug)]
pub struct ConfigBuilder {
    certificate: Option<Certificate>,
    remote_fingerprints: Vec<String>,
    retransmit_interval: Option<Duration>,
    maximum_retransmit_number: Option<usize>,
    handshake_timeout: Option<Duration>,
    maximum_transmission_unit: Option<usize>,
    replay_protection_window: Option<usize>,
}

impl ConfigBuilder {
    pub fn with_certificate(mut self, certificate: Certificate) -> Self {
        self.certificate = Some(certificate);
        self
    }

    pub fn with_remote_fingerprints(mut self, remote_fingerprints: Vec<String>) -> Self {
        self.remote_fingerprints = remote_fingerprints;
        self
    }

    pub fn with_retransmit_interval(mut self, retransmit_interval: Option<Duration>) -> Self {
        self.retransmit_interval = retransmit_interval;
        self
    }

    pub fn with_maximum_retransmit_number(mut self, maximum_retransmit_number: Option<usize>) -> Self {
        self.maximum_retransmit_number = maximum_retransmit_number;
        self
    }

    pub fn with_handshake_timeout(mut self, handshake_timeout: Option<Duration>) -> Self {
        self.handshake_timeout = handshake_timeout;
        self
    }

    pub fn with_mtu(mut self, mtu: Option<usize>) -> Self {
        self.maximum_transmission_unit = mtu;
        self
    }

    pub fn with_replay_protection_window(mut self, window: Option<usize>) -> Self {
        self.replay_protection_window = window;
        self
    }

    pub fn build(self, is_client: bool) -> Result<HandshakeConfig> {
        let certificate = self.certificate.ok_or(Error::ErrNoCertificates)?;

        Ok(HandshakeConfig {
            certificate,
            remote_fingerprints: self.remote_fingerprints,
            retransmit_interval: self
                .retransmit_interval
                .unwrap_or(DEFAULT_RETRANSMIT_INTERVAL),
            maximum_retransmit_number: self
                .maximum_retransmit_number
                .unwrap_or(DEFAULT_MAXIMUM_RETRANSMIT_NUMBER),
            handshake_timeout: self.handshake_timeout.unwrap_or(DEFAULT_HANDSHAKE_TIMEOUT),
            maximum_transmission_unit: self.maximum_transmission_unit.unwrap_or(DEFAULT_MTU),
            replay_protection_window: self
                .replay_protection_window
                .unwrap_or(DEFAULT_REPLAY_PROTECTION_WINDOW),
            is_client,
        })
    }
}
