use crate::peer_connection::certificate::RTCCertificate;
use crate::peer_connection::configuration::setting_engine::SettingEngine;
use crate::peer_connection::transport::dtls::fingerprint::RTCDtlsFingerprint;
use crate::peer_connection::transport::dtls::role::RTCDtlsRole;
use crate::peer_connection::transport::dtls::state::RTCDtlsTransportState;
use dtls::DTLSConn;
use dtls::config::ConfigBuilder;
use log::debug;
use shared::error::{Error, Result};
use std::time::{Duration, SystemTime};

pub(crate) mod fingerprint;
pub(crate) mod role;
pub(crate) mod state;

/// DTLSTransport allows an application access to information about the DTLS
/// transport over which SCTP packets of the data channels are sent and received.
#[derive(Default)]
pub(crate) struct RTCDtlsTransport {
    pub(crate) dtls_role: RTCDtlsRole,
    pub(crate) conn: Option<DTLSConn>,

    pub(crate) state: RTCDtlsTransportState,
    pub(crate) certificates: Vec<RTCCertificate>,
    pub(crate) remote_fingerprint: Option<RTCDtlsFingerprint>,

    // From SettingEngine
    retransmit_interval: Option<Duration>,
    maximum_retransmit_number: Option<usize>,
    handshake_timeout: Option<Duration>,
    replay_protection_window: Option<usize>,
}

impl RTCDtlsTransport {
    pub(crate) fn new(
        mut certificates: Vec<RTCCertificate>,
        setting_engine: &SettingEngine,
    ) -> Result<Self> {
        if !certificates.is_empty() {
            let now = SystemTime::now();
            for cert in &certificates {
                cert.check_expiry(now)?;
            }
        } else {
            certificates = vec![RTCCertificate::generate()?];
        };

        Ok(Self {
            dtls_role: RTCDtlsRole::Auto,
            conn: None,
            state: RTCDtlsTransportState::New,
            certificates,
            remote_fingerprint: None,

            retransmit_interval: setting_engine.timeout.dtls_retransmit_interval,
            maximum_retransmit_number: setting_engine.dtls_maximum_retransmit_number,
            handshake_timeout: setting_engine.timeout.dtls_handshake_timeout,
            replay_protection_window: setting_engine.dtls_replay_protection_window(),
        })
    }

    pub(crate) fn state_change(&mut self, state: RTCDtlsTransportState) {
        if self.state.is_terminal() {
            debug!("dtls transport stays {}, ignoring {}", self.state, state);
            return;
        }
        if self.state != state {
            debug!("dtls transport state {} -> {}", self.state, state);
            self.state = state;
        }
    }

    pub(crate) fn get_fingerprints(&self) -> Vec<RTCDtlsFingerprint> {
        self.certificates
            .first()
            .map(|cert| cert.get_fingerprints())
            .unwrap_or_default()
    }

    pub(crate) fn role(&self) -> RTCDtlsRole {
        self.dtls_role
    }

    pub(crate) fn is_client(&self) -> bool {
        self.dtls_role == RTCDtlsRole::Client
    }

    /// Builds the connection for `dtls_role`. A server waits for the first
    /// ClientHello; a client is started by the handler once ICE selected a pair.
    pub(crate) fn start(
        &mut self,
        dtls_role: RTCDtlsRole,
        remote_fingerprint: RTCDtlsFingerprint,
    ) -> Result<()> {
        if self.state != RTCDtlsTransportState::New {
            return Err(Error::Other(format!(
                "dtls transport can not start in state {}",
                self.state
            )));
        }

        let certificate = self
            .certificates
            .first()
            .ok_or(Error::ErrNoCertificates)?
            .dtls_certificate
            .clone();

        let handshake_config = ConfigBuilder::default()
            .with_certificate(certificate)
            .with_remote_fingerprints(vec![remote_fingerprint.value.clone()])
            .with_retransmit_interval(self.retransmit_interval)
            .with_maximum_retransmit_number(self.maximum_retransmit_number)
            .with_handshake_timeout(self.handshake_timeout)
            .with_replay_protection_window(self.replay_protection_window)
            .build(dtls_role == RTCDtlsRole::Client)?;

        debug!("dtls transport starts as {dtls_role}");
        self.dtls_role = dtls_role;
        self.remote_fingerprint = Some(remote_fingerprint);
        self.conn = Some(DTLSConn::new(handshake_config));
        self.state_change(RTCDtlsTransportState::Connecting);

        Ok(())
    }

    pub(crate) fn stop(&mut self) -> Result<()> {
        self.state_change(RTCDtlsTransportState::Closed);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_dtls_transport_failed_is_final() {
        let mut transport = RTCDtlsTransport {
            state: RTCDtlsTransportState::Connecting,
            ..Default::default()
        };
        transport.state_change(RTCDtlsTransportState::Failed);
        transport.state_change(RTCDtlsTransportState::Closed);
        assert_eq!(transport.state, RTCDtlsTransportState::Failed);
    }
}
