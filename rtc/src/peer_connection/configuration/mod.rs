pub mod setting_engine;

use crate::peer_connection::certificate::RTCCertificate;
use crate::peer_connection::transport::ice::server::RTCIceServer;
use setting_engine::SettingEngine;
use std::net::SocketAddr;

/// A Configuration defines how peer-to-peer communication via PeerConnection
/// is established or re-established.
///
/// The peer connection itself does no I/O, so the configuration names the
/// local sockets the application bound: one host candidate is advertised per
/// address in `local_addrs`.
///
/// ## Specifications
///
/// * [W3C]
///
/// [W3C]: https://w3c.github.io/webrtc-pc/#rtcconfiguration-dictionary
#[derive(Default, Clone)]
pub struct RTCConfiguration {
    /// ice_servers defines a slice describing servers available to be used by
    /// ICE. Only STUN servers are used.
    pub(crate) ice_servers: Vec<RTCIceServer>,

    /// certificates describes a set of certificates that the PeerConnection
    /// uses to authenticate. The first one is presented in the handshake. If
    /// this value is absent, a certificate is generated for each
    /// PeerConnection instance.
    pub(crate) certificates: Vec<RTCCertificate>,

    /// Addresses of the bound UDP sockets.
    pub(crate) local_addrs: Vec<SocketAddr>,

    pub(crate) setting_engine: SettingEngine,
}

impl RTCConfiguration {
    pub fn ice_servers(&self) -> &[RTCIceServer] {
        &self.ice_servers
    }

    pub fn certificates(&self) -> &[RTCCertificate] {
        &self.certificates
    }

    pub fn local_addrs(&self) -> &[SocketAddr] {
        &self.local_addrs
    }

    pub fn setting_engine(&self) -> &SettingEngine {
        &self.setting_engine
    }
}

#[derive(Default)]
pub struct RTCConfigurationBuilder {
    configuration: RTCConfiguration,
}

impl RTCConfigurationBuilder {
    pub fn new() -> Self {
        RTCConfigurationBuilder::default()
    }

    pub fn with_ice_servers(mut self, ice_servers: Vec<RTCIceServer>) -> Self {
        self.configuration.ice_servers = ice_servers;
        self
    }

    pub fn with_certificates(mut self, certificates: Vec<RTCCertificate>) -> Self {
        self.configuration.certificates = certificates;
        self
    }

    pub fn with_local_addrs(mut self, local_addrs: Vec<SocketAddr>) -> Self {
        self.configuration.local_addrs = local_addrs;
        self
    }

    pub fn with_setting_engine(mut self, setting_engine: SettingEngine) -> Self {
        self.configuration.setting_engine = setting_engine;
        self
    }

    pub fn build(self) -> RTCConfiguration {
        self.configuration
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_configuration_builder() {
        let configuration = RTCConfigurationBuilder::new()
            .with_ice_servers(vec![RTCIceServer {
                urls: vec!["stun:stun.l.google.com:19302".to_owned()],
                ..Default::default()
            }])
            .with_local_addrs(vec!["127.0.0.1:5000".parse().unwrap()])
            .build();

        assert_eq!(configuration.ice_servers().len(), 1);
        assert_eq!(
            configuration.local_addrs(),
            &["127.0.0.1:5000".parse::<SocketAddr>().unwrap()]
        );
        assert!(configuration.certificates().is_empty());
    }
}
