//! Advanced configuration engine for peer connections.
//!
//! The `SettingEngine` provides low-level control over transport behavior:
//! the timers of the connectivity checks, the DTLS flight retransmission,
//! static ICE credentials, loopback candidates and the SCTP buffer limits.
//! `RTCConfiguration` covers what a typical application sets; everything
//! here has a sensible default.
//!
//! # Examples
//!
//! ## Configuring ICE timeouts for unstable networks
//!
//! ```
//! use rtc::peer_connection::configuration::setting_engine::SettingEngine;
//! use std::time::Duration;
//!
//! let mut setting_engine = SettingEngine::default();
//!
//! // Increase timeouts for mobile or unstable networks
//! setting_engine.set_ice_timeouts(
//!     Some(Duration::from_secs(10)), // disconnected_timeout (default: 5s)
//!     Some(Duration::from_secs(30)), // failed_timeout (default: 25s)
//!     Some(Duration::from_secs(3)),  // keep_alive_interval (default: 2s)
//! );
//! ```
//!
//! ## Faster DTLS retransmission on a LAN
//!
//! ```
//! use rtc::peer_connection::configuration::setting_engine::SettingEngine;
//! use std::time::Duration;
//!
//! let mut setting_engine = SettingEngine::default();
//! setting_engine.set_dtls_retransmit_interval(Some(Duration::from_millis(100)));
//! setting_engine.set_dtls_handshake_timeout(Some(Duration::from_secs(5)));
//! ```

use std::time::Duration;

use shared::error::{Error, Result};

/// Timer configuration for connection health monitoring and handshakes.
///
/// `None` always means "use the layer's default".
#[derive(Default, Clone)]
pub struct Timeout {
    /// Duration without network activity before ICE is considered disconnected.
    /// Default: 5 seconds.
    pub ice_disconnected_timeout: Option<Duration>,

    /// Duration without a working pair before ICE is considered failed.
    /// Default: 25 seconds.
    pub ice_failed_timeout: Option<Duration>,

    /// How often ICE sends keepalive packets on the selected pair.
    /// Default: 2 seconds.
    pub ice_keepalive_interval: Option<Duration>,

    /// Pacing of new connectivity checks (Ta). Default: 50 milliseconds.
    pub ice_check_interval: Option<Duration>,

    /// First retransmission timeout of a connectivity check. Default: 250 milliseconds.
    pub ice_initial_rto: Option<Duration>,

    /// Retransmission timeout of the STUN server requests. Default: 200 milliseconds.
    pub ice_stun_rto: Option<Duration>,

    /// First retransmission timeout of a DTLS flight. Default: 1 second.
    pub dtls_retransmit_interval: Option<Duration>,

    /// Upper bound of the whole DTLS handshake. Default: 30 seconds.
    pub dtls_handshake_timeout: Option<Duration>,
}

/// ICE candidate and check-list configuration.
#[derive(Default, Clone)]
pub struct Candidates {
    /// Static ICE username fragment (ufrag) for reproducible sessions.
    pub username_fragment: String,

    /// Static ICE password for reproducible sessions.
    pub password: String,

    /// Allow gathering loopback candidates (useful for tests on one host).
    /// Note: This is non-standard per RFC 8445.
    pub include_loopback_candidate: bool,

    /// Maximum number of attempts on one pair before it fails. Default: 7.
    pub max_binding_requests: Option<u16>,

    /// Upper bound of checks in progress. Default: 8.
    pub max_concurrent_checks: Option<usize>,

    /// Stop checking pairs ranked below the selected pair.
    pub disable_background_checks: bool,
}

/// Replay attack protection window sizes.
///
/// Set to 0 to keep the default window.
#[derive(Default, Copy, Clone)]
pub struct ReplayProtection {
    /// DTLS replay protection window size (in records).
    pub dtls: usize,
}

/// Maximum message size for SCTP data channels.
///
/// Controls the maximum size of messages that can be sent through data channels.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SctpMaxMessageSize {
    /// Fixed maximum message size in bytes.
    Bounded(u32),

    /// No practical limit (uses MAX_MESSAGE_SIZE internally).
    Unbounded,
}

impl SctpMaxMessageSize {
    /// Maximum message size (256KB).
    pub const MAX_MESSAGE_SIZE: u32 = sctp::config::DEFAULT_MAX_MESSAGE_SIZE;

    /// Returns the message size as `u32`.
    pub fn as_u32(&self) -> u32 {
        match self {
            Self::Bounded(result) => *result,
            Self::Unbounded => Self::MAX_MESSAGE_SIZE,
        }
    }
}

impl Default for SctpMaxMessageSize {
    fn default() -> Self {
        Self::Bounded(Self::MAX_MESSAGE_SIZE)
    }
}

/// SCTP buffering limits. Zero keeps the association defaults.
#[derive(Default, Copy, Clone)]
pub struct SctpBuffers {
    /// Bytes one stream may have queued or in flight. Default: 1 MiB.
    pub max_stream_buffered_amount: usize,

    /// Bytes all streams together may have queued or in flight. Default: 4 MiB.
    pub max_association_buffered_amount: usize,

    /// Receive window advertised to the peer. Default: 1 MiB.
    pub max_receive_buffer_size: u32,
}

/// Advanced configuration engine for fine-tuning the transports.
///
/// ```
/// use rtc::peer_connection::configuration::setting_engine::SettingEngine;
///
/// let mut setting_engine = SettingEngine::default();
/// setting_engine.set_include_loopback_candidate(true);
/// setting_engine
///     .set_ice_credentials("someufrag".to_owned(), "somepasswordsomepassword".to_owned())
///     .unwrap();
/// ```
#[derive(Default, Clone)]
pub struct SettingEngine {
    pub(crate) timeout: Timeout,
    pub(crate) candidates: Candidates,
    pub(crate) replay_protection: ReplayProtection,
    pub(crate) dtls_maximum_retransmit_number: Option<usize>,
    /// Determines the max size of any message that may be sent through an SCTP transport.
    pub(crate) sctp_max_message_size: SctpMaxMessageSize,
    pub(crate) sctp_buffers: SctpBuffers,
}

impl SettingEngine {
    /// Sets the behavior of the ICE connection health timers.
    ///
    /// * `disconnected_timeout` - silence on the selected pair before `disconnected`
    /// * `failed_timeout` - silence before `failed`
    /// * `keep_alive_interval` - how often a Binding request keeps the pair alive
    pub fn set_ice_timeouts(
        &mut self,
        disconnected_timeout: Option<Duration>,
        failed_timeout: Option<Duration>,
        keep_alive_interval: Option<Duration>,
    ) {
        self.timeout.ice_disconnected_timeout = disconnected_timeout;
        self.timeout.ice_failed_timeout = failed_timeout;
        self.timeout.ice_keepalive_interval = keep_alive_interval;
    }

    /// Sets the pacing and first retransmission timeout of connectivity checks.
    pub fn set_ice_check_timers(
        &mut self,
        check_interval: Option<Duration>,
        initial_rto: Option<Duration>,
    ) {
        self.timeout.ice_check_interval = check_interval;
        self.timeout.ice_initial_rto = initial_rto;
    }

    /// Sets the retransmission timeout of STUN server requests while gathering.
    pub fn set_ice_stun_rto(&mut self, rto: Option<Duration>) {
        self.timeout.ice_stun_rto = rto;
    }

    /// Bounds the check list: attempts per pair and checks in flight.
    pub fn set_ice_check_limits(
        &mut self,
        max_binding_requests: Option<u16>,
        max_concurrent_checks: Option<usize>,
    ) {
        self.candidates.max_binding_requests = max_binding_requests;
        self.candidates.max_concurrent_checks = max_concurrent_checks;
    }

    /// Stops checking lower ranked pairs once a pair was selected.
    pub fn set_disable_background_checks(&mut self, disable: bool) {
        self.candidates.disable_background_checks = disable;
    }

    /// Sets static ICE credentials instead of random ones.
    ///
    /// The ufrag needs at least 3 and the password at least 16 characters.
    pub fn set_ice_credentials(&mut self, username_fragment: String, password: String) -> Result<()> {
        if username_fragment.len() * 8 < 24 {
            return Err(Error::ErrLocalUfragInsufficientBits);
        }
        if password.len() * 8 < 128 {
            return Err(Error::ErrLocalPwdInsufficientBits);
        }
        self.candidates.username_fragment = username_fragment;
        self.candidates.password = password;
        Ok(())
    }

    /// Gathers host candidates on loopback interfaces too.
    ///
    /// This is non-standard behavior per [RFC 8445 §5.1.1.1](https://www.rfc-editor.org/rfc/rfc8445#section-5.1.1.1).
    pub fn set_include_loopback_candidate(&mut self, allow_loopback: bool) {
        self.candidates.include_loopback_candidate = allow_loopback;
    }

    /// Sets the first retransmission timeout of a DTLS flight; it doubles on every retry.
    pub fn set_dtls_retransmit_interval(&mut self, interval: Option<Duration>) {
        self.timeout.dtls_retransmit_interval = interval;
    }

    /// Sets how often one flight is retransmitted before the handshake fails.
    pub fn set_dtls_maximum_retransmit_number(&mut self, n: Option<usize>) {
        self.dtls_maximum_retransmit_number = n;
    }

    /// Sets the upper bound of the whole DTLS handshake.
    pub fn set_dtls_handshake_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout.dtls_handshake_timeout = timeout;
    }

    /// Sets the DTLS replay protection window size.
    ///
    /// See [RFC 6347 §4.1.2.6 - Anti-Replay](https://datatracker.ietf.org/doc/html/rfc6347#section-4.1.2.6)
    pub fn set_dtls_replay_protection_window(&mut self, n: usize) {
        self.replay_protection.dtls = n;
    }

    /// Sets the largest message announced in `a=max-message-size` and
    /// accepted by `send`.
    pub fn set_sctp_max_message_size(&mut self, max_message_size: SctpMaxMessageSize) {
        self.sctp_max_message_size = max_message_size;
    }

    /// Sets the per-stream and per-association buffer limits. A send beyond
    /// them either waits or fails with `ErrBufferFull`, depending on the
    /// channel's reliability.
    pub fn set_sctp_buffers(
        &mut self,
        max_stream_buffered_amount: usize,
        max_association_buffered_amount: usize,
    ) {
        self.sctp_buffers.max_stream_buffered_amount = max_stream_buffered_amount;
        self.sctp_buffers.max_association_buffered_amount = max_association_buffered_amount;
    }

    /// Sets the receive window. Messages received but not yet read by the
    /// application count against it.
    pub fn set_sctp_receive_buffer_size(&mut self, max_receive_buffer_size: u32) {
        self.sctp_buffers.max_receive_buffer_size = max_receive_buffer_size;
    }

    pub(crate) fn dtls_replay_protection_window(&self) -> Option<usize> {
        if self.replay_protection.dtls != 0 {
            Some(self.replay_protection.dtls)
        } else {
            None
        }
    }

    pub(crate) fn association_config(&self) -> sctp::AssociationConfig {
        let mut config = sctp::AssociationConfig::default()
            .with_max_message_size(self.sctp_max_message_size.as_u32());
        if self.sctp_buffers.max_stream_buffered_amount != 0 {
            config =
                config.with_max_stream_buffered_amount(self.sctp_buffers.max_stream_buffered_amount);
        }
        if self.sctp_buffers.max_association_buffered_amount != 0 {
            config = config.with_max_association_buffered_amount(
                self.sctp_buffers.max_association_buffered_amount,
            );
        }
        if self.sctp_buffers.max_receive_buffer_size != 0 {
            config =
                config.with_max_receive_buffer_size(self.sctp_buffers.max_receive_buffer_size);
        }
        config
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_set_ice_credentials_too_short() {
        let mut s = SettingEngine::default();
        assert_eq!(
            s.set_ice_credentials("ab".to_owned(), "somepasswordsomepassword".to_owned()),
            Err(Error::ErrLocalUfragInsufficientBits)
        );
        assert_eq!(
            s.set_ice_credentials("abc".to_owned(), "short".to_owned()),
            Err(Error::ErrLocalPwdInsufficientBits)
        );
        assert!(
            s.set_ice_credentials("abc".to_owned(), "0123456789abcdef".to_owned())
                .is_ok()
        );
        assert_eq!(s.candidates.username_fragment, "abc");
    }

    #[test]
    fn test_sctp_max_message_size() {
        assert_eq!(
            SctpMaxMessageSize::default().as_u32(),
            SctpMaxMessageSize::MAX_MESSAGE_SIZE
        );
        assert_eq!(SctpMaxMessageSize::Bounded(1024).as_u32(), 1024);

        let mut s = SettingEngine::default();
        s.set_sctp_max_message_size(SctpMaxMessageSize::Bounded(16384));
        assert_eq!(s.association_config().max_message_size(), 16384);
    }

    #[test]
    fn test_sctp_buffers() {
        let mut s = SettingEngine::default();
        let defaults = s.association_config();

        s.set_sctp_receive_buffer_size(16384);
        s.set_sctp_buffers(4096, 8192);
        let config = s.association_config();
        assert_eq!(config.max_receive_buffer_size(), 16384);
        assert_eq!(config.max_stream_buffered_amount(), 4096);
        assert_eq!(config.max_association_buffered_amount(), 8192);
        assert_eq!(config.max_message_size(), defaults.max_message_size());
    }

    #[test]
    fn test_dtls_replay_protection_window() {
        let mut s = SettingEngine::default();
        assert_eq!(s.dtls_replay_protection_window(), None);
        s.set_dtls_replay_protection_window(128);
        assert_eq!(s.dtls_replay_protection_window(), Some(128));
    }
}
