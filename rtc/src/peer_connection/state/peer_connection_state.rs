/// Overall state of the peer connection, derived from the ICE connection
/// state and the DTLS transport state.
///
/// ```text
/// New → Connecting → Connected
/// Connected → Disconnected → Connected   (path migration)
/// Connected → Disconnected → Failed
/// any → Closed
/// ```
///
/// ```
/// use rtc::peer_connection::state::RTCPeerConnectionState;
///
/// assert_eq!(RTCPeerConnectionState::Connected.to_string(), "connected");
/// let parsed: RTCPeerConnectionState = "connecting".into();
/// assert_eq!(parsed, RTCPeerConnectionState::Connecting);
/// ```
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RTCPeerConnectionState {
    #[default]
    Unspecified,

    /// Neither ICE nor DTLS started.
    New,

    /// ICE is checking or DTLS is handshaking.
    Connecting,

    /// ICE is connected or completed and the DTLS handshake succeeded.
    Connected,

    /// ICE lost connectivity on the selected pair.
    Disconnected,

    /// ICE or DTLS failed. This is terminal.
    Failed,

    /// `close()` was called.
    Closed,
}

string_values!(RTCPeerConnectionState {
    New => "new",
    Connecting => "connecting",
    Connected => "connected",
    Disconnected => "disconnected",
    Failed => "failed",
    Closed => "closed",
});

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_peer_connection_state_strings() {
        assert_string_values!(
            RTCPeerConnectionState,
            [
                (New, "new"),
                (Connecting, "connecting"),
                (Connected, "connected"),
                (Disconnected, "disconnected"),
                (Failed, "failed"),
                (Closed, "closed"),
            ]
        );
    }
}
