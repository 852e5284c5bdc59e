use ice::state::ConnectionState;

/// Connectivity of the ICE transport, as reported by the agent.
///
/// `Completed` is only reached on the controlling side, once the remote peer
/// signaled end-of-candidates and no check is left pending.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RTCIceConnectionState {
    #[default]
    Unspecified,

    /// Waiting for remote candidates.
    New,

    /// At least one pair is being checked, none succeeded yet.
    Checking,

    /// A usable pair was selected.
    Connected,

    /// Checking finished and a pair is selected.
    Completed,

    /// The selected pair stopped receiving traffic.
    Disconnected,

    /// Every pair failed, or the selected pair was silent for too long.
    Failed,

    /// The agent was closed.
    Closed,
}

string_values!(RTCIceConnectionState {
    New => "new",
    Checking => "checking",
    Connected => "connected",
    Completed => "completed",
    Disconnected => "disconnected",
    Failed => "failed",
    Closed => "closed",
});

impl From<ConnectionState> for RTCIceConnectionState {
    fn from(state: ConnectionState) -> Self {
        match state {
            ConnectionState::Unspecified => Self::Unspecified,
            ConnectionState::New => Self::New,
            ConnectionState::Checking => Self::Checking,
            ConnectionState::Connected => Self::Connected,
            ConnectionState::Completed => Self::Completed,
            ConnectionState::Disconnected => Self::Disconnected,
            ConnectionState::Failed => Self::Failed,
            ConnectionState::Closed => Self::Closed,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_ice_connection_state_strings() {
        assert_string_values!(
            RTCIceConnectionState,
            [
                (New, "new"),
                (Checking, "checking"),
                (Connected, "connected"),
                (Completed, "completed"),
                (Disconnected, "disconnected"),
                (Failed, "failed"),
                (Closed, "closed"),
            ]
        );
    }

    #[test]
    fn test_ice_connection_state_from_agent() {
        assert_eq!(
            RTCIceConnectionState::from(ConnectionState::Checking),
            RTCIceConnectionState::Checking
        );
        assert_eq!(
            RTCIceConnectionState::from(ConnectionState::Unspecified),
            RTCIceConnectionState::Unspecified
        );
    }
}
