#[cfg(test)]
mod state_test;

use std::fmt;

/// Overall connectivity of an agent, see RFC 8445 section 6.1.2.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Unspecified,
    /// No remote credentials yet.
    New,
    Checking,
    /// A pair was selected, lower ranked pairs may still be checked.
    Connected,
    /// Nothing left to check.
    Completed,
    /// Every pair failed, or nothing was selected within the failed timeout.
    Failed,
    /// The selected pair went quiet. May recover to Connected.
    Disconnected,
    Closed,
}

impl ConnectionState {
    fn as_str(self) -> &'static str {
        match self {
            Self::Unspecified => "unspecified",
            Self::New => "new",
            Self::Checking => "checking",
            Self::Connected => "connected",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Disconnected => "disconnected",
            Self::Closed => "closed",
        }
    }

    /// Whether a selected pair currently carries traffic.
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected | Self::Completed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress of local candidate gathering.
#[derive(Default, PartialEq, Eq, Copy, Clone, Debug)]
pub enum GatheringState {
    #[default]
    Unspecified,
    New,
    Gathering,
    /// Every STUN server answered or gave up.
    Complete,
}

impl fmt::Display for GatheringState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unspecified => "unspecified",
            Self::New => "new",
            Self::Gathering => "gathering",
            Self::Complete => "complete",
        })
    }
}
