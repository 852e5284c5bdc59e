/// Indicates the state of the DTLS transport.
///
/// ```text
/// New → Connecting → Connected → Closed
///           └──────→ Failed
/// ```
///
/// A handshake failure, including a fingerprint mismatch, is terminal.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RTCDtlsTransportState {
    #[default]
    Unspecified,

    /// The handshake has not started.
    New,

    /// Flights are being exchanged. The remote fingerprint is not verified yet.
    Connecting,

    /// The remote certificate matched the signaled fingerprint and records
    /// are protected.
    Connected,

    /// Either side sent close_notify.
    Closed,

    /// A fatal alert, a fingerprint mismatch or a handshake timeout.
    Failed,
}

string_values!(RTCDtlsTransportState {
    New => "new",
    Connecting => "connecting",
    Connected => "connected",
    Closed => "closed",
    Failed => "failed",
});

impl RTCDtlsTransportState {
    /// Closed and Failed are never left.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}
