/// DataChannelState indicates the state of a data channel.
///
/// ```text
/// Connecting → Open → Closing → Closed
///      └───────────────────────────↑
/// ```
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RTCDataChannelState {
    #[default]
    Unspecified,

    /// DATA_CHANNEL_OPEN was sent and the ACK is outstanding, or the
    /// association is not up yet.
    Connecting,

    /// Messages flow. Channels announced by the remote start here.
    Open,

    /// The stream reset was sent and the peer has not answered it.
    Closing,

    /// The stream is reset, or the channel never opened.
    Closed,
}

string_values!(RTCDataChannelState {
    Connecting => "connecting",
    Open => "open",
    Closing => "closing",
    Closed => "closed",
});

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_data_channel_state_strings() {
        assert_string_values!(
            RTCDataChannelState,
            [
                (Connecting, "connecting"),
                (Open, "open"),
                (Closing, "closing"),
                (Closed, "closed"),
            ]
        );
    }
}
