use ice::state::GatheringState;

/// Progress of local candidate gathering.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RTCIceGatheringState {
    #[default]
    Unspecified,

    /// No local description was applied yet.
    New,

    /// Host candidates are out, STUN servers are being queried.
    Gathering,

    /// Every candidate was emitted. The last `OnIceCandidateEvent` carried `None`.
    Complete,
}

string_values!(RTCIceGatheringState {
    New => "new",
    Gathering => "gathering",
    Complete => "complete",
});

impl From<GatheringState> for RTCIceGatheringState {
    fn from(state: GatheringState) -> Self {
        match state {
            GatheringState::Unspecified => Self::Unspecified,
            GatheringState::New => Self::New,
            GatheringState::Gathering => Self::Gathering,
            GatheringState::Complete => Self::Complete,
        }
    }
}
