use super::*;

#[test]
fn test_connection_state_string() {
    let names: Vec<String> = [
        ConnectionState::Unspecified,
        ConnectionState::New,
        ConnectionState::Checking,
        ConnectionState::Connected,
        ConnectionState::Completed,
        ConnectionState::Failed,
        ConnectionState::Disconnected,
        ConnectionState::Closed,
    ]
    .iter()
    .map(ToString::to_string)
    .collect();
    assert_eq!(
        names,
        [
            "unspecified",
            "new",
            "checking",
            "connected",
            "completed",
            "failed",
            "disconnected",
            "closed"
        ]
    );
}

#[test]
fn test_connection_state_is_connected() {
    assert!(ConnectionState::Connected.is_connected());
    assert!(ConnectionState::Completed.is_connected());
    assert!(!ConnectionState::Checking.is_connected());
    assert!(!ConnectionState::Disconnected.is_connected());
}

#[test]
fn test_gathering_state_string() {
    assert_eq!(GatheringState::Unspecified.to_string(), "unspecified");
    assert_eq!(GatheringState::New.to_string(), "new");
    assert_eq!(GatheringState::Gathering.to_string(), "gathering");
    assert_eq!(GatheringState::Complete.to_string(), "complete");
}
