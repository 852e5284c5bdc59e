use std::time::Duration;

/// Ta, the pacing of new connectivity checks.
pub(crate) const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(50);
pub(crate) const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(2);
pub(crate) const DEFAULT_DISCONNECTED_TIMEOUT: Duration = Duration::from_secs(5);
pub(crate) const DEFAULT_FAILED_TIMEOUT: Duration = Duration::from_secs(25);
/// Binding requests sent on a pair before it is failed.
pub(crate) const DEFAULT_MAX_BINDING_REQUESTS: u16 = 7;
pub(crate) const DEFAULT_MAX_CONCURRENT_CHECKS: usize = 8;
/// First retransmission timeout of a check, doubled on every retry.
pub(crate) const DEFAULT_INITIAL_RTO: Duration = Duration::from_millis(250);
/// Age after which an unanswered binding request is forgotten.
pub(crate) const MAX_BINDING_REQUEST_TIMEOUT: Duration = Duration::from_millis(4000);

/// Settings of an [Agent](crate::agent::Agent). Every None picks the default
/// constant of the same name.
#[derive(Default, Clone)]
pub struct AgentConfig {
    /// Generated when empty. Needs at least 24 bits of randomness.
    pub local_ufrag: String,
    /// Generated when empty. Needs at least 128 bits of randomness.
    pub local_pwd: String,

    /// Silence on the selected pair before Disconnected. Zero never
    /// disconnects.
    pub disconnected_timeout: Option<Duration>,
    /// Time without a working pair before Failed. Zero never fails.
    pub failed_timeout: Option<Duration>,
    /// Zero sends no keepalives.
    pub keepalive_interval: Option<Duration>,
    pub check_interval: Option<Duration>,
    /// Requests on one pair, retransmissions included, before it is failed.
    pub max_binding_requests: Option<u16>,
    pub max_concurrent_checks: Option<usize>,
    pub initial_rto: Option<Duration>,

    pub is_controlling: bool,

    /// Leaves pairs ranked below the selected pair unchecked.
    pub disable_background_checks: bool,
}
