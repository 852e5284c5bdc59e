use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};

use stun::message::TransactionId;

/// Progress of the connectivity check of one pair (RFC 8445 section 6.1.2.6).
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CandidatePairState {
    #[default]
    Unspecified,
    /// Held back until a pair with the same foundation finished.
    Frozen,
    Waiting,
    /// A binding request is outstanding.
    InProgress,
    /// No response before the retransmissions ran out, or an error response.
    Failed,
    Succeeded,
}

impl fmt::Display for CandidatePairState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unspecified => "unspecified",
            Self::Frozen => "frozen",
            Self::Waiting => "waiting",
            Self::InProgress => "in-progress",
            Self::Failed => "failed",
            Self::Succeeded => "succeeded",
        })
    }
}

/// A local and a remote candidate, by their index in the agent's lists.
#[derive(Clone)]
pub struct CandidatePair {
    pub local_index: usize,
    pub remote_index: usize,
    pub local_priority: u32,
    pub remote_priority: u32,
    pub(crate) foundation: String,
    pub(crate) ice_role_controlling: bool,
    pub(crate) binding_request_count: u16,
    pub(crate) state: CandidatePairState,
    pub(crate) nominated: bool,
    /// Retransmission timer of the check in progress.
    pub(crate) rto: Duration,
    pub(crate) next_retransmit: Option<Instant>,
    pub(crate) transaction_id: Option<TransactionId>,
}

impl fmt::Display for CandidatePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} <-> {} (prio {}, local {}, remote {})",
            self.local_index,
            self.remote_index,
            self.priority(),
            self.local_priority,
            self.remote_priority,
        )
    }
}

impl fmt::Debug for CandidatePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self} {}", self.state)?;
        if self.nominated {
            f.write_str(" nominated")?;
        }
        Ok(())
    }
}

impl PartialEq for CandidatePair {
    fn eq(&self, other: &Self) -> bool {
        self.local_index == other.local_index && self.remote_index == other.remote_index
    }
}

impl CandidatePair {
    #[must_use]
    pub fn new(
        local_index: usize,
        remote_index: usize,
        local_priority: u32,
        remote_priority: u32,
        ice_role_controlling: bool,
    ) -> Self {
        Self {
            local_index,
            remote_index,
            local_priority,
            remote_priority,
            foundation: String::new(),
            ice_role_controlling,
            state: CandidatePairState::Waiting,
            binding_request_count: 0,
            nominated: false,
            rto: Duration::ZERO,
            next_retransmit: None,
            transaction_id: None,
        }
    }

    pub fn state(&self) -> CandidatePairState {
        self.state
    }

    pub fn nominated(&self) -> bool {
        self.nominated
    }

    /// `2^32*MIN(G,D) + 2*MAX(G,D) + (G>D?1:0)` with G the controlling and D
    /// the controlled side's candidate priority (RFC 8445 section 6.1.2.3).
    pub fn priority(&self) -> u64 {
        let (g, d) = if self.ice_role_controlling {
            (self.local_priority, self.remote_priority)
        } else {
            (self.remote_priority, self.local_priority)
        };
        let (g, d) = (u64::from(g), u64::from(d));
        // both priorities close to u32::MAX would overflow
        (g.min(d) << 32).saturating_add(2 * g.max(d) + u64::from(g > d))
    }

    pub(crate) fn is_finished(&self) -> bool {
        matches!(
            self.state,
            CandidatePairState::Succeeded | CandidatePairState::Failed
        )
    }
}
