use crate::peer_connection::state::ice_connection_state::RTCIceConnectionState;
use crate::peer_connection::state::ice_gathering_state::RTCIceGatheringState;
use crate::peer_connection::transport::ice::candidate::RTCIceCandidate;
use ice::agent::Agent;
use ice::agent::agent_config::AgentConfig;
use ice::candidate::Candidate;
use ice::gatherer::{CandidateGatherer, GathererConfig};
use shared::error::Result;
use std::time::Instant;

pub(crate) mod candidate;
pub(crate) mod candidate_type;
pub(crate) mod server;

/// ICETransport owns the connectivity check agent and the candidate gatherer
/// feeding it.
pub(crate) struct RTCIceTransport {
    pub(crate) agent: Agent,
    pub(crate) gatherer: CandidateGatherer,

    pub(crate) ice_gathering_state: RTCIceGatheringState,
    pub(crate) ice_connection_state: RTCIceConnectionState,
}

impl RTCIceTransport {
    /// creates a new RTCIceTransport
    pub(crate) fn new(agent_config: AgentConfig, gatherer_config: GathererConfig) -> Result<Self> {
        let agent = Agent::new(agent_config)?;

        Ok(RTCIceTransport {
            agent,
            gatherer: CandidateGatherer::new(gatherer_config),

            ice_gathering_state: RTCIceGatheringState::New,
            ice_connection_state: RTCIceConnectionState::New,
        })
    }

    /// Starts the gatherer once; later calls are no-ops.
    pub(crate) fn gather(&mut self, now: Instant) -> Result<bool> {
        if self.ice_gathering_state != RTCIceGatheringState::New {
            return Ok(false);
        }
        self.gatherer.gather(now)?;
        self.ice_gathering_state = RTCIceGatheringState::Gathering;
        Ok(true)
    }

    /// get_local_candidates returns the sequence of valid local candidates gathered so far.
    pub(crate) fn get_local_candidates(&self) -> Vec<RTCIceCandidate> {
        rtc_ice_candidates_from_ice_candidates(self.agent.get_local_candidates())
    }

    pub(crate) fn get_remote_candidates(&self) -> Vec<RTCIceCandidate> {
        rtc_ice_candidates_from_ice_candidates(self.agent.get_remote_candidates())
    }

    /// Returns the nominated pair as (local, remote).
    pub(crate) fn get_selected_candidate_pair(&self) -> Option<(RTCIceCandidate, RTCIceCandidate)> {
        self.agent
            .get_selected_candidate_pair()
            .map(|(local, remote)| (local.into(), remote.into()))
    }

    /// Returns the local user credentials.
    pub(crate) fn get_local_user_credentials(&self) -> (String, String) {
        self.agent.get_local_user_credentials()
    }

    /// Returns the remote user credentials, empty before a remote description.
    pub(crate) fn get_remote_user_credentials(&self) -> (String, String) {
        self.agent.get_remote_user_credentials()
    }

    pub(crate) fn have_remote_credentials_change(&self, new_ufrag: &str, new_pwd: &str) -> bool {
        let (ufrag, pwd) = self.get_remote_user_credentials();
        ufrag != new_ufrag || pwd != new_pwd
    }

    pub(crate) fn add_remote_candidate(&mut self, c: Candidate) -> Result<()> {
        self.agent.add_remote_candidate(c)
    }

    pub(crate) fn set_remote_end_of_candidates(&mut self) {
        self.agent.set_remote_end_of_candidates();
    }

    /// Generates fresh local credentials and forgets every remote candidate and
    /// pair. Local candidates are kept since the sockets do not change.
    pub(crate) fn restart(&mut self) -> Result<()> {
        self.agent.restart(String::new(), String::new(), true)
    }

    pub(crate) fn start(
        &mut self,
        is_controlling: bool,
        remote_ufrag: String,
        remote_pwd: String,
    ) -> Result<()> {
        self.agent
            .start_connectivity_checks(is_controlling, remote_ufrag, remote_pwd)
    }
}

/// Conversion for ice_candidates
pub(crate) fn rtc_ice_candidates_from_ice_candidates(
    ice_candidates: &[Candidate],
) -> Vec<RTCIceCandidate> {
    ice_candidates.iter().map(|c| c.into()).collect()
}
