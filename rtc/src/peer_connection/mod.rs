//! The peer connection: offer/answer negotiation plus the transport stack
//! carrying data channels.
//!
//! [`RTCPeerConnection`] is sans-I/O. The application feeds it datagrams and
//! timeouts through [`sansio::Protocol`] and sends whatever comes out of
//! `poll_write`; [`crate::runtime`] does exactly that on tokio.
//!
//! ```no_run
//! use rtc::peer_connection::RTCPeerConnection;
//! use rtc::peer_connection::configuration::RTCConfigurationBuilder;
//! use sansio::Protocol;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RTCConfigurationBuilder::new()
//!     .with_local_addrs(vec!["192.168.1.10:50000".parse()?])
//!     .build();
//! let mut pc = RTCPeerConnection::new(config)?;
//! let _id = pc.create_data_channel("chat", None)?;
//! let offer = pc.create_offer()?;
//! pc.set_local_description(offer.clone())?;
//! // send `offer` to the remote peer, then drive the connection:
//! while let Some(datagram) = pc.poll_write() {
//!     let _ = datagram;
//! }
//! # Ok(())
//! # }
//! ```

pub mod certificate;
pub mod configuration;
pub mod event;
pub(crate) mod handler;
mod internal;
pub mod message;
pub mod sdp;
pub mod state;
pub mod transport;

use crate::data_channel::init::RTCDataChannelInit;
use crate::data_channel::parameters::DataChannelParameters;
use crate::data_channel::{RTCDataChannel, RTCDataChannelId, internal::RTCDataChannelInternal};
use crate::peer_connection::configuration::RTCConfiguration;
use crate::peer_connection::event::RTCPeerConnectionEvent;
use crate::peer_connection::handler::PipelineContext;
use crate::peer_connection::handler::dtls::DtlsHandlerContext;
use crate::peer_connection::handler::ice::IceHandlerContext;
use crate::peer_connection::handler::sctp::SctpHandlerContext;
use crate::peer_connection::sdp::{
    MediaSection, PopulateSdpParams, RTCSdpType, RTCSessionDescription, application_media_index,
    candidate_attribute_value, extract_fingerprint, extract_ice_details, extract_max_message_size,
    populate_sdp,
};
use crate::peer_connection::state::ice_connection_state::RTCIceConnectionState;
use crate::peer_connection::state::ice_gathering_state::RTCIceGatheringState;
use crate::peer_connection::state::peer_connection_state::RTCPeerConnectionState;
use crate::peer_connection::state::signaling_state::{RTCSignalingState, StateChangeOp};
use crate::peer_connection::transport::dtls::RTCDtlsTransport;
use crate::peer_connection::transport::dtls::role::{
    DEFAULT_DTLS_ROLE_ANSWER, DEFAULT_DTLS_ROLE_OFFER, RTCDtlsRole,
};
use crate::peer_connection::transport::ice::RTCIceTransport;
use crate::peer_connection::transport::ice::candidate::{RTCIceCandidate, RTCIceCandidateInit};
use crate::peer_connection::transport::sctp::RTCSctpTransport;
use ::ice::agent::agent_config::AgentConfig;
use ::ice::candidate::unmarshal_candidate;
use ::ice::gatherer::GathererConfig;
use ::sdp::SessionDescription;
use log::{debug, warn};
use rand::Rng;
use shared::error::{Error, ErrorKind, Result};
use std::collections::HashMap;
use std::time::Instant;

/// Remote `a=max-message-size` assumed when the attribute is absent.
pub(crate) const DEFAULT_REMOTE_MAX_MESSAGE_SIZE: u32 = 65536;

const DEFAULT_APPLICATION_MID: &str = "0";

/// PeerConnection represents a WebRTC connection that establishes a
/// peer-to-peer communications with another PeerConnection instance in a
/// browser, or to another endpoint implementing the required protocols.
pub struct RTCPeerConnection {
    //////////////////////////////////////////////////
    // PeerConnection WebRTC Spec Interface Definition
    //////////////////////////////////////////////////
    configuration: RTCConfiguration,

    current_local_description: Option<RTCSessionDescription>,
    pending_local_description: Option<RTCSessionDescription>,
    current_remote_description: Option<RTCSessionDescription>,
    pending_remote_description: Option<RTCSessionDescription>,

    pub(crate) signaling_state: RTCSignalingState,
    peer_connection_state: RTCPeerConnectionState,
    pub(crate) is_closed: bool,

    //////////////////////////////////////////////////
    // PeerConnection Internal State Machine
    //////////////////////////////////////////////////
    pub(crate) pipeline_context: PipelineContext,
    pub(crate) data_channels: HashMap<RTCDataChannelId, RTCDataChannelInternal>,
    pub(crate) next_data_channel_id: RTCDataChannelId,

    session_id: u64,
    session_version: u64,
    last_offer: String,
    last_answer: String,

    /// ufrag of the remote generation candidates are accepted for.
    remote_ufrag: String,
    ice_restart_pending: bool,
    transports_started: bool,
    /// First failure reported by the secure transport or the association.
    transport_error: Option<Error>,
    /// Bytes taken with `poll_read` the application has not consumed yet.
    read_backlog: usize,
    last_now: Instant,
}

impl RTCPeerConnection {
    /// creates a PeerConnection with RTCConfiguration
    pub fn new(configuration: RTCConfiguration) -> Result<Self> {
        let setting_engine = &configuration.setting_engine;

        let agent_config = AgentConfig {
            local_ufrag: setting_engine.candidates.username_fragment.clone(),
            local_pwd: setting_engine.candidates.password.clone(),
            disconnected_timeout: setting_engine.timeout.ice_disconnected_timeout,
            failed_timeout: setting_engine.timeout.ice_failed_timeout,
            keepalive_interval: setting_engine.timeout.ice_keepalive_interval,
            check_interval: setting_engine.timeout.ice_check_interval,
            initial_rto: setting_engine.timeout.ice_initial_rto,
            max_binding_requests: setting_engine.candidates.max_binding_requests,
            max_concurrent_checks: setting_engine.candidates.max_concurrent_checks,
            disable_background_checks: setting_engine.candidates.disable_background_checks,
            ..Default::default()
        };

        let mut stun_servers = vec![];
        for ice_server in &configuration.ice_servers {
            stun_servers.extend(ice_server.stun_addrs()?);
        }
        let local_addrs = configuration
            .local_addrs
            .iter()
            .filter(|addr| {
                setting_engine.candidates.include_loopback_candidate || !addr.ip().is_loopback()
            })
            .copied()
            .collect();
        let gatherer_config = GathererConfig {
            local_addrs,
            stun_servers,
            stun_rto: setting_engine.timeout.ice_stun_rto,
        };

        // Create the ICE transport
        let ice_transport = RTCIceTransport::new(agent_config, gatherer_config)?;

        // Create the DTLS transport
        let dtls_transport =
            RTCDtlsTransport::new(configuration.certificates.clone(), setting_engine)?;

        // Create the SCTP transport
        let sctp_transport = RTCSctpTransport::new(setting_engine);

        let pipeline_context = PipelineContext::new(
            IceHandlerContext::new(ice_transport),
            DtlsHandlerContext::new(dtls_transport),
            SctpHandlerContext::new(sctp_transport),
        );

        Ok(Self {
            configuration,

            current_local_description: None,
            pending_local_description: None,
            current_remote_description: None,
            pending_remote_description: None,

            signaling_state: RTCSignalingState::Stable,
            peer_connection_state: RTCPeerConnectionState::New,
            is_closed: false,

            pipeline_context,
            data_channels: HashMap::new(),
            next_data_channel_id: 0,

            session_id: rand::rng().random_range(0..i64::MAX as u64),
            session_version: 0,
            last_offer: String::new(),
            last_answer: String::new(),

            remote_ufrag: String::new(),
            ice_restart_pending: false,
            transports_started: false,
            transport_error: None,
            read_backlog: 0,
            last_now: Instant::now(),
        })
    }

    /// create_offer generates an offer for one data-channel section.
    ///
    /// It does not touch the network. The ICE credentials are the ones of the
    /// first offer until [`RTCPeerConnection::restart_ice`] is called.
    /// <https://w3c.github.io/webrtc-pc/#dom-rtcpeerconnection-createoffer>
    pub fn create_offer(&mut self) -> Result<RTCSessionDescription> {
        if self.is_closed {
            return Err(Error::ErrConnectionClosed);
        }

        if self.ice_restart_pending {
            debug!("restarting ICE with fresh credentials");
            self.ice_transport_mut().restart()?;
            self.ice_restart_pending = false;
        }

        let mid = self
            .current_remote_description
            .as_ref()
            .and_then(|d| d.parsed.as_ref())
            .and_then(|parsed| {
                application_media_index(parsed)
                    .and_then(|index| parsed.media_descriptions[index].mid())
                    .map(str::to_owned)
            })
            .unwrap_or_else(|| DEFAULT_APPLICATION_MID.to_owned());

        let max_message_size = self.sctp_transport().local_max_message_size();
        let d = self.generate_sdp(
            vec![MediaSection::Application(mid)],
            DEFAULT_DTLS_ROLE_OFFER,
            max_message_size,
        );
        let offer = RTCSessionDescription::from_parsed(RTCSdpType::Offer, d);

        self.last_offer.clone_from(&offer.sdp);

        Ok(offer)
    }

    /// create_answer answers the pending remote offer with its data-channel
    /// section; every other section is rejected with port 0.
    pub fn create_answer(&mut self) -> Result<RTCSessionDescription> {
        if self.is_closed {
            return Err(Error::ErrConnectionClosed);
        }

        if self.signaling_state != RTCSignalingState::HaveRemoteOffer {
            return Err(Error::ErrIncorrectSignalingState);
        }

        let remote = self
            .remote_description()
            .and_then(|d| d.parsed.clone())
            .ok_or(Error::ErrNoRemoteDescription)?;
        let app_index = application_media_index(&remote).ok_or(Error::ErrNoCommonMedia)?;

        let mut sections = vec![];
        for (index, media) in remote.media_descriptions.iter().enumerate() {
            if index == app_index {
                let mid = media.mid().unwrap_or(DEFAULT_APPLICATION_MID).to_owned();
                sections.push(MediaSection::Application(mid));
            } else {
                sections.push(MediaSection::Rejected(media.clone()));
            }
        }

        let local_max = self.sctp_transport().local_max_message_size();
        let max_message_size = extract_max_message_size(&remote)
            .map(|remote_max| local_max.min(remote_max))
            .unwrap_or(local_max);

        let d = self.generate_sdp(sections, DEFAULT_DTLS_ROLE_ANSWER, max_message_size);
        let answer = RTCSessionDescription::from_parsed(RTCSdpType::Answer, d);

        self.last_answer.clone_from(&answer.sdp);

        Ok(answer)
    }

    /// set_local_description sets the SessionDescription of the local peer
    /// and starts gathering candidates.
    ///
    /// An empty `sdp` stands for the last offer or answer created.
    pub fn set_local_description(&mut self, mut description: RTCSessionDescription) -> Result<()> {
        if self.is_closed {
            return Err(Error::ErrConnectionClosed);
        }

        // JSEP 5.4
        if description.sdp.is_empty() {
            match description.sdp_type {
                RTCSdpType::Answer => description.sdp.clone_from(&self.last_answer),
                RTCSdpType::Offer => description.sdp.clone_from(&self.last_offer),
                sdp_type => return Err(Error::ErrUnsupportedSdpType(sdp_type.to_string())),
            }
        }

        description.parsed = Some(description.unmarshal()?);
        self.set_description(&description, StateChangeOp::SetLocal)?;

        let now = self.now();
        if self.ice_transport_mut().gather(now)? {
            self.pipeline_context
                .event_outs
                .push_back(RTCPeerConnectionEvent::OnIceGatheringStateChangeEvent(
                    RTCIceGatheringState::Gathering,
                ));
        }

        if self.signaling_state == RTCSignalingState::Stable {
            self.start_transports()?;
        }

        Ok(())
    }

    /// local_description returns PendingLocalDescription if it is not null and
    /// otherwise it returns CurrentLocalDescription. This property is used to
    /// determine if set_local_description has already been called.
    /// <https://www.w3.org/TR/webrtc/#dom-rtcpeerconnection-localdescription>
    pub fn local_description(&self) -> Option<&RTCSessionDescription> {
        if self.pending_local_description.is_some() {
            self.pending_local_description.as_ref()
        } else {
            self.current_local_description.as_ref()
        }
    }

    /// set_remote_description sets the SessionDescription of the remote peer
    ///
    /// A description that does not parse, or lacks ICE credentials or a
    /// certificate fingerprint, is rejected before anything changes.
    pub fn set_remote_description(&mut self, mut description: RTCSessionDescription) -> Result<()> {
        if self.is_closed {
            return Err(Error::ErrConnectionClosed);
        }

        let parsed = description.unmarshal().map_err(|err| match err.kind() {
            ErrorKind::Parse => Error::ErrInvalidSessionDescription(err.to_string()),
            _ => err,
        })?;
        let ice_details = extract_ice_details(&parsed)?;
        extract_fingerprint(&parsed)?;
        let remote_max_message_size = extract_max_message_size(&parsed);

        description.parsed = Some(parsed);
        self.set_description(&description, StateChangeOp::SetRemote)?;

        let (remote_ufrag, _) = self.ice_transport().get_remote_user_credentials();
        if !remote_ufrag.is_empty()
            && self
                .ice_transport()
                .have_remote_credentials_change(&ice_details.ufrag, &ice_details.pwd)
        {
            debug!("remote restarted ICE with ufrag {}", ice_details.ufrag);
            self.ice_transport_mut().restart()?;
        }
        self.remote_ufrag.clone_from(&ice_details.ufrag);

        for candidate in ice_details.candidates {
            if let Err(err) = self.ice_transport_mut().add_remote_candidate(candidate) {
                warn!("failed to add remote candidate: {err}");
            }
        }
        if ice_details.end_of_candidates {
            self.ice_transport_mut().set_remote_end_of_candidates();
        }

        self.sctp_transport_mut().set_remote_max_message_size(
            remote_max_message_size.unwrap_or(DEFAULT_REMOTE_MAX_MESSAGE_SIZE),
        );

        if self.signaling_state == RTCSignalingState::Stable {
            self.start_transports()?;
        }

        Ok(())
    }

    /// remote_description returns pending_remote_description if it is not null and
    /// otherwise it returns current_remote_description. This property is used to
    /// determine if setRemoteDescription has already been called.
    /// <https://www.w3.org/TR/webrtc/#dom-rtcpeerconnection-remotedescription>
    pub fn remote_description(&self) -> Option<&RTCSessionDescription> {
        if self.pending_remote_description.is_some() {
            self.pending_remote_description.as_ref()
        } else {
            self.current_remote_description.as_ref()
        }
    }

    /// add_ice_candidate accepts a trickled remote candidate.
    ///
    /// `None`, or a candidate with an empty `candidate` line, ends the remote
    /// candidates of the current ufrag generation. Candidates naming an older
    /// generation are ignored.
    pub fn add_ice_candidate(&mut self, candidate: Option<RTCIceCandidateInit>) -> Result<()> {
        if self.is_closed {
            return Err(Error::ErrConnectionClosed);
        }
        if self.remote_description().is_none() {
            return Err(Error::ErrNoRemoteDescription);
        }

        if let Some(ufrag) = candidate
            .as_ref()
            .and_then(|c| c.username_fragment.as_deref())
        {
            if !ufrag.is_empty() && ufrag != self.remote_ufrag {
                debug!("ignore candidate of stale ufrag {ufrag}");
                return Ok(());
            }
        }

        let media_index = self.remote_media_index(candidate.as_ref())?;
        match candidate {
            Some(candidate) if !candidate.is_end_of_candidates() => {
                let c = unmarshal_candidate(&candidate.candidate)?;
                self.ice_transport_mut().add_remote_candidate(c)?;
                self.update_remote_description(|parsed| {
                    parsed.with_candidate_at(
                        media_index,
                        candidate_attribute_value(&candidate.candidate),
                    )
                });
            }
            _ => {
                debug!("remote end of candidates");
                self.ice_transport_mut().set_remote_end_of_candidates();
                self.update_remote_description(|parsed| {
                    parsed.with_end_of_candidates_at(media_index)
                });
            }
        }

        Ok(())
    }

    /// restart_ice makes the next offer carry fresh ICE credentials.
    ///
    /// Candidates gathered on the local sockets are kept; every remote
    /// candidate and pair is dropped once that offer is created.
    pub fn restart_ice(&mut self) -> Result<()> {
        if self.is_closed {
            return Err(Error::ErrConnectionClosed);
        }
        self.ice_restart_pending = true;
        Ok(())
    }

    /// get_configuration returns a PeerConnection's RTCConfiguration.
    pub fn get_configuration(&self) -> &RTCConfiguration {
        &self.configuration
    }

    /// create_data_channel creates a new channel and returns its handle.
    ///
    /// Channels created before the association is up are opened as soon as it
    /// is; afterwards they are opened right away.
    pub fn create_data_channel(
        &mut self,
        label: &str,
        options: Option<RTCDataChannelInit>,
    ) -> Result<RTCDataChannelId> {
        // https://w3c.github.io/webrtc-pc/#peer-to-peer-data-api (Step #2)
        if self.is_closed {
            return Err(Error::ErrConnectionClosed);
        }

        let params = DataChannelParameters::new(label, options.unwrap_or_default())?;

        if let Some(stream_id) = params.negotiated {
            if self
                .data_channels
                .values()
                .any(|dc| dc.stream_id == Some(stream_id))
            {
                return Err(Error::ErrDataChannelIdInUse(stream_id));
            }
        }

        let id = self.next_data_channel_id;
        self.next_data_channel_id = id.wrapping_add(1);
        self.data_channels
            .insert(id, RTCDataChannelInternal::new(id, params));
        debug!("data channel {label} created as {id}");

        if self.sctp_transport().is_established() {
            self.get_datachannel_handler().dial_pending_data_channels();
        }

        Ok(id)
    }

    /// Returns the handle of a channel that is not closed yet.
    pub fn data_channel(&mut self, id: RTCDataChannelId) -> Option<RTCDataChannel<'_>> {
        if self.data_channels.contains_key(&id) {
            Some(RTCDataChannel {
                id,
                peer_connection: self,
            })
        } else {
            None
        }
    }

    /// Ids of every channel the connection knows about, in creation order.
    pub fn data_channel_ids(&self) -> Vec<RTCDataChannelId> {
        let mut ids: Vec<RTCDataChannelId> = self.data_channels.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// signaling_state attribute returns the signaling state of the
    /// PeerConnection instance.
    pub fn signaling_state(&self) -> RTCSignalingState {
        self.signaling_state
    }

    /// ice_connection_state attribute returns the ICE connection state of the
    /// PeerConnection instance.
    pub fn ice_connection_state(&self) -> RTCIceConnectionState {
        self.ice_transport().ice_connection_state
    }

    /// ice_gathering_state attribute returns the ICE gathering state of the
    /// PeerConnection instance.
    pub fn ice_gathering_state(&self) -> RTCIceGatheringState {
        self.ice_transport().ice_gathering_state
    }

    /// connection_state attribute returns the connection state of the
    /// PeerConnection instance.
    pub fn connection_state(&self) -> RTCPeerConnectionState {
        self.peer_connection_state
    }

    /// Candidates gathered for the current ICE generation.
    pub fn local_candidates(&self) -> Vec<RTCIceCandidate> {
        self.ice_transport().get_local_candidates()
    }

    /// Candidates learned from the remote peer, peer reflexive ones included.
    pub fn remote_candidates(&self) -> Vec<RTCIceCandidate> {
        self.ice_transport().get_remote_candidates()
    }

    /// The pair carrying traffic, as (local, remote).
    pub fn selected_candidate_pair(&self) -> Option<(RTCIceCandidate, RTCIceCandidate)> {
        self.ice_transport().get_selected_candidate_pair()
    }

    /// The error that moved the secure transport or the association to failed.
    pub fn transport_error(&self) -> Option<&Error> {
        self.transport_error.as_ref()
    }

    /// Reports how many bytes of messages taken with `poll_read` the
    /// application still holds. Together with the messages waiting in
    /// `poll_read` they shrink the receive window advertised to the peer.
    pub fn set_read_backlog(&mut self, bytes: usize) {
        self.read_backlog = bytes;
        self.update_receive_window();
    }

    pub(crate) fn update_receive_window(&mut self) {
        let backlog = self.pipeline_context.read_outs_bytes + self.read_backlog;
        if let Some(association) = self
            .pipeline_context
            .sctp_handler_context
            .sctp_transport
            .association
            .as_mut()
        {
            association.set_application_backlog(backlog);
        }
    }

    /// Largest message a channel may send, 0 before negotiation.
    pub fn max_message_size(&self) -> u32 {
        self.sctp_transport().max_message_size()
    }

    fn generate_sdp(
        &mut self,
        sections: Vec<MediaSection>,
        dtls_role: RTCDtlsRole,
        max_message_size: u32,
    ) -> SessionDescription {
        let (ice_ufrag, ice_pwd) = self.ice_transport().get_local_user_credentials();
        let fingerprints = self.dtls_transport().get_fingerprints();
        let candidates = self.ice_transport().agent.get_local_candidates().to_vec();
        let end_of_candidates =
            self.ice_transport().ice_gathering_state == RTCIceGatheringState::Complete;

        self.session_version += 1;
        let d = SessionDescription::new_jsep_session_description(
            self.session_id,
            self.session_version,
        );
        populate_sdp(
            d,
            sections,
            &PopulateSdpParams {
                ice_ufrag: &ice_ufrag,
                ice_pwd: &ice_pwd,
                fingerprints: &fingerprints,
                dtls_role,
                max_message_size,
                candidates: &candidates,
                end_of_candidates,
            },
        )
    }
}
