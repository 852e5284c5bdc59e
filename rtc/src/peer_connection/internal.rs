use super::*;
use crate::peer_connection::state::signaling_state::check_next_signaling_state;
use crate::peer_connection::transport::dtls::state::RTCDtlsTransportState;
use shared::TransportContext;

impl RTCPeerConnection {
    /// The latest instant the connection has seen, never behind the clock.
    pub(crate) fn now(&self) -> Instant {
        self.last_now.max(Instant::now())
    }

    // 4.4.1.6 Set the SessionDescription
    pub(super) fn set_description(
        &mut self,
        sd: &RTCSessionDescription,
        op: StateChangeOp,
    ) -> Result<()> {
        let cur = self.signaling_state;

        let next_state = match op {
            StateChangeOp::SetLocal => {
                let next = match sd.sdp_type {
                    // stable->SetLocal(offer)->have-local-offer
                    RTCSdpType::Offer => RTCSignalingState::HaveLocalOffer,
                    // have-remote-offer->SetLocal(answer)->stable
                    RTCSdpType::Answer => RTCSignalingState::Stable,
                    sdp_type => return Err(Error::ErrUnsupportedSdpType(sdp_type.to_string())),
                };
                let next_state = check_next_signaling_state(cur, next, op, sd.sdp_type)
                    .map_err(|err| {
                        debug!("set_local_description rejected: {err}");
                        Error::ErrIncorrectSignalingState
                    })?;

                if sd.sdp_type == RTCSdpType::Offer {
                    if sd.sdp != self.last_offer {
                        return Err(Error::ErrSdpDoesNotMatchOffer);
                    }
                    self.pending_local_description = Some(sd.clone());
                } else {
                    if sd.sdp != self.last_answer {
                        return Err(Error::ErrSdpDoesNotMatchAnswer);
                    }
                    self.pending_local_description = None;
                    self.current_local_description = Some(sd.clone());
                    self.current_remote_description = self.pending_remote_description.take();
                }
                next_state
            }
            StateChangeOp::SetRemote => {
                let next = match sd.sdp_type {
                    // stable->SetRemote(offer)->have-remote-offer
                    RTCSdpType::Offer => RTCSignalingState::HaveRemoteOffer,
                    // have-local-offer->SetRemote(answer)->stable
                    RTCSdpType::Answer => RTCSignalingState::Stable,
                    RTCSdpType::Unspecified => {
                        return Err(Error::ErrIncorrectSdpType(sd.sdp_type.to_string()));
                    }
                    sdp_type => return Err(Error::ErrUnsupportedSdpType(sdp_type.to_string())),
                };
                let next_state = check_next_signaling_state(cur, next, op, sd.sdp_type)
                    .map_err(|err| {
                        debug!("set_remote_description rejected: {err}");
                        Error::ErrIncorrectSdpType(sd.sdp_type.to_string())
                    })?;

                if sd.sdp_type == RTCSdpType::Offer {
                    self.pending_remote_description = Some(sd.clone());
                } else {
                    self.pending_remote_description = None;
                    self.current_remote_description = Some(sd.clone());
                    self.current_local_description = self.pending_local_description.take();
                }
                next_state
            }
        };

        if self.signaling_state != next_state {
            self.signaling_state = next_state;
            self.do_signaling_state_change(next_state);
        }
        Ok(())
    }

    pub(super) fn do_signaling_state_change(&mut self, new_state: RTCSignalingState) {
        log::info!("signaling state changed to {new_state}");
        self.pipeline_context
            .event_outs
            .push_back(RTCPeerConnectionEvent::OnSignalingStateChangeEvent(
                new_state,
            ));
    }

    /// Starts ICE, DTLS and SCTP once both descriptions are current.
    ///
    /// ICE starts again after a restart, the secure transport and the
    /// association only once.
    pub(super) fn start_transports(&mut self) -> Result<()> {
        let (Some(local), Some(remote)) = (
            self.current_local_description.as_ref(),
            self.current_remote_description.as_ref(),
        ) else {
            return Ok(());
        };
        let we_offer = local.sdp_type == RTCSdpType::Offer;
        let remote = remote.parsed()?;
        let ice_details = extract_ice_details(&remote)?;

        let (current_remote_ufrag, _) = self.ice_transport().get_remote_user_credentials();
        if current_remote_ufrag.is_empty() {
            self.ice_transport_mut()
                .start(we_offer, ice_details.ufrag, ice_details.pwd)?;
        }

        if self.transports_started {
            return Ok(());
        }
        self.transports_started = true;

        let fingerprint = extract_fingerprint(&remote)?;
        let dtls_role = if we_offer {
            RTCDtlsRole::from(&remote).complement()
        } else {
            DEFAULT_DTLS_ROLE_ANSWER
        };
        self.dtls_transport_mut().start(dtls_role, fingerprint)?;

        let now = self.now();
        let is_client = dtls_role == RTCDtlsRole::Client;
        self.sctp_transport_mut().start(is_client, now)?;

        if is_client
            && self
                .ice_transport()
                .agent
                .get_selected_candidate_pair()
                .is_some()
        {
            if let Some(conn) = self.dtls_transport_mut().conn.as_mut() {
                conn.start(now, TransportContext::default())?;
            }
        }

        Ok(())
    }

    pub(crate) fn ice_transport(&self) -> &RTCIceTransport {
        &self.pipeline_context.ice_handler_context.ice_transport
    }

    pub(crate) fn ice_transport_mut(&mut self) -> &mut RTCIceTransport {
        &mut self.pipeline_context.ice_handler_context.ice_transport
    }

    pub(crate) fn dtls_transport(&self) -> &RTCDtlsTransport {
        &self.pipeline_context.dtls_handler_context.dtls_transport
    }

    pub(crate) fn dtls_transport_mut(&mut self) -> &mut RTCDtlsTransport {
        &mut self.pipeline_context.dtls_handler_context.dtls_transport
    }

    pub(crate) fn sctp_transport(&self) -> &RTCSctpTransport {
        &self.pipeline_context.sctp_handler_context.sctp_transport
    }

    pub(crate) fn sctp_transport_mut(&mut self) -> &mut RTCSctpTransport {
        &mut self.pipeline_context.sctp_handler_context.sctp_transport
    }

    /// Fills in where a gathered candidate belongs in the local description.
    pub(crate) fn describe_local_candidate(&self, init: &mut RTCIceCandidateInit) {
        let (index, mid) = self
            .local_description()
            .and_then(|d| d.parsed.as_ref())
            .and_then(|parsed| {
                let index = application_media_index(parsed)?;
                let mid = parsed.media_descriptions[index].mid()?.to_owned();
                Some((index, mid))
            })
            .unwrap_or((0, DEFAULT_APPLICATION_MID.to_owned()));

        init.sdp_mid = Some(mid);
        init.sdp_mline_index = Some(index as u16);
        init.username_fragment = Some(self.ice_transport().get_local_user_credentials().0);
    }

    pub(crate) fn add_local_candidate_to_description(&mut self, candidate: &str) {
        let candidate = candidate.to_owned();
        self.update_local_description(move |parsed, index| {
            parsed.with_candidate_at(index, candidate)
        });
    }

    pub(crate) fn add_local_end_of_candidates_to_description(&mut self) {
        self.update_local_description(|parsed, index| parsed.with_end_of_candidates_at(index));
    }

    fn update_local_description(
        &mut self,
        update: impl FnOnce(&SessionDescription, usize) -> Result<SessionDescription>,
    ) {
        let description = if self.pending_local_description.is_some() {
            &mut self.pending_local_description
        } else {
            &mut self.current_local_description
        };
        let Some(desc) = description.as_mut() else {
            return;
        };
        let Some(parsed) = desc.parsed.as_ref() else {
            return;
        };
        let Some(index) = application_media_index(parsed) else {
            return;
        };
        match update(parsed, index) {
            Ok(parsed) => *desc = RTCSessionDescription::from_parsed(desc.sdp_type, parsed),
            Err(err) => warn!("failed to update local description: {err}"),
        }
    }

    /// Index of the remote media section a trickled candidate refers to.
    pub(super) fn remote_media_index(
        &self,
        candidate: Option<&RTCIceCandidateInit>,
    ) -> Result<usize> {
        let parsed = self
            .remote_description()
            .and_then(|d| d.parsed.as_ref())
            .ok_or(Error::ErrNoRemoteDescription)?;

        let (sdp_mid, sdp_mline_index) = candidate
            .map(|c| (c.sdp_mid.as_deref(), c.sdp_mline_index))
            .unwrap_or((None, None));
        if sdp_mid.is_none() && sdp_mline_index.is_none() {
            return application_media_index(parsed).ok_or(Error::ErrNoCommonMedia);
        }

        parsed
            .media_index(sdp_mid, sdp_mline_index)
            .ok_or_else(|| {
                Error::ErrIceCandidateUnknownMid(
                    sdp_mid
                        .map(str::to_owned)
                        .or_else(|| sdp_mline_index.map(|index| index.to_string()))
                        .unwrap_or_default(),
                )
            })
    }

    pub(super) fn update_remote_description(
        &mut self,
        update: impl FnOnce(&SessionDescription) -> Result<SessionDescription>,
    ) {
        let description = if self.pending_remote_description.is_some() {
            &mut self.pending_remote_description
        } else {
            &mut self.current_remote_description
        };
        let Some(desc) = description.as_mut() else {
            return;
        };
        let Some(parsed) = desc.parsed.as_ref() else {
            return;
        };
        match update(parsed) {
            Ok(parsed) => *desc = RTCSessionDescription::from_parsed(desc.sdp_type, parsed),
            Err(err) => warn!("failed to update remote description: {err}"),
        }
    }

    /// Update the PeerConnectionState given the state of relevant transports
    /// <https://www.w3.org/TR/webrtc/#rtcpeerconnectionstate-enum>
    pub(crate) fn update_connection_state(&mut self, is_closed: bool) {
        let ice_connection_state = self.ice_transport().ice_connection_state;
        let dtls_transport_state = self.dtls_transport().state;

        let connection_state =
            // The RTCPeerConnection object's [[IsClosed]] slot is true.
            if is_closed {
                RTCPeerConnectionState::Closed
            } else if ice_connection_state == RTCIceConnectionState::Failed || dtls_transport_state == RTCDtlsTransportState::Failed {
                // Any of the RTCIceTransports or RTCDtlsTransports are in a "failed" state.
                RTCPeerConnectionState::Failed
            } else if ice_connection_state == RTCIceConnectionState::Disconnected {
                // Any of the RTCIceTransports or RTCDtlsTransports are in the "disconnected"
                // state and none of them are in the "failed" or "connecting" or "checking" state.
                RTCPeerConnectionState::Disconnected
            } else if (ice_connection_state == RTCIceConnectionState::New || ice_connection_state == RTCIceConnectionState::Closed) &&
                (dtls_transport_state == RTCDtlsTransportState::New || dtls_transport_state == RTCDtlsTransportState::Closed) {
                // None of the previous states apply and all RTCIceTransports are in the "new" or "closed" state,
                // and all RTCDtlsTransports are in the "new" or "closed" state, or there are no transports.
                RTCPeerConnectionState::New
            } else if (ice_connection_state == RTCIceConnectionState::New || ice_connection_state == RTCIceConnectionState::Checking) ||
                (dtls_transport_state == RTCDtlsTransportState::New || dtls_transport_state == RTCDtlsTransportState::Connecting) {
                // None of the previous states apply and any RTCIceTransport is in the "new" or "checking" state or
                // any RTCDtlsTransport is in the "new" or "connecting" state.
                RTCPeerConnectionState::Connecting
            } else if (ice_connection_state == RTCIceConnectionState::Connected || ice_connection_state == RTCIceConnectionState::Completed || ice_connection_state == RTCIceConnectionState::Closed) &&
                (dtls_transport_state == RTCDtlsTransportState::Connected || dtls_transport_state == RTCDtlsTransportState::Closed) {
                // All RTCIceTransports and RTCDtlsTransports are in the "connected", "completed" or "closed"
                // state and all RTCDtlsTransports are in the "connected" or "closed" state.
                RTCPeerConnectionState::Connected
            } else {
                RTCPeerConnectionState::New
            };

        if self.peer_connection_state == connection_state {
            return;
        }

        log::info!("peer connection state changed: {connection_state}");
        self.peer_connection_state = connection_state;

        self.pipeline_context
            .event_outs
            .push_back(RTCPeerConnectionEvent::OnConnectionStateChangeEvent(
                connection_state,
            ));
    }
}
