#[cfg(test)]
mod sdp_test;

pub(crate) mod sdp_type;
pub(crate) mod session_description;

pub use sdp_type::RTCSdpType;
pub use session_description::RTCSessionDescription;

use crate::peer_connection::transport::dtls::fingerprint::RTCDtlsFingerprint;
use crate::peer_connection::transport::dtls::role::RTCDtlsRole;
use ::ice::candidate::{Candidate, unmarshal_candidate};
use log::warn;
use sdp::{MediaDescription, SessionDescription};
use shared::error::{Error, Result};

pub(crate) const ATTR_KEY_GROUP: &str = "group";
pub(crate) const ATTR_KEY_MID: &str = "mid";
pub(crate) const ATTR_KEY_ICE_UFRAG: &str = "ice-ufrag";
pub(crate) const ATTR_KEY_ICE_PWD: &str = "ice-pwd";
pub(crate) const ATTR_KEY_ICE_OPTIONS: &str = "ice-options";
pub(crate) const ATTR_KEY_FINGERPRINT: &str = "fingerprint";
pub(crate) const ATTR_KEY_SETUP: &str = "setup";
pub(crate) const ATTR_KEY_CANDIDATE: &str = "candidate";
pub(crate) const ATTR_KEY_END_OF_CANDIDATES: &str = "end-of-candidates";
pub(crate) const ATTR_KEY_SCTP_PORT: &str = "sctp-port";
pub(crate) const ATTR_KEY_MAX_MESSAGE_SIZE: &str = "max-message-size";

pub(crate) const MEDIA_SECTION_APPLICATION: &str = "application";
pub(crate) const SCTP_PORT: u16 = 5000;

/// ICE parameters found in a remote description.
#[derive(Default, Debug, Clone)]
pub(crate) struct IceDetails {
    pub(crate) ufrag: String,
    pub(crate) pwd: String,
    pub(crate) candidates: Vec<Candidate>,
    pub(crate) end_of_candidates: bool,
}

/// Reads an attribute from the media section first, then from the session.
fn media_or_session_attribute<'a>(
    desc: &'a SessionDescription,
    media: Option<&'a MediaDescription>,
    key: &str,
) -> Option<Option<&'a str>> {
    media
        .and_then(|m| m.attribute(key))
        .or_else(|| desc.attribute(key))
}

/// Value of the `a=candidate` attribute for a trickled candidate line, which
/// may carry the attribute name itself.
pub(crate) fn candidate_attribute_value(candidate: &str) -> String {
    let candidate = candidate.trim();
    let candidate = candidate.strip_prefix("a=").unwrap_or(candidate);
    candidate
        .strip_prefix("candidate:")
        .unwrap_or(candidate)
        .to_owned()
}

/// Returns the index of the first non-rejected application section.
pub(crate) fn application_media_index(desc: &SessionDescription) -> Option<usize> {
    desc.media_descriptions.iter().position(|m| {
        m.media_name.media == MEDIA_SECTION_APPLICATION && !m.is_rejected()
    })
}

pub(crate) fn extract_ice_details(desc: &SessionDescription) -> Result<IceDetails> {
    let media = application_media_index(desc).map(|index| &desc.media_descriptions[index]);

    let ufrag = media_or_session_attribute(desc, media, ATTR_KEY_ICE_UFRAG)
        .flatten()
        .filter(|v| !v.is_empty())
        .ok_or(Error::ErrSessionDescriptionMissingIceUfrag)?
        .to_owned();
    let pwd = media_or_session_attribute(desc, media, ATTR_KEY_ICE_PWD)
        .flatten()
        .filter(|v| !v.is_empty())
        .ok_or(Error::ErrSessionDescriptionMissingIcePwd)?
        .to_owned();

    let mut candidates = vec![];
    let mut end_of_candidates = false;
    if let Some(media) = media {
        for value in media.attribute_values(ATTR_KEY_CANDIDATE) {
            match unmarshal_candidate(value) {
                Ok(candidate) => candidates.push(candidate),
                Err(err) => warn!("skip unparseable candidate {value}: {err}"),
            }
        }
        end_of_candidates = media.attribute(ATTR_KEY_END_OF_CANDIDATES).is_some();
    }

    Ok(IceDetails {
        ufrag,
        pwd,
        candidates,
        end_of_candidates,
    })
}

/// Extracts the `sha-256` fingerprint of the remote certificate.
pub(crate) fn extract_fingerprint(desc: &SessionDescription) -> Result<RTCDtlsFingerprint> {
    let media = application_media_index(desc).map(|index| &desc.media_descriptions[index]);

    let value = media_or_session_attribute(desc, media, ATTR_KEY_FINGERPRINT)
        .flatten()
        .ok_or(Error::ErrSessionDescriptionNoFingerprint)?;

    let mut parts = value.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(algorithm), Some(value), None)
            if algorithm.eq_ignore_ascii_case("sha-256") && !value.is_empty() =>
        {
            Ok(RTCDtlsFingerprint {
                algorithm: algorithm.to_lowercase(),
                value: value.to_owned(),
            })
        }
        _ => Err(Error::ErrSessionDescriptionInvalidFingerprint),
    }
}

/// Returns the `a=max-message-size` of the application section, if any.
pub(crate) fn extract_max_message_size(desc: &SessionDescription) -> Option<u32> {
    let media = &desc.media_descriptions[application_media_index(desc)?];
    media
        .attribute(ATTR_KEY_MAX_MESSAGE_SIZE)
        .flatten()
        .and_then(|v| v.trim().parse::<u32>().ok())
}

/// What a local description carries about the single application section.
pub(crate) struct PopulateSdpParams<'a> {
    pub(crate) ice_ufrag: &'a str,
    pub(crate) ice_pwd: &'a str,
    pub(crate) fingerprints: &'a [RTCDtlsFingerprint],
    pub(crate) dtls_role: RTCDtlsRole,
    pub(crate) max_message_size: u32,
    pub(crate) candidates: &'a [Candidate],
    pub(crate) end_of_candidates: bool,
}

/// One m-line of the description to build.
pub(crate) enum MediaSection {
    /// The data-channel section, identified by its mid.
    Application(String),
    /// A section of the remote offer that is answered with port 0.
    Rejected(MediaDescription),
}

/// Builds a local description with one entry per `sections`, bundled together.
pub(crate) fn populate_sdp(
    mut desc: SessionDescription,
    sections: Vec<MediaSection>,
    params: &PopulateSdpParams<'_>,
) -> SessionDescription {
    let mids: Vec<String> = sections
        .iter()
        .filter_map(|section| match section {
            MediaSection::Application(mid) => Some(mid.clone()),
            MediaSection::Rejected(_) => None,
        })
        .collect();
    if !mids.is_empty() {
        desc = desc.with_value_attribute(
            ATTR_KEY_GROUP.to_owned(),
            format!("BUNDLE {}", mids.join(" ")),
        );
    }

    for section in sections {
        let media = match section {
            MediaSection::Application(mid) => application_media_description(mid, params),
            MediaSection::Rejected(offered) => rejected_media_description(offered),
        };
        desc = desc.with_media(media);
    }

    desc
}

fn application_media_description(mid: String, params: &PopulateSdpParams<'_>) -> MediaDescription {
    let mut media = MediaDescription::new_jsep_application_description()
        .with_ice_credentials(params.ice_ufrag.to_owned(), params.ice_pwd.to_owned())
        .with_value_attribute(ATTR_KEY_ICE_OPTIONS.to_owned(), "trickle".to_owned());

    for fingerprint in params.fingerprints {
        media = media.with_fingerprint(fingerprint.algorithm.clone(), fingerprint.value.clone());
    }

    media = media
        .with_value_attribute(ATTR_KEY_SETUP.to_owned(), params.dtls_role.to_connection_role())
        .with_value_attribute(ATTR_KEY_MID.to_owned(), mid)
        .with_value_attribute(ATTR_KEY_SCTP_PORT.to_owned(), SCTP_PORT.to_string())
        .with_value_attribute(
            ATTR_KEY_MAX_MESSAGE_SIZE.to_owned(),
            params.max_message_size.to_string(),
        );

    for candidate in params.candidates {
        media = media.with_candidate(candidate.marshal());
    }
    if params.end_of_candidates {
        media = media.with_end_of_candidates();
    }

    media
}

fn rejected_media_description(mut offered: MediaDescription) -> MediaDescription {
    offered.media_name.port.value = 0;
    offered.media_name.port.range = None;
    offered.attributes.retain(|a| a.key == ATTR_KEY_MID);
    offered
}
