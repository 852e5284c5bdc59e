use super::*;
use ::ice::candidate::{CandidateConfig, CandidateType};

const FINGERPRINT: &str = "AB:CD:EF:01:23:45:67:89:AB:CD:EF:01:23:45:67:89:AB:CD:EF:01:23:45:67:89:AB:CD:EF:01:23:45:67:89";

fn host_candidate(address: &str, port: u16) -> Result<Candidate> {
    CandidateConfig {
        candidate_type: CandidateType::Host,
        network: "udp".to_owned(),
        address: address.to_owned(),
        port,
        component: 1,
        ..Default::default()
    }
    .build()
}

fn fingerprints() -> Vec<RTCDtlsFingerprint> {
    vec![RTCDtlsFingerprint {
        algorithm: "sha-256".to_owned(),
        value: FINGERPRINT.to_owned(),
    }]
}

fn local_description(candidates: &[Candidate], end_of_candidates: bool) -> SessionDescription {
    let fingerprints = fingerprints();
    populate_sdp(
        SessionDescription::new_jsep_session_description(42, 1),
        vec![MediaSection::Application("0".to_owned())],
        &PopulateSdpParams {
            ice_ufrag: "ufragABCD",
            ice_pwd: "pwdABCDEFGHIJKLMNOPQRSTU",
            fingerprints: &fingerprints,
            dtls_role: RTCDtlsRole::Auto,
            max_message_size: 262144,
            candidates,
            end_of_candidates,
        },
    )
}

#[test]
fn test_populate_sdp_round_trip() -> Result<()> {
    let candidates = vec![
        host_candidate("192.168.1.10", 50000)?,
        host_candidate("10.0.0.5", 50001)?,
    ];
    let desc = local_description(&candidates, true);

    let parsed = SessionDescription::unmarshal(&desc.marshal())?;
    assert_eq!(parsed.marshal(), desc.marshal());
    assert_eq!(parsed.attribute(ATTR_KEY_GROUP), Some(Some("BUNDLE 0")));
    assert_eq!(application_media_index(&parsed), Some(0));

    let ice = extract_ice_details(&parsed)?;
    assert_eq!(ice.ufrag, "ufragABCD");
    assert_eq!(ice.pwd, "pwdABCDEFGHIJKLMNOPQRSTU");
    assert!(ice.end_of_candidates);
    assert_eq!(ice.candidates.len(), 2);
    for (got, want) in ice.candidates.iter().zip(&candidates) {
        assert!(got.equal(want), "{got} != {want}");
    }

    assert_eq!(extract_fingerprint(&parsed)?, fingerprints()[0]);
    assert_eq!(extract_max_message_size(&parsed), Some(262144));

    let media = &parsed.media_descriptions[0];
    assert_eq!(media.attribute(ATTR_KEY_SETUP), Some(Some("actpass")));
    assert_eq!(media.attribute(ATTR_KEY_MID), Some(Some("0")));
    assert_eq!(media.attribute(ATTR_KEY_SCTP_PORT), Some(Some("5000")));

    Ok(())
}

#[test]
fn test_incremental_candidates_match_up_front() -> Result<()> {
    let candidates = vec![
        host_candidate("192.168.1.10", 50000)?,
        host_candidate("10.0.0.5", 50001)?,
    ];

    let mut incremental = local_description(&[], false);
    for candidate in &candidates {
        incremental = incremental.with_candidate_at(0, candidate.marshal())?;
    }
    incremental = incremental.with_end_of_candidates_at(0)?;

    let up_front = local_description(&candidates, true);
    assert_eq!(incremental.marshal(), up_front.marshal());

    assert!(local_description(&[], false).with_candidate_at(1, candidates[0].marshal()).is_err());

    Ok(())
}

#[test]
fn test_rejected_sections_keep_their_mid() -> Result<()> {
    let offer = SessionDescription::unmarshal(
        "v=0\r\n\
         o=- 1 1 IN IP4 0.0.0.0\r\n\
         s=-\r\n\
         t=0 0\r\n\
         m=audio 9 UDP/TLS/RTP/SAVPF 111\r\n\
         c=IN IP4 0.0.0.0\r\n\
         a=mid:audio\r\n\
         a=rtpmap:111 opus/48000/2\r\n\
         m=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\n\
         c=IN IP4 0.0.0.0\r\n\
         a=mid:data\r\n\
         a=sctp-port:5000\r\n",
    )?;
    assert_eq!(application_media_index(&offer), Some(1));

    let fingerprints = fingerprints();
    let answer = populate_sdp(
        SessionDescription::new_jsep_session_description(7, 1),
        vec![
            MediaSection::Rejected(offer.media_descriptions[0].clone()),
            MediaSection::Application("data".to_owned()),
        ],
        &PopulateSdpParams {
            ice_ufrag: "ufragABCD",
            ice_pwd: "pwdABCDEFGHIJKLMNOPQRSTU",
            fingerprints: &fingerprints,
            dtls_role: RTCDtlsRole::Client,
            max_message_size: 65536,
            candidates: &[],
            end_of_candidates: false,
        },
    );

    assert_eq!(answer.media_descriptions.len(), 2);
    let rejected = &answer.media_descriptions[0];
    assert!(rejected.is_rejected());
    assert_eq!(rejected.attribute(ATTR_KEY_MID), Some(Some("audio")));
    assert!(rejected.attribute(ATTR_KEY_ICE_UFRAG).is_none());

    assert_eq!(application_media_index(&answer), Some(1));
    assert_eq!(answer.attribute(ATTR_KEY_GROUP), Some(Some("BUNDLE data")));
    assert_eq!(
        answer.media_descriptions[1].attribute(ATTR_KEY_SETUP),
        Some(Some("active"))
    );

    Ok(())
}

#[test]
fn test_extract_session_level_attributes() -> Result<()> {
    let desc = SessionDescription::unmarshal(&format!(
        "v=0\r\n\
         o=- 1 1 IN IP4 0.0.0.0\r\n\
         s=-\r\n\
         t=0 0\r\n\
         a=ice-ufrag:sessionufrag\r\n\
         a=ice-pwd:sessionpasswordsessionpass\r\n\
         a=fingerprint:SHA-256 {FINGERPRINT}\r\n\
         m=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\n\
         c=IN IP4 0.0.0.0\r\n\
         a=mid:0\r\n"
    ))?;

    let ice = extract_ice_details(&desc)?;
    assert_eq!(ice.ufrag, "sessionufrag");
    assert_eq!(ice.pwd, "sessionpasswordsessionpass");
    assert!(ice.candidates.is_empty());
    assert!(!ice.end_of_candidates);

    let fingerprint = extract_fingerprint(&desc)?;
    assert_eq!(fingerprint.algorithm, "sha-256");
    assert_eq!(fingerprint.value, FINGERPRINT);

    assert_eq!(extract_max_message_size(&desc), None);

    Ok(())
}

#[test]
fn test_extract_errors() -> Result<()> {
    let header = "v=0\r\no=- 1 1 IN IP4 0.0.0.0\r\ns=-\r\nt=0 0\r\n";
    let media = "m=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\nc=IN IP4 0.0.0.0\r\n";

    let no_ufrag = SessionDescription::unmarshal(&format!("{header}{media}a=ice-pwd:pwd\r\n"))?;
    assert_eq!(
        extract_ice_details(&no_ufrag).unwrap_err(),
        Error::ErrSessionDescriptionMissingIceUfrag
    );

    let no_pwd = SessionDescription::unmarshal(&format!("{header}{media}a=ice-ufrag:ufrag\r\n"))?;
    assert_eq!(
        extract_ice_details(&no_pwd).unwrap_err(),
        Error::ErrSessionDescriptionMissingIcePwd
    );

    let no_fingerprint = SessionDescription::unmarshal(&format!("{header}{media}"))?;
    assert_eq!(
        extract_fingerprint(&no_fingerprint).unwrap_err(),
        Error::ErrSessionDescriptionNoFingerprint
    );

    let sha1 = SessionDescription::unmarshal(&format!(
        "{header}{media}a=fingerprint:sha-1 AB:CD\r\n"
    ))?;
    assert_eq!(
        extract_fingerprint(&sha1).unwrap_err(),
        Error::ErrSessionDescriptionInvalidFingerprint
    );

    Ok(())
}

#[test]
fn test_candidate_attribute_value() {
    let tests = vec![
        "candidate:1 1 udp 2130706431 10.0.0.1 5000 typ host",
        "a=candidate:1 1 udp 2130706431 10.0.0.1 5000 typ host",
        "1 1 udp 2130706431 10.0.0.1 5000 typ host",
        " candidate:1 1 udp 2130706431 10.0.0.1 5000 typ host\r\n",
    ];
    for candidate in tests {
        assert_eq!(
            candidate_attribute_value(candidate),
            "1 1 udp 2130706431 10.0.0.1 5000 typ host",
            "{candidate:?}"
        );
    }
}
