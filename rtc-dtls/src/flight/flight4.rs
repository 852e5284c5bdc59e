use super::flight6::*;
use super::*;
use crate::cipher_suite::*;
use crate::crypto::*;
use crate::handshake::handshake_message_certificate::*;
use crate::handshake::handshake_message_certificate_request::*;
use crate::handshake::handshake_message_server_hello::*;
use crate::handshake::handshake_message_server_key_exchange::*;
use crate::handshaker::srv_cli_str;
use crate::prf::*;

use log::debug;

/// The server's hello flight. Parsing it consumes the client's flight 5.
#[derive(Debug, PartialEq)]
pub(crate) struct Flight4;

impl fmt::Display for Flight4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Flight 4")
    }
}

const FLIGHT5_RULES: [HandshakeCachePullRule; 3] = [
    rule(HandshakeType::Certificate, true),
    rule(HandshakeType::ClientKeyExchange, true),
    rule(HandshakeType::CertificateVerify, true),
];

impl Flight for Flight4 {
    fn parse(
        &self,
        state: &mut State,
        cache: &HandshakeCache,
        cfg: &HandshakeConfig,
    ) -> FlightResult<Box<dyn Flight + Send + Sync>> {
        let msgs = match cache.pull(&FLIGHT5_RULES) {
            Ok(Some(msgs)) => msgs,
            Ok(None) => return Err((None, None)),
            Err(err) => return Err(fatal(AlertDescription::DecodeError, err)),
        };

        let (
            HandshakeMessage::Certificate(certificate),
            HandshakeMessage::ClientKeyExchange(client_key_exchange),
            HandshakeMessage::CertificateVerify(certificate_verify),
        ) = (
            &msgs[0].handshake_message,
            &msgs[1].handshake_message,
            &msgs[2].handshake_message,
        )
        else {
            return Err(fatal(
                AlertDescription::UnexpectedMessage,
                Error::ErrInvalidHandshakeType,
            ));
        };

        if state.cipher_suite.is_none() {
            let Some(leaf) = certificate.certificate.first() else {
                return Err(fatal(
                    AlertDescription::HandshakeFailure,
                    Error::ErrCertificateVerifyNoCertificate,
                ));
            };
            verify_fingerprint(leaf, &cfg.remote_fingerprints)
                .map_err(|err| fatal(AlertDescription::BadCertificate, err))?;

            let transcript = cache.pull_and_merge(&CERTIFICATE_VERIFY_RULES);
            verify_signature(leaf, &transcript, &certificate_verify.signature)
                .map_err(|err| fatal(AlertDescription::DecryptError, err))?;

            state.peer_certificates = certificate.certificate.clone();
            state.peer_certificates_verified = true;

            let pre_master_secret = state
                .pre_master_secret(&client_key_exchange.public_key)
                .map_err(|err| fatal(AlertDescription::IllegalParameter, err))?;
            state.master_secret = prf_master_secret(
                &pre_master_secret,
                state.client_random(),
                state.server_random(),
            )
            .map_err(|err| fatal(AlertDescription::InternalError, err))?;

            let mut cipher_suite = CipherSuiteAes128GcmSha256::new();
            cipher_suite
                .init(
                    &state.master_secret,
                    state.client_random(),
                    state.server_random(),
                    false,
                )
                .map_err(|err| fatal(AlertDescription::InternalError, err))?;
            state.cipher_suite = Some(cipher_suite);

            debug!(
                "[handshake:{}] client certificate verified, keys derived",
                srv_cli_str(state.is_client)
            );
        }

        // The Finished is protected, it shows up once the keys above exist.
        let finished = match cache.pull(&[rule(HandshakeType::Finished, true)]) {
            Ok(Some(msgs)) => msgs,
            Ok(None) => return Err((None, None)),
            Err(err) => return Err(fatal(AlertDescription::DecodeError, err)),
        };
        let HandshakeMessage::Finished(verify_data) = &finished[0].handshake_message else {
            return Err(fatal(
                AlertDescription::UnexpectedMessage,
                Error::ErrInvalidHandshakeType,
            ));
        };

        let expected =
            prf_verify_data_client(&state.master_secret, &client_finished_transcript(cache))
                .map_err(|err| fatal(AlertDescription::InternalError, err))?;
        if &expected != verify_data {
            return Err(fatal(
                AlertDescription::DecryptError,
                Error::ErrVerifyDataMismatch,
            ));
        }

        Ok(Box::new(Flight6 {}))
    }

    fn generate(
        &self,
        state: &mut State,
        _cache: &HandshakeCache,
        cfg: &HandshakeConfig,
    ) -> FlightResult<Vec<Packet>> {
        rand::fill(&mut state.local_random);
        let public_key = state.generate_keypair();

        let mut server_key_exchange = HandshakeMessageServerKeyExchange {
            named_curve: NAMED_CURVE_X25519,
            public_key,
            signature: vec![],
        };
        let signed = [
            state.client_random(),
            state.server_random(),
            &server_key_exchange.params(),
        ]
        .concat();
        server_key_exchange.signature = cfg.certificate.sign(&signed);

        let server_hello = HandshakeMessage::ServerHello(HandshakeMessageServerHello {
            version: PROTOCOL_VERSION1_2,
            random: state.local_random,
            cipher_suite: TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
        });
        let certificate = HandshakeMessage::Certificate(HandshakeMessageCertificate {
            certificate: vec![cfg.certificate.certificate.clone()],
        });

        Ok(vec![
            handshake_packet(state, 0, server_hello),
            handshake_packet(state, 0, certificate),
            handshake_packet(
                state,
                0,
                HandshakeMessage::ServerKeyExchange(server_key_exchange),
            ),
            handshake_packet(
                state,
                0,
                HandshakeMessage::CertificateRequest(HandshakeMessageCertificateRequest),
            ),
            handshake_packet(state, 0, HandshakeMessage::ServerHelloDone),
        ])
    }
}
