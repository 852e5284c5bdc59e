use super::*;
use crate::handshake::handshake_message_certificate::*;
use crate::handshake::handshake_message_certificate_verify::*;
use crate::handshake::handshake_message_client_key_exchange::*;
use crate::prf::*;

/// The client's key exchange and Finished. Parsing it verifies the server's Finished.
#[derive(Debug, PartialEq)]
pub(crate) struct Flight5;

impl fmt::Display for Flight5 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Flight 5")
    }
}

impl Flight for Flight5 {
    fn is_last_recv_flight(&self) -> bool {
        true
    }

    fn parse(
        &self,
        state: &mut State,
        cache: &HandshakeCache,
        _cfg: &HandshakeConfig,
    ) -> FlightResult<Box<dyn Flight + Send + Sync>> {
        let finished = match cache.pull(&[rule(HandshakeType::Finished, false)]) {
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
            prf_verify_data_server(&state.master_secret, &server_finished_transcript(cache))
                .map_err(|err| fatal(AlertDescription::InternalError, err))?;
        if &expected != verify_data {
            return Err(fatal(
                AlertDescription::DecryptError,
                Error::ErrVerifyDataMismatch,
            ));
        }

        Ok(Box::new(Flight5 {}))
    }

    fn generate(
        &self,
        state: &mut State,
        cache: &HandshakeCache,
        cfg: &HandshakeConfig,
    ) -> FlightResult<Vec<Packet>> {
        let Some(public_key) = state.local_public_key() else {
            return Err(fatal(
                AlertDescription::InternalError,
                Error::ErrDtlsProtocol("missing local key pair".to_owned()),
            ));
        };

        let certificate = handshake_packet(
            state,
            0,
            HandshakeMessage::Certificate(HandshakeMessageCertificate {
                certificate: vec![cfg.certificate.certificate.clone()],
            }),
        );
        let client_key_exchange = handshake_packet(
            state,
            0,
            HandshakeMessage::ClientKeyExchange(HandshakeMessageClientKeyExchange { public_key }),
        );

        let mut transcript = cache.pull_and_merge(&CERTIFICATE_VERIFY_RULES);
        transcript.extend(marshal_handshake(&certificate)?);
        transcript.extend(marshal_handshake(&client_key_exchange)?);

        let certificate_verify = handshake_packet(
            state,
            0,
            HandshakeMessage::CertificateVerify(HandshakeMessageCertificateVerify {
                signature: cfg.certificate.sign(&transcript),
            }),
        );
        transcript.extend(marshal_handshake(&certificate_verify)?);

        let verify_data = prf_verify_data_client(&state.master_secret, &transcript)
            .map_err(|err| fatal(AlertDescription::InternalError, err))?;

        Ok(vec![
            certificate,
            client_key_exchange,
            certificate_verify,
            change_cipher_spec_packet(),
            handshake_packet(state, 1, HandshakeMessage::Finished(verify_data)),
        ])
    }
}
