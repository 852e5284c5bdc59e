use super::flight5::*;
use super::*;
use crate::cipher_suite::*;
use crate::crypto::*;
use crate::handshake::handshake_message_client_hello::*;
use crate::handshaker::srv_cli_str;
use crate::prf::*;

use log::debug;

/// The client's ClientHello. Parsing it consumes the server's flight 4 and
/// derives the session keys.
#[derive(Debug, PartialEq)]
pub(crate) struct Flight1;

impl fmt::Display for Flight1 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Flight 1")
    }
}

const FLIGHT4_RULES: [HandshakeCachePullRule; 5] = [
    rule(HandshakeType::ServerHello, false),
    rule(HandshakeType::Certificate, false),
    rule(HandshakeType::ServerKeyExchange, false),
    rule(HandshakeType::CertificateRequest, false),
    rule(HandshakeType::ServerHelloDone, false),
];

impl Flight for Flight1 {
    fn parse(
        &self,
        state: &mut State,
        cache: &HandshakeCache,
        cfg: &HandshakeConfig,
    ) -> FlightResult<Box<dyn Flight + Send + Sync>> {
        let msgs = match cache.pull(&FLIGHT4_RULES) {
            Ok(Some(msgs)) => msgs,
            Ok(None) => return Err((None, None)),
            Err(err) => return Err(fatal(AlertDescription::DecodeError, err)),
        };

        let (
            HandshakeMessage::ServerHello(server_hello),
            HandshakeMessage::Certificate(certificate),
            HandshakeMessage::ServerKeyExchange(server_key_exchange),
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

        if server_hello.version != PROTOCOL_VERSION1_2 {
            return Err(fatal(
                AlertDescription::ProtocolVersion,
                Error::ErrUnsupportedProtocolVersion,
            ));
        }
        if server_hello.cipher_suite != TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256 {
            return Err(fatal(
                AlertDescription::InsufficientSecurity,
                Error::ErrCipherSuiteNoIntersection,
            ));
        }
        if server_key_exchange.named_curve != NAMED_CURVE_X25519 {
            return Err(fatal(
                AlertDescription::HandshakeFailure,
                Error::ErrDtlsProtocol("unsupported named curve".to_owned()),
            ));
        }
        state.remote_random = server_hello.random;

        let Some(leaf) = certificate.certificate.first() else {
            return Err(fatal(
                AlertDescription::HandshakeFailure,
                Error::ErrCertificateVerifyNoCertificate,
            ));
        };
        verify_fingerprint(leaf, &cfg.remote_fingerprints)
            .map_err(|err| fatal(AlertDescription::BadCertificate, err))?;

        let signed = [
            state.client_random(),
            state.server_random(),
            &server_key_exchange.params(),
        ]
        .concat();
        verify_signature(leaf, &signed, &server_key_exchange.signature)
            .map_err(|err| fatal(AlertDescription::DecryptError, err))?;

        state.peer_certificates = certificate.certificate.clone();
        state.peer_certificates_verified = true;

        state.generate_keypair();
        let pre_master_secret = state
            .pre_master_secret(&server_key_exchange.public_key)
            .map_err(|err| fatal(AlertDescription::IllegalParameter, err))?;
        state.master_secret =
            prf_master_secret(&pre_master_secret, state.client_random(), state.server_random())
                .map_err(|err| fatal(AlertDescription::InternalError, err))?;

        let mut cipher_suite = CipherSuiteAes128GcmSha256::new();
        cipher_suite
            .init(
                &state.master_secret,
                state.client_random(),
                state.server_random(),
                true,
            )
            .map_err(|err| fatal(AlertDescription::InternalError, err))?;
        state.cipher_suite = Some(cipher_suite);

        debug!(
            "[handshake:{}] server certificate verified, keys derived",
            srv_cli_str(state.is_client)
        );

        Ok(Box::new(Flight5 {}))
    }

    fn generate(
        &self,
        state: &mut State,
        _cache: &HandshakeCache,
        _cfg: &HandshakeConfig,
    ) -> FlightResult<Vec<Packet>> {
        rand::fill(&mut state.local_random);
        let client_hello = HandshakeMessage::ClientHello(HandshakeMessageClientHello {
            version: PROTOCOL_VERSION1_2,
            random: state.local_random,
            cipher_suites: vec![TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256],
        });

        Ok(vec![handshake_packet(state, 0, client_hello)])
    }
}
