use super::flight4::*;
use super::*;
use crate::cipher_suite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256;
use crate::handshaker::srv_cli_str;

use log::debug;

/// The server waiting for a ClientHello.
#[derive(Debug, PartialEq)]
pub(crate) struct Flight0;

impl fmt::Display for Flight0 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Flight 0")
    }
}

impl Flight for Flight0 {
    fn has_retransmit(&self) -> bool {
        false
    }

    fn parse(
        &self,
        state: &mut State,
        cache: &HandshakeCache,
        _cfg: &HandshakeConfig,
    ) -> FlightResult<Box<dyn Flight + Send + Sync>> {
        let msgs = match cache.pull(&[rule(HandshakeType::ClientHello, true)]) {
            Ok(Some(msgs)) => msgs,
            Ok(None) => return Err((None, None)),
            Err(err) => return Err(fatal(AlertDescription::DecodeError, err)),
        };

        let HandshakeMessage::ClientHello(client_hello) = &msgs[0].handshake_message else {
            return Err(fatal(
                AlertDescription::InternalError,
                Error::ErrInvalidHandshakeType,
            ));
        };

        if client_hello.version != PROTOCOL_VERSION1_2 {
            return Err(fatal(
                AlertDescription::ProtocolVersion,
                Error::ErrUnsupportedProtocolVersion,
            ));
        }

        if !client_hello
            .cipher_suites
            .contains(&TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256)
        {
            return Err(fatal(
                AlertDescription::InsufficientSecurity,
                Error::ErrCipherSuiteNoIntersection,
            ));
        }

        debug!(
            "[handshake:{}] use cipher suite: TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256",
            srv_cli_str(state.is_client)
        );
        state.remote_random = client_hello.random;

        Ok(Box::new(Flight4 {}))
    }

    fn generate(
        &self,
        _state: &mut State,
        _cache: &HandshakeCache,
        _cfg: &HandshakeConfig,
    ) -> FlightResult<Vec<Packet>> {
        Ok(vec![])
    }
}
