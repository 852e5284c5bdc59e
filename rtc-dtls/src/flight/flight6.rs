use super::*;
use crate::prf::*;

/// The server's ChangeCipherSpec and Finished, the last flight of the handshake.
#[derive(Debug, PartialEq)]
pub(crate) struct Flight6;

impl fmt::Display for Flight6 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Flight 6")
    }
}

impl Flight for Flight6 {
    fn is_last_send_flight(&self) -> bool {
        true
    }

    fn parse(
        &self,
        _state: &mut State,
        _cache: &HandshakeCache,
        _cfg: &HandshakeConfig,
    ) -> FlightResult<Box<dyn Flight + Send + Sync>> {
        Ok(Box::new(Flight6 {}))
    }

    fn generate(
        &self,
        state: &mut State,
        cache: &HandshakeCache,
        _cfg: &HandshakeConfig,
    ) -> FlightResult<Vec<Packet>> {
        let verify_data =
            prf_verify_data_server(&state.master_secret, &server_finished_transcript(cache))
                .map_err(|err| fatal(AlertDescription::InternalError, err))?;

        Ok(vec![
            change_cipher_spec_packet(),
            handshake_packet(state, 1, HandshakeMessage::Finished(verify_data)),
        ])
    }
}
