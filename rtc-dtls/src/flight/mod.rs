pub(crate) mod flight0;
pub(crate) mod flight1;
pub(crate) mod flight4;
pub(crate) mod flight5;
pub(crate) mod flight6;

use std::fmt;

use crate::alert::*;
use crate::config::*;
use crate::content::*;
use crate::handshake::handshake_cache::*;
use crate::handshake::*;
use crate::record_layer::record_layer_header::*;
use crate::record_layer::*;
use crate::state::*;
use shared::error::*;

/*
  DTLS messages are grouped into a series of message flights, according
  to the diagrams below.  Although each flight of messages may consist
  of a number of messages, they should be viewed as monolithic for the
  purpose of timeout and retransmission.
  https://tools.ietf.org/html/rfc4347#section-4.2.4

  The cookie exchange of flights 2 and 3 is not used.

  Client                                          Server
  ------                                          ------
                                      Waiting                 Flight 0

  ClientHello             -------->                           Flight 1

                                             ServerHello    \
                                            Certificate      \
                                      ServerKeyExchange       Flight 4
                                     CertificateRequest      /
                          <--------      ServerHelloDone    /

  Certificate              \
  ClientKeyExchange         \
  CertificateVerify          Flight 5
  [ChangeCipherSpec]        /
  Finished                -------->  /

                                      [ChangeCipherSpec]    \ Flight 6
                          <--------             Finished    /
*/

#[derive(Clone, Debug)]
pub(crate) struct Packet {
    pub(crate) record: RecordLayer,
    pub(crate) should_encrypt: bool,
}

pub(crate) type FlightError = (Option<Alert>, Option<Error>);
pub(crate) type FlightResult<T> = std::result::Result<T, FlightError>;

pub(crate) trait Flight: fmt::Display + fmt::Debug {
    fn is_last_send_flight(&self) -> bool {
        false
    }

    fn is_last_recv_flight(&self) -> bool {
        false
    }

    fn has_retransmit(&self) -> bool {
        true
    }

    /// Consumes the peer's flight from the cache and returns the next flight.
    /// `Err((None, None))` means the peer's flight is still incomplete.
    fn parse(
        &self,
        state: &mut State,
        cache: &HandshakeCache,
        cfg: &HandshakeConfig,
    ) -> FlightResult<Box<dyn Flight + Send + Sync>>;

    fn generate(
        &self,
        state: &mut State,
        cache: &HandshakeCache,
        cfg: &HandshakeConfig,
    ) -> FlightResult<Vec<Packet>>;
}

pub(crate) fn fatal(alert_description: AlertDescription, err: Error) -> FlightError {
    (Some(Alert::fatal(alert_description)), Some(err))
}

/// Wraps a handshake message into a record, assigning the next message_seq.
pub(crate) fn handshake_packet(
    state: &mut State,
    epoch: u16,
    handshake_message: HandshakeMessage,
) -> Packet {
    let message_sequence = state.handshake_send_sequence;
    state.handshake_send_sequence += 1;

    Packet {
        record: RecordLayer::new(
            PROTOCOL_VERSION1_2,
            epoch,
            Content::Handshake(Handshake::new(handshake_message, message_sequence)),
        ),
        should_encrypt: epoch > 0,
    }
}

pub(crate) fn change_cipher_spec_packet() -> Packet {
    Packet {
        record: RecordLayer::new(PROTOCOL_VERSION1_2, 0, Content::ChangeCipherSpec),
        should_encrypt: false,
    }
}

/// The raw message of a packet the way it enters the handshake cache.
pub(crate) fn marshal_handshake(p: &Packet) -> FlightResult<Vec<u8>> {
    match &p.record.content {
        Content::Handshake(h) => h
            .marshal()
            .map_err(|err| fatal(AlertDescription::InternalError, err)),
        _ => Err(fatal(
            AlertDescription::InternalError,
            Error::ErrInvalidContentType,
        )),
    }
}

// Transcript covered by the client's CertificateVerify.
pub(crate) const CERTIFICATE_VERIFY_RULES: [HandshakeCachePullRule; 8] = [
    rule(HandshakeType::ClientHello, true),
    rule(HandshakeType::ServerHello, false),
    rule(HandshakeType::Certificate, false),
    rule(HandshakeType::ServerKeyExchange, false),
    rule(HandshakeType::CertificateRequest, false),
    rule(HandshakeType::ServerHelloDone, false),
    rule(HandshakeType::Certificate, true),
    rule(HandshakeType::ClientKeyExchange, true),
];

/// Transcript covered by the client's Finished.
pub(crate) fn client_finished_transcript(cache: &HandshakeCache) -> Vec<u8> {
    let mut transcript = cache.pull_and_merge(&CERTIFICATE_VERIFY_RULES);
    transcript.extend(cache.pull_and_merge(&[rule(HandshakeType::CertificateVerify, true)]));
    transcript
}

/// Transcript covered by the server's Finished.
pub(crate) fn server_finished_transcript(cache: &HandshakeCache) -> Vec<u8> {
    let mut transcript = client_finished_transcript(cache);
    transcript.extend(cache.pull_and_merge(&[rule(HandshakeType::Finished, true)]));
    transcript
}
