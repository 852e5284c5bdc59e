#[cfg(test)]
mod handshake_test;

pub mod handshake_cache;
pub mod handshake_header;
pub mod handshake_message_certificate;
pub mod handshake_message_certificate_request;
pub mod handshake_message_certificate_verify;
pub mod handshake_message_client_hello;
pub mod handshake_message_client_key_exchange;
pub mod handshake_message_server_hello;
pub mod handshake_message_server_key_exchange;

use std::fmt;

use handshake_header::*;
use handshake_message_certificate::*;
use handshake_message_certificate_request::*;
use handshake_message_certificate_verify::*;
use handshake_message_client_hello::*;
use handshake_message_client_key_exchange::*;
use handshake_message_server_hello::*;
use handshake_message_server_key_exchange::*;
use shared::error::*;

pub const HANDSHAKE_RANDOM_LENGTH: usize = 32;
pub const VERIFY_DATA_LENGTH: usize = 12;

pub(crate) const ELLIPTIC_CURVE_TYPE_NAMED_CURVE: u8 = 0x03;
pub(crate) const NAMED_CURVE_X25519: u16 = 0x001d;
pub(crate) const HASH_ALGORITHM_SHA256: u8 = 4;
pub(crate) const SIGNATURE_ALGORITHM_ECDSA: u8 = 3;

/// <https://tools.ietf.org/html/rfc5246#section-7.4>
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum HandshakeType {
    HelloRequest = 0,
    ClientHello = 1,
    ServerHello = 2,
    HelloVerifyRequest = 3,
    Certificate = 11,
    ServerKeyExchange = 12,
    CertificateRequest = 13,
    ServerHelloDone = 14,
    CertificateVerify = 15,
    ClientKeyExchange = 16,
    Finished = 20,
    #[default]
    Invalid,
}

impl fmt::Display for HandshakeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            HandshakeType::HelloRequest => "HelloRequest",
            HandshakeType::ClientHello => "ClientHello",
            HandshakeType::ServerHello => "ServerHello",
            HandshakeType::HelloVerifyRequest => "HelloVerifyRequest",
            HandshakeType::Certificate => "Certificate",
            HandshakeType::ServerKeyExchange => "ServerKeyExchange",
            HandshakeType::CertificateRequest => "CertificateRequest",
            HandshakeType::ServerHelloDone => "ServerHelloDone",
            HandshakeType::CertificateVerify => "CertificateVerify",
            HandshakeType::ClientKeyExchange => "ClientKeyExchange",
            HandshakeType::Finished => "Finished",
            HandshakeType::Invalid => "Invalid",
        };
        write!(f, "{s}")
    }
}

impl From<u8> for HandshakeType {
    fn from(val: u8) -> Self {
        match val {
            0 => HandshakeType::HelloRequest,
            1 => HandshakeType::ClientHello,
            2 => HandshakeType::ServerHello,
            3 => HandshakeType::HelloVerifyRequest,
            11 => HandshakeType::Certificate,
            12 => HandshakeType::ServerKeyExchange,
            13 => HandshakeType::CertificateRequest,
            14 => HandshakeType::ServerHelloDone,
            15 => HandshakeType::CertificateVerify,
            16 => HandshakeType::ClientKeyExchange,
            20 => HandshakeType::Finished,
            _ => HandshakeType::Invalid,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandshakeMessage {
    ClientHello(HandshakeMessageClientHello),
    ServerHello(HandshakeMessageServerHello),
    Certificate(HandshakeMessageCertificate),
    ServerKeyExchange(HandshakeMessageServerKeyExchange),
    CertificateRequest(HandshakeMessageCertificateRequest),
    ServerHelloDone,
    CertificateVerify(HandshakeMessageCertificateVerify),
    ClientKeyExchange(HandshakeMessageClientKeyExchange),
    Finished(Vec<u8>),
}

impl HandshakeMessage {
    pub fn handshake_type(&self) -> HandshakeType {
        match self {
            HandshakeMessage::ClientHello(_) => HandshakeType::ClientHello,
            HandshakeMessage::ServerHello(_) => HandshakeType::ServerHello,
            HandshakeMessage::Certificate(_) => HandshakeType::Certificate,
            HandshakeMessage::ServerKeyExchange(_) => HandshakeType::ServerKeyExchange,
            HandshakeMessage::CertificateRequest(_) => HandshakeType::CertificateRequest,
            HandshakeMessage::ServerHelloDone => HandshakeType::ServerHelloDone,
            HandshakeMessage::CertificateVerify(_) => HandshakeType::CertificateVerify,
            HandshakeMessage::ClientKeyExchange(_) => HandshakeType::ClientKeyExchange,
            HandshakeMessage::Finished(_) => HandshakeType::Finished,
        }
    }

    pub fn marshal(&self, writer: &mut Vec<u8>) -> Result<()> {
        match self {
            HandshakeMessage::ClientHello(m) => m.marshal(writer),
            HandshakeMessage::ServerHello(m) => m.marshal(writer),
            HandshakeMessage::Certificate(m) => m.marshal(writer),
            HandshakeMessage::ServerKeyExchange(m) => m.marshal(writer),
            HandshakeMessage::CertificateRequest(m) => m.marshal(writer),
            HandshakeMessage::ServerHelloDone => Ok(()),
            HandshakeMessage::CertificateVerify(m) => m.marshal(writer),
            HandshakeMessage::ClientKeyExchange(m) => m.marshal(writer),
            HandshakeMessage::Finished(verify_data) => {
                writer.extend_from_slice(verify_data);
                Ok(())
            }
        }
    }

    pub fn unmarshal(handshake_type: HandshakeType, body: &[u8]) -> Result<Self> {
        Ok(match handshake_type {
            HandshakeType::ClientHello => {
                HandshakeMessage::ClientHello(HandshakeMessageClientHello::unmarshal(body)?)
            }
            HandshakeType::ServerHello => {
                HandshakeMessage::ServerHello(HandshakeMessageServerHello::unmarshal(body)?)
            }
            HandshakeType::Certificate => {
                HandshakeMessage::Certificate(HandshakeMessageCertificate::unmarshal(body)?)
            }
            HandshakeType::ServerKeyExchange => HandshakeMessage::ServerKeyExchange(
                HandshakeMessageServerKeyExchange::unmarshal(body)?,
            ),
            HandshakeType::CertificateRequest => HandshakeMessage::CertificateRequest(
                HandshakeMessageCertificateRequest::unmarshal(body)?,
            ),
            HandshakeType::ServerHelloDone => HandshakeMessage::ServerHelloDone,
            HandshakeType::CertificateVerify => HandshakeMessage::CertificateVerify(
                HandshakeMessageCertificateVerify::unmarshal(body)?,
            ),
            HandshakeType::ClientKeyExchange => HandshakeMessage::ClientKeyExchange(
                HandshakeMessageClientKeyExchange::unmarshal(body)?,
            ),
            HandshakeType::Finished => {
                if body.len() != VERIFY_DATA_LENGTH {
                    return Err(Error::ErrLengthMismatch);
                }
                HandshakeMessage::Finished(body.to_vec())
            }
            _ => return Err(Error::ErrInvalidHandshakeType),
        })
    }
}

/// A complete, unfragmented handshake message with its header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Handshake {
    pub handshake_header: HandshakeHeader,
    pub handshake_message: HandshakeMessage,
}

impl Handshake {
    pub fn new(handshake_message: HandshakeMessage, message_sequence: u16) -> Self {
        Handshake {
            handshake_header: HandshakeHeader {
                handshake_type: handshake_message.handshake_type(),
                length: 0,
                message_sequence,
                fragment_offset: 0,
                fragment_length: 0,
            },
            handshake_message,
        }
    }

    pub fn marshal(&self) -> Result<Vec<u8>> {
        let mut body = vec![];
        self.handshake_message.marshal(&mut body)?;

        let header = HandshakeHeader {
            length: body.len() as u32,
            fragment_offset: 0,
            fragment_length: body.len() as u32,
            ..self.handshake_header
        };

        let mut raw = Vec::with_capacity(HANDSHAKE_HEADER_LENGTH + body.len());
        header.marshal(&mut raw)?;
        raw.extend_from_slice(&body);
        Ok(raw)
    }

    pub fn unmarshal(raw: &[u8]) -> Result<Self> {
        let handshake_header = HandshakeHeader::unmarshal(raw)?;
        let end = HANDSHAKE_HEADER_LENGTH + handshake_header.length as usize;
        if handshake_header.fragment_offset != 0
            || handshake_header.fragment_length != handshake_header.length
            || raw.len() < end
        {
            return Err(Error::ErrLengthMismatch);
        }

        let handshake_message = HandshakeMessage::unmarshal(
            handshake_header.handshake_type,
            &raw[HANDSHAKE_HEADER_LENGTH..end],
        )?;

        Ok(Handshake {
            handshake_header,
            handshake_message,
        })
    }
}

pub(crate) fn read_bytes<'a>(reader: &mut &'a [u8], len: usize) -> Result<&'a [u8]> {
    if reader.len() < len {
        return Err(Error::ErrBufferTooSmall);
    }
    let (head, tail) = reader.split_at(len);
    *reader = tail;
    Ok(head)
}

pub(crate) fn read_random(reader: &mut &[u8]) -> Result<[u8; HANDSHAKE_RANDOM_LENGTH]> {
    let mut random = [0u8; HANDSHAKE_RANDOM_LENGTH];
    random.copy_from_slice(read_bytes(reader, HANDSHAKE_RANDOM_LENGTH)?);
    Ok(random)
}
