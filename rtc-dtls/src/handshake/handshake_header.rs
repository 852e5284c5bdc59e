use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use super::HandshakeType;
use shared::error::*;

pub const HANDSHAKE_HEADER_LENGTH: usize = 12;

/// <https://tools.ietf.org/html/rfc6347#section-4.2.2>
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HandshakeHeader {
    pub handshake_type: HandshakeType,
    /// uint24 in spec
    pub length: u32,
    pub message_sequence: u16,
    /// uint24 in spec
    pub fragment_offset: u32,
    /// uint24 in spec
    pub fragment_length: u32,
}

impl HandshakeHeader {
    pub fn marshal(&self, writer: &mut Vec<u8>) -> Result<()> {
        writer.write_u8(self.handshake_type as u8)?;
        writer.write_u24::<BigEndian>(self.length)?;
        writer.write_u16::<BigEndian>(self.message_sequence)?;
        writer.write_u24::<BigEndian>(self.fragment_offset)?;
        writer.write_u24::<BigEndian>(self.fragment_length)?;
        Ok(())
    }

    pub fn unmarshal(raw: &[u8]) -> Result<Self> {
        if raw.len() < HANDSHAKE_HEADER_LENGTH {
            return Err(Error::ErrBufferTooSmall);
        }
        let mut reader = raw;

        let handshake_type = reader.read_u8()?.into();
        let length = reader.read_u24::<BigEndian>()?;
        let message_sequence = reader.read_u16::<BigEndian>()?;
        let fragment_offset = reader.read_u24::<BigEndian>()?;
        let fragment_length = reader.read_u24::<BigEndian>()?;

        Ok(HandshakeHeader {
            handshake_type,
            length,
            message_sequence,
            fragment_offset,
            fragment_length,
        })
    }
}
