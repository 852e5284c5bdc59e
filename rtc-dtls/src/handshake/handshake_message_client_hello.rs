use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use super::*;
use crate::record_layer::record_layer_header::ProtocolVersion;

/// The first message of a handshake. Session resumption, the cookie exchange and
/// compression are not supported, so their fields are always empty on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandshakeMessageClientHello {
    pub version: ProtocolVersion,
    pub random: [u8; HANDSHAKE_RANDOM_LENGTH],
    pub cipher_suites: Vec<u16>,
}

impl HandshakeMessageClientHello {
    pub fn marshal(&self, writer: &mut Vec<u8>) -> Result<()> {
        writer.write_u8(self.version.major)?;
        writer.write_u8(self.version.minor)?;
        writer.extend_from_slice(&self.random);

        // session id, cookie
        writer.write_u8(0)?;
        writer.write_u8(0)?;

        writer.write_u16::<BigEndian>(2 * self.cipher_suites.len() as u16)?;
        for id in &self.cipher_suites {
            writer.write_u16::<BigEndian>(*id)?;
        }

        // null compression only
        writer.write_u8(1)?;
        writer.write_u8(0)?;

        Ok(())
    }

    pub fn unmarshal(mut reader: &[u8]) -> Result<Self> {
        let major = reader.read_u8()?;
        let minor = reader.read_u8()?;
        let random = read_random(&mut reader)?;

        let session_id_len = reader.read_u8()? as usize;
        read_bytes(&mut reader, session_id_len)?;
        let cookie_len = reader.read_u8()? as usize;
        read_bytes(&mut reader, cookie_len)?;

        let cipher_suites_len = reader.read_u16::<BigEndian>()? as usize;
        if cipher_suites_len % 2 != 0 {
            return Err(Error::ErrLengthMismatch);
        }
        let mut cipher_suites = vec![];
        for _ in 0..cipher_suites_len / 2 {
            cipher_suites.push(reader.read_u16::<BigEndian>()?);
        }

        let compression_methods_len = reader.read_u8()? as usize;
        read_bytes(&mut reader, compression_methods_len)?;

        // extensions, if any, are ignored

        Ok(HandshakeMessageClientHello {
            version: ProtocolVersion { major, minor },
            random,
            cipher_suites,
        })
    }
}
