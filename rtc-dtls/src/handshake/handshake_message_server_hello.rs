use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use super::*;
use crate::record_layer::record_layer_header::ProtocolVersion;

/// Sent in response to a ClientHello when an acceptable cipher suite was found.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandshakeMessageServerHello {
    pub version: ProtocolVersion,
    pub random: [u8; HANDSHAKE_RANDOM_LENGTH],
    pub cipher_suite: u16,
}

impl HandshakeMessageServerHello {
    pub fn marshal(&self, writer: &mut Vec<u8>) -> Result<()> {
        writer.write_u8(self.version.major)?;
        writer.write_u8(self.version.minor)?;
        writer.extend_from_slice(&self.random);
        writer.write_u8(0)?;
        writer.write_u16::<BigEndian>(self.cipher_suite)?;
        writer.write_u8(0)?;
        Ok(())
    }

    pub fn unmarshal(mut reader: &[u8]) -> Result<Self> {
        let major = reader.read_u8()?;
        let minor = reader.read_u8()?;
        let random = read_random(&mut reader)?;
        let session_id_len = reader.read_u8()? as usize;
        read_bytes(&mut reader, session_id_len)?;
        let cipher_suite = reader.read_u16::<BigEndian>()?;
        let _compression_method = reader.read_u8()?;

        Ok(HandshakeMessageServerHello {
            version: ProtocolVersion { major, minor },
            random,
            cipher_suite,
        })
    }
}
