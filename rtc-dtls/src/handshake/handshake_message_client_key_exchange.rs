use byteorder::{ReadBytesExt, WriteBytesExt};

use super::*;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandshakeMessageClientKeyExchange {
    pub public_key: Vec<u8>,
}

impl HandshakeMessageClientKeyExchange {
    pub fn marshal(&self, writer: &mut Vec<u8>) -> Result<()> {
        writer.write_u8(self.public_key.len() as u8)?;
        writer.extend_from_slice(&self.public_key);
        Ok(())
    }

    pub fn unmarshal(mut reader: &[u8]) -> Result<Self> {
        let public_key_len = reader.read_u8()? as usize;
        let public_key = read_bytes(&mut reader, public_key_len)?.to_vec();
        Ok(HandshakeMessageClientKeyExchange { public_key })
    }
}
