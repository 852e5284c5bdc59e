use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use super::*;

/// Proves possession of the client certificate's key by signing the transcript so far.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandshakeMessageCertificateVerify {
    pub signature: Vec<u8>,
}

impl HandshakeMessageCertificateVerify {
    pub fn marshal(&self, writer: &mut Vec<u8>) -> Result<()> {
        writer.write_u8(HASH_ALGORITHM_SHA256)?;
        writer.write_u8(SIGNATURE_ALGORITHM_ECDSA)?;
        writer.write_u16::<BigEndian>(self.signature.len() as u16)?;
        writer.extend_from_slice(&self.signature);
        Ok(())
    }

    pub fn unmarshal(mut reader: &[u8]) -> Result<Self> {
        let _hash_algorithm = reader.read_u8()?;
        let _signature_algorithm = reader.read_u8()?;
        let signature_len = reader.read_u16::<BigEndian>()? as usize;
        let signature = read_bytes(&mut reader, signature_len)?.to_vec();
        Ok(HandshakeMessageCertificateVerify { signature })
    }
}
