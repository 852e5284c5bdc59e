use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use super::*;

const HANDSHAKE_MESSAGE_CERTIFICATE_LENGTH_FIELD_SIZE: usize = 3;

/// A chain of DER certificates, leaf first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandshakeMessageCertificate {
    pub certificate: Vec<Vec<u8>>,
}

impl HandshakeMessageCertificate {
    pub fn marshal(&self, writer: &mut Vec<u8>) -> Result<()> {
        let payload_size: usize = self
            .certificate
            .iter()
            .map(|c| HANDSHAKE_MESSAGE_CERTIFICATE_LENGTH_FIELD_SIZE + c.len())
            .sum();
        writer.write_u24::<BigEndian>(payload_size as u32)?;
        for c in &self.certificate {
            writer.write_u24::<BigEndian>(c.len() as u32)?;
            writer.extend_from_slice(c);
        }
        Ok(())
    }

    pub fn unmarshal(mut reader: &[u8]) -> Result<Self> {
        let payload_size = reader.read_u24::<BigEndian>()? as usize;
        let mut payload = read_bytes(&mut reader, payload_size)?;

        let mut certificate = vec![];
        while !payload.is_empty() {
            let len = payload.read_u24::<BigEndian>()? as usize;
            certificate.push(read_bytes(&mut payload, len)?.to_vec());
        }

        Ok(HandshakeMessageCertificate { certificate })
    }
}
