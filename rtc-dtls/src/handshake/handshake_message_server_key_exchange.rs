use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use super::*;

/// ECDHE parameters of the server, signed with its certificate key over
/// `client_random || server_random || params`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandshakeMessageServerKeyExchange {
    pub named_curve: u16,
    pub public_key: Vec<u8>,
    pub signature: Vec<u8>,
}

impl HandshakeMessageServerKeyExchange {
    /// The part of the message covered by the signature.
    pub fn params(&self) -> Vec<u8> {
        let mut params = Vec::with_capacity(4 + self.public_key.len());
        params.push(ELLIPTIC_CURVE_TYPE_NAMED_CURVE);
        params.extend_from_slice(&self.named_curve.to_be_bytes());
        params.push(self.public_key.len() as u8);
        params.extend_from_slice(&self.public_key);
        params
    }

    pub fn marshal(&self, writer: &mut Vec<u8>) -> Result<()> {
        writer.extend_from_slice(&self.params());
        writer.write_u8(HASH_ALGORITHM_SHA256)?;
        writer.write_u8(SIGNATURE_ALGORITHM_ECDSA)?;
        writer.write_u16::<BigEndian>(self.signature.len() as u16)?;
        writer.extend_from_slice(&self.signature);
        Ok(())
    }

    pub fn unmarshal(mut reader: &[u8]) -> Result<Self> {
        if reader.read_u8()? != ELLIPTIC_CURVE_TYPE_NAMED_CURVE {
            return Err(Error::ErrDtlsProtocol("unsupported curve type".to_owned()));
        }
        let named_curve = reader.read_u16::<BigEndian>()?;
        let public_key_len = reader.read_u8()? as usize;
        let public_key = read_bytes(&mut reader, public_key_len)?.to_vec();

        let _hash_algorithm = reader.read_u8()?;
        let _signature_algorithm = reader.read_u8()?;
        let signature_len = reader.read_u16::<BigEndian>()? as usize;
        let signature = read_bytes(&mut reader, signature_len)?.to_vec();

        Ok(HandshakeMessageServerKeyExchange {
            named_curve,
            public_key,
            signature,
        })
    }
}
