use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use super::*;

const CLIENT_CERTIFICATE_TYPE_ECDSA_SIGN: u8 = 64;

/// Asks the client for an ECDSA certificate. The list of acceptable
/// certificate authorities is always empty.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HandshakeMessageCertificateRequest;

impl HandshakeMessageCertificateRequest {
    pub fn marshal(&self, writer: &mut Vec<u8>) -> Result<()> {
        writer.write_u8(1)?;
        writer.write_u8(CLIENT_CERTIFICATE_TYPE_ECDSA_SIGN)?;
        writer.write_u16::<BigEndian>(2)?;
        writer.write_u8(HASH_ALGORITHM_SHA256)?;
        writer.write_u8(SIGNATURE_ALGORITHM_ECDSA)?;
        writer.write_u16::<BigEndian>(0)?;
        Ok(())
    }

    pub fn unmarshal(mut reader: &[u8]) -> Result<Self> {
        let certificate_types_len = reader.read_u8()? as usize;
        let certificate_types = read_bytes(&mut reader, certificate_types_len)?;
        if !certificate_types.contains(&CLIENT_CERTIFICATE_TYPE_ECDSA_SIGN) {
            return Err(Error::ErrDtlsProtocol(
                "certificate request without ecdsa_sign".to_owned(),
            ));
        }
        let algorithms_len = reader.read_u16::<BigEndian>()? as usize;
        read_bytes(&mut reader, algorithms_len)?;
        Ok(HandshakeMessageCertificateRequest)
    }
}
