use super::ChunkValue;
use bytes::{Buf, Bytes, BytesMut};
use shared::error::{Error, Result};

/// Cause code for an abort requested by the upper layer.
pub const USER_INITIATED_ABORT: u16 = 12;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ErrorCause {
    pub code: u16,
    pub raw: Bytes,
}

///Abort represents an SCTP Chunk of type ABORT
///
///The ABORT chunk is sent to the peer of an association to close the
///association.  The ABORT chunk may contain Cause Parameters to inform
///the receiver about the reason of the abort.
///
/// 0                   1                   2                   3
/// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|   Type = 6    |Reserved     |T|           Length              |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///\                                                               \
////                   zero or more Error Causes                   /
///\                                                               \
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ChunkAbort {
    pub error_causes: Vec<ErrorCause>,
}

impl ChunkAbort {
    pub(crate) fn unmarshal(mut value: &[u8]) -> Result<Self> {
        let mut error_causes = vec![];
        while value.len() >= 4 {
            let code = value.get_u16();
            let length = value.get_u16() as usize;
            if length < 4 || length - 4 > value.len() {
                return Err(Error::ErrChunkHeaderInvalidLength);
            }
            error_causes.push(ErrorCause {
                code,
                raw: Bytes::copy_from_slice(&value[..length - 4]),
            });
            let padded = (length - 4 + crate::util::get_padding_size(length)).min(value.len());
            value.advance(padded);
        }
        Ok(ChunkAbort { error_causes })
    }
}

impl ChunkValue for ChunkAbort {
    fn value_length(&self) -> usize {
        self.error_causes
            .iter()
            .map(|c| super::param_size(c.raw.len()))
            .sum()
    }

    fn marshal_value(&self, buf: &mut BytesMut) {
        for c in &self.error_causes {
            super::marshal_param(buf, c.code, &c.raw);
        }
    }
}
