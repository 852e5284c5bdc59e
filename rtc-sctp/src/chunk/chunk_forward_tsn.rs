use super::ChunkValue;
use bytes::{Buf, BufMut, BytesMut};
use shared::error::{Error, Result};

const NEW_CUMULATIVE_TSN_LENGTH: usize = 4;
const FORWARD_TSN_STREAM_LENGTH: usize = 4;

/// Stream and sequence number of the last skipped ordered message on a stream.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ChunkForwardTsnStream {
    pub identifier: u16,
    pub sequence: u16,
}

/// This chunk shall be used by the data sender to inform the data
/// receiver to adjust its cumulative received TSN point forward because
/// some missing TSNs are associated with data chunks that SHOULD NOT be
/// transmitted or retransmitted by the sender.
///
/// 0                   1                   2                   3
/// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|   Type = 192  |  Flags = 0x00 |        Length = Variable      |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|                      New Cumulative TSN                       |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|         Stream-1              |       Stream Sequence-1       |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///\                                                               /
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ChunkForwardTsn {
    pub new_cumulative_tsn: u32,
    pub streams: Vec<ChunkForwardTsnStream>,
}

impl ChunkForwardTsn {
    pub(crate) fn unmarshal(mut value: &[u8]) -> Result<Self> {
        if value.len() < NEW_CUMULATIVE_TSN_LENGTH {
            return Err(Error::ErrChunkHeaderTooSmall);
        }
        let new_cumulative_tsn = value.get_u32();
        let mut streams = vec![];
        while value.len() >= FORWARD_TSN_STREAM_LENGTH {
            streams.push(ChunkForwardTsnStream {
                identifier: value.get_u16(),
                sequence: value.get_u16(),
            });
        }
        Ok(ChunkForwardTsn {
            new_cumulative_tsn,
            streams,
        })
    }
}

impl ChunkValue for ChunkForwardTsn {
    fn value_length(&self) -> usize {
        NEW_CUMULATIVE_TSN_LENGTH + self.streams.len() * FORWARD_TSN_STREAM_LENGTH
    }

    fn marshal_value(&self, buf: &mut BytesMut) {
        buf.put_u32(self.new_cumulative_tsn);
        for s in &self.streams {
            buf.put_u16(s.identifier);
            buf.put_u16(s.sequence);
        }
    }
}
