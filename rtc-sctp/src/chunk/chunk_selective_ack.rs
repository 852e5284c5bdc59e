use super::ChunkValue;
use bytes::{Buf, BufMut, BytesMut};
use shared::error::{Error, Result};
use std::fmt;

const SELECTIVE_ACK_HEADER_SIZE: usize = 12;

/// A range of TSNs received beyond the cumulative ack point, as offsets from it.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct GapAckBlock {
    pub start: u16,
    pub end: u16,
}

impl fmt::Display for GapAckBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.start, self.end)
    }
}

///chunkSelectiveAck represents an SCTP Chunk of type SACK
///
///This chunk is sent to the peer endpoint to acknowledge received DATA
///chunks and to inform the peer endpoint of gaps in the received
///subsequences of DATA chunks as represented by their TSNs.
///0                   1                   2                   3
///0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|   Type = 3    |Chunk  Flags   |      Chunk Length             |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|                      Cumulative TSN Ack                       |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|          Advertised Receiver Window Credit (a_rwnd)           |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///| Number of Gap Ack Blocks = N  |  Number of Duplicate TSNs = X |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|  Gap Ack Block #1 Start       |   Gap Ack Block #1 End        |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|                       Duplicate TSN X                         |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ChunkSelectiveAck {
    pub cumulative_tsn_ack: u32,
    pub advertised_receiver_window_credit: u32,
    pub gap_ack_blocks: Vec<GapAckBlock>,
    pub duplicate_tsn: Vec<u32>,
}

impl fmt::Display for ChunkSelectiveAck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SACK cumTsnAck={} arwnd={} gaps={:?} dupTsn={:?}",
            self.cumulative_tsn_ack,
            self.advertised_receiver_window_credit,
            self.gap_ack_blocks,
            self.duplicate_tsn
        )
    }
}

impl ChunkValue for ChunkSelectiveAck {
    fn value_length(&self) -> usize {
        SELECTIVE_ACK_HEADER_SIZE + self.gap_ack_blocks.len() * 4 + self.duplicate_tsn.len() * 4
    }

    fn marshal_value(&self, buf: &mut BytesMut) {
        buf.put_u32(self.cumulative_tsn_ack);
        buf.put_u32(self.advertised_receiver_window_credit);
        buf.put_u16(self.gap_ack_blocks.len() as u16);
        buf.put_u16(self.duplicate_tsn.len() as u16);
        for g in &self.gap_ack_blocks {
            buf.put_u16(g.start);
            buf.put_u16(g.end);
        }
        for t in &self.duplicate_tsn {
            buf.put_u32(*t);
        }
    }
}

impl ChunkSelectiveAck {
    pub(crate) fn unmarshal(mut value: &[u8]) -> Result<Self> {
        if value.len() < SELECTIVE_ACK_HEADER_SIZE {
            return Err(Error::ErrChunkHeaderTooSmall);
        }

        let cumulative_tsn_ack = value.get_u32();
        let advertised_receiver_window_credit = value.get_u32();
        let n_gaps = value.get_u16() as usize;
        let n_dups = value.get_u16() as usize;
        if value.len() < (n_gaps + n_dups) * 4 {
            return Err(Error::ErrChunkHeaderNotEnoughSpace);
        }

        let gap_ack_blocks = (0..n_gaps)
            .map(|_| GapAckBlock {
                start: value.get_u16(),
                end: value.get_u16(),
            })
            .collect();
        let duplicate_tsn = (0..n_dups).map(|_| value.get_u32()).collect();

        Ok(ChunkSelectiveAck {
            cumulative_tsn_ack,
            advertised_receiver_window_credit,
            gap_ack_blocks,
            duplicate_tsn,
        })
    }
}
