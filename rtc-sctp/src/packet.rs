use crate::chunk::Chunk;
use crate::util::generate_packet_checksum;
use bytes::{BufMut, BytesMut};
use log::trace;
use shared::error::{Error, Result};
use std::fmt;

pub(crate) const PACKET_HEADER_SIZE: usize = 12;

///Packet represents an SCTP packet, defined in https://tools.ietf.org/html/rfc4960#section-3
///An SCTP packet is composed of a common header and chunks.  A chunk
///contains either control information or user data.
///
///
///SCTP Packet Format
/// 0                   1                   2                   3
/// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|                        Common Header                          |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|                          Chunk #1                             |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|                           ...                                 |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|                          Chunk #n                             |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///
///SCTP Common Header Format
///
/// 0                   1                   2                   3
/// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|     Source Value Number        |     Destination Value Number |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|                      Verification Tag                         |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|                           Checksum                            |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
#[derive(Default, Debug, Clone, PartialEq)]
pub struct Packet {
    pub source_port: u16,
    pub destination_port: u16,
    pub verification_tag: u32,
    pub chunks: Vec<Chunk>,
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Packet: sourcePort={} destinationPort={} verificationTag={} chunks=[",
            self.source_port, self.destination_port, self.verification_tag,
        )?;
        for (i, c) in self.chunks.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{c}")?;
        }
        write!(f, "]")
    }
}

impl Packet {
    pub fn unmarshal(raw: &[u8]) -> Result<Self> {
        if raw.len() < PACKET_HEADER_SIZE {
            return Err(Error::ErrPacketRawTooSmall);
        }

        let their_checksum = u32::from_le_bytes([raw[8], raw[9], raw[10], raw[11]]);
        let mut zeroed = raw.to_vec();
        zeroed[8..12].copy_from_slice(&[0, 0, 0, 0]);
        if their_checksum != generate_packet_checksum(&zeroed) {
            return Err(Error::ErrChecksumMismatch);
        }

        let source_port = u16::from_be_bytes([raw[0], raw[1]]);
        let destination_port = u16::from_be_bytes([raw[2], raw[3]]);
        let verification_tag = u32::from_be_bytes([raw[4], raw[5], raw[6], raw[7]]);

        let mut chunks = vec![];
        let mut offset = PACKET_HEADER_SIZE;
        while offset < raw.len() {
            let (chunk, consumed) = Chunk::unmarshal(&raw[offset..])?;
            match chunk {
                Some(chunk) => chunks.push(chunk),
                None => trace!("skipping unknown chunk type {}", raw[offset]),
            }
            offset += consumed;
        }

        Ok(Packet {
            source_port,
            destination_port,
            verification_tag,
            chunks,
        })
    }

    pub fn marshal_size(&self) -> usize {
        PACKET_HEADER_SIZE + self.chunks.iter().map(|c| c.marshal_size()).sum::<usize>()
    }

    pub fn marshal(&self) -> BytesMut {
        let mut raw = BytesMut::with_capacity(self.marshal_size());
        raw.put_u16(self.source_port);
        raw.put_u16(self.destination_port);
        raw.put_u32(self.verification_tag);
        raw.put_u32(0);
        for c in &self.chunks {
            c.marshal_to(&mut raw);
        }

        let checksum = generate_packet_checksum(&raw);
        raw[8..12].copy_from_slice(&checksum.to_le_bytes());
        raw
    }
}
