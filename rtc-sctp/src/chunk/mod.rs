#[cfg(test)]
mod chunk_test;

pub mod chunk_abort;
pub mod chunk_cookie;
pub mod chunk_forward_tsn;
pub mod chunk_init;
pub mod chunk_payload_data;
pub mod chunk_reconfig;
pub mod chunk_selective_ack;
pub mod chunk_type;

use bytes::{BufMut, BytesMut};
use chunk_abort::ChunkAbort;
use chunk_cookie::ChunkCookieEcho;
use chunk_forward_tsn::ChunkForwardTsn;
use chunk_init::ChunkInit;
use chunk_payload_data::ChunkPayloadData;
use chunk_reconfig::ChunkReconfig;
use chunk_selective_ack::ChunkSelectiveAck;
use chunk_type::*;
use shared::error::{Error, Result};
use std::fmt;

use crate::util::get_padding_size;

pub(crate) const CHUNK_HEADER_SIZE: usize = 4;

/// Wire form shared by every chunk value.
///
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |   Chunk Type  | Chunk  Flags  |        Chunk Length           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// \                                                               \
/// /                          Chunk Value                          /
/// \                                                               \
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
pub(crate) trait ChunkValue {
    fn flags(&self) -> u8 {
        0
    }
    fn value_length(&self) -> usize;
    fn marshal_value(&self, buf: &mut BytesMut);
}

#[derive(Debug, Clone, PartialEq)]
pub enum Chunk {
    PayloadData(ChunkPayloadData),
    SelectiveAck(ChunkSelectiveAck),
    Init(ChunkInit),
    CookieEcho(ChunkCookieEcho),
    CookieAck,
    Abort(ChunkAbort),
    ForwardTsn(ChunkForwardTsn),
    Reconfig(ChunkReconfig),
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Chunk::PayloadData(c) => write!(f, "{c}"),
            Chunk::SelectiveAck(c) => write!(f, "{c}"),
            _ => write!(f, "{}", self.chunk_type()),
        }
    }
}

impl Chunk {
    pub fn chunk_type(&self) -> ChunkType {
        match self {
            Chunk::PayloadData(_) => CT_PAYLOAD_DATA,
            Chunk::SelectiveAck(_) => CT_SACK,
            Chunk::Init(c) if c.is_ack => CT_INIT_ACK,
            Chunk::Init(_) => CT_INIT,
            Chunk::CookieEcho(_) => CT_COOKIE_ECHO,
            Chunk::CookieAck => CT_COOKIE_ACK,
            Chunk::Abort(_) => CT_ABORT,
            Chunk::ForwardTsn(_) => CT_FORWARD_TSN,
            Chunk::Reconfig(_) => CT_RECONFIG,
        }
    }

    fn value(&self) -> Option<&dyn ChunkValue> {
        match self {
            Chunk::PayloadData(c) => Some(c),
            Chunk::SelectiveAck(c) => Some(c),
            Chunk::Init(c) => Some(c),
            Chunk::CookieEcho(c) => Some(c),
            Chunk::CookieAck => None,
            Chunk::Abort(c) => Some(c),
            Chunk::ForwardTsn(c) => Some(c),
            Chunk::Reconfig(c) => Some(c),
        }
    }

    /// Length on the wire including the trailing padding.
    pub fn marshal_size(&self) -> usize {
        let l = CHUNK_HEADER_SIZE + self.value().map_or(0, |v| v.value_length());
        l + get_padding_size(l)
    }

    pub fn marshal_to(&self, buf: &mut BytesMut) {
        let (flags, value_length) = self
            .value()
            .map_or((0, 0), |v| (v.flags(), v.value_length()));
        let length = CHUNK_HEADER_SIZE + value_length;

        buf.put_u8(self.chunk_type().0);
        buf.put_u8(flags);
        buf.put_u16(length as u16);
        if let Some(v) = self.value() {
            v.marshal_value(buf);
        }
        buf.put_bytes(0, get_padding_size(length));
    }

    /// Parses one chunk from the head of `raw`.
    ///
    /// Returns the chunk (or `None` for an unknown type that may be skipped)
    /// and the number of bytes consumed including padding.
    pub fn unmarshal(raw: &[u8]) -> Result<(Option<Chunk>, usize)> {
        if raw.len() < CHUNK_HEADER_SIZE {
            return Err(Error::ErrChunkHeaderTooSmall);
        }

        let typ = ChunkType(raw[0]);
        let flags = raw[1];
        let length = u16::from_be_bytes([raw[2], raw[3]]) as usize;
        if length < CHUNK_HEADER_SIZE {
            return Err(Error::ErrChunkHeaderInvalidLength);
        }
        if length > raw.len() {
            return Err(Error::ErrChunkHeaderNotEnoughSpace);
        }
        let consumed = (length + get_padding_size(length)).min(raw.len());
        let value = &raw[CHUNK_HEADER_SIZE..length];

        let chunk = match typ {
            CT_PAYLOAD_DATA => Chunk::PayloadData(ChunkPayloadData::unmarshal(flags, value)?),
            CT_SACK => Chunk::SelectiveAck(ChunkSelectiveAck::unmarshal(value)?),
            CT_INIT => Chunk::Init(ChunkInit::unmarshal(false, value)?),
            CT_INIT_ACK => Chunk::Init(ChunkInit::unmarshal(true, value)?),
            CT_COOKIE_ECHO => Chunk::CookieEcho(ChunkCookieEcho::unmarshal(value)),
            CT_COOKIE_ACK => Chunk::CookieAck,
            CT_ABORT => Chunk::Abort(ChunkAbort::unmarshal(value)?),
            CT_FORWARD_TSN => Chunk::ForwardTsn(ChunkForwardTsn::unmarshal(value)?),
            CT_RECONFIG => Chunk::Reconfig(ChunkReconfig::unmarshal(value)?),
            _ if typ.skip_when_unknown() => return Ok((None, consumed)),
            _ => return Err(Error::ErrUnmarshalUnknownChunkType),
        };

        Ok((Some(chunk), consumed))
    }
}

/// Writes a parameter TLV (type, length, value, padding).
pub(crate) fn marshal_param(buf: &mut BytesMut, typ: u16, value: &[u8]) {
    let length = 4 + value.len();
    buf.put_u16(typ);
    buf.put_u16(length as u16);
    buf.put_slice(value);
    buf.put_bytes(0, get_padding_size(length));
}

pub(crate) fn param_size(value_len: usize) -> usize {
    let length = 4 + value_len;
    length + get_padding_size(length)
}

/// Splits a run of parameter TLVs into `(type, value)` pairs.
pub(crate) fn unmarshal_params(mut raw: &[u8]) -> Result<Vec<(u16, &[u8])>> {
    let mut params = vec![];
    while raw.len() >= 4 {
        let typ = u16::from_be_bytes([raw[0], raw[1]]);
        let length = u16::from_be_bytes([raw[2], raw[3]]) as usize;
        if length < 4 || length > raw.len() {
            return Err(Error::ErrChunkHeaderInvalidLength);
        }
        params.push((typ, &raw[4..length]));
        let consumed = (length + get_padding_size(length)).min(raw.len());
        raw = &raw[consumed..];
    }
    Ok(params)
}
