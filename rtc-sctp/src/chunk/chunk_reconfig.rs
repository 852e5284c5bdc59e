use super::{ChunkValue, marshal_param, param_size, unmarshal_params};
use bytes::{Buf, BufMut, BytesMut};
use log::trace;
use shared::error::{Error, Result};

pub(crate) const PARAM_OUTGOING_RESET_REQUEST: u16 = 13;
pub(crate) const PARAM_RECONFIG_RESPONSE: u16 = 16;

const OUTGOING_RESET_REQUEST_HEADER_SIZE: usize = 12;
const RECONFIG_RESPONSE_SIZE: usize = 8;

/// Result codes of a Re-configuration Response parameter (RFC 6525 section 4.4).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReconfigResult {
    SuccessNop,
    SuccessPerformed,
    Denied,
    ErrorWrongSsn,
    ErrorRequestAlreadyInProgress,
    ErrorBadSequenceNumber,
    InProgress,
    Unknown(u32),
}

impl From<u32> for ReconfigResult {
    fn from(v: u32) -> Self {
        match v {
            0 => ReconfigResult::SuccessNop,
            1 => ReconfigResult::SuccessPerformed,
            2 => ReconfigResult::Denied,
            3 => ReconfigResult::ErrorWrongSsn,
            4 => ReconfigResult::ErrorRequestAlreadyInProgress,
            5 => ReconfigResult::ErrorBadSequenceNumber,
            6 => ReconfigResult::InProgress,
            other => ReconfigResult::Unknown(other),
        }
    }
}

impl From<ReconfigResult> for u32 {
    fn from(v: ReconfigResult) -> u32 {
        match v {
            ReconfigResult::SuccessNop => 0,
            ReconfigResult::SuccessPerformed => 1,
            ReconfigResult::Denied => 2,
            ReconfigResult::ErrorWrongSsn => 3,
            ReconfigResult::ErrorRequestAlreadyInProgress => 4,
            ReconfigResult::ErrorBadSequenceNumber => 5,
            ReconfigResult::InProgress => 6,
            ReconfigResult::Unknown(other) => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReconfigParam {
    /// Outgoing SSN Reset Request Parameter
    OutgoingResetRequest {
        reconfig_request_sequence_number: u32,
        reconfig_response_sequence_number: u32,
        sender_last_tsn: u32,
        stream_identifiers: Vec<u16>,
    },
    /// Re-configuration Response Parameter
    Response {
        reconfig_response_sequence_number: u32,
        result: ReconfigResult,
    },
}

impl ReconfigParam {
    fn value_length(&self) -> usize {
        match self {
            ReconfigParam::OutgoingResetRequest {
                stream_identifiers, ..
            } => OUTGOING_RESET_REQUEST_HEADER_SIZE + stream_identifiers.len() * 2,
            ReconfigParam::Response { .. } => RECONFIG_RESPONSE_SIZE,
        }
    }

    fn marshal(&self, buf: &mut BytesMut) {
        let mut value = BytesMut::with_capacity(self.value_length());
        let typ = match self {
            ReconfigParam::OutgoingResetRequest {
                reconfig_request_sequence_number,
                reconfig_response_sequence_number,
                sender_last_tsn,
                stream_identifiers,
            } => {
                value.put_u32(*reconfig_request_sequence_number);
                value.put_u32(*reconfig_response_sequence_number);
                value.put_u32(*sender_last_tsn);
                for id in stream_identifiers {
                    value.put_u16(*id);
                }
                PARAM_OUTGOING_RESET_REQUEST
            }
            ReconfigParam::Response {
                reconfig_response_sequence_number,
                result,
            } => {
                value.put_u32(*reconfig_response_sequence_number);
                value.put_u32((*result).into());
                PARAM_RECONFIG_RESPONSE
            }
        };
        marshal_param(buf, typ, &value);
    }
}

///https://tools.ietf.org/html/rfc6525#section-3.1
///chunkReconfig represents an SCTP Chunk used to reconfigure streams.
///
/// 0                   1                   2                   3
/// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///| Type = 130    |  Chunk Flags  |      Chunk Length             |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///\                                                               \
////                  Re-configuration Parameter                   /
///\                                                               \
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///\                                                               \
////             Re-configuration Parameter (optional)             /
///\                                                               \
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ChunkReconfig {
    pub params: Vec<ReconfigParam>,
}

impl ChunkReconfig {
    pub(crate) fn unmarshal(value: &[u8]) -> Result<Self> {
        let mut params = vec![];
        for (typ, mut v) in unmarshal_params(value)? {
            match typ {
                PARAM_OUTGOING_RESET_REQUEST => {
                    if v.len() < OUTGOING_RESET_REQUEST_HEADER_SIZE {
                        return Err(Error::ErrChunkHeaderTooSmall);
                    }
                    let reconfig_request_sequence_number = v.get_u32();
                    let reconfig_response_sequence_number = v.get_u32();
                    let sender_last_tsn = v.get_u32();
                    let mut stream_identifiers = vec![];
                    while v.len() >= 2 {
                        stream_identifiers.push(v.get_u16());
                    }
                    params.push(ReconfigParam::OutgoingResetRequest {
                        reconfig_request_sequence_number,
                        reconfig_response_sequence_number,
                        sender_last_tsn,
                        stream_identifiers,
                    });
                }
                PARAM_RECONFIG_RESPONSE => {
                    if v.len() < RECONFIG_RESPONSE_SIZE {
                        return Err(Error::ErrChunkHeaderTooSmall);
                    }
                    params.push(ReconfigParam::Response {
                        reconfig_response_sequence_number: v.get_u32(),
                        result: v.get_u32().into(),
                    });
                }
                _ => trace!("skipping RECONFIG parameter type {typ}"),
            }
        }
        Ok(ChunkReconfig { params })
    }
}

impl ChunkValue for ChunkReconfig {
    fn value_length(&self) -> usize {
        self.params
            .iter()
            .map(|p| param_size(p.value_length()))
            .sum()
    }

    fn marshal_value(&self, buf: &mut BytesMut) {
        for p in &self.params {
            p.marshal(buf);
        }
    }
}
