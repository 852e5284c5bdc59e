use super::chunk_type::{CT_FORWARD_TSN, CT_RECONFIG};
use super::{ChunkValue, marshal_param, param_size, unmarshal_params};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use log::trace;
use shared::error::{Error, Result};

const INIT_CHUNK_MIN_LENGTH: usize = 16;

pub(crate) const PARAM_STATE_COOKIE: u16 = 7;
pub(crate) const PARAM_SUPPORTED_EXTENSIONS: u16 = 0x8008;
pub(crate) const PARAM_FORWARD_TSN_SUPPORTED: u16 = 0xc000;

/// ChunkInit represents an SCTP Chunk of type INIT, or INIT ACK when `is_ack` is set.
///
/// The two chunks share one layout; only INIT ACK carries a state cookie.
///
/// 0                   1                   2                   3
/// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|   Type = 1/2  |  Chunk Flags  |      Chunk Length             |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|                         Initiate Tag                          |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|           Advertised Receiver Window Credit (a_rwnd)          |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|  Number of Outbound Streams   |  Number of Inbound Streams    |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|                          Initial TSN                          |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///\                                                               \
///|              Optional/Variable-Length Parameters              |
///\                                                               \
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ChunkInit {
    pub is_ack: bool,
    pub initiate_tag: u32,
    pub advertised_receiver_window_credit: u32,
    pub num_outbound_streams: u16,
    pub num_inbound_streams: u16,
    pub initial_tsn: u32,
    pub state_cookie: Option<Bytes>,
    pub forward_tsn_supported: bool,
    pub supported_extensions: Vec<u8>,
}

impl ChunkInit {
    /// Advertises partial reliability and stream reconfiguration.
    pub(crate) fn with_extensions(mut self) -> Self {
        self.forward_tsn_supported = true;
        self.supported_extensions = vec![CT_RECONFIG.0, CT_FORWARD_TSN.0];
        self
    }

    pub(crate) fn unmarshal(is_ack: bool, mut value: &[u8]) -> Result<Self> {
        if value.len() < INIT_CHUNK_MIN_LENGTH {
            return Err(Error::ErrChunkHeaderTooSmall);
        }

        let mut init = ChunkInit {
            is_ack,
            initiate_tag: value.get_u32(),
            advertised_receiver_window_credit: value.get_u32(),
            num_outbound_streams: value.get_u16(),
            num_inbound_streams: value.get_u16(),
            initial_tsn: value.get_u32(),
            ..Default::default()
        };

        for (typ, v) in unmarshal_params(value)? {
            match typ {
                PARAM_STATE_COOKIE => init.state_cookie = Some(Bytes::copy_from_slice(v)),
                PARAM_SUPPORTED_EXTENSIONS => init.supported_extensions = v.to_vec(),
                PARAM_FORWARD_TSN_SUPPORTED => init.forward_tsn_supported = true,
                _ => trace!("skipping INIT parameter type {typ}"),
            }
        }

        Ok(init)
    }
}

impl ChunkValue for ChunkInit {
    fn value_length(&self) -> usize {
        let mut l = INIT_CHUNK_MIN_LENGTH;
        if let Some(cookie) = &self.state_cookie {
            l += param_size(cookie.len());
        }
        if !self.supported_extensions.is_empty() {
            l += param_size(self.supported_extensions.len());
        }
        if self.forward_tsn_supported {
            l += param_size(0);
        }
        l
    }

    fn marshal_value(&self, buf: &mut BytesMut) {
        buf.put_u32(self.initiate_tag);
        buf.put_u32(self.advertised_receiver_window_credit);
        buf.put_u16(self.num_outbound_streams);
        buf.put_u16(self.num_inbound_streams);
        buf.put_u32(self.initial_tsn);
        if let Some(cookie) = &self.state_cookie {
            marshal_param(buf, PARAM_STATE_COOKIE, cookie);
        }
        if !self.supported_extensions.is_empty() {
            marshal_param(buf, PARAM_SUPPORTED_EXTENSIONS, &self.supported_extensions);
        }
        if self.forward_tsn_supported {
            marshal_param(buf, PARAM_FORWARD_TSN_SUPPORTED, &[]);
        }
    }
}
