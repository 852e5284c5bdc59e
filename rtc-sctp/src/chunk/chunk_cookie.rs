use super::ChunkValue;
use bytes::{BufMut, Bytes, BytesMut};

/// COOKIE ECHO returns the state cookie received in INIT ACK.
///
/// COOKIE ACK has no value and is represented by `Chunk::CookieAck`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ChunkCookieEcho {
    pub cookie: Bytes,
}

impl ChunkCookieEcho {
    pub(crate) fn unmarshal(value: &[u8]) -> Self {
        ChunkCookieEcho {
            cookie: Bytes::copy_from_slice(value),
        }
    }
}

impl ChunkValue for ChunkCookieEcho {
    fn value_length(&self) -> usize {
        self.cookie.len()
    }

    fn marshal_value(&self, buf: &mut BytesMut) {
        buf.put_slice(&self.cookie);
    }
}
