use std::collections::HashMap;

use crate::content::ContentType;
use crate::handshake::handshake_header::*;
use crate::record_layer::record_layer_header::*;
use shared::error::*;

// Bounds the number of out-of-order messages kept in memory.
const FRAGMENT_BUFFER_MAX_SIZE: usize = 2_000_000;

struct Fragment {
    handshake_header: HandshakeHeader,
    data: Vec<u8>,
}

/// Reassembles handshake fragments and hands out complete messages strictly in
/// message_seq order.
#[derive(Default)]
pub(crate) struct FragmentBuffer {
    cache: HashMap<u16, Vec<Fragment>>,
    current_message_sequence_number: u16,
    size: usize,
    /// Set when a message older than the next expected one arrived, meaning the
    /// peer is retransmitting a flight it believes we never saw.
    retransmit_seen: bool,
}

impl FragmentBuffer {
    pub(crate) fn new() -> Self {
        FragmentBuffer::default()
    }

    /// Returns `Ok(false)` if the record is not a handshake record.
    pub(crate) fn push(&mut self, raw: &[u8]) -> Result<bool> {
        let record_layer_header = RecordLayerHeader::unmarshal(raw)?;
        if record_layer_header.content_type != ContentType::Handshake {
            return Ok(false);
        }

        let mut buf = &raw[RECORD_LAYER_HEADER_SIZE..];
        while !buf.is_empty() {
            let handshake_header = HandshakeHeader::unmarshal(buf)?;
            let end = HANDSHAKE_HEADER_LENGTH + handshake_header.fragment_length as usize;
            if buf.len() < end
                || handshake_header.fragment_offset + handshake_header.fragment_length
                    > handshake_header.length
            {
                return Err(Error::ErrLengthMismatch);
            }

            if handshake_header.message_sequence < self.current_message_sequence_number {
                self.retransmit_seen = true;
            } else if self.size + end <= FRAGMENT_BUFFER_MAX_SIZE {
                let fragments = self
                    .cache
                    .entry(handshake_header.message_sequence)
                    .or_default();
                if !fragments.iter().any(|f| {
                    f.handshake_header.fragment_offset == handshake_header.fragment_offset
                }) {
                    self.size += end;
                    fragments.push(Fragment {
                        handshake_header,
                        data: buf[HANDSHAKE_HEADER_LENGTH..end].to_vec(),
                    });
                }
            }

            buf = &buf[end..];
        }

        Ok(true)
    }

    /// Returns the next complete handshake message, header included.
    pub(crate) fn pop(&mut self) -> Option<Vec<u8>> {
        let fragments = self.cache.get(&self.current_message_sequence_number)?;
        let first = fragments.first()?.handshake_header;

        let mut body = Vec::with_capacity(first.length as usize);
        while (body.len() as u32) < first.length {
            let offset = body.len() as u32;
            let next = fragments.iter().find(|f| {
                f.handshake_header.fragment_offset <= offset
                    && f.handshake_header.fragment_offset + f.handshake_header.fragment_length
                        > offset
            })?;
            let skip = (offset - next.handshake_header.fragment_offset) as usize;
            body.extend_from_slice(&next.data[skip..]);
        }

        let handshake_header = HandshakeHeader {
            fragment_offset: 0,
            fragment_length: first.length,
            ..first
        };
        let mut raw = Vec::with_capacity(HANDSHAKE_HEADER_LENGTH + body.len());
        handshake_header.marshal(&mut raw).ok()?;
        raw.extend_from_slice(&body);

        if let Some(fragments) = self.cache.remove(&self.current_message_sequence_number) {
            self.size -= fragments
                .iter()
                .map(|f| HANDSHAKE_HEADER_LENGTH + f.data.len())
                .sum::<usize>();
        }
        self.current_message_sequence_number += 1;

        Some(raw)
    }

    pub(crate) fn take_retransmit_seen(&mut self) -> bool {
        std::mem::take(&mut self.retransmit_seen)
    }
}
