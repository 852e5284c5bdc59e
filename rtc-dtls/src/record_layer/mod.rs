#[cfg(test)]
mod record_layer_test;

pub mod record_layer_header;

use record_layer_header::*;

use crate::content::*;
use shared::error::*;

/// The record layer, see
/// <https://tools.ietf.org/html/rfc4347#section-4.1>
#[derive(Debug, Clone, PartialEq)]
pub struct RecordLayer {
    pub record_layer_header: RecordLayerHeader,
    pub content: Content,
}

impl RecordLayer {
    pub fn new(protocol_version: ProtocolVersion, epoch: u16, content: Content) -> Self {
        RecordLayer {
            record_layer_header: RecordLayerHeader {
                content_type: content.content_type(),
                protocol_version,
                epoch,
                sequence_number: 0,
                content_len: 0,
            },
            content,
        }
    }

    /// Serializes header and content, filling in the content length.
    pub fn marshal(&self) -> Result<Vec<u8>> {
        let content = self.content.marshal()?;
        let header = RecordLayerHeader {
            content_len: u16::try_from(content.len()).map_err(|_| Error::ErrLengthMismatch)?,
            ..self.record_layer_header
        };

        let mut raw = Vec::with_capacity(RECORD_LAYER_HEADER_SIZE + content.len());
        header.marshal(&mut raw)?;
        raw.extend_from_slice(&content);
        Ok(raw)
    }

    pub fn unmarshal(raw: &[u8]) -> Result<Self> {
        let record_layer_header = RecordLayerHeader::unmarshal(raw)?;
        let end = RECORD_LAYER_HEADER_SIZE + record_layer_header.content_len as usize;
        if raw.len() < end {
            return Err(Error::ErrBufferTooSmall);
        }
        let content = Content::unmarshal(
            record_layer_header.content_type,
            &raw[RECORD_LAYER_HEADER_SIZE..end],
        )?;

        Ok(RecordLayer {
            record_layer_header,
            content,
        })
    }
}

/// Splits a datagram into the records it carries.
/// Multiple DTLS records may be placed in a single datagram, see
/// <https://tools.ietf.org/html/rfc6347#section-4.1.1>
pub(crate) fn unpack_datagram(buf: &[u8]) -> Result<Vec<Vec<u8>>> {
    let mut out = vec![];

    let mut offset = 0;
    while buf.len() != offset {
        if buf.len() - offset <= RECORD_LAYER_HEADER_SIZE {
            return Err(Error::ErrBufferTooSmall);
        }

        let pkt_len = RECORD_LAYER_HEADER_SIZE
            + (((buf[offset + RECORD_LAYER_HEADER_SIZE - 2] as usize) << 8)
                | buf[offset + RECORD_LAYER_HEADER_SIZE - 1] as usize);
        if offset + pkt_len > buf.len() {
            return Err(Error::ErrLengthMismatch);
        }

        out.push(buf[offset..offset + pkt_len].to_vec());
        offset += pkt_len;
    }

    Ok(out)
}
