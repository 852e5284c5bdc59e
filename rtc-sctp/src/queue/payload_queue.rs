use crate::chunk::chunk_payload_data::ChunkPayloadData;
use crate::stream::ReliabilityType;
use crate::util::sna32lte;
use std::collections::VecDeque;
use std::time::Instant;

/// A DATA chunk owned by the sender until the peer acknowledges or it is abandoned.
#[derive(Debug, Clone)]
pub(crate) struct OutboundChunk {
    pub(crate) chunk: ChunkPayloadData,
    /// Fragments of one user message share this id.
    pub(crate) message_id: u64,
    /// When the user message was written.
    pub(crate) since: Instant,
    pub(crate) sent_at: Option<Instant>,
    pub(crate) nsent: u32,
    pub(crate) acked: bool,
    pub(crate) abandoned: bool,
    pub(crate) retransmit: bool,
    pub(crate) reliability_type: ReliabilityType,
    pub(crate) reliability_value: u32,
}

impl OutboundChunk {
    pub(crate) fn is_outstanding(&self) -> bool {
        self.nsent > 0 && !self.acked && !self.abandoned
    }

    pub(crate) fn len(&self) -> usize {
        self.chunk.user_data.len()
    }
}

/// Outbound chunks in TSN order, from the first unacknowledged TSN onward.
#[derive(Debug, Default)]
pub(crate) struct PayloadQueue {
    chunks: VecDeque<OutboundChunk>,
}

impl PayloadQueue {
    pub(crate) fn push(&mut self, c: OutboundChunk) {
        self.chunks.push_back(c);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.chunks.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &OutboundChunk> {
        self.chunks.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut OutboundChunk> {
        self.chunks.iter_mut()
    }

    /// Removes every chunk up to and including `cumulative_tsn_ack`.
    pub(crate) fn pop_through(&mut self, cumulative_tsn_ack: u32) -> Vec<OutboundChunk> {
        let mut popped = vec![];
        while let Some(front) = self.chunks.front() {
            if !sna32lte(front.chunk.tsn, cumulative_tsn_ack) {
                break;
            }
            if let Some(c) = self.chunks.pop_front() {
                popped.push(c);
            }
        }
        popped
    }

    /// Marks the chunks covered by `[start, end]` as acknowledged.
    /// Returns the chunks that were newly acknowledged.
    pub(crate) fn mark_acked(&mut self, start: u32, end: u32) -> Vec<&mut OutboundChunk> {
        self.chunks
            .iter_mut()
            .filter(|c| {
                !c.acked && sna32lte(start, c.chunk.tsn) && sna32lte(c.chunk.tsn, end)
            })
            .map(|c| {
                c.acked = true;
                c.retransmit = false;
                c
            })
            .collect()
    }

    /// Bytes sent but neither acknowledged nor abandoned.
    pub(crate) fn outstanding_bytes(&self) -> usize {
        self.chunks
            .iter()
            .filter(|c| c.is_outstanding())
            .map(|c| c.len())
            .sum()
    }

    pub(crate) fn has_outstanding(&self) -> bool {
        self.chunks.iter().any(|c| c.is_outstanding())
    }

    pub(crate) fn clear(&mut self) {
        self.chunks.clear();
    }
}
