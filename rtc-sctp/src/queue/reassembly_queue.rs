use crate::chunk::chunk_payload_data::{ChunkPayloadData, PayloadProtocolIdentifier};
use crate::util::{sna16lt, sna16lte, sna32lt, sna32lte};
use bytes::BytesMut;

/// Fragments of a single user message.
#[derive(Debug, Clone)]
pub(crate) struct ChunkSet {
    pub(crate) ssn: u16,
    pub(crate) ppi: PayloadProtocolIdentifier,
    pub(crate) chunks: Vec<ChunkPayloadData>,
}

impl ChunkSet {
    fn new(ssn: u16, ppi: PayloadProtocolIdentifier) -> Self {
        ChunkSet {
            ssn,
            ppi,
            chunks: vec![],
        }
    }

    /// Inserts in TSN order. Returns false for a duplicate.
    fn push(&mut self, chunk: ChunkPayloadData) -> bool {
        if self.chunks.iter().any(|c| c.tsn == chunk.tsn) {
            return false;
        }
        let pos = self
            .chunks
            .iter()
            .position(|c| sna32lt(chunk.tsn, c.tsn))
            .unwrap_or(self.chunks.len());
        self.chunks.insert(pos, chunk);
        true
    }

    fn is_complete(&self) -> bool {
        let (Some(first), Some(last)) = (self.chunks.first(), self.chunks.last()) else {
            return false;
        };
        if !first.beginning_fragment || !last.ending_fragment {
            return false;
        }
        self.chunks
            .windows(2)
            .all(|w| w[1].tsn == w[0].tsn.wrapping_add(1))
    }

    fn n_bytes(&self) -> usize {
        self.chunks.iter().map(|c| c.user_data.len()).sum()
    }

    fn assemble(self) -> (PayloadProtocolIdentifier, BytesMut) {
        let mut payload = BytesMut::with_capacity(self.n_bytes());
        for c in &self.chunks {
            payload.extend_from_slice(&c.user_data);
        }
        (self.ppi, payload)
    }
}

/// Per-stream reassembly of inbound DATA chunks.
#[derive(Debug, Default)]
pub(crate) struct ReassemblyQueue {
    /// Expected SSN of the next ordered message.
    pub(crate) next_ssn: u16,
    ordered: Vec<ChunkSet>,
    unordered: Vec<ChunkSet>,
    unordered_chunks: Vec<ChunkPayloadData>,
    n_bytes: usize,
}

impl ReassemblyQueue {

    /// Accepts a fragment. Returns false when it was dropped as stale or duplicate.
    pub(crate) fn push(&mut self, chunk: ChunkPayloadData) -> bool {
        let n = chunk.user_data.len();

        if chunk.unordered {
            if self.unordered_chunks.iter().any(|c| c.tsn == chunk.tsn) {
                return false;
            }
            let pos = self
                .unordered_chunks
                .iter()
                .position(|c| sna32lt(chunk.tsn, c.tsn))
                .unwrap_or(self.unordered_chunks.len());
            self.unordered_chunks.insert(pos, chunk);
            self.n_bytes += n;
            self.find_complete_unordered_chunk_sets();
            return true;
        }

        // Already delivered or skipped by FORWARD TSN.
        if sna16lt(chunk.stream_sequence_number, self.next_ssn) {
            return false;
        }

        let ssn = chunk.stream_sequence_number;
        let accepted = match self.ordered.iter_mut().find(|s| s.ssn == ssn) {
            Some(set) => set.push(chunk),
            None => {
                let mut set = ChunkSet::new(ssn, chunk.payload_type);
                set.push(chunk);
                self.ordered.push(set);
                true
            }
        };
        if accepted {
            self.n_bytes += n;
        }
        accepted
    }

    fn find_complete_unordered_chunk_sets(&mut self) {
        let mut start = 0;
        while start < self.unordered_chunks.len() {
            if !self.unordered_chunks[start].beginning_fragment {
                start += 1;
                continue;
            }

            let mut end = None;
            let mut i = start;
            loop {
                if self.unordered_chunks[i].ending_fragment {
                    end = Some(i);
                    break;
                }
                i += 1;
                if i >= self.unordered_chunks.len()
                    || self.unordered_chunks[i].beginning_fragment
                    || self.unordered_chunks[i].tsn
                        != self.unordered_chunks[i - 1].tsn.wrapping_add(1)
                {
                    break;
                }
            }

            match end {
                Some(end) => {
                    let chunks: Vec<ChunkPayloadData> =
                        self.unordered_chunks.drain(start..=end).collect();
                    let mut set = ChunkSet::new(0, chunks[0].payload_type);
                    set.chunks = chunks;
                    self.unordered.push(set);
                }
                None => start += 1,
            }
        }
    }

    /// Pops the next deliverable message.
    pub(crate) fn read(&mut self) -> Option<(PayloadProtocolIdentifier, BytesMut)> {
        let set = if !self.unordered.is_empty() {
            self.unordered.remove(0)
        } else {
            let pos = self
                .ordered
                .iter()
                .position(|s| s.ssn == self.next_ssn && s.is_complete())?;
            self.next_ssn = self.next_ssn.wrapping_add(1);
            self.ordered.remove(pos)
        };

        self.n_bytes -= set.n_bytes();
        Some(set.assemble())
    }

    /// Skips ordered messages up to and including `last_ssn`.
    pub(crate) fn forward_tsn_for_ordered(&mut self, last_ssn: u16) {
        let mut n_bytes = 0;
        self.ordered.retain(|s| {
            let keep = !sna16lte(s.ssn, last_ssn);
            if !keep {
                n_bytes += s.n_bytes();
            }
            keep
        });
        self.n_bytes -= n_bytes;

        if sna16lte(self.next_ssn, last_ssn) {
            self.next_ssn = last_ssn.wrapping_add(1);
        }
    }

    /// Drops unordered fragments that can no longer complete.
    pub(crate) fn forward_tsn_for_unordered(&mut self, new_cumulative_tsn: u32) {
        let mut n_bytes = 0;
        self.unordered_chunks.retain(|c| {
            let keep = !sna32lte(c.tsn, new_cumulative_tsn);
            if !keep {
                n_bytes += c.user_data.len();
            }
            keep
        });
        self.n_bytes -= n_bytes;
    }

    /// Discards everything and restarts the SSN space.
    pub(crate) fn reset(&mut self) {
        self.ordered.clear();
        self.unordered.clear();
        self.unordered_chunks.clear();
        self.n_bytes = 0;
        self.next_ssn = 0;
    }

    pub(crate) fn buffered_amount(&self) -> usize {
        self.n_bytes
    }
}
