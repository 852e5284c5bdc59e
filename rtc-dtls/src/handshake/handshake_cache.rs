use super::*;

#[derive(Clone, Debug)]
struct HandshakeCacheItem {
    typ: HandshakeType,
    is_client: bool,
    message_sequence: u16,
    data: Vec<u8>,
}

/// Rule used to select a message out of the cache: its type and who sent it.
#[derive(Copy, Clone, Debug)]
pub(crate) struct HandshakeCachePullRule {
    pub(crate) typ: HandshakeType,
    pub(crate) is_client: bool,
}

pub(crate) const fn rule(typ: HandshakeType, is_client: bool) -> HandshakeCachePullRule {
    HandshakeCachePullRule { typ, is_client }
}

/// Every handshake message sent or received, kept for signing and for the
/// Finished verify_data.
#[derive(Default, Clone, Debug)]
pub(crate) struct HandshakeCache {
    cache: Vec<HandshakeCacheItem>,
}

impl HandshakeCache {
    pub(crate) fn new() -> Self {
        HandshakeCache { cache: vec![] }
    }

    /// Stores a raw message. Retransmitted copies are ignored.
    pub(crate) fn push(
        &mut self,
        data: Vec<u8>,
        message_sequence: u16,
        typ: HandshakeType,
        is_client: bool,
    ) {
        if self
            .cache
            .iter()
            .any(|i| i.is_client == is_client && i.message_sequence == message_sequence)
        {
            return;
        }

        self.cache.push(HandshakeCacheItem {
            typ,
            is_client,
            message_sequence,
            data,
        });
    }

    fn find(&self, r: &HandshakeCachePullRule) -> Option<&HandshakeCacheItem> {
        self.cache
            .iter()
            .find(|i| i.typ == r.typ && i.is_client == r.is_client)
    }

    /// Returns the parsed messages matching `rules`, or `None` until all of them arrived.
    pub(crate) fn pull(&self, rules: &[HandshakeCachePullRule]) -> Result<Option<Vec<Handshake>>> {
        let mut out = vec![];
        for r in rules {
            let Some(item) = self.find(r) else {
                return Ok(None);
            };
            out.push(Handshake::unmarshal(&item.data)?);
        }
        Ok(Some(out))
    }

    /// Concatenates the raw messages matching `rules`, skipping absent ones.
    pub(crate) fn pull_and_merge(&self, rules: &[HandshakeCachePullRule]) -> Vec<u8> {
        let mut merged = vec![];
        for r in rules {
            if let Some(item) = self.find(r) {
                merged.extend_from_slice(&item.data);
            }
        }
        merged
    }
}
