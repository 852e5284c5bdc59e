use crate::record_layer::record_layer_header::MAX_SEQUENCE_NUMBER;

pub(crate) const DEFAULT_REPLAY_PROTECTION_WINDOW: usize = 64;

/// Sliding window replay protection over record sequence numbers.
///
/// `check` only inspects a sequence number. The record is marked as seen by a
/// following `accept` once it was authenticated, so a forged record can not
/// poison the window.
pub(crate) struct ReplayDetector {
    window_size: u64,
    latest_seq: u64,
    window: u64,
    accepted: Option<u64>,
    initialized: bool,
}

impl ReplayDetector {
    pub(crate) fn new(window_size: usize) -> Self {
        ReplayDetector {
            window_size: (window_size as u64).clamp(1, 64),
            latest_seq: 0,
            window: 0,
            accepted: None,
            initialized: false,
        }
    }

    pub(crate) fn check(&mut self, seq: u64) -> bool {
        self.accepted = None;
        if seq > MAX_SEQUENCE_NUMBER {
            return false;
        }

        if !self.initialized || seq > self.latest_seq {
            self.accepted = Some(seq);
            return true;
        }

        let diff = self.latest_seq - seq;
        if diff >= self.window_size {
            return false;
        }
        if self.window & (1u64 << diff) != 0 {
            return false;
        }

        self.accepted = Some(seq);
        true
    }

    pub(crate) fn accept(&mut self) {
        let Some(seq) = self.accepted.take() else {
            return;
        };

        if !self.initialized {
            self.initialized = true;
            self.latest_seq = seq;
            self.window = 1;
        } else if seq > self.latest_seq {
            let shift = seq - self.latest_seq;
            self.window = if shift >= 64 { 0 } else { self.window << shift };
            self.window |= 1;
            self.latest_seq = seq;
        } else {
            self.window |= 1u64 << (self.latest_seq - seq);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn feed(d: &mut ReplayDetector, seq: u64) -> bool {
        let ok = d.check(seq);
        if ok {
            d.accept();
        }
        ok
    }

    #[test]
    fn test_replay_detector() {
        let mut d = ReplayDetector::new(DEFAULT_REPLAY_PROTECTION_WINDOW);

        assert!(feed(&mut d, 0));
        assert!(feed(&mut d, 1));
        assert!(!feed(&mut d, 1), "duplicate must be rejected");
        assert!(feed(&mut d, 10));
        assert!(feed(&mut d, 5), "late but inside the window");
        assert!(!feed(&mut d, 5));
        assert!(feed(&mut d, 100));
        assert!(!feed(&mut d, 10), "too old");
        assert!(feed(&mut d, 37));
        assert!(!feed(&mut d, 36), "exactly one window behind");
    }

    #[test]
    fn test_unaccepted_record_does_not_move_window() {
        let mut d = ReplayDetector::new(DEFAULT_REPLAY_PROTECTION_WINDOW);
        assert!(feed(&mut d, 3));
        assert!(d.check(4));
        // record 4 failed authentication, so no accept
        assert!(d.check(4));
        d.accept();
        assert!(!d.check(4));
    }
}
