use std::time::{Duration, Instant};

/// rtoManager manages Rtx timeout values.
/// This is an implementation of RFC 4960 sec 6.3.1.
#[derive(Debug, Clone)]
pub(crate) struct RtoManager {
    srtt: f64,
    rttvar: f64,
    rto: Duration,
    rto_min: Duration,
    rto_max: Duration,
}

const RTO_ALPHA: f64 = 0.125;
const RTO_BETA: f64 = 0.25;

impl RtoManager {
    pub(crate) fn new(rto_initial: Duration, rto_min: Duration, rto_max: Duration) -> Self {
        RtoManager {
            srtt: 0.0,
            rttvar: 0.0,
            rto: rto_initial,
            rto_min,
            rto_max,
        }
    }

    /// Takes a newly measured RTT and returns the smoothed RTT in milliseconds.
    pub(crate) fn set_new_rtt(&mut self, rtt: Duration) -> f64 {
        let r = rtt.as_micros() as f64 / 1000.0;
        if self.srtt == 0.0 {
            // First measurement
            self.srtt = r;
            self.rttvar = r / 2.0;
        } else {
            // Subsequent rtt measurement
            self.rttvar = (1.0 - RTO_BETA) * self.rttvar + RTO_BETA * (self.srtt - r).abs();
            self.srtt = (1.0 - RTO_ALPHA) * self.srtt + RTO_ALPHA * r;
        }

        let rto = Duration::from_millis((self.srtt + 4.0 * self.rttvar).round() as u64);
        self.rto = rto.clamp(self.rto_min, self.rto_max);
        self.srtt
    }

    pub(crate) fn get_rto(&self) -> Duration {
        self.rto
    }

    pub(crate) fn rto_max(&self) -> Duration {
        self.rto_max
    }
}

pub(crate) fn calculate_next_timeout(rto: Duration, n_rtos: usize, rto_max: Duration) -> Duration {
    // RFC 4960 Sec 6.3.3.  Handle T3-rtx Expiration
    //   E2)  For the destination address for which the timer expires, set RTO
    //        <- RTO * 2 ("back off the timer").  The maximum value discussed
    //        in rule C7 above (RTO.max) may be used to provide an upper bound
    //        to this doubling operation.
    rto.saturating_mul(1u32 << n_rtos.min(31)).min(rto_max)
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum RtxTimerId {
    T1Init,
    T1Cookie,
    T3RTX,
    Reconfig,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum TimerOutcome {
    NotExpired,
    /// The timer fired for the n-th time and was re-armed with backoff.
    Expired(usize),
    /// The maximum number of retransmissions was exceeded.
    Failure,
}

/// rtxTimer provides the retnransmission timer conforms with RFC 4960 Sec 6.3.1
#[derive(Debug, Clone)]
pub(crate) struct RtxTimer {
    pending_timeout: Option<Instant>,
    n_rtos: usize,
    max_retrans: Option<usize>,
}

impl RtxTimer {
    pub(crate) fn new(max_retrans: Option<usize>) -> Self {
        RtxTimer {
            pending_timeout: None,
            n_rtos: 0,
            max_retrans,
        }
    }

    /// Arms the timer unless it is already running. Returns whether it was armed.
    pub(crate) fn start(&mut self, now: Instant, rto: Duration, rto_max: Duration) -> bool {
        if self.is_running() {
            return false;
        }
        self.pending_timeout = Some(now + calculate_next_timeout(rto, self.n_rtos, rto_max));
        true
    }

    pub(crate) fn stop(&mut self) {
        self.pending_timeout = None;
        self.n_rtos = 0;
    }

    pub(crate) fn restart(&mut self, now: Instant, rto: Duration, rto_max: Duration) {
        self.stop();
        self.start(now, rto, rto_max);
    }

    pub(crate) fn is_running(&self) -> bool {
        self.pending_timeout.is_some()
    }

    pub(crate) fn poll_timeout(&self) -> Option<Instant> {
        self.pending_timeout
    }

    pub(crate) fn handle_timeout(
        &mut self,
        now: Instant,
        rto: Duration,
        rto_max: Duration,
    ) -> TimerOutcome {
        match self.pending_timeout {
            Some(timeout) if timeout <= now => {}
            _ => return TimerOutcome::NotExpired,
        }

        self.n_rtos += 1;
        if let Some(max_retrans) = self.max_retrans {
            if self.n_rtos > max_retrans {
                self.pending_timeout = None;
                return TimerOutcome::Failure;
            }
        }

        self.pending_timeout = Some(now + calculate_next_timeout(rto, self.n_rtos, rto_max));
        TimerOutcome::Expired(self.n_rtos)
    }
}
