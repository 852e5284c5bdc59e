use super::rtx_timer::*;
use std::time::{Duration, Instant};

#[test]
fn test_rto_manager_initial_values() {
    let m = RtoManager::new(
        Duration::from_secs(1),
        Duration::from_millis(200),
        Duration::from_secs(60),
    );
    assert_eq!(m.get_rto(), Duration::from_secs(1));
}

#[test]
fn test_rto_manager_first_and_subsequent_measurements() {
    let mut m = RtoManager::new(
        Duration::from_secs(1),
        Duration::from_millis(200),
        Duration::from_secs(60),
    );

    // srtt = 600, rttvar = 300, rto = 600 + 4 * 300
    let srtt = m.set_new_rtt(Duration::from_millis(600));
    assert_eq!(srtt, 600.0);
    assert_eq!(m.get_rto(), Duration::from_millis(1800));

    // rttvar = 0.75 * 300 + 0.25 * 0 = 225, srtt = 600
    m.set_new_rtt(Duration::from_millis(600));
    assert_eq!(m.get_rto(), Duration::from_millis(1500));
}

#[test]
fn test_rto_manager_clamps_to_bounds() {
    let mut m = RtoManager::new(
        Duration::from_secs(1),
        Duration::from_millis(200),
        Duration::from_secs(3),
    );
    m.set_new_rtt(Duration::from_millis(10));
    assert_eq!(m.get_rto(), Duration::from_millis(200));

    let mut m = RtoManager::new(
        Duration::from_secs(1),
        Duration::from_millis(200),
        Duration::from_secs(3),
    );
    m.set_new_rtt(Duration::from_secs(10));
    assert_eq!(m.get_rto(), Duration::from_secs(3));
}

#[test]
fn test_calculate_next_timeout() {
    let max = Duration::from_secs(60);
    let rto = Duration::from_secs(1);
    assert_eq!(calculate_next_timeout(rto, 0, max), Duration::from_secs(1));
    assert_eq!(calculate_next_timeout(rto, 1, max), Duration::from_secs(2));
    assert_eq!(calculate_next_timeout(rto, 3, max), Duration::from_secs(8));
    assert_eq!(calculate_next_timeout(rto, 10, max), max);
    assert_eq!(calculate_next_timeout(rto, 100, max), max);
}

#[test]
fn test_rtx_timer_backoff_and_failure() {
    let now = Instant::now();
    let rto = Duration::from_secs(1);
    let max = Duration::from_secs(60);
    let mut t = RtxTimer::new(Some(2));

    assert!(t.start(now, rto, max));
    assert!(!t.start(now, rto, max), "already running");
    assert_eq!(t.poll_timeout(), Some(now + rto));

    assert_eq!(
        t.handle_timeout(now + Duration::from_millis(500), rto, max),
        TimerOutcome::NotExpired
    );

    let t1 = now + rto;
    assert_eq!(t.handle_timeout(t1, rto, max), TimerOutcome::Expired(1));
    assert_eq!(t.poll_timeout(), Some(t1 + Duration::from_secs(2)));

    let t2 = t1 + Duration::from_secs(2);
    assert_eq!(t.handle_timeout(t2, rto, max), TimerOutcome::Expired(2));
    assert_eq!(t.poll_timeout(), Some(t2 + Duration::from_secs(4)));

    let t3 = t2 + Duration::from_secs(4);
    assert_eq!(t.handle_timeout(t3, rto, max), TimerOutcome::Failure);
    assert!(!t.is_running());
}

#[test]
fn test_rtx_timer_stop_resets_backoff() {
    let now = Instant::now();
    let rto = Duration::from_secs(1);
    let max = Duration::from_secs(60);
    let mut t = RtxTimer::new(None);

    t.start(now, rto, max);
    assert_eq!(t.handle_timeout(now + rto, rto, max), TimerOutcome::Expired(1));
    t.restart(now + rto, rto, max);
    assert_eq!(t.poll_timeout(), Some(now + rto + rto));
}
