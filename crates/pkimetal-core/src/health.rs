//! Health observer (C8): liveness/readiness derived from three monotonic timestamps, mirroring
//! the reference implementation's `UpdateLatestTimestamps`/`IsAlive`/`IsReady`.

use std::sync::RwLock;
use std::time::{Duration, Instant};

struct Timestamps {
    latest_non_error: Instant,
    latest_error: Instant,
    latest_busy: Instant,
}

/// Tracks the most recent success, failure, and "request timed out waiting for a free worker"
/// events. Liveness fails once errors have been more recent than successes; readiness fails
/// while a busy event is still within `remember_busy_timeout` of now.
pub struct HealthObserver {
    timestamps: RwLock<Timestamps>,
    remember_busy_timeout: Duration,
}

impl HealthObserver {
    pub fn new(remember_busy_timeout: Duration) -> Self {
        let epoch = Instant::now() - Duration::from_secs(365 * 24 * 3600);
        Self {
            timestamps: RwLock::new(Timestamps {
                latest_non_error: epoch,
                latest_error: epoch,
                latest_busy: epoch,
            }),
            remember_busy_timeout,
        }
    }

    pub fn record_success(&self) {
        self.update(Some(Instant::now()), None, None);
    }

    pub fn record_error(&self) {
        self.update(None, Some(Instant::now()), None);
    }

    pub fn record_busy(&self) {
        self.update(None, None, Some(Instant::now()));
    }

    fn update(&self, non_error: Option<Instant>, error: Option<Instant>, busy: Option<Instant>) {
        let mut ts = self.timestamps.write().expect("health timestamp lock poisoned");
        if let Some(t) = non_error {
            if t > ts.latest_non_error {
                ts.latest_non_error = t;
            }
        }
        if let Some(t) = error {
            if t > ts.latest_error {
                ts.latest_error = t;
            }
        }
        if let Some(t) = busy {
            if t > ts.latest_busy {
                ts.latest_busy = t;
            }
        }
    }

    /// Alive as long as the most recent event wasn't an error more recent than any success.
    pub fn is_alive(&self) -> bool {
        let ts = self.timestamps.read().expect("health timestamp lock poisoned");
        ts.latest_non_error >= ts.latest_error
    }

    /// Ready as long as no worker pool has reported "busy" within the remember-busy window.
    pub fn is_ready(&self) -> bool {
        let ts = self.timestamps.read().expect("health timestamp lock poisoned");
        ts.latest_busy + self.remember_busy_timeout < Instant::now()
    }
}

impl Default for HealthObserver {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_alive_and_ready() {
        let h = HealthObserver::default();
        assert!(h.is_alive());
        assert!(h.is_ready());
    }

    #[test]
    fn error_after_success_makes_it_not_alive() {
        let h = HealthObserver::default();
        h.record_success();
        h.record_error();
        assert!(!h.is_alive());
    }

    #[test]
    fn success_after_error_restores_alive() {
        let h = HealthObserver::default();
        h.record_error();
        h.record_success();
        assert!(h.is_alive());
    }

    #[test]
    fn busy_makes_it_not_ready_until_the_window_elapses() {
        let h = HealthObserver::new(Duration::from_millis(50));
        h.record_busy();
        assert!(!h.is_ready());
        std::thread::sleep(Duration::from_millis(80));
        assert!(h.is_ready());
    }
}
