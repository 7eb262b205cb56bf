//! Wall-clock aligned epochs.
//!
//! Peers schedule independently, so ticks fall on multiples of the period since the Unix
//! epoch rather than on intervals from process start. Two devices with roughly synced
//! clocks then gossip and run consensus rounds at the same moments.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EpochClock {
    period_ms: u64,
}

impl EpochClock {
    pub fn new(period: Duration) -> Self {
        Self {
            period_ms: (period.as_millis() as u64).max(1),
        }
    }

    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    /// Start of the epoch containing `now_ms`.
    pub fn boundary_at(&self, now_ms: u64) -> u64 {
        now_ms - now_ms % self.period_ms
    }

    /// First boundary strictly after `now_ms`.
    pub fn next_boundary(&self, now_ms: u64) -> u64 {
        self.boundary_at(now_ms) + self.period_ms
    }

    pub fn delay_from(&self, now_ms: u64) -> Duration {
        Duration::from_millis(self.next_boundary(now_ms) - now_ms)
    }

    pub fn delay_until_next(&self) -> Duration {
        self.delay_from(now_ms())
    }

    /// Boundary following an already-fired `boundary`, never earlier than the next
    /// boundary after now. Guards against re-firing when a timer wakes a little early.
    pub fn following(&self, boundary: u64) -> u64 {
        self.next_boundary(boundary.max(now_ms()))
    }

    /// Sleep until the next boundary and return it in Unix milliseconds.
    pub async fn tick(&self) -> u64 {
        let now = now_ms();
        tokio::time::sleep(self.delay_from(now)).await;
        self.next_boundary(now)
    }
}

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
