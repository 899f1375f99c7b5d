//! Heartbeat schedule and liveness clock.
//!
//! Both use `tokio::time::Instant` so paused-clock tests drive them.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use rand::Rng;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::SyncConfig;

/// Delay before the first heartbeat: one interval plus random jitter.
pub(crate) fn first_beat_delay(config: &SyncConfig) -> Duration {
    let jitter_ms = config.heartbeat_jitter.as_millis() as u64;
    let jitter = if jitter_ms > 0 {
        Duration::from_millis(rand::rng().random_range(0..jitter_ms))
    } else {
        Duration::ZERO
    };
    config.heartbeat_interval + jitter
}

/// A ticker firing every `heartbeat_interval`, first after
/// [`first_beat_delay`]. Late ticks are delayed, never bunched.
pub(crate) fn heartbeat_ticker(config: &SyncConfig) -> Interval {
    let start = Instant::now() + first_beat_delay(config);
    let mut ticker = tokio::time::interval_at(start, config.heartbeat_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Tracks when anything was last received on a link.
#[derive(Debug)]
pub(crate) struct Liveness {
    last_activity: Mutex<Instant>,
    timeout: Duration,
}

impl Liveness {
    pub(crate) fn new(timeout: Duration) -> Self {
        Self {
            last_activity: Mutex::new(Instant::now()),
            timeout,
        }
    }

    /// Records incoming traffic. Any message counts, heartbeats included.
    pub(crate) fn touch(&self) {
        *self.last() = Instant::now();
    }

    /// The instant at which the link expires unless touched again.
    pub(crate) fn deadline(&self) -> Instant {
        *self.last() + self.timeout
    }

    pub(crate) fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline()
    }

    fn last(&self) -> std::sync::MutexGuard<'_, Instant> {
        self.last_activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_beat_delay_without_jitter() {
        let config = SyncConfig {
            heartbeat_jitter: Duration::ZERO,
            ..SyncConfig::default()
        };
        assert_eq!(first_beat_delay(&config), Duration::from_secs(5));
    }

    #[test]
    fn test_first_beat_delay_within_jitter() {
        let config = SyncConfig::default();
        for _ in 0..100 {
            let d = first_beat_delay(&config);
            assert!(d >= Duration::from_secs(5));
            assert!(d < Duration::from_secs(5) + Duration::from_millis(250));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_period() {
        let config = SyncConfig {
            heartbeat_jitter: Duration::ZERO,
            ..SyncConfig::default()
        };
        let start = Instant::now();
        let mut ticker = heartbeat_ticker(&config);
        ticker.tick().await;
        assert_eq!(start.elapsed(), Duration::from_secs(5));
        ticker.tick().await;
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_liveness_expires_after_timeout() {
        let live = Liveness::new(Duration::from_secs(15));
        tokio::time::advance(Duration::from_secs(14)).await;
        assert!(!live.is_expired());
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(live.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_touch_pushes_deadline() {
        let live = Liveness::new(Duration::from_secs(15));
        tokio::time::advance(Duration::from_secs(10)).await;
        live.touch();
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(!live.is_expired());
        assert_eq!(live.deadline(), Instant::now() + Duration::from_secs(5));
    }
}
