//! Link timing configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// The protocol version this build speaks.
pub const PROTOCOL_VERSION: &str = "1";

/// Timing and version settings shared by host and remote links.
///
/// The four timeouts are independent of each other; they live in one struct
/// so tests can shrink all of them at once (see [`SyncConfig::fast`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Bound on establishing the outbound TCP connection (remote side).
    pub connect_timeout: Duration,
    /// Bound on waiting for the other side's handshake message.
    pub handshake_timeout: Duration,
    /// Period of outgoing `HEARTBEAT` messages.
    pub heartbeat_interval: Duration,
    /// A link with no incoming traffic for this long is torn down.
    pub read_timeout: Duration,
    /// Version string sent in `HELLO` and `WELCOME`.
    pub protocol_version: String,
    /// Random 0..jitter delay added to the first heartbeat so many links
    /// opened at once do not beat in lockstep.
    pub heartbeat_jitter: Duration,
    /// Outgoing messages a link may hold while its peer is slow to read.
    /// A link whose queue overflows is torn down.
    pub send_queue: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            handshake_timeout: Duration::from_secs(15),
            heartbeat_interval: Duration::from_secs(5),
            read_timeout: Duration::from_secs(15),
            protocol_version: PROTOCOL_VERSION.to_string(),
            heartbeat_jitter: Duration::from_millis(250),
            send_queue: 256,
        }
    }
}

impl SyncConfig {
    const MIN_DURATION: Duration = Duration::from_millis(1);

    /// Millisecond-scale timings for tests.
    pub fn fast() -> Self {
        Self {
            connect_timeout: Duration::from_millis(500),
            handshake_timeout: Duration::from_millis(300),
            heartbeat_interval: Duration::from_millis(50),
            read_timeout: Duration::from_millis(200),
            heartbeat_jitter: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Clamp and fix any out-of-range values so the config is safe to use.
    ///
    /// - Zero timeouts and intervals are raised to 1 ms.
    /// - `read_timeout` must exceed `heartbeat_interval`, otherwise a
    ///   healthy peer would be timed out between two beats; it is raised
    ///   to three intervals.
    /// - An empty `protocol_version` falls back to [`PROTOCOL_VERSION`].
    /// - A zero `send_queue` is raised to 1.
    pub fn validated(mut self) -> Self {
        for d in [
            &mut self.connect_timeout,
            &mut self.handshake_timeout,
            &mut self.heartbeat_interval,
            &mut self.read_timeout,
        ] {
            if *d < Self::MIN_DURATION {
                *d = Self::MIN_DURATION;
            }
        }
        if self.read_timeout <= self.heartbeat_interval {
            warn!(
                read_timeout = ?self.read_timeout,
                heartbeat_interval = ?self.heartbeat_interval,
                "read_timeout not above heartbeat_interval, raising it"
            );
            self.read_timeout = self.heartbeat_interval * 3;
        }
        if self.protocol_version.is_empty() {
            self.protocol_version = PROTOCOL_VERSION.to_string();
        }
        self.send_queue = self.send_queue.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_config_default() {
        let config = SyncConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.handshake_timeout, Duration::from_secs(15));
        assert_eq!(config.heartbeat_interval, Duration::from_secs(5));
        assert_eq!(config.read_timeout, Duration::from_secs(15));
        assert_eq!(config.protocol_version, "1");
        assert_eq!(config.send_queue, 256);
    }

    #[test]
    fn test_validated_keeps_sane_config() {
        let config = SyncConfig::default();
        assert_eq!(config.clone().validated(), config);
        let fast = SyncConfig::fast();
        assert_eq!(fast.clone().validated(), fast);
    }

    #[test]
    fn test_validated_raises_zero_durations() {
        let config = SyncConfig {
            connect_timeout: Duration::ZERO,
            heartbeat_interval: Duration::ZERO,
            ..SyncConfig::default()
        }
        .validated();
        assert_eq!(config.connect_timeout, Duration::from_millis(1));
        assert_eq!(config.heartbeat_interval, Duration::from_millis(1));

        let config = SyncConfig {
            send_queue: 0,
            ..SyncConfig::default()
        }
        .validated();
        assert_eq!(config.send_queue, 1);
    }

    #[test]
    fn test_validated_read_timeout_exceeds_heartbeat() {
        let config = SyncConfig {
            heartbeat_interval: Duration::from_secs(5),
            read_timeout: Duration::from_secs(5),
            ..SyncConfig::default()
        }
        .validated();
        assert_eq!(config.read_timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_validated_restores_empty_version() {
        let config = SyncConfig {
            protocol_version: String::new(),
            ..SyncConfig::default()
        }
        .validated();
        assert_eq!(config.protocol_version, PROTOCOL_VERSION);
    }
}
