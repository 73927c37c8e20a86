//! Centralized configuration for Shoal.
//!
//! All tunable tracker and client parameters live here instead of being
//! scattered through the protocol code.

use std::env::VarError;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use crate::tracker::protocol::constants::{
    DEFAULT_ANNOUNCE_INTERVAL, DEFAULT_NUM_WANT, MIN_ANNOUNCE_INTERVAL,
};
use crate::{Result, ShoalError};

/// Central configuration for all Shoal components.
///
/// Supports environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct ShoalConfig {
    pub tracker: TrackerConfig,
    pub client: ClientConfig,
}

/// Tracker communication configuration.
///
/// Controls request timeouts, announce pacing and the values sent with
/// every announce.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Upper bound on one HTTP request or UDP round trip
    pub request_timeout: Duration,
    /// Wait before the very first announce
    pub initial_announce_delay: Duration,
    /// Used when a tracker answers with interval 0
    pub default_announce_interval: Duration,
    /// Lower clamp for tracker-supplied intervals
    pub min_announce_interval: Duration,
    /// Peers requested per announce, negative for the tracker default
    pub num_want: i32,
    /// TCP port advertised to trackers
    pub listen_port: u16,
    /// User agent for HTTP requests
    pub user_agent: &'static str,
    /// Receive buffer for UDP announce replies
    pub udp_response_buffer: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            initial_announce_delay: Duration::from_secs(1),
            default_announce_interval: Duration::from_secs(u64::from(DEFAULT_ANNOUNCE_INTERVAL)),
            min_announce_interval: Duration::from_secs(u64::from(MIN_ANNOUNCE_INTERVAL)),
            num_want: DEFAULT_NUM_WANT,
            listen_port: 6881,
            user_agent: concat!("shoal/", env!("CARGO_PKG_VERSION")),
            udp_response_buffer: 4096, // ~678 peers
        }
    }
}

impl TrackerConfig {
    /// Turns a tracker-supplied interval in seconds into the wait before the
    /// next announce.
    pub fn announce_interval(&self, seconds: u32) -> Duration {
        if seconds == 0 {
            return self.default_announce_interval;
        }
        Duration::from_secs(u64::from(seconds)).max(self.min_announce_interval)
    }
}

/// Client identity configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Azureus-style prefix of every generated peer id
    pub peer_id_prefix: [u8; 8],
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            peer_id_prefix: *b"-SH0001-",
        }
    }
}

impl ShoalConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// # Errors
    /// - `ShoalError::Configuration` - An override is set but does not parse
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(seconds) = env_override::<u64>("SHOAL_TRACKER_TIMEOUT")? {
            config.tracker.request_timeout = Duration::from_secs(seconds);
        }
        if let Some(count) = env_override::<i32>("SHOAL_NUM_WANT")? {
            config.tracker.num_want = count;
        }
        if let Some(port) = env_override::<u16>("SHOAL_LISTEN_PORT")? {
            config.tracker.listen_port = port;
        }
        if let Some(millis) = env_override::<u64>("SHOAL_INITIAL_ANNOUNCE_DELAY_MS")? {
            config.tracker.initial_announce_delay = Duration::from_millis(millis);
        }

        Ok(config)
    }

    /// Creates a configuration optimized for testing.
    ///
    /// Short timeouts and no initial delay so unreachable trackers fail fast.
    pub fn for_testing() -> Self {
        Self {
            tracker: TrackerConfig {
                request_timeout: Duration::from_secs(2),
                initial_announce_delay: Duration::ZERO,
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

/// Parsed value of environment variable `name`, `None` when unset.
fn env_override<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|e| ShoalError::Configuration {
                reason: format!("{name}={value:?}: {e}"),
            }),
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(_)) => Err(ShoalError::Configuration {
            reason: format!("{name} is not valid UTF-8"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = ShoalConfig::default();

        assert_eq!(&config.client.peer_id_prefix, b"-SH0001-");
        assert_eq!(config.tracker.request_timeout, Duration::from_secs(30));
        assert_eq!(config.tracker.initial_announce_delay, Duration::from_secs(1));
        assert_eq!(config.tracker.num_want, 5);
        assert_eq!(config.tracker.listen_port, 6881);
        assert!(config.tracker.user_agent.starts_with("shoal/"));
    }

    #[test]
    fn test_announce_interval_clamping() {
        let config = TrackerConfig::default();

        assert_eq!(config.announce_interval(0), Duration::from_secs(1800));
        assert_eq!(config.announce_interval(10), Duration::from_secs(60));
        assert_eq!(config.announce_interval(900), Duration::from_secs(900));
    }

    #[test]
    fn test_testing_preset() {
        let config = ShoalConfig::for_testing();
        assert_eq!(config.tracker.initial_announce_delay, Duration::ZERO);
        assert!(config.tracker.request_timeout < Duration::from_secs(30));
    }

    // The environment is process-wide, so every override case lives here.
    #[test]
    fn test_env_override() {
        unsafe {
            std::env::set_var("SHOAL_TRACKER_TIMEOUT", "60");
            std::env::set_var("SHOAL_NUM_WANT", "-1");
            std::env::set_var("SHOAL_LISTEN_PORT", "51413");
            std::env::set_var("SHOAL_INITIAL_ANNOUNCE_DELAY_MS", "250");
        }

        let config = ShoalConfig::from_env().unwrap();

        assert_eq!(config.tracker.request_timeout, Duration::from_secs(60));
        assert_eq!(config.tracker.num_want, -1);
        assert_eq!(config.tracker.listen_port, 51413);
        assert_eq!(
            config.tracker.initial_announce_delay,
            Duration::from_millis(250)
        );

        unsafe {
            std::env::set_var("SHOAL_LISTEN_PORT", "70000");
        }
        match ShoalConfig::from_env() {
            Err(ShoalError::Configuration { reason }) => {
                assert!(reason.starts_with("SHOAL_LISTEN_PORT=\"70000\""));
            }
            other => panic!("expected configuration error, got {other:?}"),
        }

        // Cleanup
        unsafe {
            std::env::remove_var("SHOAL_TRACKER_TIMEOUT");
            std::env::remove_var("SHOAL_NUM_WANT");
            std::env::remove_var("SHOAL_LISTEN_PORT");
            std::env::remove_var("SHOAL_INITIAL_ANNOUNCE_DELAY_MS");
        }
    }
}
