use std::env;
use std::time::Duration;

use chrono_tz::Tz;

use crate::state::ReconnectPolicy;

/// Subscriber configuration derived from the host environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Real-time server address.
    pub url: String,
    pub namespace: String,
    pub events: Events,
    pub reconnect: ReconnectPolicy,

    /// Capacity of each subscription's lifecycle broadcast channel.
    pub lifecycle_buffer: usize,

    /// Timezone used for the timestamp readout.
    pub timezone: Tz,
}

impl Config {
    pub fn from_env() -> Self {
        let url = env::var("TRACKER_URL").unwrap_or_else(|_| {
            let default = "http://localhost:3000".to_string();
            tracing::trace!("TRACKER_URL not set, using default: {default}");
            default
        });
        let namespace = env::var("TRACKER_NAMESPACE").unwrap_or_else(|_| "/".to_string());
        let timezone = env::var("TIMEZONE")
            .ok()
            .and_then(|value| value.parse::<Tz>().ok())
            .unwrap_or(Tz::UTC);

        let defaults = ReconnectPolicy::default();
        let reconnect = ReconnectPolicy {
            max_attempts: env_u32("MAX_RECONNECT_ATTEMPTS", defaults.max_attempts),
            delay: env_millis("RECONNECT_DELAY_MS", defaults.delay),
            max_delay: env_millis("RECONNECT_DELAY_MAX_MS", defaults.max_delay),
        };

        Self {
            url,
            namespace,
            events: Events::from_env(),
            reconnect,
            lifecycle_buffer: env_usize("LIFECYCLE_BUFFER", 16),
            timezone,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Event names used on the real-time channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Events {
    pub join: String,
    pub leave: String,
    pub update: String,
}

impl Events {
    fn from_env() -> Self {
        Self {
            join: env::var("TRACKER_JOIN_EVENT").unwrap_or_else(|_| "joinTrip".to_string()),
            leave: env::var("TRACKER_LEAVE_EVENT").unwrap_or_else(|_| "leaveTrip".to_string()),
            update: env::var("TRACKER_UPDATE_EVENT")
                .unwrap_or_else(|_| "locationUpdate".to_string()),
        }
    }
}

impl Default for Events {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_u32(key: &str, default: u32) -> u32 {
    env::var(key).ok().and_then(|value| value.parse::<u32>().ok()).unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key).ok().and_then(|value| value.parse::<usize>().ok()).unwrap_or(default)
}

fn env_millis(key: &str, default: Duration) -> Duration {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}
