// ABOUTME: Fixed waits used by the pipeline outside the retry executor.
// ABOUTME: Defaults match the backend's observed propagation behaviour; config may override.

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Timings {
    /// Delay between build status checks.
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Wait before reading logs of a failed build so they have time to arrive.
    #[serde(default = "default_log_propagation_delay", with = "humantime_serde")]
    pub log_propagation_delay: Duration,

    /// Wait before the second attempt at enabling an API.
    #[serde(default = "default_activation_retry_delay", with = "humantime_serde")]
    pub activation_retry_delay: Duration,
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(5000)
}

fn default_log_propagation_delay() -> Duration {
    Duration::from_millis(10_000)
}

fn default_activation_retry_delay() -> Duration {
    Duration::from_millis(1000)
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            log_propagation_delay: default_log_propagation_delay(),
            activation_retry_delay: default_activation_retry_delay(),
        }
    }
}
