//! Global configuration shared by every component in a process.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::topology::RetryPolicy;

/// Process-wide settings.
///
/// ```
/// use sluice_core::config::GlobalConfig;
///
/// let config: GlobalConfig = serde_yaml::from_str("retries: 3").unwrap();
/// assert_eq!(config.retries, 3);
/// assert_eq!(config.retry_delay_secs, 5);
/// assert_eq!(config.max_parallel_jobs, None);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    /// Additional attempts for a failed step, applied uniformly to every step.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Delay between attempts of a failed step.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Upper bound on concurrently running fan-out jobs.
    ///
    /// `None` runs every job of a fan-out at once.
    #[serde(default)]
    pub max_parallel_jobs: Option<usize>,

    /// Maximum random delay in seconds before each component starts.
    #[serde(default)]
    pub poll_jitter_secs: u64,
}

fn default_retries() -> u32 {
    1
}

fn default_retry_delay_secs() -> u64 {
    5
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            retry_delay_secs: default_retry_delay_secs(),
            max_parallel_jobs: None,
            poll_jitter_secs: 0,
        }
    }
}

impl GlobalConfig {
    /// Merge values from another config (last non-default value wins).
    pub fn merge_from(&mut self, other: Self) {
        let defaults = Self::default();
        if other.retries != defaults.retries {
            self.retries = other.retries;
        }
        if other.retry_delay_secs != defaults.retry_delay_secs {
            self.retry_delay_secs = other.retry_delay_secs;
        }
        if other.max_parallel_jobs.is_some() {
            self.max_parallel_jobs = other.max_parallel_jobs;
        }
        if other.poll_jitter_secs != defaults.poll_jitter_secs {
            self.poll_jitter_secs = other.poll_jitter_secs;
        }
    }

    /// The retry policy every orchestrated step runs under.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retries, Duration::from_secs(self.retry_delay_secs))
    }
}
