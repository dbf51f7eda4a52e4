//! Propagation-wait configuration.

use std::time::Duration;

use serde::Deserialize;

/// How long and how often to poll for a write to become visible.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PropagationConfig {
    /// Minimum spacing between two polls.
    #[serde(with = "secs")]
    pub poll_interval: Duration,
    /// Consecutive successful reads required before the record counts as present.
    pub stable_polls: u32,
    /// Overall deadline for the wait.
    #[serde(with = "secs")]
    pub timeout: Duration,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            stable_polls: 10,
            timeout: Duration::from_secs(5 * 60),
        }
    }
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}
