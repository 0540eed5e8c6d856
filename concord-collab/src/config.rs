//! Engine configuration.
//!
//! Every field has a default, so a JSON document only needs to name the
//! values it overrides:
//!
//! ```text
//! { "presence_timeout_ms": 10000, "activity_capacity": 500 }
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{CollabError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollabConfig {
    /// Silence after which an online user is demoted to away (also the sweep period)
    pub presence_timeout_ms: u64,
    /// Multiple of the timeout after which a user is demoted to offline
    pub presence_offline_factor: u32,
    /// Offline records older than this are dropped by the sweep (None = keep forever)
    pub presence_eviction_after_ms: Option<u64>,
    /// Activity ring buffer capacity
    pub activity_capacity: usize,
    /// Events buffered per broadcast topic before slow subscribers lag
    pub broadcast_capacity: usize,
    /// Room capacity used when the caller does not supply one
    pub default_max_participants: usize,
    /// Maximum chat message length in chars
    pub max_message_length: usize,
    /// Maximum comment/reply length in chars
    pub max_comment_length: usize,
}

impl Default for CollabConfig {
    fn default() -> Self {
        Self {
            presence_timeout_ms: 30_000,
            presence_offline_factor: 5,
            presence_eviction_after_ms: Some(24 * 60 * 60 * 1000),
            activity_capacity: 1000,
            broadcast_capacity: 256,
            default_max_participants: 50,
            max_message_length: 10_000,
            max_comment_length: 10_000,
        }
    }
}

impl CollabConfig {
    /// Parse a JSON config and validate it.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: CollabConfig =
            serde_json::from_str(json).map_err(|e| CollabError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject zero capacities and timeouts.
    pub fn validate(&self) -> Result<()> {
        if self.presence_timeout_ms == 0 {
            return Err(CollabError::Config("presence_timeout_ms must be > 0".into()));
        }
        if self.presence_offline_factor < 2 {
            return Err(CollabError::Config("presence_offline_factor must be >= 2".into()));
        }
        if self.activity_capacity == 0 {
            return Err(CollabError::Config("activity_capacity must be > 0".into()));
        }
        if self.broadcast_capacity == 0 {
            return Err(CollabError::Config("broadcast_capacity must be > 0".into()));
        }
        if self.default_max_participants == 0 {
            return Err(CollabError::Config("default_max_participants must be > 0".into()));
        }
        if self.max_message_length == 0 || self.max_comment_length == 0 {
            return Err(CollabError::Config("message/comment length limits must be > 0".into()));
        }
        Ok(())
    }

    pub fn presence_timeout(&self) -> Duration {
        Duration::from_millis(self.presence_timeout_ms)
    }

    pub fn presence_offline_after(&self) -> Duration {
        self.presence_timeout() * self.presence_offline_factor
    }

    pub fn presence_eviction_after(&self) -> Option<Duration> {
        self.presence_eviction_after_ms.map(Duration::from_millis)
    }
}
