use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::kernel::time::{REWIND_THRESHOLD_SECS, SAFETY_LIMIT_MS, TICK_MS};

/// Engine timing knobs. Every field falls back to its default when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub poll_interval_ms: u64,
    pub safety_limit_ms: u64,
    pub rewind_threshold_secs: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: TICK_MS,
            safety_limit_ms: SAFETY_LIMIT_MS,
            rewind_threshold_secs: REWIND_THRESHOLD_SECS,
        }
    }
}

impl EngineConfig {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn safety_limit(&self) -> Duration {
        Duration::from_millis(self.safety_limit_ms)
    }
}
