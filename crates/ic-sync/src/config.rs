//! Synchronizer configuration
//!
//! Durations are expressed in milliseconds on the wire:
//!
//! ```json
//! { "pollIntervalMs": 50, "settleTimeoutMs": 200, "maxRemovalRetries": 1,
//!   "compile": { "disabledFilters": "matchAll" } }
//! ```

use std::time::Duration;

use ic_core::scope::CompileOptions;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncConfig {
    /// Delay between re-reads while waiting for a removal to propagate
    #[serde(rename = "pollIntervalMs", with = "millis")]
    pub poll_interval: Duration,
    /// How long one removal may take to show up before it is retried
    #[serde(rename = "settleTimeoutMs", with = "millis")]
    pub settle_timeout: Duration,
    /// Extra removals issued for residue before giving up and proceeding
    pub max_removal_retries: u32,
    pub compile: CompileOptions,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            settle_timeout: Duration::from_millis(200),
            max_removal_retries: 1,
            compile: CompileOptions::default(),
        }
    }
}

impl SyncConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
