use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::Result;

/// Event multiplexer parameters
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct SelectConfig {
    /// Timeout used by `Select::select_default()` in milliseconds.
    /// 0 waits until an object becomes ready.
    ///
    /// **Default**: 0
    #[serde(default)]
    pub default_timeout_ms: u64,
}

impl SelectConfig {
    pub fn default_timeout(&self) -> Option<Duration> {
        match self.default_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    pub fn validate(&self) -> Result<()> {
        Ok(())
    }
}
