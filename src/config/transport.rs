use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_POP_BATCH_SIZE;
use crate::Error;
use crate::Result;

/// Producer/consumer transport parameters
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TransportConfig {
    /// Maximum number of entries drained by one `pops()` call
    ///
    /// **Default**: 128
    #[serde(default = "default_pop_batch_size")]
    pub pop_batch_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            pop_batch_size: default_pop_batch_size(),
        }
    }
}

impl TransportConfig {
    pub fn validate(&self) -> Result<()> {
        if self.pop_batch_size == 0 {
            return Err(Error::Config(ConfigError::Message(
                "transport.pop_batch_size must be greater than 0".into(),
            )));
        }
        Ok(())
    }
}

const fn default_pop_batch_size() -> usize {
    DEFAULT_POP_BATCH_SIZE
}
