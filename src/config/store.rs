use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;
use tracing::warn;

use crate::constants::DEFAULT_MAX_PENDING_MESSAGES;
use crate::Error;
use crate::Result;

/// Row store adapter behaviour
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoreConfig {
    /// Publish `__keyspace@{db}__:{key}` events on every mutating command.
    ///
    /// Key-space watchers see nothing while this is off.
    ///
    /// **Default**: true
    #[serde(default = "default_keyspace_events")]
    pub keyspace_events: bool,

    /// Messages buffered per subscriber before new deliveries are dropped.
    ///
    /// A subscriber that stops draining must never stall publishers, so the
    /// buffer is bounded. Overflow is logged and reported to that subscriber
    /// as `StoreError::SubscriberOverflow`; repeated wake-ups are folded and
    /// never count against it.
    ///
    /// **Default**: 100000
    #[serde(default = "default_max_pending_messages")]
    pub max_pending_messages: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            keyspace_events: default_keyspace_events(),
            max_pending_messages: default_max_pending_messages(),
        }
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_pending_messages == 0 {
            return Err(Error::Config(ConfigError::Message(
                "store.max_pending_messages must be greater than 0".into(),
            )));
        }

        if self.max_pending_messages > 10_000_000 {
            warn!(
                "store.max_pending_messages ({}) is very large, a stalled subscriber may hold a lot of memory",
                self.max_pending_messages
            );
        }

        Ok(())
    }
}

const fn default_keyspace_events() -> bool {
    true
}

const fn default_max_pending_messages() -> usize {
    DEFAULT_MAX_PENDING_MESSAGES
}
