// -
// Store key namespaces

/// FIFO transport queue suffix: `{table}_KEY_VALUE_OP_QUEUE`
pub(crate) const FIFO_QUEUE_SUFFIX: &str = "_KEY_VALUE_OP_QUEUE";

/// Coalesced transport dirty key queue suffix: `{table}_KEY_SET`
pub(crate) const DIRTY_KEY_QUEUE_SUFFIX: &str = "_KEY_SET";

/// Wake-up channel shared by the producers of one table: `{table}_CHANNEL`
pub(crate) const TABLE_CHANNEL_SUFFIX: &str = "_CHANNEL";

/// Payload published on the table channel. Consumers only care that
/// something arrived, never about the content.
pub(crate) const WAKEUP_PAYLOAD: &[u8] = b"G";

/// Native key-space event channel prefix: `__keyspace@{db}__:{key}`
pub(crate) const KEYSPACE_PREFIX: &str = "__keyspace@";
pub(crate) const KEYSPACE_SUFFIX: &str = "__:";

// -
// Defaults

pub(crate) const DEFAULT_TABLE_SEPARATOR: &str = ":";

/// Upper bound of entries returned by a single `pops()` call
pub(crate) const DEFAULT_POP_BATCH_SIZE: usize = 128;

/// Per subscriber buffer limit before new messages are dropped
pub(crate) const DEFAULT_MAX_PENDING_MESSAGES: usize = 100_000;

pub(crate) fn keyspace_channel(
    db_id: u32,
    key: &str,
) -> String {
    format!("{KEYSPACE_PREFIX}{db_id}{KEYSPACE_SUFFIX}{key}")
}

pub(crate) fn table_channel(table: &str) -> String {
    format!("{table}{TABLE_CHANNEL_SUFFIX}")
}
