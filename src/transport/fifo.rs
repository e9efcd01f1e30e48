//! FIFO state transport.
//!
//! Every write appends one immutable entry to `{table}_KEY_VALUE_OP_QUEUE`,
//! so N writes before a pop produce N pops in write order, each carrying
//! exactly the fields of its write.

use std::sync::Arc;

use tokio::sync::Notify;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use crate::constants::table_channel;
use crate::constants::FIFO_QUEUE_SUFFIX;
use crate::constants::WAKEUP_PAYLOAD;
use crate::select::next_selectable_id;
use crate::DbConnector;
use crate::Error;
use crate::FieldValues;
use crate::KeyOpFieldValues;
use crate::Result;
use crate::RowStore;
use crate::Selectable;
use crate::SelectableId;
use crate::StoreError;
use crate::Subscription;
use crate::Topic;
use crate::TransportConfig;

fn queue_key(table_name: &str) -> String {
    format!("{table_name}{FIFO_QUEUE_SUFFIX}")
}

fn encode_entry(entry: &KeyOpFieldValues) -> Result<Vec<u8>> {
    bincode::serialize(entry).map_err(|e| Error::Fatal(format!("Failed to encode queue entry: {e}")))
}

fn decode_entry(
    queue: &str,
    bytes: &[u8],
) -> Result<KeyOpFieldValues> {
    bincode::deserialize(bytes).map_err(|e| StoreError::malformed(queue, e).into())
}

/// Write side of the FIFO transport
pub struct ProducerTable {
    store: Arc<dyn RowStore>,
    table_name: String,
    queue: String,
    channel: String,
}

impl std::fmt::Debug for ProducerTable {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ProducerTable").field("table_name", &self.table_name).finish()
    }
}

impl ProducerTable {
    pub fn new(
        db: &DbConnector,
        table_name: &str,
    ) -> Self {
        Self {
            store: db.store(),
            table_name: table_name.to_string(),
            queue: queue_key(table_name),
            channel: table_channel(table_name),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Queues a `SET` carrying exactly `fields`.
    ///
    /// `Err` means nothing was queued, so the write can be retried without
    /// duplicating the entry.
    pub fn set(
        &self,
        key: &str,
        fields: &[(String, String)],
    ) -> Result<()> {
        self.push(&KeyOpFieldValues::set(key, fields.to_vec()))?;
        self.wake();
        Ok(())
    }

    /// Queues a `DEL`
    pub fn del(
        &self,
        key: &str,
    ) -> Result<()> {
        self.push(&KeyOpFieldValues::del(key))?;
        self.wake();
        Ok(())
    }

    /// Queues one `SET` per entry, in order, with a single wake-up.
    ///
    /// On `Err` the entries before the failing one stay queued.
    pub fn set_batch(
        &self,
        values: &[(String, FieldValues)],
    ) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }
        for (key, fields) in values {
            self.push(&KeyOpFieldValues::set(key.as_str(), fields.clone()))?;
        }
        self.wake();
        Ok(())
    }

    /// Queues one `DEL` per key, in order, with a single wake-up
    pub fn del_batch(
        &self,
        keys: &[String],
    ) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        for key in keys {
            self.push(&KeyOpFieldValues::del(key.as_str()))?;
        }
        self.wake();
        Ok(())
    }

    fn push(
        &self,
        entry: &KeyOpFieldValues,
    ) -> Result<()> {
        let len = self.store.rpush(&self.queue, encode_entry(entry)?)?;
        trace!(table = %self.table_name, key = %entry.key, op = %entry.op, queued = len, "Entry queued");
        Ok(())
    }

    /// Consumers go by queue length, so a lost wake-up only delays them
    /// until their next select. Never fails the write that was queued.
    fn wake(&self) {
        if let Err(e) = self.store.publish(&self.channel, WAKEUP_PAYLOAD.to_vec()) {
            warn!(table = %self.table_name, error = %e, "Failed to publish wake-up, entry stays queued");
        }
    }
}

/// Read side of the FIFO transport
///
/// Several consumers may share one table; each entry is delivered to
/// exactly one of them.
pub struct ConsumerTable {
    id: SelectableId,
    store: Arc<dyn RowStore>,
    table_name: String,
    queue: String,
    subscription: Subscription,
    pop_batch_size: usize,
    priority: i32,
}

impl std::fmt::Debug for ConsumerTable {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ConsumerTable")
            .field("id", &self.id)
            .field("table_name", &self.table_name)
            .field("priority", &self.priority)
            .finish()
    }
}

impl ConsumerTable {
    pub fn new(
        db: &DbConnector,
        table_name: &str,
    ) -> Result<Self> {
        Self::with_config(db, table_name, &TransportConfig::default())
    }

    pub fn with_config(
        db: &DbConnector,
        table_name: &str,
        config: &TransportConfig,
    ) -> Result<Self> {
        let store = db.store();
        let subscription = Subscription::new(store.clone(), Topic::Channel(table_channel(table_name)))?;
        let id = next_selectable_id();
        debug!(selectable_id = id, table = table_name, "FIFO consumer opened");

        Ok(Self {
            id,
            store,
            table_name: table_name.to_string(),
            queue: queue_key(table_name),
            subscription,
            pop_batch_size: config.pop_batch_size,
            priority: 0,
        })
    }

    pub fn with_priority(
        mut self,
        priority: i32,
    ) -> Self {
        self.priority = priority;
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Removes and returns the oldest entry, `None` when nothing is queued
    pub fn pop(&self) -> Result<Option<KeyOpFieldValues>> {
        self.subscription.drain()?;
        match self.store.lpop(&self.queue)? {
            None => Ok(None),
            Some(bytes) => {
                let entry = decode_entry(&self.queue, &bytes)?;
                trace!(table = %self.table_name, key = %entry.key, op = %entry.op, "Entry popped");
                Ok(Some(entry))
            }
        }
    }

    /// Pops up to the configured batch size, in queue order
    pub fn pops(&self) -> Result<Vec<KeyOpFieldValues>> {
        let mut entries = Vec::new();
        while entries.len() < self.pop_batch_size {
            match self.pop()? {
                Some(entry) => entries.push(entry),
                None => break,
            }
        }
        Ok(entries)
    }

    /// Number of queued entries
    pub fn pending(&self) -> Result<usize> {
        self.store.llen(&self.queue)
    }
}

impl Selectable for ConsumerTable {
    fn selectable_id(&self) -> SelectableId {
        self.id
    }

    fn has_pending(&self) -> Result<bool> {
        Ok(self.pending()? > 0)
    }

    fn notifier(&self) -> Arc<Notify> {
        self.subscription.notifier()
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}
