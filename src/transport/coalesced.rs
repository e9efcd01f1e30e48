//! Coalesced state transport.
//!
//! Writers merge into the row itself and mark the key dirty in
//! `{table}_KEY_SET`; a key already dirty is not queued twice. The consumer
//! reads the row back at pop time, so any burst of writes to one key costs a
//! single pop carrying the latest accumulated state.
//!
//! Only per-key recency is guaranteed, never global order across keys. A
//! write landing between a consumer's dequeue and its row read re-marks the
//! key, so the consumer may see the same state twice.

use std::sync::Arc;

use tokio::sync::Notify;
use tracing::debug;
use tracing::trace;

use crate::constants::table_channel;
use crate::constants::DIRTY_KEY_QUEUE_SUFFIX;
use crate::constants::WAKEUP_PAYLOAD;
use crate::select::next_selectable_id;
use crate::table::TableLocation;
use crate::DbConnector;
use crate::FieldValues;
use crate::KeyOpFieldValues;
use crate::Result;
use crate::RowStore;
use crate::Selectable;
use crate::SelectableId;
use crate::Subscription;
use crate::Topic;
use crate::TransportConfig;

fn dirty_queue_key(table_name: &str) -> String {
    format!("{table_name}{DIRTY_KEY_QUEUE_SUFFIX}")
}

/// Write side of the coalesced transport
pub struct ProducerStateTable {
    store: Arc<dyn RowStore>,
    location: TableLocation,
    dirty_queue: String,
    channel: String,
}

impl std::fmt::Debug for ProducerStateTable {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ProducerStateTable").field("location", &self.location).finish()
    }
}

impl ProducerStateTable {
    pub fn new(
        db: &DbConnector,
        table_name: &str,
    ) -> Self {
        Self {
            store: db.store(),
            location: TableLocation::new(table_name, db.separator()),
            dirty_queue: dirty_queue_key(table_name),
            channel: table_channel(table_name),
        }
    }

    pub fn table_name(&self) -> &str {
        self.location.name()
    }

    /// Upsert-merges `fields` into the row and marks `key` dirty.
    ///
    /// An empty `fields` writes nothing and marks nothing.
    pub fn set(
        &self,
        key: &str,
        fields: &[(String, String)],
    ) -> Result<()> {
        if self.write(key, fields)? {
            self.wake()?;
        }
        Ok(())
    }

    /// Removes the row and marks `key` dirty
    pub fn del(
        &self,
        key: &str,
    ) -> Result<()> {
        if self.remove(key)? {
            self.wake()?;
        }
        Ok(())
    }

    /// Applies every write, then wakes consumers at most once
    pub fn set_batch(
        &self,
        values: &[(String, FieldValues)],
    ) -> Result<()> {
        let mut newly_dirty = false;
        for (key, fields) in values {
            newly_dirty |= self.write(key, fields)?;
        }
        if newly_dirty {
            self.wake()?;
        }
        Ok(())
    }

    /// Removes every row, then wakes consumers at most once
    pub fn del_batch(
        &self,
        keys: &[String],
    ) -> Result<()> {
        let mut newly_dirty = false;
        for key in keys {
            newly_dirty |= self.remove(key)?;
        }
        if newly_dirty {
            self.wake()?;
        }
        Ok(())
    }

    /// Number of keys currently marked dirty
    pub fn pending(&self) -> Result<usize> {
        self.store.unique_len(&self.dirty_queue)
    }

    /// Returns whether `key` was not already dirty
    fn write(
        &self,
        key: &str,
        fields: &[(String, String)],
    ) -> Result<bool> {
        if fields.is_empty() {
            trace!(table = self.table_name(), key, "Empty set ignored");
            return Ok(false);
        }
        self.store.hset(&self.location.row_key(key), fields)?;
        self.mark_dirty(key)
    }

    fn remove(
        &self,
        key: &str,
    ) -> Result<bool> {
        self.store.del(&self.location.row_key(key))?;
        self.mark_dirty(key)
    }

    fn mark_dirty(
        &self,
        key: &str,
    ) -> Result<bool> {
        let appended = self.store.enqueue_unique(&self.dirty_queue, key)?;
        trace!(table = self.table_name(), key, appended, "Key marked dirty");
        Ok(appended)
    }

    fn wake(&self) -> Result<()> {
        self.store.publish(&self.channel, WAKEUP_PAYLOAD.to_vec())?;
        Ok(())
    }
}

/// Read side of the coalesced transport
pub struct ConsumerStateTable {
    id: SelectableId,
    store: Arc<dyn RowStore>,
    location: TableLocation,
    dirty_queue: String,
    subscription: Subscription,
    pop_batch_size: usize,
    priority: i32,
}

impl std::fmt::Debug for ConsumerStateTable {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ConsumerStateTable")
            .field("id", &self.id)
            .field("location", &self.location)
            .field("priority", &self.priority)
            .finish()
    }
}

impl ConsumerStateTable {
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
        debug!(selectable_id = id, table = table_name, "Coalesced consumer opened");

        Ok(Self {
            id,
            store,
            location: TableLocation::new(table_name, db.separator()),
            dirty_queue: dirty_queue_key(table_name),
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
        self.location.name()
    }

    /// Takes the oldest dirty key and reads its row back.
    ///
    /// Reports `DEL` with no fields when the row is gone, `SET` with the
    /// full current row otherwise. `None` when nothing is dirty.
    pub fn pop(&self) -> Result<Option<KeyOpFieldValues>> {
        self.subscription.drain()?;
        let Some(key) = self.store.dequeue_unique(&self.dirty_queue)? else {
            return Ok(None);
        };

        let row = self.store.hgetall(&self.location.row_key(&key))?;
        let entry = KeyOpFieldValues::from_row(key, row);
        trace!(table = self.table_name(), key = %entry.key, op = %entry.op, "Dirty key popped");
        Ok(Some(entry))
    }

    /// Pops up to the configured batch size
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

    /// Number of dirty keys awaiting a pop
    pub fn pending(&self) -> Result<usize> {
        self.store.unique_len(&self.dirty_queue)
    }
}

impl Selectable for ConsumerStateTable {
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
