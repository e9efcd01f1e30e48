use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;
use tracing::trace;

use crate::constants::keyspace_channel;
use crate::select::next_selectable_id;
use crate::table::TableLocation;
use crate::utils::DirtyKeySet;
use crate::DbConnector;
use crate::KeyOpFieldValues;
use crate::Result;
use crate::RowStore;
use crate::Selectable;
use crate::SelectableId;
use crate::StoreError;
use crate::Subscription;
use crate::Topic;
use crate::TransportConfig;

/// Key-space watcher over one table
///
/// Observes the store's native change events for `{table}{separator}*`
/// instead of a transport queue, so it also sees rows written by producers
/// that never go through a state transport. Events are folded into a local
/// dirty key set with the same one-pending-entry-per-key rule as the
/// coalesced transport, and `pop` reads the row back.
///
/// Only changes made after the watcher subscribed are observed.
///
/// Each event is the only record of its change, so events the store drops
/// on a full subscriber buffer surface once as
/// [`StoreError::SubscriberOverflow`] from whichever of `pop`, `pending` or
/// `has_pending` sees them first. The caller resynchronizes from the table
/// (e.g. [`crate::Table::get_keys`]); later pops keep working.
pub struct SubscriberStateTable {
    id: SelectableId,
    store: Arc<dyn RowStore>,
    location: TableLocation,
    channel_prefix: String,
    subscription: Subscription,
    dirty: Mutex<DirtyKeySet>,
    pop_batch_size: usize,
    priority: i32,
}

impl std::fmt::Debug for SubscriberStateTable {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SubscriberStateTable")
            .field("id", &self.id)
            .field("location", &self.location)
            .field("dirty", &self.dirty.lock().len())
            .finish()
    }
}

impl SubscriberStateTable {
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
        let location = TableLocation::new(table_name, db.separator());
        let channel_prefix = keyspace_channel(db.db_id(), "");
        let pattern = format!("{channel_prefix}{}", location.row_pattern());
        let subscription = Subscription::new(store.clone(), Topic::Pattern(pattern))?;

        let id = next_selectable_id();
        debug!(selectable_id = id, table = table_name, "Key-space watcher opened");

        Ok(Self {
            id,
            store,
            location,
            channel_prefix,
            subscription,
            dirty: Mutex::new(DirtyKeySet::new()),
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

    /// Takes the oldest changed key and reads its row back: `DEL` when the
    /// row is gone, `SET` with every current field otherwise.
    pub fn pop(&self) -> Result<Option<KeyOpFieldValues>> {
        self.absorb_events()?;
        let Some(key) = self.dirty.lock().pop() else {
            return Ok(None);
        };

        let row = self.store.hgetall(&self.location.row_key(&key))?;
        let entry = KeyOpFieldValues::from_row(key, row);
        trace!(table = self.table_name(), key = %entry.key, op = %entry.op, "Watched key popped");
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

    /// Number of distinct changed keys awaiting a pop
    pub fn pending(&self) -> Result<usize> {
        self.absorb_events()?;
        Ok(self.dirty.lock().len())
    }

    /// Moves every buffered event into the dirty key set.
    ///
    /// Stops at the first event whose channel is not a row of this table;
    /// the events after it stay buffered for the next call.
    fn absorb_events(&self) -> Result<()> {
        while let Some(message) = self.subscription.try_recv()? {
            let key = self.key_of(&message.channel)?;
            let newly_dirty = self.dirty.lock().mark(key);
            trace!(
                table = self.table_name(),
                key,
                event = %String::from_utf8_lossy(&message.payload),
                newly_dirty,
                "Key-space event"
            );
        }
        Ok(())
    }

    fn key_of<'a>(
        &self,
        channel: &'a str,
    ) -> Result<&'a str> {
        channel
            .strip_prefix(self.channel_prefix.as_str())
            .and_then(|row_key| self.location.strip(row_key))
            .ok_or_else(|| StoreError::malformed(channel, "not a key-space event of this table").into())
    }
}

impl Selectable for SubscriberStateTable {
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
