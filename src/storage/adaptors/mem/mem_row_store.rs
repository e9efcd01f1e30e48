use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::Notify;
use tracing::debug;
use tracing::trace;

use super::PubSubHub;
use crate::constants::keyspace_channel;
use crate::utils::glob_match;
use crate::utils::DirtyKeySet;
use crate::ClientId;
use crate::FieldValues;
use crate::PubSubMessage;
use crate::Result;
use crate::RowStore;
use crate::StoreConfig;
use crate::StoreError;
use crate::StoreInstance;
use crate::SubscriptionId;
use crate::Topic;

#[derive(Debug)]
enum StoreValue {
    Hash(FieldValues),
    List(VecDeque<Vec<u8>>),
    UniqueQueue(DirtyKeySet),
}

impl StoreValue {
    fn type_name(&self) -> &'static str {
        match self {
            StoreValue::Hash(_) => "hash",
            StoreValue::List(_) => "list",
            StoreValue::UniqueQueue(_) => "unique queue",
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            StoreValue::Hash(h) => h.is_empty(),
            StoreValue::List(l) => l.is_empty(),
            StoreValue::UniqueQueue(q) => q.is_empty(),
        }
    }
}

fn wrong_type(
    key: &str,
    expected: &'static str,
    actual: &StoreValue,
) -> StoreError {
    StoreError::WrongType {
        key: key.to_string(),
        expected,
        actual: actual.type_name(),
    }
}

/// In-memory logical database
///
/// Every method runs under one lock, which gives the single-command atomicity
/// the transports rely on. Key-space events are published while the lock is
/// held so their order matches the order of the mutations.
#[derive(Debug)]
pub struct MemoryRowStore {
    db_id: u32,
    data: RwLock<HashMap<String, StoreValue>>,
    hub: Arc<PubSubHub>,
    clients: DashMap<ClientId, String>,
    keyspace_events: bool,
    closed: AtomicBool,
}

impl MemoryRowStore {
    /// Creates a standalone database with its own pub/sub hub
    pub fn new(db_id: u32) -> Self {
        Self::with_config(db_id, &StoreConfig::default())
    }

    pub fn with_config(
        db_id: u32,
        config: &StoreConfig,
    ) -> Self {
        Self::with_hub(
            db_id,
            Arc::new(PubSubHub::new(config.max_pending_messages)),
            config,
        )
    }

    pub(super) fn with_hub(
        db_id: u32,
        hub: Arc<PubSubHub>,
        config: &StoreConfig,
    ) -> Self {
        Self {
            db_id,
            data: RwLock::new(HashMap::new()),
            hub,
            clients: DashMap::new(),
            keyspace_events: config.keyspace_events,
            closed: AtomicBool::new(false),
        }
    }

    /// Simulates the store going away: every later call fails with a
    /// connection error.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        debug!(db_id = self.db_id, "Memory row store closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of connected clients
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(StoreError::Connection(format!("database {} is closed", self.db_id)).into());
        }
        Ok(())
    }

    fn notify_keyspace(
        &self,
        key: &str,
        event: &str,
    ) {
        if self.keyspace_events {
            self.hub.publish(&keyspace_channel(self.db_id, key), event.as_bytes());
        }
    }

    /// Drops the value at `key` once its container is empty
    fn remove_if_empty(
        data: &mut HashMap<String, StoreValue>,
        key: &str,
    ) -> bool {
        if data.get(key).map(StoreValue::is_empty).unwrap_or(false) {
            data.remove(key);
            return true;
        }
        false
    }
}

impl RowStore for MemoryRowStore {
    fn db_id(&self) -> u32 {
        self.db_id
    }

    fn connect(&self) -> Result<ClientId> {
        self.ensure_open()?;
        let id = self.hub.next_id();
        self.clients.insert(id, String::new());
        trace!(db_id = self.db_id, client_id = id, "Client connected");
        Ok(id)
    }

    fn disconnect(
        &self,
        client: ClientId,
    ) {
        self.clients.remove(&client);
        trace!(db_id = self.db_id, client_id = client, "Client disconnected");
    }

    fn set_client_name(
        &self,
        client: ClientId,
        name: &str,
    ) -> Result<()> {
        self.ensure_open()?;
        let mut entry = self.clients.get_mut(&client).ok_or(StoreError::UnknownClient(client))?;
        *entry = name.to_string();
        Ok(())
    }

    fn client_name(
        &self,
        client: ClientId,
    ) -> Result<String> {
        self.ensure_open()?;
        let entry = self.clients.get(&client).ok_or(StoreError::UnknownClient(client))?;
        Ok(entry.clone())
    }

    fn hset(
        &self,
        key: &str,
        fields: &[(String, String)],
    ) -> Result<()> {
        self.ensure_open()?;
        if fields.is_empty() {
            return Ok(());
        }

        let mut data = self.data.write();
        let value = data.entry(key.to_string()).or_insert_with(|| StoreValue::Hash(Vec::new()));
        let row = match value {
            StoreValue::Hash(row) => row,
            other => return Err(wrong_type(key, "hash", other).into()),
        };

        for (field, new_value) in fields {
            match row.iter_mut().find(|(f, _)| f == field) {
                Some((_, v)) => *v = new_value.clone(),
                None => row.push((field.clone(), new_value.clone())),
            }
        }

        self.notify_keyspace(key, "hset");
        Ok(())
    }

    fn hget(
        &self,
        key: &str,
        field: &str,
    ) -> Result<Option<String>> {
        self.ensure_open()?;
        let data = self.data.read();
        match data.get(key) {
            None => Ok(None),
            Some(StoreValue::Hash(row)) => {
                Ok(row.iter().find(|(f, _)| f == field).map(|(_, v)| v.clone()))
            }
            Some(other) => Err(wrong_type(key, "hash", other).into()),
        }
    }

    fn hgetall(
        &self,
        key: &str,
    ) -> Result<FieldValues> {
        self.ensure_open()?;
        let data = self.data.read();
        match data.get(key) {
            None => Ok(Vec::new()),
            Some(StoreValue::Hash(row)) => Ok(row.clone()),
            Some(other) => Err(wrong_type(key, "hash", other).into()),
        }
    }

    fn hdel(
        &self,
        key: &str,
        fields: &[String],
    ) -> Result<usize> {
        self.ensure_open()?;
        let mut data = self.data.write();
        let removed = match data.get_mut(key) {
            None => return Ok(0),
            Some(StoreValue::Hash(row)) => {
                let before = row.len();
                row.retain(|(f, _)| !fields.contains(f));
                before - row.len()
            }
            Some(other) => return Err(wrong_type(key, "hash", other).into()),
        };

        if removed > 0 {
            self.notify_keyspace(key, "hdel");
            if Self::remove_if_empty(&mut data, key) {
                self.notify_keyspace(key, "del");
            }
        }
        Ok(removed)
    }

    fn del(
        &self,
        key: &str,
    ) -> Result<bool> {
        self.ensure_open()?;
        let mut data = self.data.write();
        let existed = data.remove(key).is_some();
        if existed {
            self.notify_keyspace(key, "del");
        }
        Ok(existed)
    }

    fn exists(
        &self,
        key: &str,
    ) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.data.read().contains_key(key))
    }

    fn keys(
        &self,
        pattern: &str,
    ) -> Result<Vec<String>> {
        self.ensure_open()?;
        let data = self.data.read();
        let mut keys: Vec<String> = data.keys().filter(|k| glob_match(pattern, k)).cloned().collect();
        keys.sort();
        Ok(keys)
    }

    fn rpush(
        &self,
        key: &str,
        value: Vec<u8>,
    ) -> Result<usize> {
        self.ensure_open()?;
        let mut data = self.data.write();
        let entry = data.entry(key.to_string()).or_insert_with(|| StoreValue::List(VecDeque::new()));
        let list = match entry {
            StoreValue::List(list) => list,
            other => return Err(wrong_type(key, "list", other).into()),
        };
        list.push_back(value);
        let len = list.len();

        self.notify_keyspace(key, "rpush");
        Ok(len)
    }

    fn lpop(
        &self,
        key: &str,
    ) -> Result<Option<Vec<u8>>> {
        self.ensure_open()?;
        let mut data = self.data.write();
        let value = match data.get_mut(key) {
            None => return Ok(None),
            Some(StoreValue::List(list)) => list.pop_front(),
            Some(other) => return Err(wrong_type(key, "list", other).into()),
        };

        if value.is_some() {
            self.notify_keyspace(key, "lpop");
            Self::remove_if_empty(&mut data, key);
        }
        Ok(value)
    }

    fn llen(
        &self,
        key: &str,
    ) -> Result<usize> {
        self.ensure_open()?;
        let data = self.data.read();
        match data.get(key) {
            None => Ok(0),
            Some(StoreValue::List(list)) => Ok(list.len()),
            Some(other) => Err(wrong_type(key, "list", other).into()),
        }
    }

    fn enqueue_unique(
        &self,
        key: &str,
        member: &str,
    ) -> Result<bool> {
        self.ensure_open()?;
        let mut data = self.data.write();
        let entry = data
            .entry(key.to_string())
            .or_insert_with(|| StoreValue::UniqueQueue(DirtyKeySet::new()));
        let queue = match entry {
            StoreValue::UniqueQueue(queue) => queue,
            other => return Err(wrong_type(key, "unique queue", other).into()),
        };

        let appended = queue.mark(member);
        if appended {
            self.notify_keyspace(key, "enqueue");
        }
        Ok(appended)
    }

    fn dequeue_unique(
        &self,
        key: &str,
    ) -> Result<Option<String>> {
        self.ensure_open()?;
        let mut data = self.data.write();
        let member = match data.get_mut(key) {
            None => return Ok(None),
            Some(StoreValue::UniqueQueue(queue)) => queue.pop(),
            Some(other) => return Err(wrong_type(key, "unique queue", other).into()),
        };

        if member.is_some() {
            self.notify_keyspace(key, "dequeue");
            Self::remove_if_empty(&mut data, key);
        }
        Ok(member)
    }

    fn unique_len(
        &self,
        key: &str,
    ) -> Result<usize> {
        self.ensure_open()?;
        let data = self.data.read();
        match data.get(key) {
            None => Ok(0),
            Some(StoreValue::UniqueQueue(queue)) => Ok(queue.len()),
            Some(other) => Err(wrong_type(key, "unique queue", other).into()),
        }
    }

    fn publish(
        &self,
        channel: &str,
        payload: Vec<u8>,
    ) -> Result<usize> {
        self.ensure_open()?;
        Ok(self.hub.publish(channel, &payload))
    }

    fn subscribe(
        &self,
        topic: Topic,
    ) -> Result<SubscriptionId> {
        self.ensure_open()?;
        Ok(self.hub.subscribe(topic))
    }

    fn unsubscribe(
        &self,
        id: SubscriptionId,
    ) {
        self.hub.unsubscribe(id);
    }

    fn next_message(
        &self,
        id: SubscriptionId,
    ) -> Result<Option<PubSubMessage>> {
        self.ensure_open()?;
        Ok(self.hub.next_message(id)?)
    }

    fn pending_messages(
        &self,
        id: SubscriptionId,
    ) -> Result<usize> {
        self.ensure_open()?;
        Ok(self.hub.pending_messages(id)?)
    }

    fn subscription_notifier(
        &self,
        id: SubscriptionId,
    ) -> Result<Arc<Notify>> {
        self.ensure_open()?;
        Ok(self.hub.notifier(id)?)
    }
}

/// In-memory store instance: lazily created databases sharing one pub/sub hub
#[derive(Debug)]
pub struct MemoryInstance {
    databases: DashMap<u32, Arc<MemoryRowStore>>,
    hub: Arc<PubSubHub>,
    config: StoreConfig,
}

impl Default for MemoryInstance {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl MemoryInstance {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            databases: DashMap::new(),
            hub: Arc::new(PubSubHub::new(config.max_pending_messages)),
            config,
        }
    }

    /// Concrete handle to one database, created on first use
    pub fn memory_database(
        &self,
        db_id: u32,
    ) -> Arc<MemoryRowStore> {
        self.databases
            .entry(db_id)
            .or_insert_with(|| {
                debug!(db_id, "Memory database created");
                Arc::new(MemoryRowStore::with_hub(db_id, self.hub.clone(), &self.config))
            })
            .clone()
    }

    /// Closes every database created so far
    pub fn close(&self) {
        for db in self.databases.iter() {
            db.value().close();
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.hub.subscriber_count()
    }
}

impl StoreInstance for MemoryInstance {
    fn database(
        &self,
        db_id: u32,
    ) -> Result<Arc<dyn RowStore>> {
        let db = self.memory_database(db_id);
        if db.is_closed() {
            return Err(StoreError::Connection(format!("database {db_id} is closed")).into());
        }
        Ok(db)
    }
}
