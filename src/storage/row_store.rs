//! Row Store Adapter boundary.
//!
//! Everything the transports need from the shared key-value store. Each
//! method corresponds to one atomic store command; no method spans more than
//! one key except `publish`, which fans out to subscribers.

use std::sync::Arc;

#[cfg(test)]
use mockall::automock;
use tokio::sync::Notify;

use crate::FieldValues;
use crate::Result;

/// Identifies one client connection to the store
pub type ClientId = u64;

/// Identifies one subscription registered with the store
pub type SubscriptionId = u64;

/// What a subscription listens to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Exact channel name
    Channel(String),
    /// Glob pattern over channel names
    Pattern(String),
}

impl Topic {
    pub fn matches(
        &self,
        channel: &str,
    ) -> bool {
        match self {
            Topic::Channel(name) => name == channel,
            Topic::Pattern(pattern) => crate::utils::glob_match(pattern, channel),
        }
    }
}

/// One message delivered to one subscriber
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubSubMessage {
    /// Channel the message was published on
    pub channel: String,
    /// Pattern that matched, for pattern subscriptions
    pub pattern: Option<String>,
    pub payload: Vec<u8>,
}

#[cfg_attr(test, automock)]
pub trait RowStore: Send + Sync + 'static {
    /// Numeric id of the logical database this store represents
    fn db_id(&self) -> u32;

    // -
    // Connections

    /// Registers a new client connection
    fn connect(&self) -> Result<ClientId>;

    /// Drops a client connection. Unknown ids are ignored.
    fn disconnect(
        &self,
        client: ClientId,
    );

    fn set_client_name(
        &self,
        client: ClientId,
        name: &str,
    ) -> Result<()>;

    /// Display name of a connection, empty when never set
    fn client_name(
        &self,
        client: ClientId,
    ) -> Result<String>;

    // -
    // Hashes

    /// Upsert-merges `fields` into the hash at `key`. Fields not in
    /// `fields` are preserved; existing fields keep their position.
    fn hset(
        &self,
        key: &str,
        fields: &[(String, String)],
    ) -> Result<()>;

    fn hget(
        &self,
        key: &str,
        field: &str,
    ) -> Result<Option<String>>;

    /// All fields of the hash at `key` in insertion order; empty if absent
    fn hgetall(
        &self,
        key: &str,
    ) -> Result<FieldValues>;

    /// Removes fields, returning how many existed. The hash disappears
    /// once its last field is removed.
    fn hdel(
        &self,
        key: &str,
        fields: &[String],
    ) -> Result<usize>;

    /// Removes any value at `key`, returning whether one existed
    fn del(
        &self,
        key: &str,
    ) -> Result<bool>;

    fn exists(
        &self,
        key: &str,
    ) -> Result<bool>;

    /// Keys matching a glob pattern, sorted
    fn keys(
        &self,
        pattern: &str,
    ) -> Result<Vec<String>>;

    // -
    // Lists

    /// Appends to the list at `key`, returning the new length
    fn rpush(
        &self,
        key: &str,
        value: Vec<u8>,
    ) -> Result<usize>;

    fn lpop(
        &self,
        key: &str,
    ) -> Result<Option<Vec<u8>>>;

    fn llen(
        &self,
        key: &str,
    ) -> Result<usize>;

    // -
    // Unique queues (dirty key queues)

    /// Atomically marks `member` pending and appends it, unless it is
    /// already pending. Returns `true` if it was appended.
    fn enqueue_unique(
        &self,
        key: &str,
        member: &str,
    ) -> Result<bool>;

    /// Atomically removes the oldest pending member and clears its mark
    fn dequeue_unique(
        &self,
        key: &str,
    ) -> Result<Option<String>>;

    fn unique_len(
        &self,
        key: &str,
    ) -> Result<usize>;

    // -
    // Publish/subscribe

    /// Delivers `payload` to every subscriber connected right now and
    /// returns how many received it. Nothing is retained for later
    /// subscribers.
    fn publish(
        &self,
        channel: &str,
        payload: Vec<u8>,
    ) -> Result<usize>;

    fn subscribe(
        &self,
        topic: Topic,
    ) -> Result<SubscriptionId>;

    /// Unknown ids are ignored
    fn unsubscribe(
        &self,
        id: SubscriptionId,
    );

    /// Oldest undelivered message for `id`.
    ///
    /// Fails once with `StoreError::SubscriberOverflow` after the store
    /// dropped messages for `id`, then resumes with the buffered ones.
    fn next_message(
        &self,
        id: SubscriptionId,
    ) -> Result<Option<PubSubMessage>>;

    /// Fails with `StoreError::SubscriberOverflow`, without consuming it,
    /// while a drop has not been observed through `next_message`
    fn pending_messages(
        &self,
        id: SubscriptionId,
    ) -> Result<usize>;

    /// Signalled after every delivery (or drop) to `id`
    fn subscription_notifier(
        &self,
        id: SubscriptionId,
    ) -> Result<Arc<Notify>>;
}

/// Resolves numeric database ids to stores of one store instance
#[cfg_attr(test, automock)]
pub trait StoreInstance: Send + Sync + 'static {
    fn database(
        &self,
        db_id: u32,
    ) -> Result<Arc<dyn RowStore>>;
}
