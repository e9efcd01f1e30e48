use std::sync::Arc;

use tokio::sync::Notify;
use tracing::debug;
use tracing::trace;

use super::PubSubMessage;
use super::RowStore;
use super::SubscriptionId;
use super::Topic;
use crate::Error;
use crate::Result;
use crate::StoreError;

/// Handle for a registered subscription
///
/// Buffered messages live in the store. When dropped, the subscription is
/// unregistered from the store and its buffer discarded.
pub struct Subscription {
    id: SubscriptionId,
    topic: Topic,
    store: Arc<dyn RowStore>,
    notifier: Arc<Notify>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}

impl Subscription {
    pub fn new(
        store: Arc<dyn RowStore>,
        topic: Topic,
    ) -> Result<Self> {
        let id = store.subscribe(topic.clone())?;
        let notifier = match store.subscription_notifier(id) {
            Ok(notifier) => notifier,
            Err(e) => {
                store.unsubscribe(id);
                return Err(e);
            }
        };

        trace!(subscription_id = id, topic = ?topic, "Subscription registered");

        Ok(Self {
            id,
            topic,
            store,
            notifier,
        })
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    pub fn notifier(&self) -> Arc<Notify> {
        self.notifier.clone()
    }

    pub fn try_recv(&self) -> Result<Option<PubSubMessage>> {
        self.store.next_message(self.id)
    }

    pub fn pending(&self) -> Result<usize> {
        self.store.pending_messages(self.id)
    }

    /// Discards every buffered message, returning how many were dropped.
    ///
    /// Used by consumers whose channel only carries wake-ups: their data is
    /// read from the store, so a lost wake-up loses nothing and an overflow
    /// is skipped.
    pub fn drain(&self) -> Result<usize> {
        let mut drained = 0;
        loop {
            match self.store.next_message(self.id) {
                Ok(Some(_)) => drained += 1,
                Ok(None) => return Ok(drained),
                Err(Error::Store(StoreError::SubscriberOverflow { dropped, .. })) => {
                    debug!(subscription_id = self.id, dropped, "Wake-ups dropped, ignored");
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.store.unsubscribe(self.id);
        trace!(subscription_id = self.id, "Subscription unregistered");
    }
}
