use std::sync::Arc;

use tokio::sync::Notify;
use tracing::debug;
use tracing::trace;

use super::NotificationMessage;
use crate::select::next_selectable_id;
use crate::DbConnector;
use crate::Result;
use crate::Selectable;
use crate::SelectableId;
use crate::Subscription;
use crate::Topic;
use crate::TransportConfig;

/// Receiving side of a notification channel
///
/// Messages published from the moment of construction are buffered in the
/// subscription and popped in publish order. Messages the store had to drop
/// on a full buffer are reported by the next `pop` as
/// [`crate::StoreError::SubscriberOverflow`]; `pending` fails the same way
/// until that pop.
pub struct NotificationConsumer {
    id: SelectableId,
    channel: String,
    subscription: Subscription,
    pop_batch_size: usize,
    priority: i32,
}

impl std::fmt::Debug for NotificationConsumer {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("NotificationConsumer")
            .field("id", &self.id)
            .field("channel", &self.channel)
            .field("priority", &self.priority)
            .finish()
    }
}

impl NotificationConsumer {
    pub fn new(
        db: &DbConnector,
        channel: &str,
    ) -> Result<Self> {
        Self::with_config(db, channel, &TransportConfig::default())
    }

    pub fn with_config(
        db: &DbConnector,
        channel: &str,
        config: &TransportConfig,
    ) -> Result<Self> {
        let subscription = Subscription::new(db.store(), Topic::Channel(channel.to_string()))?;
        let id = next_selectable_id();
        debug!(selectable_id = id, channel, "Notification consumer subscribed");

        Ok(Self {
            id,
            channel: channel.to_string(),
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

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Oldest undelivered message, `None` when nothing is buffered
    pub fn pop(&self) -> Result<Option<NotificationMessage>> {
        let Some(message) = self.subscription.try_recv()? else {
            return Ok(None);
        };
        let notification = NotificationMessage::decode(&message.channel, &message.payload)?;
        trace!(channel = %self.channel, op = %notification.op, "Notification popped");
        Ok(Some(notification))
    }

    /// Pops up to the configured batch size
    pub fn pops(&self) -> Result<Vec<NotificationMessage>> {
        let mut messages = Vec::new();
        while messages.len() < self.pop_batch_size {
            match self.pop()? {
                Some(message) => messages.push(message),
                None => break,
            }
        }
        Ok(messages)
    }

    /// Number of buffered messages
    pub fn pending(&self) -> Result<usize> {
        self.subscription.pending()
    }
}

impl Selectable for NotificationConsumer {
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
