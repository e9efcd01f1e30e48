use std::sync::Arc;

use tracing::trace;

use super::NotificationMessage;
use crate::DbConnector;
use crate::Result;
use crate::RowStore;

/// Sending side of a notification channel
///
/// Fire and forget: `send` never waits for subscribers, and a message
/// published while nobody is subscribed is lost.
pub struct NotificationProducer {
    store: Arc<dyn RowStore>,
    channel: String,
}

impl std::fmt::Debug for NotificationProducer {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("NotificationProducer").field("channel", &self.channel).finish()
    }
}

impl NotificationProducer {
    pub fn new(
        db: &DbConnector,
        channel: &str,
    ) -> Self {
        Self {
            store: db.store(),
            channel: channel.to_string(),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Publishes `(op, data, fields)` as one message and returns how many
    /// subscribers received it.
    ///
    /// Retrying is not idempotent: subscribers would see the message twice.
    pub fn send(
        &self,
        op: &str,
        data: &str,
        fields: &[(String, String)],
    ) -> Result<usize> {
        let message = NotificationMessage::new(op, data, fields.to_vec());
        let receivers = self.store.publish(&self.channel, message.encode()?)?;
        trace!(channel = %self.channel, op, data, receivers, "Notification sent");
        Ok(receivers)
    }
}
