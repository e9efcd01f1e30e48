//! Broadcast publish/subscribe shared by every database of one instance.
//!
//! Each subscriber owns a bounded FIFO buffer inside the hub, so delivery
//! order is per subscriber publish order and a slow subscriber never blocks
//! a publisher: when a buffer is full the new message is dropped for that
//! subscriber only. The drop is counted and reported to the subscriber as
//! [`StoreError::SubscriberOverflow`] before anything else is read.
//!
//! A wake-up published while the same wake-up is still unread at the tail of
//! a buffer is folded into it, so idle transport consumers hold at most one.

use std::collections::VecDeque;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::trace;
use tracing::warn;

use crate::constants::WAKEUP_PAYLOAD;
use crate::PubSubMessage;
use crate::StoreError;
use crate::SubscriptionId;
use crate::Topic;

struct Subscriber {
    topic: Topic,
    buffer: Mutex<SubscriberBuffer>,
    notifier: Arc<Notify>,
}

#[derive(Default)]
struct SubscriberBuffer {
    messages: VecDeque<PubSubMessage>,
    /// Messages dropped since the subscriber last observed an overflow
    dropped: u64,
}

impl SubscriberBuffer {
    fn overflow(
        &self,
        id: SubscriptionId,
    ) -> Result<(), StoreError> {
        if self.dropped == 0 {
            return Ok(());
        }
        Err(StoreError::SubscriberOverflow {
            id,
            dropped: self.dropped,
        })
    }

    fn is_unread_wakeup(
        &self,
        channel: &str,
        payload: &[u8],
    ) -> bool {
        payload == WAKEUP_PAYLOAD
            && matches!(self.messages.back(), Some(last) if last.channel == channel && last.payload == payload)
    }
}

pub struct PubSubHub {
    subscribers: DashMap<SubscriptionId, Subscriber>,
    next_id: AtomicU64,
    max_pending: usize,
}

impl std::fmt::Debug for PubSubHub {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("PubSubHub")
            .field("subscribers", &self.subscribers.len())
            .field("next_id", &self.next_id)
            .field("max_pending", &self.max_pending)
            .finish()
    }
}

impl PubSubHub {
    pub fn new(max_pending: usize) -> Self {
        Self {
            subscribers: DashMap::new(),
            next_id: AtomicU64::new(1),
            max_pending,
        }
    }

    /// Hands out ids unique across the instance (subscriptions and clients)
    pub(crate) fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn subscribe(
        &self,
        topic: Topic,
    ) -> SubscriptionId {
        let id = self.next_id();
        self.subscribers.insert(
            id,
            Subscriber {
                topic,
                buffer: Mutex::new(SubscriberBuffer::default()),
                notifier: Arc::new(Notify::new()),
            },
        );
        id
    }

    pub fn unsubscribe(
        &self,
        id: SubscriptionId,
    ) {
        self.subscribers.remove(&id);
    }

    /// Returns the number of subscribers that received the message
    pub fn publish(
        &self,
        channel: &str,
        payload: &[u8],
    ) -> usize {
        let mut receivers = 0;

        for entry in self.subscribers.iter() {
            let subscriber = entry.value();
            if !subscriber.topic.matches(channel) {
                continue;
            }

            let pattern = match &subscriber.topic {
                Topic::Pattern(p) => Some(p.clone()),
                Topic::Channel(_) => None,
            };

            {
                let mut buffer = subscriber.buffer.lock();
                // A folded wake-up still signals below: a waiter may already
                // have consumed the permit of the unread one.
                if !buffer.is_unread_wakeup(channel, payload) {
                    if buffer.messages.len() >= self.max_pending {
                        buffer.dropped += 1;
                        warn!(
                            subscription_id = *entry.key(),
                            channel,
                            max_pending = self.max_pending,
                            dropped = buffer.dropped,
                            "Subscriber buffer full, message dropped"
                        );
                        drop(buffer);
                        subscriber.notifier.notify_one();
                        continue;
                    }
                    buffer.messages.push_back(PubSubMessage {
                        channel: channel.to_string(),
                        pattern,
                        payload: payload.to_vec(),
                    });
                }
            }

            subscriber.notifier.notify_one();
            receivers += 1;
        }

        trace!(channel, receivers, "Message published");
        receivers
    }

    /// Oldest buffered message.
    ///
    /// After an overflow the first call fails with
    /// [`StoreError::SubscriberOverflow`] and resets the drop count; the
    /// messages buffered before the overflow are returned by later calls.
    pub fn next_message(
        &self,
        id: SubscriptionId,
    ) -> Result<Option<PubSubMessage>, StoreError> {
        let subscriber = self.subscribers.get(&id).ok_or(StoreError::UnknownSubscription(id))?;
        let mut buffer = subscriber.buffer.lock();
        if let Err(e) = buffer.overflow(id) {
            buffer.dropped = 0;
            return Err(e);
        }
        Ok(buffer.messages.pop_front())
    }

    /// Number of buffered messages. Fails without consuming anything while
    /// an overflow is unobserved.
    pub fn pending_messages(
        &self,
        id: SubscriptionId,
    ) -> Result<usize, StoreError> {
        let subscriber = self.subscribers.get(&id).ok_or(StoreError::UnknownSubscription(id))?;
        let buffer = subscriber.buffer.lock();
        buffer.overflow(id)?;
        Ok(buffer.messages.len())
    }

    pub fn notifier(
        &self,
        id: SubscriptionId,
    ) -> Result<Arc<Notify>, StoreError> {
        let subscriber = self.subscribers.get(&id).ok_or(StoreError::UnknownSubscription(id))?;
        Ok(subscriber.notifier.clone())
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
