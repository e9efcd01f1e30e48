use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::Notify;
use tracing::trace;

use super::next_selectable_id;
use super::Selectable;
use super::SelectableId;
use crate::Result;

/// In-process selectable signalled by hand
///
/// Useful to wake a dispatch loop from another task, e.g. to make it
/// deregister everything and return. Signals are counted; `take` consumes
/// them all at once.
#[derive(Debug)]
pub struct SelectableEvent {
    id: SelectableId,
    signals: AtomicU64,
    notifier: Arc<Notify>,
    priority: i32,
}

impl Default for SelectableEvent {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectableEvent {
    pub fn new() -> Self {
        Self::with_priority(0)
    }

    pub fn with_priority(priority: i32) -> Self {
        Self {
            id: next_selectable_id(),
            signals: AtomicU64::new(0),
            notifier: Arc::new(Notify::new()),
            priority,
        }
    }

    pub fn notify(&self) {
        let signals = self.signals.fetch_add(1, Ordering::AcqRel) + 1;
        trace!(selectable_id = self.id, signals, "Event signalled");
        self.notifier.notify_one();
    }

    /// Returns and clears the number of signals received since the last call
    pub fn take(&self) -> u64 {
        self.signals.swap(0, Ordering::AcqRel)
    }

    pub fn signals(&self) -> u64 {
        self.signals.load(Ordering::Acquire)
    }
}

impl Selectable for SelectableEvent {
    fn selectable_id(&self) -> SelectableId {
        self.id
    }

    fn has_pending(&self) -> Result<bool> {
        Ok(self.signals() > 0)
    }

    fn notifier(&self) -> Arc<Notify> {
        self.notifier.clone()
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}
