use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

#[cfg(test)]
use mockall::automock;
use tokio::sync::Notify;

use crate::Result;

/// Process-unique identity of a selectable object
pub type SelectableId = u64;

static NEXT_SELECTABLE_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_selectable_id() -> SelectableId {
    NEXT_SELECTABLE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Consumer-side object the event multiplexer can wait on
///
/// Readiness is level triggered: `has_pending` reports current occupancy,
/// so an object stays ready until drained no matter how many wake-ups it
/// received. The notifier only tells the multiplexer when to look again.
#[cfg_attr(test, automock)]
pub trait Selectable: Send + Sync {
    fn selectable_id(&self) -> SelectableId;

    /// True while at least one item is waiting. Must not consume anything
    /// the caller would later `pop`.
    fn has_pending(&self) -> Result<bool>;

    /// Signalled whenever new data may have arrived
    fn notifier(&self) -> Arc<Notify>;

    /// Higher priorities are reported first when several objects are ready
    fn priority(&self) -> i32 {
        0
    }
}
