//! Key-space watcher: coalesced change notifications for rows written
//! directly to the store.

mod subscriber_state_table;

pub use subscriber_state_table::*;
