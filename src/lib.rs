//! State synchronization over a shared key-value store.
//!
//! Producers and consumers in independent processes exchange row-level
//! updates through the store alone:
//!
//! - [`ProducerTable`] / [`ConsumerTable`]: FIFO transport, one pop per write
//! - [`ProducerStateTable`] / [`ConsumerStateTable`]: coalescing transport,
//!   one pop per dirty key carrying the latest row state
//! - [`SubscriberStateTable`]: key-space watcher for rows written directly
//! - [`NotificationProducer`] / [`NotificationConsumer`]: broadcast point
//!   events
//! - [`Select`]: waits on any mix of the consumer-side objects above
//!
//! ```ignore
//! let instance = MemoryInstance::default();
//! let db = DbConnector::new(&instance, "APPL_DB", &DatabaseCatalog::default())?;
//!
//! let consumer = Arc::new(ConsumerStateTable::new(&db, "PORT_TABLE")?);
//! let mut select = Select::new();
//! select.add_selectable(consumer.clone());
//!
//! ProducerStateTable::new(&db, "PORT_TABLE").set("Ethernet0", &field_values([("mtu", "9100")]))?;
//!
//! if let SelectOutcome::Object(ready) = select.select(None).await {
//!     while let Some(entry) = consumer.pop()? { /* dispatch */ }
//! }
//! ```

mod config;
mod connector;
mod constants;
mod errors;
mod notification;
mod select;
mod storage;
mod table;
mod transport;
pub mod utils;
mod watch;

pub use config::*;
pub use connector::*;
pub use errors::*;
pub use notification::*;
pub use select::*;
pub use storage::*;
pub use table::*;
pub use transport::*;
pub use watch::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
