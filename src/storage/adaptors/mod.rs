//! Row store adapters shipped with the crate.
//!
//! Only the in-memory adapter lives here. Anything else that implements
//! [`crate::RowStore`] and [`crate::StoreInstance`] plugs into the transports
//! the same way.

pub mod mem;

pub use mem::*;
