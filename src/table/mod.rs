//! Row model shared by every transport and plain table access.

#[allow(clippy::module_inception)]
mod table;
mod types;

pub(crate) use table::TableLocation;
pub use table::Table;
pub use types::*;
