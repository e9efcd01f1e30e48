mod mem_row_store;
mod pubsub_hub;

pub use mem_row_store::*;
pub use pubsub_hub::*;
