//! Row store boundary: the primitive surface the transports consume, its
//! in-memory adapter and the RAII subscription handle.

mod adaptors;
mod row_store;
mod subscription;

pub use adaptors::*;
pub use row_store::*;
pub use subscription::*;
