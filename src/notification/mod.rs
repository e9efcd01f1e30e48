//! Broadcast notification channel for point events.

mod consumer;
mod message;
mod producer;

pub use consumer::*;
pub use message::*;
pub use producer::*;
