//! Producer/consumer state transports.
//!
//! Both variants share the wake-up channel `{table}_CHANNEL`: producers
//! publish after queueing, consumers only use the messages as a signal to
//! look at the queue again.

mod coalesced;
mod fifo;

pub use coalesced::*;
pub use fifo::*;
