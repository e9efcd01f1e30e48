//! Event multiplexer: one control loop waiting on many consumers at once.

#[allow(clippy::module_inception)]
mod select;
mod selectable;
mod selectable_event;

pub use select::*;
pub use selectable::*;
pub use selectable_event::*;

#[cfg(test)]
mod select_test;
