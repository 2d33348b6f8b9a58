//! Domain events propagated between devices.
//!
//! Change events are transient: they travel over the change bus and are
//! never persisted beyond it.

pub mod change;

pub use change::{ChangeEvent, ChangeType};
