//! # filesync-bus
//!
//! Change bus for FileSync. Provides:
//!
//! - An in-process bus with consumer-group semantics for single-node use
//! - A Redis Streams bus for multi-node deployments (`redis-bus` feature)
//! - [`ChangeBusClient`], which names topics and consumer groups, encodes
//!   change events and runs the blocking subscribe loop

pub mod client;
pub mod factory;
pub mod providers;

pub use client::ChangeBusClient;
pub use factory::build_change_bus;
pub use providers::MemoryChangeBus;
