//! Core traits defined in `filesync-core` and implemented by other crates.

pub mod bus;
pub mod storage;

pub use bus::{BusMessage, BusStream, ChangeBus};
pub use storage::{BlobStore, ByteStream};
