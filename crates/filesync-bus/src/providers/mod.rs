//! Change bus backends.

pub mod memory;
#[cfg(feature = "redis-bus")]
pub mod redis;

pub use memory::MemoryChangeBus;
#[cfg(feature = "redis-bus")]
pub use self::redis::RedisChangeBus;
