//! # filesync-database
//!
//! Metadata store for FileSync: the [`MetadataStore`] contract, the
//! PostgreSQL implementation with its connection pool and migrations, and an
//! in-memory implementation used by tests and development setups.

pub mod connection;
pub mod memory;
pub mod migration;
pub mod repositories;
pub mod store;

pub use connection::DatabasePool;
pub use memory::MemoryMetadataStore;
pub use repositories::FileRepository;
pub use store::{ConflictResolution, MetadataStore};
