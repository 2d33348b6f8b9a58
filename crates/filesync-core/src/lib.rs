//! # filesync-core
//!
//! Core crate for FileSync. Contains the unified error system, configuration
//! schemas, the change event model, pagination types and
//! the traits implemented by the blob store and change bus crates.
//!
//! This crate has **no** internal dependencies on other FileSync crates.

pub mod config;
pub mod error;
pub mod events;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
