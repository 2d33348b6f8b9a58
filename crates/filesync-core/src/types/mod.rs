//! Core type definitions used across the FileSync workspace.

pub mod pagination;

pub use pagination::{PageRequest, PageResponse};
