//! Route handlers organized by domain.

pub mod file;
pub mod health;
pub mod sync;
pub mod ws;
