//! Convenience result type alias for FileSync.

use crate::error::AppError;

/// A specialized `Result` type for FileSync operations.
pub type AppResult<T> = Result<T, AppError>;
