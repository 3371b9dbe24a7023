//! Shared types for the POS workspace
//!
//! Error types, response envelope, data models and small utilities used
//! by pos-server and any client talking to it.

pub mod error;
pub mod models;
pub mod util;

// Re-exports
pub use error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};
pub use serde::{Deserialize, Serialize};
