//! Data models
//!
//! Shared between pos-server and its front ends.
//! DB row types use `#[cfg_attr(feature = "db", derive(sqlx::FromRow))]`.
//! All IDs are `i64` snowflakes, see [`crate::util::snowflake_id`].

pub mod audit;
pub mod backup;
pub mod expense;
pub mod order;
pub mod product;
pub mod report;
pub mod setting;
pub mod user;

// Re-exports
pub use audit::*;
pub use backup::*;
pub use expense::*;
pub use order::*;
pub use product::*;
pub use report::*;
pub use setting::*;
pub use user::*;
