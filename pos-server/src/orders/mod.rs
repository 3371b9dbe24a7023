//! Order Commit Engine
//!
//! Turns a fully priced cart into one order with its items, payments and
//! stock decrements, all in a single transaction.
//!
//! - [`OrderService`] - commit entry point
//! - [`OrderNumberGenerator`] - `ORD-<millis>-<seq>` numbering
//! - [`money`] - decimal totals and cart building

pub mod money;
pub mod number;
pub mod service;

pub use money::CartBuilder;
pub use number::OrderNumberGenerator;
pub use service::{OrderPolicy, OrderService};
