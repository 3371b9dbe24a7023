//! Staff accounts
//!
//! Local username / password login against the `user` table. Hashes are
//! argon2 PHC strings, see [`crate::utils::password`].

pub mod service;

pub use service::AuthService;
