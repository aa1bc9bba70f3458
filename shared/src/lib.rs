//! Shared domain models and error taxonomy for the marketplace
//! fulfillment core.
//!
//! This crate holds the serializable records (orders, wallets,
//! notifications, users) and nothing else: no storage, no orchestration.

pub mod error;
pub mod models;

pub use error::{CoreError, CoreResult};
