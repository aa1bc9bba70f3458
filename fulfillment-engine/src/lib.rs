//! Order fulfillment and payment core for the marketplace.
//!
//! This crate owns the one subsystem with real cross-cutting coordination:
//! the order status state machine, driver visibility and matching, the
//! multi-party notification fan-out triggered by state transitions, and a
//! wallet ledger that keeps balances consistent under concurrent
//! debits and credits.
//!
//! HTTP framing, authentication, uploads and catalog browsing live outside
//! this crate; callers drive it through [`orders::LifecycleManager`].
//!
//! # Atomicity
//!
//! Every caller-facing mutation commits all of its order/wallet/ledger/
//! notification writes in a single redb write transaction. Write
//! transactions are serialized and all-or-nothing, so a concurrent reader
//! never observes partial state and the check-then-debit race on wallet
//! balances cannot occur.

pub mod core;
pub mod db;
pub mod directory;
pub mod matching;
pub mod notifications;
pub mod orders;
pub mod tracking;
pub mod wallet;

pub use core::{Config, DomainEvent};
pub use db::Storage;
pub use directory::{InMemoryDirectory, UserDirectory};
pub use orders::LifecycleManager;
pub use wallet::WalletLedger;
