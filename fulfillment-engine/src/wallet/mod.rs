//! Wallet ledger: balances and the append-only transaction log.

pub mod ledger;

pub use ledger::WalletLedger;
