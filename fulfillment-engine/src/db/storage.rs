//! redb-backed storage for the fulfillment core.
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `orders` | `order_id` | `Order` | Order records |
//! | `wallets` | `user_id` | `WalletAccount` | One balance per user |
//! | `wallet_transactions` | `tx_id` | `WalletTransaction` | Append-only ledger |
//! | `notifications` | `notification_id` | `Notification` | Per-recipient messages |
//! | `counters` | name | `u64` | Order id counter |
//!
//! Values are JSON-serialized. All helpers that mutate take a
//! `&WriteTransaction` so one caller-facing operation can commit every
//! write it performs in a single transaction; redb write transactions are
//! serialized and all-or-nothing, which is what keeps the wallet
//! `balance >= 0` invariant safe under concurrent debit attempts.

use redb::{
    Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction,
};
use shared::models::{Notification, Order, WalletAccount, WalletTransaction};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

const ORDERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("orders");
const WALLETS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("wallets");
const WALLET_TXNS_TABLE: TableDefinition<&str, &[u8]> =
    TableDefinition::new("wallet_transactions");
const NOTIFICATIONS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("notifications");
const COUNTERS_TABLE: TableDefinition<&str, u64> = TableDefinition::new("counters");

const ORDER_COUNT_KEY: &str = "order_count";

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for shared::CoreError {
    fn from(err: StorageError) -> Self {
        shared::CoreError::Store(err.to_string())
    }
}

/// Keyed store backed by redb.
#[derive(Clone)]
pub struct Storage {
    db: Arc<Database>,
}

impl Storage {
    /// Open or create the database at the given path.
    ///
    /// redb commits with immediate durability and keeps the file in a
    /// consistent state via copy-on-write, so a crash mid-operation leaves
    /// either the whole mutation or none of it.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        let storage = Self { db: Arc::new(db) };
        storage.init_tables()?;
        Ok(storage)
    }

    /// Open an in-memory database (tests and embedders).
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        let storage = Self { db: Arc::new(db) };
        storage.init_tables()?;
        Ok(storage)
    }

    fn init_tables(&self) -> StorageResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let _ = write_txn.open_table(ORDERS_TABLE)?;
            let _ = write_txn.open_table(WALLETS_TABLE)?;
            let _ = write_txn.open_table(WALLET_TXNS_TABLE)?;
            let _ = write_txn.open_table(NOTIFICATIONS_TABLE)?;

            let mut counters = write_txn.open_table(COUNTERS_TABLE)?;
            if counters.get(ORDER_COUNT_KEY)?.is_none() {
                counters.insert(ORDER_COUNT_KEY, 0u64)?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Begin a write transaction.
    pub fn begin_write(&self) -> StorageResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }

    // ========== Order Counter ==========

    /// Get and increment the order count atomically. Returns the NEW count.
    ///
    /// Runs in its own transaction: redb does not allow nested write
    /// transactions, so callers pre-generate ids before opening theirs.
    pub fn next_order_count(&self) -> StorageResult<u64> {
        let txn = self.db.begin_write()?;
        let next = {
            let mut table = txn.open_table(COUNTERS_TABLE)?;
            let current = table.get(ORDER_COUNT_KEY)?.map(|g| g.value()).unwrap_or(0);
            let next = current + 1;
            table.insert(ORDER_COUNT_KEY, next)?;
            next
        };
        txn.commit()?;
        Ok(next)
    }

    // ========== Orders ==========

    /// Store or replace an order (within transaction).
    pub fn put_order(&self, txn: &WriteTransaction, order: &Order) -> StorageResult<()> {
        let mut table = txn.open_table(ORDERS_TABLE)?;
        let value = serde_json::to_vec(order)?;
        table.insert(order.id.as_str(), value.as_slice())?;
        Ok(())
    }

    /// Load an order within a write transaction (authoritative read for
    /// read-modify-write).
    pub fn get_order_in_txn(
        &self,
        txn: &WriteTransaction,
        order_id: &str,
    ) -> StorageResult<Option<Order>> {
        let table = txn.open_table(ORDERS_TABLE)?;
        match table.get(order_id)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Remove an order (within transaction). Returns whether it existed.
    pub fn remove_order(&self, txn: &WriteTransaction, order_id: &str) -> StorageResult<bool> {
        let mut table = txn.open_table(ORDERS_TABLE)?;
        Ok(table.remove(order_id)?.is_some())
    }

    /// Load an order by id (read-only).
    pub fn get_order(&self, order_id: &str) -> StorageResult<Option<Order>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;
        match table.get(order_id)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Load all orders (read-only).
    pub fn list_orders(&self) -> StorageResult<Vec<Order>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;
        let mut orders = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            orders.push(serde_json::from_slice(value.value())?);
        }
        Ok(orders)
    }

    // ========== Wallets ==========

    /// Store or replace a wallet account (within transaction).
    pub fn put_wallet(&self, txn: &WriteTransaction, wallet: &WalletAccount) -> StorageResult<()> {
        let mut table = txn.open_table(WALLETS_TABLE)?;
        let value = serde_json::to_vec(wallet)?;
        table.insert(wallet.user_id.as_str(), value.as_slice())?;
        Ok(())
    }

    /// Load a wallet within a write transaction.
    pub fn get_wallet_in_txn(
        &self,
        txn: &WriteTransaction,
        user_id: &str,
    ) -> StorageResult<Option<WalletAccount>> {
        let table = txn.open_table(WALLETS_TABLE)?;
        match table.get(user_id)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Load a wallet by user id (read-only).
    pub fn get_wallet(&self, user_id: &str) -> StorageResult<Option<WalletAccount>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(WALLETS_TABLE)?;
        match table.get(user_id)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    // ========== Wallet Transactions ==========

    /// Append a ledger row (within transaction). Rows are never mutated.
    pub fn append_wallet_tx(
        &self,
        txn: &WriteTransaction,
        tx: &WalletTransaction,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(WALLET_TXNS_TABLE)?;
        let value = serde_json::to_vec(tx)?;
        table.insert(tx.id.as_str(), value.as_slice())?;
        Ok(())
    }

    /// All ledger rows for one user (read-only, unsorted).
    pub fn list_wallet_txs(&self, user_id: &str) -> StorageResult<Vec<WalletTransaction>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(WALLET_TXNS_TABLE)?;
        let mut rows = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            let tx: WalletTransaction = serde_json::from_slice(value.value())?;
            if tx.user_id == user_id {
                rows.push(tx);
            }
        }
        Ok(rows)
    }

    // ========== Notifications ==========

    /// Store or replace a notification (within transaction).
    pub fn put_notification(
        &self,
        txn: &WriteTransaction,
        notification: &Notification,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(NOTIFICATIONS_TABLE)?;
        let value = serde_json::to_vec(notification)?;
        table.insert(notification.id.as_str(), value.as_slice())?;
        Ok(())
    }

    /// Load a notification within a write transaction.
    pub fn get_notification_in_txn(
        &self,
        txn: &WriteTransaction,
        id: &str,
    ) -> StorageResult<Option<Notification>> {
        let table = txn.open_table(NOTIFICATIONS_TABLE)?;
        match table.get(id)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Remove a notification (within transaction). Returns whether it existed.
    pub fn remove_notification(&self, txn: &WriteTransaction, id: &str) -> StorageResult<bool> {
        let mut table = txn.open_table(NOTIFICATIONS_TABLE)?;
        Ok(table.remove(id)?.is_some())
    }

    /// All notifications for one recipient, within a write transaction
    /// (used by mark-all-read and clear).
    pub fn list_notifications_in_txn(
        &self,
        txn: &WriteTransaction,
        user_id: &str,
    ) -> StorageResult<Vec<Notification>> {
        let table = txn.open_table(NOTIFICATIONS_TABLE)?;
        let mut rows = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            let n: Notification = serde_json::from_slice(value.value())?;
            if n.user_id == user_id {
                rows.push(n);
            }
        }
        Ok(rows)
    }

    /// All notifications for one recipient (read-only, unsorted).
    pub fn list_notifications(&self, user_id: &str) -> StorageResult<Vec<Notification>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(NOTIFICATIONS_TABLE)?;
        let mut rows = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            let n: Notification = serde_json::from_slice(value.value())?;
            if n.user_id == user_id {
                rows.push(n);
            }
        }
        Ok(rows)
    }
}
