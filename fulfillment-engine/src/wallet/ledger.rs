//! Wallet ledger operations.
//!
//! The safety-critical invariant lives here: `balance >= 0`, always,
//! including under concurrent debit attempts. [`WalletLedger::debit_in_txn`]
//! performs the balance check and the balance write inside the caller's
//! write transaction, so the check-then-debit sequence is a single atomic
//! unit. Two concurrent payments against the same near-empty wallet are
//! serialized by the storage layer and the second one fails cleanly.

use crate::db::{Storage, StorageResult};
use redb::WriteTransaction;
use shared::models::{TransactionType, WalletAccount, WalletTransaction};
use shared::{CoreError, CoreResult};

pub struct WalletLedger {
    storage: Storage,
    /// Minimum accepted top-up, integer rupiah.
    min_topup_amount: i64,
}

impl WalletLedger {
    pub fn new(storage: Storage, min_topup_amount: i64) -> Self {
        Self {
            storage,
            min_topup_amount,
        }
    }

    /// Return the account, creating one with zero balance if absent.
    ///
    /// Creation is persisted so later reads observe the account.
    pub fn get_or_create(&self, user_id: &str) -> CoreResult<WalletAccount> {
        if let Some(wallet) = self.storage.get_wallet(user_id)? {
            return Ok(wallet);
        }
        let txn = self.storage.begin_write()?;
        // Re-check inside the transaction; a concurrent first access may
        // have created the account between the read and the write.
        let wallet = match self.storage.get_wallet_in_txn(&txn, user_id)? {
            Some(existing) => existing,
            None => {
                let wallet = WalletAccount::new(user_id);
                self.storage.put_wallet(&txn, &wallet)?;
                wallet
            }
        };
        txn.commit().map_err(crate::db::StorageError::from)?;
        Ok(wallet)
    }

    /// Credit the wallet within the caller's transaction. `amount > 0`.
    pub fn credit_in_txn(
        &self,
        txn: &WriteTransaction,
        user_id: &str,
        amount: i64,
    ) -> CoreResult<WalletAccount> {
        if amount <= 0 {
            return Err(CoreError::validation("credit amount must be positive"));
        }
        let mut wallet = self
            .storage
            .get_wallet_in_txn(txn, user_id)?
            .unwrap_or_else(|| WalletAccount::new(user_id));
        wallet.balance += amount;
        wallet.updated_at = chrono::Utc::now().timestamp_millis();
        self.storage.put_wallet(txn, &wallet)?;
        Ok(wallet)
    }

    /// Debit the wallet within the caller's transaction. `amount > 0` and
    /// the balance must cover it; otherwise nothing is written and the
    /// caller's whole operation aborts with the transaction.
    pub fn debit_in_txn(
        &self,
        txn: &WriteTransaction,
        user_id: &str,
        amount: i64,
    ) -> CoreResult<WalletAccount> {
        if amount <= 0 {
            return Err(CoreError::validation("debit amount must be positive"));
        }
        let mut wallet = self
            .storage
            .get_wallet_in_txn(txn, user_id)?
            .unwrap_or_else(|| WalletAccount::new(user_id));
        if wallet.balance < amount {
            return Err(CoreError::InsufficientFunds {
                balance: wallet.balance,
                requested: amount,
            });
        }
        wallet.balance -= amount;
        wallet.updated_at = chrono::Utc::now().timestamp_millis();
        self.storage.put_wallet(txn, &wallet)?;
        Ok(wallet)
    }

    /// Append an immutable ledger row within the caller's transaction.
    pub fn append_in_txn(&self, txn: &WriteTransaction, row: &WalletTransaction) -> StorageResult<()> {
        self.storage.append_wallet_tx(txn, row)
    }

    /// Top up the wallet: credit plus a `topup` ledger row, one
    /// transaction. Rejects amounts below the configured minimum. No
    /// notification side effect.
    pub fn top_up(&self, user_id: &str, amount: i64, method: &str) -> CoreResult<WalletAccount> {
        if amount < self.min_topup_amount {
            return Err(CoreError::Validation(format!(
                "top-up amount {} is below the minimum of {}",
                amount, self.min_topup_amount
            )));
        }

        let txn = self.storage.begin_write()?;
        let wallet = self.credit_in_txn(&txn, user_id, amount)?;
        let row = WalletTransaction::new(
            user_id,
            TransactionType::Topup,
            amount,
            format!("Top up via {}", method),
        );
        self.append_in_txn(&txn, &row)?;
        txn.commit().map_err(crate::db::StorageError::from)?;

        tracing::info!(user_id = %user_id, amount, balance = wallet.balance, "Wallet topped up");
        Ok(wallet)
    }

    /// Ledger rows for one user, newest first.
    pub fn history(&self, user_id: &str) -> CoreResult<Vec<WalletTransaction>> {
        let mut rows = self.storage.list_wallet_txs(user_id)?;
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> WalletLedger {
        WalletLedger::new(Storage::open_in_memory().unwrap(), 10_000)
    }

    #[test]
    fn get_or_create_is_lazy_and_persistent() {
        let ledger = ledger();
        let wallet = ledger.get_or_create("user-1").unwrap();
        assert_eq!(wallet.balance, 0);

        // Second call returns the stored account, not a fresh one.
        let again = ledger.get_or_create("user-1").unwrap();
        assert_eq!(again.user_id, "user-1");
        assert_eq!(again.balance, 0);
    }

    #[test]
    fn top_up_below_minimum_is_rejected() {
        let ledger = ledger();
        let err = ledger.top_up("user-1", 9_999, "bank_transfer").unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert_eq!(ledger.get_or_create("user-1").unwrap().balance, 0);
    }

    #[test]
    fn top_up_credits_and_appends_row() {
        let ledger = ledger();
        let wallet = ledger.top_up("user-1", 50_000, "bank_transfer").unwrap();
        assert_eq!(wallet.balance, 50_000);

        let history = ledger.history("user-1").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].tx_type, TransactionType::Topup);
        assert_eq!(history[0].signed_amount(), 50_000);
    }

    #[test]
    fn debit_of_exact_balance_leaves_zero() {
        let ledger = ledger();
        ledger.top_up("user-1", 30_000, "bank_transfer").unwrap();

        let txn = ledger.storage.begin_write().unwrap();
        let wallet = ledger.debit_in_txn(&txn, "user-1", 30_000).unwrap();
        txn.commit().unwrap();
        assert_eq!(wallet.balance, 0);
    }

    #[test]
    fn debit_one_over_balance_fails_and_changes_nothing() {
        let ledger = ledger();
        ledger.top_up("user-1", 30_000, "bank_transfer").unwrap();

        let txn = ledger.storage.begin_write().unwrap();
        let err = ledger.debit_in_txn(&txn, "user-1", 30_001).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InsufficientFunds {
                balance: 30_000,
                requested: 30_001
            }
        ));
        drop(txn);

        assert_eq!(ledger.get_or_create("user-1").unwrap().balance, 30_000);
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        let ledger = ledger();
        let txn = ledger.storage.begin_write().unwrap();
        assert!(matches!(
            ledger.credit_in_txn(&txn, "user-1", 0),
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            ledger.debit_in_txn(&txn, "user-1", -5),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn history_reconciles_with_balance() {
        let ledger = ledger();
        ledger.top_up("user-1", 50_000, "bank_transfer").unwrap();
        ledger.top_up("user-1", 20_000, "bank_transfer").unwrap();

        let txn = ledger.storage.begin_write().unwrap();
        ledger.debit_in_txn(&txn, "user-1", 45_000).unwrap();
        let row = WalletTransaction::new(
            "user-1",
            TransactionType::Payment,
            45_000,
            "Payment for ORD-1",
        );
        ledger.append_in_txn(&txn, &row).unwrap();
        txn.commit().unwrap();

        let balance = ledger.get_or_create("user-1").unwrap().balance;
        let reconciled: i64 = ledger
            .history("user-1")
            .unwrap()
            .iter()
            .map(|row| row.signed_amount())
            .sum();
        assert_eq!(balance, 25_000);
        assert_eq!(reconciled, balance);
    }
}
