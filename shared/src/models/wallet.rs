//! Wallet account and ledger rows.
//!
//! Balances are integer rupiah and never negative. Ledger rows are
//! append-only; the sum of signed amounts for a user reconciles with that
//! user's balance changes.

use serde::{Deserialize, Serialize};

/// One stored-value balance per user. Created lazily with zero balance on
/// first access; never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WalletAccount {
    pub user_id: String,
    /// Integer rupiah, `>= 0` at all times.
    pub balance: i64,
    pub updated_at: i64,
}

impl WalletAccount {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            balance: 0,
            updated_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Ledger entry kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Topup,
    Payment,
    Refund,
}

impl TransactionType {
    /// Sign of the balance change this entry represents.
    pub fn sign(self) -> i64 {
        match self {
            TransactionType::Topup | TransactionType::Refund => 1,
            TransactionType::Payment => -1,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    #[default]
    Completed,
    Pending,
    Failed,
}

/// Immutable ledger row. Amounts are positive magnitudes; the type carries
/// the sign.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WalletTransaction {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    pub amount: i64,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    pub status: TransactionStatus,
    pub created_at: i64,
}

impl WalletTransaction {
    pub fn new(
        user_id: impl Into<String>,
        tx_type: TransactionType,
        amount: i64,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            tx_type,
            amount,
            description: description.into(),
            order_id: None,
            status: TransactionStatus::Completed,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn with_order(mut self, order_id: impl Into<String>) -> Self {
        self.order_id = Some(order_id.into());
        self
    }

    /// Signed balance delta this row represents.
    pub fn signed_amount(&self) -> i64 {
        self.tx_type.sign() * self.amount
    }
}
