//! Domain events broadcast after each committed mutation.
//!
//! Events are observability output, not part of the persisted state:
//! they are sent only after the owning transaction commits, and a lagging
//! or absent subscriber never affects the operation that produced them.

use serde::Serialize;
use shared::models::{OrderStatus, PaymentMethod};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DomainEvent {
    OrderCreated {
        order_id: String,
        buyer_id: String,
        merchant_id: String,
        total: i64,
    },
    StatusChanged {
        order_id: String,
        from: OrderStatus,
        to: OrderStatus,
    },
    PaymentRecorded {
        order_id: String,
        buyer_id: String,
        amount: i64,
        method: PaymentMethod,
    },
    LocationUpdated {
        order_id: String,
        driver_id: String,
        lat: f64,
        lng: f64,
    },
    WalletToppedUp {
        user_id: String,
        amount: i64,
        balance: i64,
    },
}
