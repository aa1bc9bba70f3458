//! Order record and fulfillment status.
//!
//! Amounts are integer rupiah; `total = subtotal + delivery_fee` holds at
//! every point in the order's lifecycle. Item prices are captured at order
//! time and never re-read from the live catalog.

use serde::{Deserialize, Serialize};

/// Fulfillment status. Transitions are monotonic along one fixed path,
/// no regression and no skipping:
///
/// ```text
/// preparing -> ready -> pickup -> delivered -> completed
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Preparing,
    Ready,
    Pickup,
    Delivered,
    Completed,
}

impl OrderStatus {
    /// Canonical linear flow, in order.
    pub const FLOW: [OrderStatus; 5] = [
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::Pickup,
        OrderStatus::Delivered,
        OrderStatus::Completed,
    ];

    /// Position of this status within the canonical flow.
    pub fn position(self) -> usize {
        match self {
            OrderStatus::Preparing => 0,
            OrderStatus::Ready => 1,
            OrderStatus::Pickup => 2,
            OrderStatus::Delivered => 3,
            OrderStatus::Completed => 4,
        }
    }

    /// The single status reachable from this one, if any.
    pub fn next(self) -> Option<OrderStatus> {
        Self::FLOW.get(self.position() + 1).copied()
    }

    pub fn is_terminal(self) -> bool {
        self == OrderStatus::Completed
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Preparing => "PREPARING",
            OrderStatus::Ready => "READY",
            OrderStatus::Pickup => "PICKUP",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Completed => "COMPLETED",
        }
    }
}

/// Payment settlement state. `Pending -> Paid` happens exactly once;
/// `Paid` is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
}

/// How the buyer settles the order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// In-platform stored-value balance.
    #[default]
    Wallet,
    /// Cash on delivery.
    Cod,
    BankTransfer,
}

impl PaymentMethod {
    /// Wallet-settled methods debit the buyer's balance at payment time.
    pub fn is_wallet(self) -> bool {
        self == PaymentMethod::Wallet
    }
}

/// One ordered line item; unit price captured at order time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub product_id: String,
    pub name: String,
    pub quantity: i64,
    /// Integer rupiah per unit.
    pub unit_price: i64,
}

impl OrderItem {
    /// `unit_price * quantity`, or `None` when the product overflows `i64`.
    pub fn line_total(&self) -> Option<i64> {
        self.unit_price.checked_mul(self.quantity)
    }
}

/// Last-known driver position. Last-writer-wins point update; no track
/// history is retained here.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DriverLocation {
    pub lat: f64,
    pub lng: f64,
    /// Millisecond timestamp of the update.
    pub updated_at: i64,
}

/// One purchase transaction from one buyer to one merchant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    /// Human-legible order id, e.g. `ORD-20260829-10001`.
    pub id: String,
    pub buyer_id: String,
    pub merchant_id: String,
    /// Assigned at pickup, immutable once set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<String>,
    /// Driver display name snapshot, captured at pickup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_name: Option<String>,
    pub items: Vec<OrderItem>,
    pub subtotal: i64,
    pub delivery_fee: i64,
    /// Always `subtotal + delivery_fee`; immutable after creation.
    pub total: i64,
    pub delivery_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub status: OrderStatus,
    /// Assigned once, when the order first reaches `Ready`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_location: Option<DriverLocation>,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pickup_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Order {
    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }

    pub fn has_driver(&self) -> bool {
        self.driver_id.is_some()
    }

    /// Whether the given driver is the one assigned to this order.
    pub fn is_assigned_to(&self, driver_id: &str) -> bool {
        self.driver_id.as_deref() == Some(driver_id)
    }

    /// Open for claim: ready for pickup and not yet taken by any driver.
    pub fn is_claimable(&self) -> bool {
        self.status == OrderStatus::Ready && self.driver_id.is_none()
    }
}
