//! Domain records persisted by the fulfillment core.

pub mod notification;
pub mod order;
pub mod user;
pub mod wallet;

pub use notification::{Notification, NotificationType};
pub use order::{
    DriverLocation, Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus,
};
pub use user::{GeoPoint, User, UserRole};
pub use wallet::{TransactionStatus, TransactionType, WalletAccount, WalletTransaction};
