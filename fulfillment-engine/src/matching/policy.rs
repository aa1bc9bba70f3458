//! Pure read-side filters deciding what a driver sees and who gets the
//! "ready" broadcast. No stored state of its own; mutation never consults
//! this module.

use shared::models::{Order, OrderStatus, User};

/// Whether an order appears in this driver's order list:
/// open for claim (`ready`, unassigned), or one of their own active/past
/// deliveries.
pub fn driver_visible(driver_id: &str, order: &Order) -> bool {
    if order.is_claimable() {
        return true;
    }
    order.is_assigned_to(driver_id)
        && matches!(
            order.status,
            OrderStatus::Pickup | OrderStatus::Delivered | OrderStatus::Completed
        )
}

/// Whether a user receives the "ready" fan-out: an active, verified
/// driver account.
pub fn eligible_for_fanout(user: &User) -> bool {
    user.is_driver() && user.active && user.verified
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::{PaymentMethod, PaymentStatus, UserRole};

    fn order_with(status: OrderStatus, driver_id: Option<&str>) -> Order {
        let now = chrono::Utc::now().timestamp_millis();
        Order {
            id: "ORD-1".to_string(),
            buyer_id: "buyer-1".to_string(),
            merchant_id: "merchant-1".to_string(),
            driver_id: driver_id.map(str::to_string),
            driver_name: None,
            items: vec![],
            subtotal: 10_000,
            delivery_fee: 5_000,
            total: 15_000,
            delivery_address: "Jl. Merdeka 1".to_string(),
            notes: None,
            status,
            tracking_number: None,
            driver_location: None,
            payment_method: PaymentMethod::Wallet,
            payment_status: PaymentStatus::Pending,
            paid_at: None,
            pickup_time: None,
            delivered_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn driver(active: bool, verified: bool) -> User {
        User {
            id: "driver-1".to_string(),
            name: "Budi".to_string(),
            role: UserRole::Driver,
            active,
            verified,
            location: None,
        }
    }

    #[test]
    fn unassigned_ready_orders_are_open_to_everyone() {
        let order = order_with(OrderStatus::Ready, None);
        assert!(driver_visible("driver-1", &order));
        assert!(driver_visible("driver-2", &order));
    }

    #[test]
    fn assigned_orders_only_visible_to_their_driver() {
        let order = order_with(OrderStatus::Pickup, Some("driver-1"));
        assert!(driver_visible("driver-1", &order));
        assert!(!driver_visible("driver-2", &order));
    }

    #[test]
    fn preparing_orders_are_hidden() {
        let order = order_with(OrderStatus::Preparing, None);
        assert!(!driver_visible("driver-1", &order));
    }

    #[test]
    fn completed_deliveries_stay_in_history() {
        let order = order_with(OrderStatus::Completed, Some("driver-1"));
        assert!(driver_visible("driver-1", &order));
    }

    #[test]
    fn fanout_requires_active_and_verified() {
        assert!(eligible_for_fanout(&driver(true, true)));
        assert!(!eligible_for_fanout(&driver(false, true)));
        assert!(!eligible_for_fanout(&driver(true, false)));

        let mut buyer = driver(true, true);
        buyer.role = UserRole::Buyer;
        assert!(!eligible_for_fanout(&buyer));
    }
}
