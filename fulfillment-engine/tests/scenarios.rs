//! End-to-end fulfillment flows against in-memory storage.

use fulfillment_engine::core::Config;
use fulfillment_engine::db::Storage;
use fulfillment_engine::directory::InMemoryDirectory;
use fulfillment_engine::orders::{CreateOrderRequest, LifecycleManager};
use shared::CoreError;
use shared::models::{
    GeoPoint, OrderItem, OrderStatus, PaymentMethod, PaymentStatus, TransactionType, User,
    UserRole,
};
use std::sync::Arc;

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn test_config() -> Config {
    Config {
        min_topup_amount: 10_000,
        default_delivery_fee: 5_000,
        event_channel_capacity: 64,
    }
}

fn user(id: &str, name: &str, role: UserRole) -> User {
    User {
        id: id.to_string(),
        name: name.to_string(),
        role,
        active: true,
        verified: true,
        location: None,
    }
}

/// Buyer, merchant (with a registered location) and three verified drivers.
fn marketplace() -> LifecycleManager {
    init_tracing();
    let directory = InMemoryDirectory::new();
    directory.insert(user("buyer-1", "Sari", UserRole::Buyer));
    let mut merchant = user("merchant-1", "Warung Makmur", UserRole::Merchant);
    merchant.location = Some(GeoPoint {
        lat: -6.2088,
        lng: 106.8456,
    });
    directory.insert(merchant);
    directory.insert(user("driver-1", "Budi", UserRole::Driver));
    directory.insert(user("driver-2", "Agus", UserRole::Driver));
    directory.insert(user("driver-3", "Tono", UserRole::Driver));

    LifecycleManager::new(
        Storage::open_in_memory().unwrap(),
        Arc::new(directory),
        test_config(),
    )
}

fn order_request() -> CreateOrderRequest {
    CreateOrderRequest {
        buyer_id: "buyer-1".to_string(),
        merchant_id: "merchant-1".to_string(),
        items: vec![OrderItem {
            product_id: "prod-1".to_string(),
            name: "Nasi Goreng".to_string(),
            quantity: 4,
            unit_price: 10_000,
        }],
        delivery_address: "Jl. Merdeka 1, Jakarta".to_string(),
        payment_method: PaymentMethod::Wallet,
        delivery_fee: Some(5_000),
        notes: None,
    }
}

#[tokio::test]
async fn full_delivery_flow() {
    let manager = marketplace();

    // Creation: totals add up, merchant is told.
    let order = manager.create_order(order_request()).await.unwrap();
    assert_eq!(order.total, 45_000);
    assert_eq!(order.subtotal + order.delivery_fee, order.total);
    assert_eq!(order.status, OrderStatus::Preparing);
    assert_eq!(
        manager
            .notifications()
            .list_for_user("merchant-1")
            .unwrap()
            .len(),
        1
    );

    // Ready: tracking number assigned once, all three drivers notified.
    let order = manager
        .advance_status(&order.id, "READY", None, None)
        .await
        .unwrap();
    let tracking = order.tracking_number.clone().unwrap();
    assert!(!tracking.is_empty());
    for driver in ["driver-1", "driver-2", "driver-3"] {
        let inbox = manager.notifications().list_for_user(driver).unwrap();
        assert_eq!(inbox.len(), 1, "driver {} missed the fan-out", driver);
    }

    // The open order is visible to every driver.
    let visible = manager.driver_visible_orders("driver-2").await.unwrap();
    assert_eq!(visible.len(), 1);

    // Pickup by driver-1: binding, pickup time, seeded location, two
    // notifications.
    let order = manager
        .advance_status(&order.id, "PICKUP", Some("driver-1"), None)
        .await
        .unwrap();
    assert_eq!(order.driver_id.as_deref(), Some("driver-1"));
    assert_eq!(order.driver_name.as_deref(), Some("Budi"));
    assert!(order.pickup_time.is_some());
    assert!(order.driver_location.is_some());
    assert_eq!(order.tracking_number.as_deref(), Some(tracking.as_str()));
    assert_eq!(
        manager
            .notifications()
            .list_for_user("merchant-1")
            .unwrap()
            .len(),
        2
    );
    assert_eq!(
        manager.notifications().list_for_user("buyer-1").unwrap().len(),
        1
    );

    // A second driver trying the same pickup gets a conflict.
    let err = manager
        .advance_status(&order.id, "PICKUP", Some("driver-2"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));

    // The claimed order drops out of other drivers' lists but stays in
    // driver-1's.
    assert!(
        manager
            .driver_visible_orders("driver-2")
            .await
            .unwrap()
            .is_empty()
    );
    assert_eq!(
        manager
            .driver_visible_orders("driver-1")
            .await
            .unwrap()
            .len(),
        1
    );

    // Delivered then completed; the tracking number never changes.
    let order = manager
        .advance_status(&order.id, "DELIVERED", None, None)
        .await
        .unwrap();
    assert!(order.delivered_at.is_some());
    assert_eq!(
        manager.notifications().list_for_user("buyer-1").unwrap().len(),
        2
    );

    let order = manager
        .advance_status(&order.id, "COMPLETED", None, None)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Completed);
    assert_eq!(order.tracking_number.as_deref(), Some(tracking.as_str()));
}

#[tokio::test]
async fn wallet_payment_flow() {
    let manager = marketplace();
    let order = manager.create_order(order_request()).await.unwrap();

    // Balance 30k cannot cover a 45k order; the order stays pending.
    manager
        .top_up_wallet("buyer-1", 30_000, "bank_transfer")
        .await
        .unwrap();
    let err = manager
        .record_payment(&order.id, "buyer-1", PaymentMethod::Wallet)
        .unwrap_err();
    assert!(matches!(err, CoreError::InsufficientFunds { .. }));
    assert_eq!(
        manager.get_order(&order.id).unwrap().payment_status,
        PaymentStatus::Pending
    );
    assert_eq!(manager.ledger().get_or_create("buyer-1").unwrap().balance, 30_000);

    // Top up to 50k, retry, succeed: balance 5k, one payment row of 45k,
    // merchant notified.
    manager
        .top_up_wallet("buyer-1", 20_000, "bank_transfer")
        .await
        .unwrap();
    let order = manager
        .record_payment(&order.id, "buyer-1", PaymentMethod::Wallet)
        .unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Paid);
    assert!(order.paid_at.is_some());
    assert_eq!(manager.ledger().get_or_create("buyer-1").unwrap().balance, 5_000);

    let history = manager.ledger().history("buyer-1").unwrap();
    let payments: Vec<_> = history
        .iter()
        .filter(|row| row.tx_type == TransactionType::Payment)
        .collect();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].amount, 45_000);
    assert_eq!(payments[0].order_id.as_deref(), Some(order.id.as_str()));

    let merchant_inbox = manager.notifications().list_for_user("merchant-1").unwrap();
    assert!(merchant_inbox.iter().any(|n| n.title == "Payment received"));

    // Double payment is rejected and the balance stays put.
    let err = manager
        .record_payment(&order.id, "buyer-1", PaymentMethod::Wallet)
        .unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));
    assert_eq!(manager.ledger().get_or_create("buyer-1").unwrap().balance, 5_000);
}

#[tokio::test]
async fn payment_requires_the_buyer() {
    let manager = marketplace();
    let order = manager.create_order(order_request()).await.unwrap();

    let err = manager
        .record_payment(&order.id, "driver-1", PaymentMethod::Wallet)
        .unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));

    let err = manager
        .record_payment("ORD-MISSING", "buyer-1", PaymentMethod::Wallet)
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
}

#[tokio::test]
async fn location_updates_are_driver_scoped() {
    let manager = marketplace();
    let order = manager.create_order(order_request()).await.unwrap();
    manager
        .advance_status(&order.id, "READY", None, None)
        .await
        .unwrap();

    // No driver assigned yet: nobody may push a position.
    let err = manager
        .update_driver_location(&order.id, "driver-1", "-6.21", "106.85")
        .unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));

    manager
        .advance_status(&order.id, "PICKUP", Some("driver-1"), None)
        .await
        .unwrap();

    // Wrong driver: rejected, location untouched.
    let before = manager.get_order(&order.id).unwrap().driver_location;
    let err = manager
        .update_driver_location(&order.id, "driver-2", "-6.21", "106.85")
        .unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));
    assert_eq!(manager.get_order(&order.id).unwrap().driver_location, before);

    // Assigned driver: last write wins.
    let order = manager
        .update_driver_location(&order.id, "driver-1", "-6.2100", "106.8500")
        .unwrap();
    let loc = order.driver_location.unwrap();
    assert!((loc.lat - (-6.21)).abs() < 1e-9);

    let order = manager
        .update_driver_location(&order.id, "driver-1", "-6.2200", "106.8600")
        .unwrap();
    let loc = order.driver_location.unwrap();
    assert!((loc.lat - (-6.22)).abs() < 1e-9);

    // Garbage coordinates never reach the order.
    let err = manager
        .update_driver_location(&order.id, "driver-1", "north", "106.85")
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));

    // Once completed, transit is over.
    manager
        .advance_status(&order.id, "DELIVERED", None, None)
        .await
        .unwrap();
    manager
        .advance_status(&order.id, "COMPLETED", None, None)
        .await
        .unwrap();
    let err = manager
        .update_driver_location(&order.id, "driver-1", "-6.23", "106.87")
        .unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));
}

#[tokio::test]
async fn fanout_skips_inactive_and_unverified_drivers() {
    init_tracing();
    let directory = InMemoryDirectory::new();
    directory.insert(user("buyer-1", "Sari", UserRole::Buyer));
    directory.insert(user("merchant-1", "Warung Makmur", UserRole::Merchant));
    directory.insert(user("driver-1", "Budi", UserRole::Driver));
    let mut inactive = user("driver-2", "Agus", UserRole::Driver);
    inactive.active = false;
    directory.insert(inactive);
    let mut unverified = user("driver-3", "Tono", UserRole::Driver);
    unverified.verified = false;
    directory.insert(unverified);

    let manager = LifecycleManager::new(
        Storage::open_in_memory().unwrap(),
        Arc::new(directory),
        test_config(),
    );
    let order = manager.create_order(order_request()).await.unwrap();
    manager
        .advance_status(&order.id, "READY", None, None)
        .await
        .unwrap();

    assert_eq!(manager.notifications().list_for_user("driver-1").unwrap().len(), 1);
    assert!(manager.notifications().list_for_user("driver-2").unwrap().is_empty());
    assert!(manager.notifications().list_for_user("driver-3").unwrap().is_empty());
}

/// Two concurrent wallet payments against a balance that only covers one:
/// exactly one must succeed and the balance must never go negative.
#[tokio::test]
async fn concurrent_payments_cannot_overdraw() {
    let manager = Arc::new(marketplace());
    let first = manager.create_order(order_request()).await.unwrap();
    let second = manager.create_order(order_request()).await.unwrap();
    manager
        .top_up_wallet("buyer-1", 45_000, "bank_transfer")
        .await
        .unwrap();

    let m1 = Arc::clone(&manager);
    let id1 = first.id.clone();
    let h1 = std::thread::spawn(move || m1.record_payment(&id1, "buyer-1", PaymentMethod::Wallet));
    let m2 = Arc::clone(&manager);
    let id2 = second.id.clone();
    let h2 = std::thread::spawn(move || m2.record_payment(&id2, "buyer-1", PaymentMethod::Wallet));

    let results = [h1.join().unwrap(), h2.join().unwrap()];
    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 1, "exactly one payment may win the balance");
    assert!(results.iter().any(|r| matches!(
        r,
        Err(CoreError::InsufficientFunds { .. })
    )));

    let wallet = manager.ledger().get_or_create("buyer-1").unwrap();
    assert_eq!(wallet.balance, 0);
    assert!(wallet.balance >= 0);
}
