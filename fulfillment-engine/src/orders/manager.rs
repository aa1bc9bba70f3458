//! LifecycleManager - order orchestration.
//!
//! Every caller-facing mutation follows the same shape:
//!
//! ```text
//! operation(...)
//!     ├─ 1. Resolve external parties (user directory, outside the txn)
//!     ├─ 2. Begin write transaction
//!     ├─ 3. Load the order and enforce ownership
//!     ├─ 4. Validate against the transition table
//!     ├─ 5. Mutate order / wallet / ledger / notifications
//!     ├─ 6. Commit (all-or-nothing)
//!     ├─ 7. Post-commit: driver fan-out, event broadcast
//!     └─ 8. Return the updated order
//! ```
//!
//! The driver "ready" fan-out runs after the commit on purpose: it is
//! independent of the status change and a per-driver failure must never
//! fail the transition that triggered it.

use crate::core::{Config, DomainEvent};
use crate::db::Storage;
use crate::directory::UserDirectory;
use crate::matching::policy;
use crate::notifications::NotificationDispatcher;
use crate::orders::transitions::{self, Advance, SideEffect};
use crate::tracking::location;
use crate::wallet::WalletLedger;
use shared::models::{
    DriverLocation, Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus, TransactionType,
    User, WalletAccount, WalletTransaction,
};
use shared::{CoreError, CoreResult};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Input for order creation. Item prices are captured here and never
/// re-read from the live catalog afterwards.
#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    pub buyer_id: String,
    pub merchant_id: String,
    pub items: Vec<OrderItem>,
    pub delivery_address: String,
    pub payment_method: PaymentMethod,
    /// Falls back to the configured default when absent.
    pub delivery_fee: Option<i64>,
    pub notes: Option<String>,
}

/// Read-side order filter. All set fields must match.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub buyer_id: Option<String>,
    pub merchant_id: Option<String>,
    pub driver_id: Option<String>,
    pub status: Option<OrderStatus>,
}

impl OrderFilter {
    fn matches(&self, order: &Order) -> bool {
        if let Some(buyer_id) = &self.buyer_id
            && &order.buyer_id != buyer_id
        {
            return false;
        }
        if let Some(merchant_id) = &self.merchant_id
            && &order.merchant_id != merchant_id
        {
            return false;
        }
        if let Some(driver_id) = &self.driver_id
            && order.driver_id.as_ref() != Some(driver_id)
        {
            return false;
        }
        if let Some(status) = self.status
            && order.status != status
        {
            return false;
        }
        true
    }
}

pub struct LifecycleManager {
    storage: Storage,
    directory: Arc<dyn UserDirectory>,
    ledger: WalletLedger,
    dispatcher: NotificationDispatcher,
    config: Config,
    event_tx: broadcast::Sender<DomainEvent>,
}

impl LifecycleManager {
    pub fn new(storage: Storage, directory: Arc<dyn UserDirectory>, config: Config) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_channel_capacity);
        let ledger = WalletLedger::new(storage.clone(), config.min_topup_amount);
        let dispatcher = NotificationDispatcher::new(storage.clone());
        Self {
            storage,
            directory,
            ledger,
            dispatcher,
            config,
            event_tx,
        }
    }

    /// Subscribe to post-commit domain events.
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.event_tx.subscribe()
    }

    pub fn ledger(&self) -> &WalletLedger {
        &self.ledger
    }

    pub fn notifications(&self) -> &NotificationDispatcher {
        &self.dispatcher
    }

    fn now() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    /// Human-legible order id, crash-safe via the counter table.
    fn next_order_id(&self) -> CoreResult<String> {
        let count = self.storage.next_order_count()?;
        let date = chrono::Utc::now().format("%Y%m%d");
        Ok(format!("ORD-{}-{}", date, 10_000 + count))
    }

    /// Tracking number, generated once per order on first `ready`.
    fn generate_tracking_number() -> String {
        use rand::Rng;
        let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000);
        let date = chrono::Utc::now().format("%Y%m%d");
        format!("TRK-{}-{:06}", date, suffix)
    }

    // ========== CreateOrder ==========

    /// Create an order for the buyer: validates both parties, captures
    /// item prices, persists, and notifies the merchant, all in one
    /// transaction.
    pub async fn create_order(&self, req: CreateOrderRequest) -> CoreResult<Order> {
        self.directory
            .get(&req.buyer_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("buyer {}", req.buyer_id)))?;
        let merchant = self
            .directory
            .get(&req.merchant_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("merchant {}", req.merchant_id)))?;
        if !merchant.is_merchant() {
            return Err(CoreError::Validation(format!(
                "user {} is not a merchant",
                req.merchant_id
            )));
        }

        if req.items.is_empty() {
            return Err(CoreError::validation("order must contain at least one item"));
        }
        let mut subtotal: i64 = 0;
        for item in &req.items {
            if item.quantity <= 0 || item.unit_price <= 0 {
                return Err(CoreError::Validation(format!(
                    "invalid line item for product {}",
                    item.product_id
                )));
            }
            // Amounts stay in i64 rupiah; an overflowing order is bogus
            // input, not a wrap-around.
            let line = item.line_total().ok_or_else(|| {
                CoreError::Validation(format!(
                    "line total overflows for product {}",
                    item.product_id
                ))
            })?;
            subtotal = subtotal
                .checked_add(line)
                .ok_or_else(|| CoreError::validation("order subtotal overflows"))?;
        }
        let delivery_fee = req.delivery_fee.unwrap_or(self.config.default_delivery_fee);
        if delivery_fee < 0 {
            return Err(CoreError::validation("delivery fee cannot be negative"));
        }
        let total = subtotal
            .checked_add(delivery_fee)
            .ok_or_else(|| CoreError::validation("order total overflows"))?;
        if total <= 0 {
            return Err(CoreError::validation("order total must be positive"));
        }

        // Pre-generate the id: redb write transactions do not nest and the
        // counter bumps in its own transaction.
        let id = self.next_order_id()?;
        let now = Self::now();
        let order = Order {
            id,
            buyer_id: req.buyer_id,
            merchant_id: req.merchant_id,
            driver_id: None,
            driver_name: None,
            items: req.items,
            subtotal,
            delivery_fee,
            total,
            delivery_address: req.delivery_address,
            notes: req.notes,
            status: OrderStatus::Preparing,
            tracking_number: None,
            driver_location: None,
            payment_method: req.payment_method,
            payment_status: PaymentStatus::Pending,
            paid_at: None,
            pickup_time: None,
            delivered_at: None,
            created_at: now,
            updated_at: now,
        };

        let txn = self.storage.begin_write()?;
        self.storage.put_order(&txn, &order)?;
        self.dispatcher
            .append_in_txn(&txn, &NotificationDispatcher::merchant_new_order(&order))?;
        txn.commit().map_err(crate::db::StorageError::from)?;

        tracing::info!(
            order_id = %order.id,
            buyer_id = %order.buyer_id,
            merchant_id = %order.merchant_id,
            total = order.total,
            "Order created"
        );
        let _ = self.event_tx.send(DomainEvent::OrderCreated {
            order_id: order.id.clone(),
            buyer_id: order.buyer_id.clone(),
            merchant_id: order.merchant_id.clone(),
            total: order.total,
        });
        Ok(order)
    }

    // ========== AdvanceStatus ==========

    /// Advance the order along the canonical flow. Reaching the current
    /// status again only rewrites `notes`/`updated_at`. Entering `pickup`
    /// requires the acting driver; entering `ready` triggers the driver
    /// fan-out after the commit.
    pub async fn advance_status(
        &self,
        order_id: &str,
        new_status: &str,
        acting_driver_id: Option<&str>,
        notes: Option<String>,
    ) -> CoreResult<Order> {
        let target = transitions::parse_status(new_status)?;

        // Directory lookups happen before the write transaction opens.
        let (acting_driver, merchant) = if target == OrderStatus::Pickup {
            let driver_id = acting_driver_id.ok_or_else(|| {
                CoreError::validation("advancing to PICKUP requires the acting driver id")
            })?;
            let driver = self
                .directory
                .get(driver_id)
                .await?
                .ok_or_else(|| CoreError::NotFound(format!("driver {}", driver_id)))?;
            if !driver.is_driver() {
                return Err(CoreError::Validation(format!(
                    "user {} is not a driver",
                    driver_id
                )));
            }
            let preview = self
                .storage
                .get_order(order_id)?
                .ok_or_else(|| CoreError::NotFound(format!("order {}", order_id)))?;
            let merchant = self.directory.get(&preview.merchant_id).await?;
            (Some(driver), merchant)
        } else {
            (None, None)
        };

        let txn = self.storage.begin_write()?;
        let mut order = self
            .storage
            .get_order_in_txn(&txn, order_id)?
            .ok_or_else(|| CoreError::NotFound(format!("order {}", order_id)))?;

        // A driver is bound at most once; a second driver attempting the
        // pickup gets a conflict whether or not the status already moved.
        if target == OrderStatus::Pickup
            && let Some(existing) = &order.driver_id
            && acting_driver_id != Some(existing.as_str())
        {
            return Err(CoreError::Conflict(format!(
                "order {} is already assigned to driver {}",
                order.id, existing
            )));
        }
        // Past pickup, a caller identifying as a driver must be the bound
        // one; nobody else gets to mark the order delivered or completed.
        if target != OrderStatus::Pickup
            && let Some(acting) = acting_driver_id
            && let Some(existing) = &order.driver_id
            && acting != existing.as_str()
        {
            return Err(CoreError::Forbidden(format!(
                "driver {} is not assigned to order {}",
                acting, order.id
            )));
        }

        let plan = transitions::plan_advance(order.status, target)?;
        let now = Self::now();

        if plan == Advance::NoOp {
            if let Some(n) = notes {
                order.notes = Some(n);
            }
            order.updated_at = now;
            self.storage.put_order(&txn, &order)?;
            txn.commit().map_err(crate::db::StorageError::from)?;
            return Ok(order);
        }

        let from = order.status;
        order.status = target;
        for effect in transitions::effects_on_enter(target) {
            match effect {
                SideEffect::AssignTrackingNumber => {
                    if order.tracking_number.is_none() {
                        order.tracking_number = Some(Self::generate_tracking_number());
                    }
                }
                SideEffect::FanOutToDrivers => {
                    // Runs post-commit; see below.
                }
                SideEffect::AssignDriver => {
                    let driver = acting_driver
                        .as_ref()
                        .ok_or_else(|| CoreError::validation("acting driver is required"))?;
                    order.driver_id = Some(driver.id.clone());
                    order.driver_name = Some(driver.name.clone());
                    order.pickup_time = Some(now);
                }
                SideEffect::SeedDriverLocation => {
                    if let Some(point) = merchant.as_ref().and_then(|m| m.location) {
                        order.driver_location = Some(DriverLocation {
                            lat: point.lat,
                            lng: point.lng,
                            updated_at: now,
                        });
                    }
                }
                SideEffect::NotifyMerchantPickedUp => {
                    let driver_name = order.driver_name.as_deref().unwrap_or("A driver");
                    self.dispatcher.append_in_txn(
                        &txn,
                        &NotificationDispatcher::merchant_picked_up(&order, driver_name),
                    )?;
                }
                SideEffect::NotifyBuyerOnTheWay => {
                    self.dispatcher
                        .append_in_txn(&txn, &NotificationDispatcher::buyer_on_the_way(&order))?;
                }
                SideEffect::SetDeliveredAt => {
                    order.delivered_at = Some(now);
                }
                SideEffect::NotifyBuyerDelivered => {
                    self.dispatcher
                        .append_in_txn(&txn, &NotificationDispatcher::buyer_delivered(&order))?;
                }
            }
        }
        if let Some(n) = notes {
            order.notes = Some(n);
        }
        order.updated_at = now;
        self.storage.put_order(&txn, &order)?;
        txn.commit().map_err(crate::db::StorageError::from)?;

        tracing::info!(
            order_id = %order.id,
            from = from.as_str(),
            to = target.as_str(),
            "Order status advanced"
        );

        if target == OrderStatus::Ready {
            self.fan_out_ready(&order).await;
        }

        let _ = self.event_tx.send(DomainEvent::StatusChanged {
            order_id: order.id.clone(),
            from,
            to: target,
        });
        Ok(order)
    }

    /// Broadcast a ready order to every eligible driver. Failures here
    /// never propagate: the status change is already committed and
    /// visibility is a convenience, not a delivery guarantee.
    async fn fan_out_ready(&self, order: &Order) {
        let users = match self.directory.all().await {
            Ok(users) => users,
            Err(e) => {
                tracing::warn!(order_id = %order.id, error = %e, "Driver fan-out skipped, directory unavailable");
                return;
            }
        };
        let drivers: Vec<User> = users
            .into_iter()
            .filter(policy::eligible_for_fanout)
            .collect();
        let outcomes = self.dispatcher.fan_out_ready(order, &drivers);
        let sent = outcomes.iter().filter(|o| o.sent).count();
        tracing::info!(
            order_id = %order.id,
            eligible = outcomes.len(),
            sent,
            failed = outcomes.len() - sent,
            "Driver fan-out finished"
        );
    }

    // ========== UpdateTracking ==========

    /// Merchant-scoped status push. Verifies the order belongs to the
    /// acting merchant, applies the same state machine (without driver
    /// binding), and notifies the buyer with the stage message table.
    pub async fn update_tracking(
        &self,
        order_id: &str,
        merchant_id: &str,
        new_status: Option<&str>,
        tracking_number: Option<String>,
        notes: Option<String>,
    ) -> CoreResult<Order> {
        let target = new_status.map(transitions::parse_status).transpose()?;

        let txn = self.storage.begin_write()?;
        let mut order = self
            .storage
            .get_order_in_txn(&txn, order_id)?
            .ok_or_else(|| CoreError::NotFound(format!("order {}", order_id)))?;
        if order.merchant_id != merchant_id {
            return Err(CoreError::Forbidden(format!(
                "order {} belongs to another merchant",
                order.id
            )));
        }

        let now = Self::now();
        let mut entered_ready = false;
        if let Some(target) = target
            && transitions::plan_advance(order.status, target)? == Advance::Forward
        {
            order.status = target;
            match target {
                OrderStatus::Ready => {
                    if order.tracking_number.is_none() {
                        order.tracking_number = Some(Self::generate_tracking_number());
                    }
                    entered_ready = true;
                }
                OrderStatus::Delivered => {
                    order.delivered_at = Some(now);
                }
                _ => {}
            }
        }

        if let Some(tn) = tracking_number {
            match &order.tracking_number {
                None => order.tracking_number = Some(tn),
                Some(existing) if *existing != tn => {
                    return Err(CoreError::Conflict(format!(
                        "order {} already has tracking number {}",
                        order.id, existing
                    )));
                }
                Some(_) => {}
            }
        }
        if let Some(n) = notes {
            order.notes = Some(n);
        }
        order.updated_at = now;

        if let Some(target) = target {
            let message = transitions::tracking_message(target);
            self.dispatcher.append_in_txn(
                &txn,
                &NotificationDispatcher::buyer_tracking_update(&order, message),
            )?;
        }
        self.storage.put_order(&txn, &order)?;
        txn.commit().map_err(crate::db::StorageError::from)?;

        tracing::info!(
            order_id = %order.id,
            merchant_id = %merchant_id,
            status = order.status.as_str(),
            "Tracking updated"
        );

        if entered_ready {
            self.fan_out_ready(&order).await;
        }
        Ok(order)
    }

    // ========== RecordPayment ==========

    /// The only path that flips `payment_status`. For wallet settlement
    /// the debit, the ledger row, the status flip and the merchant
    /// notification commit together; an insufficient balance aborts the
    /// whole operation and the order stays pending.
    pub fn record_payment(
        &self,
        order_id: &str,
        buyer_id: &str,
        method: PaymentMethod,
    ) -> CoreResult<Order> {
        let txn = self.storage.begin_write()?;
        let mut order = self
            .storage
            .get_order_in_txn(&txn, order_id)?
            .ok_or_else(|| CoreError::NotFound(format!("order {}", order_id)))?;
        if order.buyer_id != buyer_id {
            return Err(CoreError::Forbidden(format!(
                "order {} belongs to another buyer",
                order.id
            )));
        }
        if order.is_paid() {
            return Err(CoreError::Conflict(format!(
                "order {} is already paid",
                order.id
            )));
        }

        if method.is_wallet() {
            self.ledger.debit_in_txn(&txn, buyer_id, order.total)?;
            let row = WalletTransaction::new(
                buyer_id,
                TransactionType::Payment,
                order.total,
                format!("Payment for order {}", order.id),
            )
            .with_order(&order.id);
            self.ledger.append_in_txn(&txn, &row)?;
        }

        let now = Self::now();
        order.payment_status = PaymentStatus::Paid;
        order.payment_method = method;
        order.paid_at = Some(now);
        order.updated_at = now;
        self.storage.put_order(&txn, &order)?;
        self.dispatcher.append_in_txn(
            &txn,
            &NotificationDispatcher::merchant_payment_received(&order),
        )?;
        txn.commit().map_err(crate::db::StorageError::from)?;

        tracing::info!(
            order_id = %order.id,
            buyer_id = %buyer_id,
            amount = order.total,
            method = ?method,
            "Payment recorded"
        );
        let _ = self.event_tx.send(DomainEvent::PaymentRecorded {
            order_id: order.id.clone(),
            buyer_id: buyer_id.to_string(),
            amount: order.total,
            method,
        });
        Ok(order)
    }

    // ========== UpdateDriverLocation ==========

    /// Periodic position update from the assigned driver. Last-writer-wins
    /// point overwrite, only while the order is in active transit.
    pub fn update_driver_location(
        &self,
        order_id: &str,
        driver_id: &str,
        lat: &str,
        lng: &str,
    ) -> CoreResult<Order> {
        let (lat, lng) = location::parse_point(lat, lng)?;

        let txn = self.storage.begin_write()?;
        let mut order = self
            .storage
            .get_order_in_txn(&txn, order_id)?
            .ok_or_else(|| CoreError::NotFound(format!("order {}", order_id)))?;
        if !order.is_assigned_to(driver_id) {
            return Err(CoreError::Forbidden(format!(
                "driver {} is not assigned to order {}",
                driver_id, order.id
            )));
        }
        if !location::is_in_transit(order.status) {
            return Err(CoreError::Conflict(format!(
                "order {} is {}, location updates are only accepted during PICKUP or DELIVERED",
                order.id,
                order.status.as_str()
            )));
        }

        let now = Self::now();
        order.driver_location = Some(DriverLocation {
            lat,
            lng,
            updated_at: now,
        });
        order.updated_at = now;
        self.storage.put_order(&txn, &order)?;
        txn.commit().map_err(crate::db::StorageError::from)?;

        let _ = self.event_tx.send(DomainEvent::LocationUpdated {
            order_id: order.id.clone(),
            driver_id: driver_id.to_string(),
            lat,
            lng,
        });
        Ok(order)
    }

    // ========== Administrative delete ==========

    /// Hard delete, not reachable from normal buyer/merchant/driver flows.
    pub fn delete_order(&self, order_id: &str) -> CoreResult<()> {
        let txn = self.storage.begin_write()?;
        if !self.storage.remove_order(&txn, order_id)? {
            return Err(CoreError::NotFound(format!("order {}", order_id)));
        }
        txn.commit().map_err(crate::db::StorageError::from)?;
        tracing::warn!(order_id = %order_id, "Order hard-deleted");
        Ok(())
    }

    // ========== Read side ==========

    pub fn get_order(&self, order_id: &str) -> CoreResult<Order> {
        self.storage
            .get_order(order_id)?
            .ok_or_else(|| CoreError::NotFound(format!("order {}", order_id)))
    }

    /// Filtered order list, newest first.
    pub fn list_orders(&self, filter: &OrderFilter) -> CoreResult<Vec<Order>> {
        let mut orders = self.storage.list_orders()?;
        orders.retain(|order| filter.matches(order));
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    /// Orders a driver may see: open-for-claim ready orders plus their own
    /// active and past deliveries. Newest first.
    pub async fn driver_visible_orders(&self, driver_id: &str) -> CoreResult<Vec<Order>> {
        let caller = self
            .directory
            .get(driver_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("driver {}", driver_id)))?;
        if !caller.is_driver() {
            return Err(CoreError::Validation(format!(
                "user {} is not a driver",
                driver_id
            )));
        }
        let mut orders = self.storage.list_orders()?;
        orders.retain(|order| policy::driver_visible(driver_id, order));
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    // ========== Wallet ==========

    /// Top up the caller's wallet. The user must exist; the amount must
    /// meet the configured minimum.
    pub async fn top_up_wallet(
        &self,
        user_id: &str,
        amount: i64,
        method: &str,
    ) -> CoreResult<WalletAccount> {
        self.directory
            .get(user_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("user {}", user_id)))?;
        let wallet = self.ledger.top_up(user_id, amount, method)?;
        let _ = self.event_tx.send(DomainEvent::WalletToppedUp {
            user_id: user_id.to_string(),
            amount,
            balance: wallet.balance,
        });
        Ok(wallet)
    }
}
