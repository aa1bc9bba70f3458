//! Notification dispatcher.
//!
//! Single-recipient notifications (merchant "new order", buyer "on the
//! way", merchant "payment received") are appended inside the same write
//! transaction as the mutation that triggers them, so they land atomically
//! with it. The driver "ready" broadcast is different: each recipient
//! write is independent, a failure is logged and skipped, and the caller
//! gets a typed outcome per driver instead of silence. Visibility is a
//! broadcast convenience, not a delivery guarantee.

use crate::db::{Storage, StorageResult};
use redb::WriteTransaction;
use shared::CoreResult;
use shared::models::{Notification, NotificationType, Order, User};

/// Per-driver result of the "ready" fan-out.
#[derive(Debug, Clone)]
pub struct FanoutOutcome {
    pub driver_id: String,
    pub sent: bool,
    pub error: Option<String>,
}

pub struct NotificationDispatcher {
    storage: Storage,
}

impl NotificationDispatcher {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Append a notification within the caller's transaction.
    pub fn append_in_txn(
        &self,
        txn: &WriteTransaction,
        notification: &Notification,
    ) -> StorageResult<()> {
        self.storage.put_notification(txn, notification)
    }

    // ========== Message builders ==========

    pub fn merchant_new_order(order: &Order) -> Notification {
        Notification::new(
            &order.merchant_id,
            NotificationType::Order,
            "New order",
            format!(
                "Order {} was placed for {} item(s), total Rp{}",
                order.id,
                order.items.len(),
                order.total
            ),
        )
        .with_order(&order.id)
        .with_status(order.status.as_str())
    }

    pub fn merchant_picked_up(order: &Order, driver_name: &str) -> Notification {
        Notification::new(
            &order.merchant_id,
            NotificationType::Delivery,
            "Order picked up",
            format!("{} picked up order {}", driver_name, order.id),
        )
        .with_order(&order.id)
        .with_status(order.status.as_str())
    }

    pub fn buyer_on_the_way(order: &Order) -> Notification {
        Notification::new(
            &order.buyer_id,
            NotificationType::Delivery,
            "Order on the way",
            format!("Your order {} is on the way", order.id),
        )
        .with_order(&order.id)
        .with_status(order.status.as_str())
    }

    pub fn buyer_delivered(order: &Order) -> Notification {
        Notification::new(
            &order.buyer_id,
            NotificationType::Delivery,
            "Order delivered",
            format!("Your order {} has been delivered", order.id),
        )
        .with_order(&order.id)
        .with_status(order.status.as_str())
    }

    pub fn merchant_payment_received(order: &Order) -> Notification {
        Notification::new(
            &order.merchant_id,
            NotificationType::Payment,
            "Payment received",
            format!("Payment of Rp{} received for order {}", order.total, order.id),
        )
        .with_order(&order.id)
        .with_status("PAID")
    }

    pub fn buyer_tracking_update(order: &Order, message: &str) -> Notification {
        Notification::new(
            &order.buyer_id,
            NotificationType::Order,
            "Order update",
            format!("{} ({})", message, order.id),
        )
        .with_order(&order.id)
        .with_status(order.status.as_str())
    }

    fn driver_ready_broadcast(order: &Order, driver_id: &str) -> Notification {
        Notification::new(
            driver_id,
            NotificationType::Delivery,
            "Order ready for pickup",
            format!(
                "Order {} is ready for pickup at the merchant, deliver to {}",
                order.id, order.delivery_address
            ),
        )
        .with_order(&order.id)
        .with_status(order.status.as_str())
    }

    // ========== Fan-out ==========

    /// Broadcast a ready order to the given (already filtered) drivers.
    ///
    /// Each write runs in its own transaction; one failure is logged and
    /// skipped so the remaining drivers still get notified. The caller
    /// receives one outcome per driver.
    pub fn fan_out_ready(&self, order: &Order, drivers: &[User]) -> Vec<FanoutOutcome> {
        let mut outcomes = Vec::with_capacity(drivers.len());
        for driver in drivers {
            let result = self.append_now(Self::driver_ready_broadcast(order, &driver.id));
            match result {
                Ok(()) => outcomes.push(FanoutOutcome {
                    driver_id: driver.id.clone(),
                    sent: true,
                    error: None,
                }),
                Err(e) => {
                    tracing::warn!(
                        order_id = %order.id,
                        driver_id = %driver.id,
                        error = %e,
                        "Driver notification failed, skipping"
                    );
                    outcomes.push(FanoutOutcome {
                        driver_id: driver.id.clone(),
                        sent: false,
                        error: Some(e.to_string()),
                    });
                }
            }
        }
        outcomes
    }

    fn append_now(&self, notification: Notification) -> StorageResult<()> {
        let txn = self.storage.begin_write()?;
        self.storage.put_notification(&txn, &notification)?;
        txn.commit()?;
        Ok(())
    }

    // ========== Read-state management ==========

    /// All notifications for one recipient, newest first.
    pub fn list_for_user(&self, user_id: &str) -> CoreResult<Vec<Notification>> {
        let mut rows = self.storage.list_notifications(user_id)?;
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    /// Mark one notification read. Returns the updated record.
    pub fn mark_read(&self, user_id: &str, notification_id: &str) -> CoreResult<Notification> {
        let txn = self.storage.begin_write()?;
        let mut notification = self
            .storage
            .get_notification_in_txn(&txn, notification_id)?
            .ok_or_else(|| {
                shared::CoreError::NotFound(format!("notification {}", notification_id))
            })?;
        if notification.user_id != user_id {
            return Err(shared::CoreError::forbidden(
                "notification belongs to another user",
            ));
        }
        notification.mark_read();
        self.storage.put_notification(&txn, &notification)?;
        txn.commit().map_err(crate::db::StorageError::from)?;
        Ok(notification)
    }

    /// Mark every unread notification for the user read. Returns how many
    /// were updated.
    pub fn mark_all_read(&self, user_id: &str) -> CoreResult<usize> {
        let txn = self.storage.begin_write()?;
        let rows = self.storage.list_notifications_in_txn(&txn, user_id)?;
        let mut updated = 0;
        for mut notification in rows {
            if !notification.read {
                notification.mark_read();
                self.storage.put_notification(&txn, &notification)?;
                updated += 1;
            }
        }
        txn.commit().map_err(crate::db::StorageError::from)?;
        Ok(updated)
    }

    /// Delete one notification.
    pub fn delete(&self, user_id: &str, notification_id: &str) -> CoreResult<()> {
        let txn = self.storage.begin_write()?;
        let notification = self
            .storage
            .get_notification_in_txn(&txn, notification_id)?
            .ok_or_else(|| {
                shared::CoreError::NotFound(format!("notification {}", notification_id))
            })?;
        if notification.user_id != user_id {
            return Err(shared::CoreError::forbidden(
                "notification belongs to another user",
            ));
        }
        self.storage.remove_notification(&txn, notification_id)?;
        txn.commit().map_err(crate::db::StorageError::from)?;
        Ok(())
    }

    /// Remove every notification for the user. Returns how many were
    /// removed.
    pub fn clear_for_user(&self, user_id: &str) -> CoreResult<usize> {
        let txn = self.storage.begin_write()?;
        let rows = self.storage.list_notifications_in_txn(&txn, user_id)?;
        let mut removed = 0;
        for notification in &rows {
            if self.storage.remove_notification(&txn, &notification.id)? {
                removed += 1;
            }
        }
        txn.commit().map_err(crate::db::StorageError::from)?;
        Ok(removed)
    }
}
