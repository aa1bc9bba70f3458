//! Notification records created as side effects of lifecycle events.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    Order,
    Delivery,
    Payment,
    System,
}

/// One message to one recipient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: String,
    /// Recipient user id.
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    /// Mirrors the triggering domain status (order or payment), if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub read: bool,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_at: Option<i64>,
}

impl Notification {
    pub fn new(
        user_id: impl Into<String>,
        kind: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            kind,
            title: title.into(),
            message: message.into(),
            order_id: None,
            status: None,
            read: false,
            created_at: chrono::Utc::now().timestamp_millis(),
            read_at: None,
        }
    }

    pub fn with_order(mut self, order_id: impl Into<String>) -> Self {
        self.order_id = Some(order_id.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Mark as read, recording the read timestamp once.
    pub fn mark_read(&mut self) {
        if !self.read {
            self.read = true;
            self.read_at = Some(chrono::Utc::now().timestamp_millis());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_read_is_idempotent() {
        let mut n = Notification::new("user-1", NotificationType::Order, "New order", "msg");
        assert!(!n.read);
        n.mark_read();
        assert!(n.read);
        let first_read_at = n.read_at;
        n.mark_read();
        assert_eq!(n.read_at, first_read_at);
    }
}
