//! Notification fan-out and read-state management.

pub mod dispatcher;

pub use dispatcher::{FanoutOutcome, NotificationDispatcher};
