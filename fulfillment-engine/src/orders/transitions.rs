//! Explicit transition table for the order state machine.
//!
//! The legal flow is linear with no cycles:
//!
//! ```text
//! preparing -> ready -> pickup -> delivered -> completed
//! ```
//!
//! Instead of branching on status strings at every call site, the table
//! here answers two questions for the lifecycle manager:
//! which advances are legal from a given status, and which side effects
//! fire on entering a status.

use shared::models::OrderStatus;
use shared::{CoreError, CoreResult};

/// Outcome of validating a requested status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Move to the next status in the canonical flow.
    Forward,
    /// Target equals the current status: only `notes`/`updated_at` are
    /// written, the status field is untouched.
    NoOp,
}

/// Side effects fired on entering a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    /// Generate the tracking number if absent (first `ready` only).
    AssignTrackingNumber,
    /// Broadcast the open order to eligible drivers.
    FanOutToDrivers,
    /// Bind the acting driver to the order and stamp the pickup time.
    AssignDriver,
    /// Seed the driver location from the merchant's registered point.
    SeedDriverLocation,
    /// Tell the merchant a driver picked the order up.
    NotifyMerchantPickedUp,
    /// Tell the buyer the order is on the way.
    NotifyBuyerOnTheWay,
    /// Stamp `delivered_at`.
    SetDeliveredAt,
    /// Tell the buyer the order arrived.
    NotifyBuyerDelivered,
}

/// Parse a caller-supplied status, rejecting anything outside the fixed
/// status set with the legal values spelled out.
pub fn parse_status(input: &str) -> CoreResult<OrderStatus> {
    let normalized = input.trim().to_ascii_uppercase();
    OrderStatus::FLOW
        .iter()
        .copied()
        .find(|s| s.as_str() == normalized)
        .ok_or_else(|| {
            CoreError::Validation(format!(
                "unknown status '{}', expected one of PREPARING, READY, PICKUP, DELIVERED, COMPLETED",
                input
            ))
        })
}

/// Validate a requested advance against the canonical flow.
///
/// Reaching the current status again is a no-op write; anything other
/// than the single next status is a conflict (no skipping ahead, no
/// regression).
pub fn plan_advance(current: OrderStatus, target: OrderStatus) -> CoreResult<Advance> {
    if target == current {
        return Ok(Advance::NoOp);
    }
    if current.next() == Some(target) {
        return Ok(Advance::Forward);
    }
    Err(CoreError::Conflict(format!(
        "cannot move from {} to {}, the only legal advance is {}",
        current.as_str(),
        target.as_str(),
        current
            .next()
            .map(OrderStatus::as_str)
            .unwrap_or("none (terminal)"),
    )))
}

/// Side effects fired when an order first enters `status`.
pub fn effects_on_enter(status: OrderStatus) -> &'static [SideEffect] {
    match status {
        OrderStatus::Preparing => &[],
        OrderStatus::Ready => &[SideEffect::AssignTrackingNumber, SideEffect::FanOutToDrivers],
        OrderStatus::Pickup => &[
            SideEffect::AssignDriver,
            SideEffect::SeedDriverLocation,
            SideEffect::NotifyMerchantPickedUp,
            SideEffect::NotifyBuyerOnTheWay,
        ],
        OrderStatus::Delivered => &[SideEffect::SetDeliveredAt, SideEffect::NotifyBuyerDelivered],
        OrderStatus::Completed => &[],
    }
}

/// Buyer-facing message for the merchant tracking update, keyed by the
/// status the order is in after the update.
pub fn tracking_message(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Preparing => "Your order has been received",
        OrderStatus::Ready => "Your order is being processed",
        OrderStatus::Pickup => "Your order has been packed",
        OrderStatus::Delivered => "Your order has been shipped",
        OrderStatus::Completed => "Your order is done",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_only_to_immediate_next() {
        assert_eq!(
            plan_advance(OrderStatus::Preparing, OrderStatus::Ready).unwrap(),
            Advance::Forward
        );
        assert_eq!(
            plan_advance(OrderStatus::Ready, OrderStatus::Pickup).unwrap(),
            Advance::Forward
        );
        assert_eq!(
            plan_advance(OrderStatus::Delivered, OrderStatus::Completed).unwrap(),
            Advance::Forward
        );
    }

    #[test]
    fn same_status_is_noop() {
        for status in OrderStatus::FLOW {
            assert_eq!(plan_advance(status, status).unwrap(), Advance::NoOp);
        }
    }

    #[test]
    fn skipping_ahead_is_a_conflict() {
        let err = plan_advance(OrderStatus::Preparing, OrderStatus::Pickup).unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[test]
    fn regression_is_a_conflict() {
        let err = plan_advance(OrderStatus::Delivered, OrderStatus::Ready).unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
        let err = plan_advance(OrderStatus::Completed, OrderStatus::Preparing).unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[test]
    fn terminal_state_has_no_advance() {
        let err = plan_advance(OrderStatus::Completed, OrderStatus::Ready).unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[test]
    fn parse_accepts_any_case_and_rejects_unknown() {
        assert_eq!(parse_status("ready").unwrap(), OrderStatus::Ready);
        assert_eq!(parse_status(" PICKUP ").unwrap(), OrderStatus::Pickup);
        let err = parse_status("shipped").unwrap_err();
        assert!(matches!(err, CoreError::Validation(msg) if msg.contains("PREPARING")));
    }

    #[test]
    fn ready_effects_include_fanout_and_tracking() {
        let effects = effects_on_enter(OrderStatus::Ready);
        assert!(effects.contains(&SideEffect::AssignTrackingNumber));
        assert!(effects.contains(&SideEffect::FanOutToDrivers));
    }

    #[test]
    fn terminal_states_have_no_effects() {
        assert!(effects_on_enter(OrderStatus::Completed).is_empty());
        assert!(effects_on_enter(OrderStatus::Preparing).is_empty());
    }
}
