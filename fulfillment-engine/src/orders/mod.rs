//! Order lifecycle: state machine and orchestration.

pub mod manager;
pub mod transitions;

pub use manager::{CreateOrderRequest, LifecycleManager, OrderFilter};
pub use transitions::{Advance, SideEffect};
