//! Driver matching policy.

pub mod policy;

pub use policy::{driver_visible, eligible_for_fanout};
