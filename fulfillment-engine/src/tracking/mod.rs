//! Driver position updates.

pub mod location;

pub use location::{is_in_transit, parse_point};
