//! Engine configuration.
//!
//! # Environment variables
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | MIN_TOPUP_AMOUNT | 10000 | Minimum wallet top-up (rupiah) |
//! | DEFAULT_DELIVERY_FEE | 5000 | Delivery fee when the caller supplies none |
//! | EVENT_CHANNEL_CAPACITY | 1024 | Domain event broadcast buffer |

#[derive(Debug, Clone)]
pub struct Config {
    /// Minimum accepted wallet top-up, integer rupiah.
    pub min_topup_amount: i64,
    /// Delivery fee applied when an order is created without one.
    pub default_delivery_fee: i64,
    /// Capacity of the post-commit domain event broadcast channel.
    pub event_channel_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        Self {
            min_topup_amount: std::env::var("MIN_TOPUP_AMOUNT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10_000),
            default_delivery_fee: std::env::var("DEFAULT_DELIVERY_FEE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5_000),
            event_channel_capacity: std::env::var("EVENT_CHANNEL_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1024),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
