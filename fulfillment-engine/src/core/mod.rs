//! Core configuration and domain events.

pub mod config;
pub mod events;

pub use config::Config;
pub use events::DomainEvent;
