//! Topic-based publish/subscribe messaging over a managed broker.
//!
//! Publishers send typed [`Message`](domain::Message)s to versioned
//! [`Topic`](domain::Topic)s. Each [`Subscription`](domain::Subscription)
//! owns an environment-scoped queue, created with a dead-letter queue and
//! bound to its topic the first time it is consumed. Consumption loops hand
//! messages to caller-supplied handlers and leave failed deliveries to the
//! broker's redelivery and dead-lettering. The module follows hexagonal
//! architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod services;

pub use config::{ConfigError, MessagingConfig};

#[cfg(test)]
mod tests;
