//! In-memory broker adapter for tests and local development.

mod broker;

pub use broker::InMemoryBroker;
