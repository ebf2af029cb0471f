//! Adapter implementations for the messaging ports.

pub mod memory;

mod delay;
mod json;

pub use delay::TokioDelayer;
pub use json::JsonSerializer;
pub use memory::InMemoryBroker;
