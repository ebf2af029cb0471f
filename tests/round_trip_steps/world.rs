//! Shared world state for publish and consume BDD scenarios.

use crate::helpers::{Greeting, MessagingStack};
use rstest::fixture;
use switchyard::messaging::{
    domain::Message,
    services::{PublisherError, SubscriberError},
};
use tokio::sync::mpsc;

/// Scenario world for round-trip behaviour tests.
#[derive(Default)]
pub struct RoundTripWorld {
    pub stack: Option<MessagingStack>,
    pub deliveries: Option<mpsc::UnboundedReceiver<Message<Greeting>>>,
    pub publish_result: Option<Result<Message<Greeting>, PublisherError>>,
    pub subscribe_result: Option<Result<(), SubscriberError>>,
    pub last_received: Option<Message<Greeting>>,
}

impl RoundTripWorld {
    /// Returns the messaging stack created by a given step.
    pub fn stack(&self) -> Result<&MessagingStack, eyre::Report> {
        self.stack
            .as_ref()
            .ok_or_else(|| eyre::eyre!("missing messaging stack in scenario world"))
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> RoundTripWorld {
    RoundTripWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
