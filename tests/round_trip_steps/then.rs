//! Then steps for publish and consume BDD scenarios.

use super::world::{RoundTripWorld, run_async};
use crate::helpers::next_within;
use rstest_bdd_macros::then;
use switchyard::messaging::{
    ports::ProvisioningError,
    services::{PublisherError, ResolveError, SubscriberError},
};

#[then(r#"the subscriber receives data "{data}""#)]
fn subscriber_receives(world: &mut RoundTripWorld, data: String) -> Result<(), eyre::Report> {
    let deliveries = world
        .deliveries
        .as_mut()
        .ok_or_else(|| eyre::eyre!("missing subscription in scenario world"))?;
    let message = run_async(next_within(deliveries));

    if message.body().data != data {
        return Err(eyre::eyre!(
            "expected data {data}, received {}",
            message.body().data
        ));
    }
    world.last_received = Some(message);
    Ok(())
}

#[then("the received message carries the published message id")]
fn received_message_carries_id(world: &RoundTripWorld) -> Result<(), eyre::Report> {
    let published = match world.publish_result.as_ref() {
        Some(Ok(published)) => published,
        other => return Err(eyre::eyre!("expected a successful publish, got {other:?}")),
    };
    let received = world
        .last_received
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing received message"))?;

    if received.message_id() != published.message_id() {
        return Err(eyre::eyre!(
            "expected message id {}, received {}",
            published.message_id(),
            received.message_id()
        ));
    }
    if received.published_at() != published.published_at() {
        return Err(eyre::eyre!("publish time was not carried to the subscriber"));
    }
    Ok(())
}

#[then(r#"publishing fails because topic "{name}" is missing"#)]
fn publishing_fails(world: &RoundTripWorld, name: String) -> Result<(), eyre::Report> {
    let result = world
        .publish_result
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing publish result"))?;

    match result {
        Err(PublisherError::Resolve(ResolveError::NotFound { name: missing }))
            if *missing == name =>
        {
            Ok(())
        }
        other => Err(eyre::eyre!("expected missing topic {name}, got {other:?}")),
    }
}

#[then(r#"subscribing fails because topic "{name}" is missing"#)]
fn subscribing_fails(world: &RoundTripWorld, name: String) -> Result<(), eyre::Report> {
    let result = world
        .subscribe_result
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing subscribe result"))?;

    match result {
        Err(SubscriberError::Provisioning(ProvisioningError::TopicNotFound { name: missing }))
            if *missing == name =>
        {
            Ok(())
        }
        other => Err(eyre::eyre!("expected missing topic {name}, got {other:?}")),
    }
}
