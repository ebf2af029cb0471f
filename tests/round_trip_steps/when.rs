//! When steps for publish and consume BDD scenarios.

use super::world::{RoundTripWorld, run_async};
use crate::helpers::Greeting;
use eyre::WrapErr;
use rstest_bdd_macros::when;
use switchyard::messaging::{
    domain::{Message, Subscription, Topic},
    services::HandlerError,
};

#[when(r#"a message with data "{data}" is published to "{topic}""#)]
fn publish_message(
    world: &mut RoundTripWorld,
    data: String,
    topic: String,
) -> Result<(), eyre::Report> {
    let topic: Topic = topic.parse().wrap_err("parse scenario topic")?;
    let message = Message::new(topic, Greeting::new(&data));
    let result = run_async(world.stack()?.publisher.publish(&message));
    world.publish_result = Some(result);
    Ok(())
}

#[when(r#""{subscriber}" "{process}" subscribes to "{topic}""#)]
fn subscribe_to_topic(
    world: &mut RoundTripWorld,
    subscriber: String,
    process: String,
    topic: String,
) -> Result<(), eyre::Report> {
    let topic: Topic = topic.parse().wrap_err("parse scenario topic")?;
    let subscription =
        Subscription::new(topic, subscriber, process).wrap_err("build scenario subscription")?;
    let result = run_async(world.stack()?.subscriber.subscribe(
        subscription,
        |_message: Message<Greeting>| std::future::ready(Ok::<(), HandlerError>(())),
    ));
    world.subscribe_result = Some(result);
    Ok(())
}
