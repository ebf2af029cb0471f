//! Given steps for publish and consume BDD scenarios.

use super::world::{RoundTripWorld, run_async};
use crate::helpers::{Greeting, MessagingStack};
use eyre::WrapErr;
use rstest_bdd_macros::given;
use switchyard::messaging::{
    MessagingConfig,
    domain::{Message, Subscription, Topic},
    services::HandlerResult,
};
use tokio::sync::mpsc;

#[given(r#"a messaging stack for environment "{environment}""#)]
fn messaging_stack(world: &mut RoundTripWorld, environment: String) -> Result<(), eyre::Report> {
    let config = MessagingConfig::for_environment(&environment)
        .wrap_err("build scenario configuration")?
        .with_long_polling_seconds(1);
    world.stack = Some(MessagingStack::new(config));
    Ok(())
}

#[given(r#"the topic "{topic}" exists"#)]
fn topic_exists(world: &mut RoundTripWorld, topic: String) -> Result<(), eyre::Report> {
    let topic: Topic = topic.parse().wrap_err("parse scenario topic")?;
    world.stack()?.create_topic(&topic);
    Ok(())
}

#[given(r#"a subscription for "{subscriber}" "{process}" on "{topic}""#)]
fn subscription_on_topic(
    world: &mut RoundTripWorld,
    subscriber: String,
    process: String,
    topic: String,
) -> Result<(), eyre::Report> {
    let topic: Topic = topic.parse().wrap_err("parse scenario topic")?;
    let subscription =
        Subscription::new(topic, subscriber, process).wrap_err("build scenario subscription")?;
    let (sender, receiver) = mpsc::unbounded_channel();

    run_async(world.stack()?.subscriber.subscribe(
        subscription,
        move |message: Message<Greeting>| {
            let result: HandlerResult = sender.send(message).map_err(|err| err.to_string().into());
            std::future::ready(result)
        },
    ))
    .wrap_err("subscribe in scenario setup")?;
    world.deliveries = Some(receiver);
    Ok(())
}
