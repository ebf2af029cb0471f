//! Switchyard: conventions for topic-based messaging.
//!
//! This crate standardizes how services publish and consume events over a
//! managed pub/sub broker and queue service: how topics and subscriptions
//! are named, how queues and dead-letter queues are provisioned, how
//! messages are enveloped on the wire, and how consumption loops process,
//! retry, and report.
//!
//! # Architecture
//!
//! Switchyard follows hexagonal architecture principles:
//!
//! - **Domain**: Naming rules and message types with no I/O
//! - **Ports**: Abstract trait interfaces for the broker, serializer, and delays
//! - **Adapters**: JSON serialization and an in-memory broker
//! - **Services**: Publishing, provisioning, and consumption
//!
//! # Modules
//!
//! - [`messaging`]: Topics, subscriptions, publishing, and consumption

pub mod messaging;
