//! Step definitions for the publish and consume scenarios.

mod given;
mod then;
mod when;
pub mod world;
