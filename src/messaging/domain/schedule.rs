//! One-shot scheduled publish registrations.

use super::{Environment, ScheduleName, TopicArn};
use chrono::{DateTime, Utc};

/// What the scheduler does with a schedule once it has fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActionAfterCompletion {
    /// Remove the schedule after it fires.
    #[default]
    Delete,
    /// Keep the schedule after it fires.
    Retain,
}

/// Whether the scheduler may fire inside a window around the target time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlexibleTimeWindow {
    /// Fire exactly at the scheduled time.
    #[default]
    Off,
    /// Fire at any point within the given number of minutes.
    Flexible {
        /// Width of the window in minutes.
        maximum_window_minutes: u32,
    },
}

/// The publish performed when a schedule fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleTarget {
    /// Topic receiving the scheduled message.
    pub topic_arn: TopicArn,
    /// Serialized message body sent to the topic.
    pub input: String,
    /// Identity the scheduler assumes to publish.
    pub role_arn: String,
}

/// Registration of a message to be published once at a future time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleRequest {
    /// Unique schedule name.
    pub name: ScheduleName,
    /// Environment-scoped schedule group.
    pub group_name: String,
    /// `at(YYYY-MM-DDTHH:MM:SS)` expression in UTC.
    pub schedule_expression: String,
    /// Instant the expression denotes.
    pub fire_at: DateTime<Utc>,
    /// Publish performed on firing.
    pub target: ScheduleTarget,
    /// Completion behaviour.
    pub action_after_completion: ActionAfterCompletion,
    /// Firing window.
    pub flexible_time_window: FlexibleTimeWindow,
}

/// Formats the one-shot schedule expression for `fire_at`.
///
/// The scheduler accepts whole seconds only, so sub-second precision is
/// dropped.
#[must_use]
pub fn at_expression(fire_at: DateTime<Utc>) -> String {
    format!("at({})", fire_at.format("%Y-%m-%dT%H:%M:%S"))
}

/// Returns the schedule group used for an environment.
#[must_use]
pub fn schedule_group_name(environment: &Environment) -> String {
    format!("{environment}_scheduled_messages")
}
