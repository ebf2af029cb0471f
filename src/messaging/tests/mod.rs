//! Unit tests for the messaging context.

mod subscriber_tests;
