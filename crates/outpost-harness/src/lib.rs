//! Test doubles and fixtures for exercising Outpost without real
//! infrastructure.
//!
//! - [`mocks::MockTransport`]: a scriptable remote boundary — queue up
//!   command batches, inject fetch/report failures, inspect submissions.
//! - [`mocks::RecordingHandler`]: a capability handler that records every
//!   invocation and answers from a script.
//! - [`fixtures`]: command builders.
//!
//! All doubles use `Arc<Mutex<_>>` interior state so tests keep a handle
//! to inspect after ownership moves into the system under test.

pub mod fixtures;
pub mod mocks;

pub use fixtures::command;
pub use mocks::{MockTransport, RecordingHandler};
