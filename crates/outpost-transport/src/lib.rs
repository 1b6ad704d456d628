//! Polling transport between an Outpost agent and its remote boundary.
//!
//! The remote side never reaches into the machine: the agent polls for
//! pending commands, executes them, and reports results. The channel can
//! disappear for minutes at a time, so the [`poller`] module models an
//! explicit state machine (`Connecting → Connected → Degraded → Offline`)
//! with bounded exponential backoff, and the [`client`] module hides the
//! HTTP surface behind the [`CommandTransport`] trait so the machine is
//! testable against a fake.

pub mod backoff;
pub mod client;
pub mod poller;

pub use backoff::Backoff;
pub use client::{CloudClient, CommandTransport, TransportError};
pub use poller::{Poller, PollerConfig, PollerState};
