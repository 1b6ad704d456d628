//! Core types shared across all Outpost crates.
//!
//! Defines the command and result model, the capability handler contract,
//! configuration, and error types used by the policy engine, execution
//! engine, transport poller, and capability handlers.

pub mod command;
pub mod config;
pub mod error;
pub mod handler;
pub mod result;

pub use command::{Command, CommandId};
pub use config::{
    AgentConfig, BrowserConfig, CloudConfig, OutpostConfig, SecurityConfig, TransportConfig,
    CONFIG_FILENAME,
};
pub use error::OutpostError;
pub use handler::{CapabilityHandler, CommandExecutor, HandlerOutcome, SessionLifecycle};
pub use result::{CommandResult, FailureKind};
