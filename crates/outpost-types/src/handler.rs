//! The capability handler contract.
//!
//! Every capability domain (browser session, process/OS, filesystem)
//! implements [`CapabilityHandler`] and returns the uniform
//! [`HandlerOutcome`] shape the execution engine normalizes from. Handlers
//! never read transport or policy state.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::command::Command;
use crate::error::OutpostError;
use crate::result::CommandResult;

/// The uniform outcome shape every handler method returns.
///
/// Mirrors the result wire shape so normalization is mechanical. A handler
/// signals failure by value; it never panics across the contract boundary.
#[derive(Debug, Clone)]
pub struct HandlerOutcome {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Human-readable outcome description.
    pub message: Option<String>,
    /// Error description on failure.
    pub error: Option<String>,
    /// Structured payload.
    pub data: Option<Value>,
}

impl HandlerOutcome {
    /// A successful outcome with a message.
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
            data: None,
        }
    }

    /// A successful outcome with a message and payload.
    pub fn ok_with(message: impl Into<String>, data: Value) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
            data: Some(data),
        }
    }

    /// A failed outcome with an error description.
    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
            data: None,
        }
    }
}

/// A capability handler: one domain of actions behind a uniform execute call.
///
/// `execute` takes the bound method name (from the dispatch table) and the
/// command parameters. Unknown methods must return a failed outcome, not
/// panic — the dispatch table is the only caller and is built from a closed
/// registry, so an unknown method here indicates a wiring bug.
#[async_trait]
pub trait CapabilityHandler: Send + Sync {
    /// Short name of this handler, used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Execute one bound method with the given parameters.
    async fn execute(&mut self, method: &str, params: &Map<String, Value>) -> HandlerOutcome;

    /// Release any long-lived resources at process shutdown.
    async fn shutdown(&mut self) {}
}

/// Lifecycle hooks for handlers that own long-lived session state.
///
/// `ensure_session` must be idempotent: safe to call on every command that
/// needs a session, a no-op if one is already open.
#[async_trait]
pub trait SessionLifecycle {
    /// Open the session if none exists. No-op when one is already live.
    async fn ensure_session(&mut self) -> Result<(), OutpostError>;

    /// Tear down the live session, if any.
    async fn close_session(&mut self);

    /// Whether a session is currently live.
    fn has_session(&self) -> bool;
}

/// The execution seam between the transport poller and the engine.
///
/// The poller only needs "execute this command, give me the one result";
/// expressing that as a trait lets transport tests inject a trivial
/// executor instead of assembling the full engine.
#[async_trait]
pub trait CommandExecutor: Send {
    /// Execute a command to completion (or timeout). Never fails: all
    /// errors are captured in the returned result.
    async fn execute(&mut self, command: &Command) -> CommandResult;

    /// Release handler resources at shutdown.
    async fn shutdown(&mut self) {}
}
