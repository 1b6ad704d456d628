//! Normalized command outcomes.
//!
//! Every accepted command produces exactly one [`CommandResult`], including
//! commands rejected by the security policy. The wire shape is
//! `{success, message?, error?, data?}`; the failure kind is retained in
//! memory only, so callers can distinguish validation errors from policy
//! denials from handler failures without parsing error strings.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Classification of a command failure.
///
/// Transport failures are deliberately absent: they are recovered inside
/// the poller's state machine and never surface as a per-command result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The command was malformed (missing action, bad parameters).
    Validation,
    /// The security policy denied the command.
    Policy,
    /// No dispatch entry exists for the action identifier.
    UnknownAction,
    /// The handler invocation exceeded its time budget. The underlying
    /// side effect may still be in progress; treat as unknown outcome.
    Timeout,
    /// The capability handler reported a failure.
    Handler,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::Validation => "validation",
            FailureKind::Policy => "policy",
            FailureKind::UnknownAction => "unknown_action",
            FailureKind::Timeout => "timeout",
            FailureKind::Handler => "handler_error",
        };
        f.write_str(s)
    }
}

/// The normalized outcome of executing (or rejecting) a command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    /// Whether the command succeeded.
    pub success: bool,
    /// Human-readable outcome description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Error description on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Structured payload returned by the handler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Failure classification. In-memory only, never on the wire.
    #[serde(skip)]
    pub kind: Option<FailureKind>,
}

impl CommandResult {
    /// A successful result with a message.
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
            data: None,
            kind: None,
        }
    }

    /// A successful result with a message and a structured payload.
    pub fn ok_with_data(message: impl Into<String>, data: Value) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
            data: Some(data),
            kind: None,
        }
    }

    /// A failed result with the given classification and error description.
    pub fn failure(kind: FailureKind, error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
            data: None,
            kind: Some(kind),
        }
    }

    /// Render the exact wire shape: `{success, message?, error?, data?}`.
    pub fn to_wire(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({"success": false}))
    }
}
