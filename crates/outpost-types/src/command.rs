//! Commands received from the remote decision-maker.
//!
//! A [`Command`] is a single requested action with parameters, identified
//! uniquely per issuance. Commands are immutable once parsed; the transport
//! poller guarantees no command id is executed twice.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Strongly-typed command identifier. Uses `Arc<str>` internally so cloning
/// is an atomic increment instead of a heap allocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommandId(Arc<str>);

impl CommandId {
    /// Create a new CommandId from any string-like value.
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// Mint a fresh random identifier (used for locally-sourced commands).
    pub fn random() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CommandId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CommandId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CommandId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl PartialEq<str> for CommandId {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for CommandId {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl Serialize for CommandId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CommandId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(CommandId::new(s))
    }
}

/// A single requested action, as delivered over the wire.
///
/// Wire shape: `{id: string, action: string, parameters: object}`. Missing
/// parameters default to an empty map, and the issuance timestamp defaults
/// to the time of receipt when the remote side omits it. Unknown wire
/// fields are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    /// Unique identifier for this issuance.
    pub id: CommandId,
    /// Action identifier. An open string set at the wire; resolved against
    /// the closed dispatch registry at execution time.
    pub action: String,
    /// Action parameters, keyed by name.
    #[serde(default)]
    pub parameters: serde_json::Map<String, Value>,
    /// When the command was issued (or received, if the wire omits it).
    #[serde(default = "Utc::now")]
    pub issued_at: DateTime<Utc>,
}

impl Command {
    /// Create a command with the given id, action, and parameters.
    pub fn new(
        id: impl Into<CommandId>,
        action: impl Into<String>,
        parameters: serde_json::Map<String, Value>,
    ) -> Self {
        Self {
            id: id.into(),
            action: action.into(),
            parameters,
            issued_at: Utc::now(),
        }
    }

    /// Look up a string parameter.
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(Value::as_str)
    }

    /// Look up an integer parameter.
    pub fn param_i64(&self, key: &str) -> Option<i64> {
        self.parameters.get(key).and_then(Value::as_i64)
    }
}
