//! Command fixtures for tests.

use serde_json::Value;

use outpost_types::Command;

/// Build a command from an action and a JSON parameters object.
pub fn command(id: &str, action: &str, params: Value) -> Command {
    Command::new(id, action, params.as_object().cloned().unwrap_or_default())
}
