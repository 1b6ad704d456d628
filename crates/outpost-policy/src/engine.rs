//! The security policy engine.
//!
//! [`SecurityPolicy`] is a pure function of (command, loaded rules): the
//! same command against the same rules always yields the same verdict, and
//! evaluation itself never fails. Rules are loaded once at startup and are
//! read-only for the process lifetime.

use outpost_types::{Command, SecurityConfig};

use crate::builtin::DEFAULT_BLOCKED_PATTERNS;
use crate::verdict::PolicyVerdict;

/// Evaluates proposed commands against blocked patterns and the
/// confirmation requirement.
#[derive(Debug, Clone)]
pub struct SecurityPolicy {
    /// Blocked patterns, pre-lowered for case-insensitive matching.
    blocked: Vec<String>,
    /// Whether commands that pass the pattern check still need approval.
    require_confirmation: bool,
}

impl SecurityPolicy {
    /// Build a policy from explicit patterns.
    pub fn new(patterns: impl IntoIterator<Item = String>, require_confirmation: bool) -> Self {
        Self {
            blocked: patterns.into_iter().map(|p| p.to_lowercase()).collect(),
            require_confirmation,
        }
    }

    /// Build a policy from configuration. An empty pattern list falls back
    /// to the built-in default set.
    pub fn from_config(config: &SecurityConfig) -> Self {
        if config.blocked_patterns.is_empty() {
            tracing::info!(
                patterns = DEFAULT_BLOCKED_PATTERNS.len(),
                "no blocked patterns configured, using built-in defaults"
            );
            Self::new(
                DEFAULT_BLOCKED_PATTERNS.iter().map(|p| p.to_string()),
                config.require_confirmation,
            )
        } else {
            Self::new(
                config.blocked_patterns.iter().cloned(),
                config.require_confirmation,
            )
        }
    }

    /// Evaluate a command. Never fails; malformed commands are denied.
    pub fn evaluate(&self, command: &Command) -> PolicyVerdict {
        if command.action.trim().is_empty() {
            return PolicyVerdict::Deny {
                reason: "malformed command: missing action".to_string(),
            };
        }

        let operation = realize_operation(command);
        let lowered = operation.to_lowercase();

        for pattern in &self.blocked {
            if lowered.contains(pattern.as_str()) {
                tracing::warn!(
                    command = %command.id,
                    action = %command.action,
                    pattern = %pattern,
                    "command denied by blocked pattern"
                );
                return PolicyVerdict::matched(pattern);
            }
        }

        if self.require_confirmation {
            return PolicyVerdict::RequireConfirmation;
        }

        PolicyVerdict::Allow
    }

    /// Number of loaded blocked patterns.
    pub fn pattern_count(&self) -> usize {
        self.blocked.len()
    }
}

/// Realize the command's effective operation string: the literal shell
/// line, file path, or browser target the command would touch.
///
/// Actions with no sharper realization fall back to the action name plus
/// the compact parameter JSON, so patterns still get a chance to match.
pub fn realize_operation(command: &Command) -> String {
    let p = |key: &str| command.param_str(key).unwrap_or_default().to_string();

    match command.action.as_str() {
        "run_command" => p("command"),
        "open_application" => p("app_name"),
        "install_program" | "uninstall_program" => p("program"),
        "create_file" | "read_file" | "delete_file" | "create_directory" | "list_directory" => {
            p("path")
        }
        "copy_file" | "move_file" => format!("{} {}", p("source"), p("destination")),
        "open_browser" | "new_tab" => p("url"),
        "search_web" => p("query"),
        "click_element" => p("selector"),
        "type_text" => format!("{} {}", p("selector"), p("text")),
        _ => {
            let params = serde_json::Value::Object(command.parameters.clone());
            format!("{} {params}", command.action)
        }
    }
}
