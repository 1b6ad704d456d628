//! The dispatch table: a closed action registry with parameter schemas.
//!
//! Action identifiers arrive as open strings on the wire but resolve
//! against the closed [`ActionId`] enum; unknown identifiers yield a typed
//! [`ResolveError::UnknownAction`]. Parameter validation (required keys
//! present, basic type check) happens at resolve time, before any handler
//! is invoked, so validation failures stay distinguishable from policy
//! denials and handler errors.

use std::collections::HashMap;
use std::str::FromStr;

use serde_json::{Map, Value};

/// Every action the agent can execute. Closed set; extending it means
/// adding a variant and a registry entry, not a runtime lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionId {
    OpenBrowser,
    NewTab,
    CloseTab,
    SearchWeb,
    ClickElement,
    TypeText,
    GetPageContent,
    RunCommand,
    InstallProgram,
    UninstallProgram,
    OpenApplication,
    CreateFile,
    ReadFile,
    DeleteFile,
    CreateDirectory,
    ListDirectory,
    CopyFile,
    MoveFile,
}

impl ActionId {
    /// The wire identifier for this action.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionId::OpenBrowser => "open_browser",
            ActionId::NewTab => "new_tab",
            ActionId::CloseTab => "close_tab",
            ActionId::SearchWeb => "search_web",
            ActionId::ClickElement => "click_element",
            ActionId::TypeText => "type_text",
            ActionId::GetPageContent => "get_page_content",
            ActionId::RunCommand => "run_command",
            ActionId::InstallProgram => "install_program",
            ActionId::UninstallProgram => "uninstall_program",
            ActionId::OpenApplication => "open_application",
            ActionId::CreateFile => "create_file",
            ActionId::ReadFile => "read_file",
            ActionId::DeleteFile => "delete_file",
            ActionId::CreateDirectory => "create_directory",
            ActionId::ListDirectory => "list_directory",
            ActionId::CopyFile => "copy_file",
            ActionId::MoveFile => "move_file",
        }
    }

    /// All registered actions, in registry order.
    pub fn all() -> &'static [ActionId] {
        &[
            ActionId::OpenBrowser,
            ActionId::NewTab,
            ActionId::CloseTab,
            ActionId::SearchWeb,
            ActionId::ClickElement,
            ActionId::TypeText,
            ActionId::GetPageContent,
            ActionId::RunCommand,
            ActionId::InstallProgram,
            ActionId::UninstallProgram,
            ActionId::OpenApplication,
            ActionId::CreateFile,
            ActionId::ReadFile,
            ActionId::DeleteFile,
            ActionId::CreateDirectory,
            ActionId::ListDirectory,
            ActionId::CopyFile,
            ActionId::MoveFile,
        ]
    }
}

impl std::fmt::Display for ActionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionId::all()
            .iter()
            .copied()
            .find(|a| a.as_str() == s)
            .ok_or(())
    }
}

/// Which capability handler services an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerKind {
    Browser,
    System,
    Files,
}

impl HandlerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandlerKind::Browser => "browser",
            HandlerKind::System => "system",
            HandlerKind::Files => "files",
        }
    }
}

impl std::fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Basic parameter type for schema validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Integer,
}

impl ParamKind {
    fn matches(&self, value: &Value) -> bool {
        match self {
            ParamKind::String => value.is_string(),
            ParamKind::Integer => value.is_i64() || value.is_u64(),
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Integer => "integer",
        }
    }
}

/// One parameter in an action's schema.
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub key: &'static str,
    pub kind: ParamKind,
    pub required: bool,
}

const fn required(key: &'static str, kind: ParamKind) -> ParamSpec {
    ParamSpec {
        key,
        kind,
        required: true,
    }
}

const fn optional(key: &'static str, kind: ParamKind) -> ParamSpec {
    ParamSpec {
        key,
        kind,
        required: false,
    }
}

/// A registry entry binding an action to a handler method and its schema.
#[derive(Debug, Clone, Copy)]
pub struct Binding {
    pub action: ActionId,
    pub handler: HandlerKind,
    /// Method name passed to `CapabilityHandler::execute`. Identical to the
    /// wire action today, but bound explicitly so the mapping stays a
    /// registry decision.
    pub method: &'static str,
    pub params: &'static [ParamSpec],
}

/// Typed resolution failure, kept distinct from policy and handler errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("unknown action: {action}")]
    UnknownAction { action: String },

    #[error("missing required parameter '{key}' for action {action}")]
    MissingParam { action: ActionId, key: &'static str },

    #[error("parameter '{key}' for action {action} must be a {expected}")]
    WrongType {
        action: ActionId,
        key: &'static str,
        expected: &'static str,
    },
}

impl ResolveError {
    /// Whether this is an unknown-action failure (vs. a validation failure).
    pub fn is_unknown_action(&self) -> bool {
        matches!(self, ResolveError::UnknownAction { .. })
    }
}

/// The fixed registry. Method names repeat the wire identifier today, but
/// the binding keeps them an explicit registry decision.
const REGISTRY: &[Binding] = &{
    use ActionId::*;
    use HandlerKind::*;
    use ParamKind::{Integer, String as Str};

    const fn bind(
        action: ActionId,
        handler: HandlerKind,
        method: &'static str,
        params: &'static [ParamSpec],
    ) -> Binding {
        Binding {
            action,
            handler,
            method,
            params,
        }
    }

    [
        bind(OpenBrowser, Browser, "open_browser", &[optional("url", Str)]),
        bind(NewTab, Browser, "new_tab", &[optional("url", Str)]),
        bind(CloseTab, Browser, "close_tab", &[optional("index", Integer)]),
        bind(SearchWeb, Browser, "search_web", &[required("query", Str)]),
        bind(
            ClickElement,
            Browser,
            "click_element",
            &[required("selector", Str)],
        ),
        bind(
            TypeText,
            Browser,
            "type_text",
            &[required("selector", Str), required("text", Str)],
        ),
        bind(GetPageContent, Browser, "get_page_content", &[]),
        bind(RunCommand, System, "run_command", &[required("command", Str)]),
        bind(
            InstallProgram,
            System,
            "install_program",
            &[required("program", Str)],
        ),
        bind(
            UninstallProgram,
            System,
            "uninstall_program",
            &[required("program", Str)],
        ),
        bind(
            OpenApplication,
            System,
            "open_application",
            &[required("app_name", Str)],
        ),
        bind(
            CreateFile,
            Files,
            "create_file",
            &[required("path", Str), optional("content", Str)],
        ),
        bind(ReadFile, Files, "read_file", &[required("path", Str)]),
        bind(DeleteFile, Files, "delete_file", &[required("path", Str)]),
        bind(
            CreateDirectory,
            Files,
            "create_directory",
            &[required("path", Str)],
        ),
        bind(
            ListDirectory,
            Files,
            "list_directory",
            &[required("path", Str)],
        ),
        bind(
            CopyFile,
            Files,
            "copy_file",
            &[required("source", Str), required("destination", Str)],
        ),
        bind(
            MoveFile,
            Files,
            "move_file",
            &[required("source", Str), required("destination", Str)],
        ),
    ]
};

/// Static action registry, built once at startup.
pub struct DispatchTable {
    bindings: HashMap<ActionId, Binding>,
}

impl DispatchTable {
    /// Build the standard registry covering every [`ActionId`].
    pub fn standard() -> Self {
        let bindings = REGISTRY
            .iter()
            .map(|binding| (binding.action, *binding))
            .collect();
        Self { bindings }
    }

    /// Resolve an action identifier and validate its parameters against the
    /// bound schema.
    pub fn resolve(
        &self,
        action: &str,
        params: &Map<String, Value>,
    ) -> Result<&Binding, ResolveError> {
        let id = ActionId::from_str(action).map_err(|_| ResolveError::UnknownAction {
            action: action.to_string(),
        })?;

        // The standard registry covers every variant; a miss here would be
        // a registry bug, surfaced as unknown rather than a panic.
        let binding = self
            .bindings
            .get(&id)
            .ok_or_else(|| ResolveError::UnknownAction {
                action: action.to_string(),
            })?;

        for spec in binding.params {
            match params.get(spec.key) {
                Some(value) if value.is_null() && !spec.required => {}
                Some(value) => {
                    if !spec.kind.matches(value) {
                        return Err(ResolveError::WrongType {
                            action: id,
                            key: spec.key,
                            expected: spec.kind.as_str(),
                        });
                    }
                }
                None if spec.required => {
                    return Err(ResolveError::MissingParam {
                        action: id,
                        key: spec.key,
                    });
                }
                None => {}
            }
        }

        Ok(binding)
    }

    /// Number of registered actions.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether the registry is empty (it never is for `standard()`).
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
