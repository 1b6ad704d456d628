//! The command execution engine.
//!
//! `execute()` never raises: every failure mode — malformed shape, policy
//! denial, unknown action, handler timeout, handler error — is captured
//! into exactly one [`CommandResult`]. One command runs to completion (or
//! timeout) before the next is dispatched; the engine takes `&mut self`,
//! so serialized execution is enforced by the borrow checker rather than a
//! lock.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use outpost_policy::{engine::realize_operation, PolicyVerdict, SecurityPolicy};
use outpost_types::{
    CapabilityHandler, Command, CommandExecutor, CommandResult, FailureKind, HandlerOutcome,
};

use crate::confirm::ConfirmationGate;
use crate::dispatch::{DispatchTable, HandlerKind};

/// Time budgets for the engine.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Upper bound on a single handler invocation.
    pub command_timeout: Duration,
    /// How long to wait for out-of-band approval before auto-denying.
    pub confirmation_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_secs(300),
            confirmation_timeout: Duration::from_secs(30),
        }
    }
}

/// Validates, gates, routes, and invokes commands; normalizes outcomes.
pub struct ExecutionEngine {
    policy: SecurityPolicy,
    table: DispatchTable,
    handlers: HashMap<HandlerKind, Box<dyn CapabilityHandler>>,
    gate: Option<Box<dyn ConfirmationGate>>,
    config: EngineConfig,
}

impl ExecutionEngine {
    /// Create an engine with no handlers registered.
    pub fn new(policy: SecurityPolicy, table: DispatchTable, config: EngineConfig) -> Self {
        Self {
            policy,
            table,
            handlers: HashMap::new(),
            gate: None,
            config,
        }
    }

    /// Register the handler instance serving a capability domain.
    pub fn register_handler(
        &mut self,
        kind: HandlerKind,
        handler: Box<dyn CapabilityHandler>,
    ) -> &mut Self {
        self.handlers.insert(kind, handler);
        self
    }

    /// Install the confirmation gate. Without one, confirmation-required
    /// commands are auto-denied.
    pub fn with_confirmation_gate(&mut self, gate: Box<dyn ConfirmationGate>) -> &mut Self {
        self.gate = Some(gate);
        self
    }

    /// Execute one command to completion. Never fails; all outcomes are a
    /// [`CommandResult`].
    ///
    /// A timed-out invocation is abandoned, not cancelled: the future is
    /// dropped at the deadline, but side effects already started at the OS
    /// level (a spawned process, an in-flight install) may still complete.
    /// Callers must treat `timeout` results as unknown outcome, not no-op.
    pub async fn execute(&mut self, command: &Command) -> CommandResult {
        tracing::info!(command = %command.id, action = %command.action, "executing command");

        // 1. Shape validation.
        if command.action.trim().is_empty() {
            return CommandResult::failure(
                FailureKind::Validation,
                "malformed command: missing action",
            );
        }

        // 2. Policy gate.
        match self.policy.evaluate(command) {
            PolicyVerdict::Allow => {}
            PolicyVerdict::Deny { reason } => {
                return CommandResult::failure(FailureKind::Policy, format!("policy: {reason}"));
            }
            PolicyVerdict::RequireConfirmation => {
                if !self.await_confirmation(command).await {
                    return CommandResult::failure(
                        FailureKind::Policy,
                        "policy: confirmation denied",
                    );
                }
            }
        }

        // 3. Dispatch resolution and parameter validation.
        let binding = match self.table.resolve(&command.action, &command.parameters) {
            Ok(binding) => *binding,
            Err(e) if e.is_unknown_action() => {
                return CommandResult::failure(FailureKind::UnknownAction, e.to_string());
            }
            Err(e) => {
                return CommandResult::failure(FailureKind::Validation, e.to_string());
            }
        };

        let Some(handler) = self.handlers.get_mut(&binding.handler) else {
            return CommandResult::failure(
                FailureKind::Handler,
                format!("no handler registered for {}", binding.handler),
            );
        };

        // 4. Timeout-bounded invocation.
        let invocation = handler.execute(binding.method, &command.parameters);
        let outcome = match tokio::time::timeout(self.config.command_timeout, invocation).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::warn!(
                    command = %command.id,
                    action = %command.action,
                    budget_secs = self.config.command_timeout.as_secs(),
                    "handler invocation abandoned after timeout"
                );
                return CommandResult::failure(FailureKind::Timeout, "timeout");
            }
        };

        // 5. Normalization.
        normalize(outcome)
    }

    /// Block on the confirmation gate, auto-denying on timeout or when no
    /// gate is configured.
    async fn await_confirmation(&self, command: &Command) -> bool {
        let Some(gate) = &self.gate else {
            tracing::warn!(
                command = %command.id,
                "confirmation required but no approver configured, denying"
            );
            return false;
        };

        let operation = realize_operation(command);
        match tokio::time::timeout(
            self.config.confirmation_timeout,
            gate.confirm(command, &operation),
        )
        .await
        {
            Ok(approved) => approved,
            Err(_) => {
                tracing::warn!(command = %command.id, "confirmation timed out, denying");
                false
            }
        }
    }

    /// Shut down all registered handlers (closing live sessions).
    pub async fn shutdown_handlers(&mut self) {
        for handler in self.handlers.values_mut() {
            handler.shutdown().await;
        }
    }
}

#[async_trait]
impl CommandExecutor for ExecutionEngine {
    async fn execute(&mut self, command: &Command) -> CommandResult {
        ExecutionEngine::execute(self, command).await
    }

    async fn shutdown(&mut self) {
        self.shutdown_handlers().await;
    }
}

/// Fold a handler outcome into the canonical result shape.
fn normalize(outcome: HandlerOutcome) -> CommandResult {
    if outcome.success {
        CommandResult {
            success: true,
            message: outcome.message,
            error: None,
            data: outcome.data,
            kind: None,
        }
    } else {
        CommandResult {
            success: false,
            message: outcome.message,
            error: Some(
                outcome
                    .error
                    .unwrap_or_else(|| "handler reported failure".to_string()),
            ),
            data: outcome.data,
            kind: Some(FailureKind::Handler),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use serde_json::{json, Map, Value};

    use crate::confirm::{ChannelGate, DenyAllGate};

    /// Handler test double: scripted outcome plus an invocation counter.
    struct ScriptedHandler {
        outcome: HandlerOutcome,
        delay: Option<Duration>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedHandler {
        fn new(outcome: HandlerOutcome) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    outcome,
                    delay: None,
                    calls: Arc::clone(&calls),
                },
                calls,
            )
        }

        fn slow(outcome: HandlerOutcome, delay: Duration) -> (Self, Arc<AtomicUsize>) {
            let (mut handler, calls) = Self::new(outcome);
            handler.delay = Some(delay);
            (handler, calls)
        }
    }

    #[async_trait]
    impl CapabilityHandler for ScriptedHandler {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn execute(&mut self, _method: &str, _params: &Map<String, Value>) -> HandlerOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.outcome.clone()
        }
    }

    fn command(action: &str, params: Value) -> Command {
        Command::new(
            "cmd-test",
            action,
            params.as_object().cloned().unwrap_or_default(),
        )
    }

    fn engine_with(
        policy: SecurityPolicy,
        kind: HandlerKind,
        handler: ScriptedHandler,
    ) -> ExecutionEngine {
        let mut engine = ExecutionEngine::new(
            policy,
            DispatchTable::standard(),
            EngineConfig {
                command_timeout: Duration::from_millis(100),
                confirmation_timeout: Duration::from_millis(100),
            },
        );
        engine.register_handler(kind, Box::new(handler));
        engine
    }

    #[tokio::test]
    async fn blocked_command_never_reaches_handler() {
        let (handler, calls) = ScriptedHandler::new(HandlerOutcome::ok("ran"));
        let policy = SecurityPolicy::new(vec!["format".to_string()], false);
        let mut engine = engine_with(policy, HandlerKind::System, handler);

        let result = engine
            .execute(&command("run_command", json!({"command": "format C:"})))
            .await;

        assert!(!result.success);
        assert_eq!(result.kind, Some(FailureKind::Policy));
        assert_eq!(result.error.as_deref(), Some("policy: matched 'format'"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_action_never_reaches_handler() {
        let (handler, calls) = ScriptedHandler::new(HandlerOutcome::ok("ran"));
        let policy = SecurityPolicy::new(Vec::new(), false);
        let mut engine = engine_with(policy, HandlerKind::System, handler);

        let result = engine.execute(&command("send_email", json!({}))).await;

        assert_eq!(result.kind, Some(FailureKind::UnknownAction));
        assert!(result.error.unwrap().contains("send_email"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_param_is_validation_not_unknown() {
        let (handler, calls) = ScriptedHandler::new(HandlerOutcome::ok("ran"));
        let policy = SecurityPolicy::new(Vec::new(), false);
        let mut engine = engine_with(policy, HandlerKind::System, handler);

        let result = engine.execute(&command("run_command", json!({}))).await;

        assert_eq!(result.kind, Some(FailureKind::Validation));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_action_is_validation() {
        let (handler, _) = ScriptedHandler::new(HandlerOutcome::ok("ran"));
        let policy = SecurityPolicy::new(Vec::new(), false);
        let mut engine = engine_with(policy, HandlerKind::System, handler);

        let result = engine.execute(&command("", json!({}))).await;
        assert_eq!(result.kind, Some(FailureKind::Validation));
    }

    #[tokio::test]
    async fn accepted_command_invokes_handler_exactly_once() {
        let (handler, calls) = ScriptedHandler::new(HandlerOutcome::ok_with(
            "ran",
            json!({"stdout": "hello"}),
        ));
        let policy = SecurityPolicy::new(Vec::new(), false);
        let mut engine = engine_with(policy, HandlerKind::System, handler);

        let result = engine
            .execute(&command("run_command", json!({"command": "echo hello"})))
            .await;

        assert!(result.success);
        assert_eq!(result.message.as_deref(), Some("ran"));
        assert_eq!(result.data.unwrap()["stdout"], "hello");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn handler_failure_normalizes_to_handler_error() {
        let (handler, _) = ScriptedHandler::new(HandlerOutcome::err("disk on fire"));
        let policy = SecurityPolicy::new(Vec::new(), false);
        let mut engine = engine_with(policy, HandlerKind::Files, handler);

        let result = engine
            .execute(&command("read_file", json!({"path": "/tmp/x"})))
            .await;

        assert!(!result.success);
        assert_eq!(result.kind, Some(FailureKind::Handler));
        assert_eq!(result.error.as_deref(), Some("disk on fire"));
    }

    #[tokio::test]
    async fn handler_failure_without_error_gets_a_default() {
        let (handler, _) = ScriptedHandler::new(HandlerOutcome {
            success: false,
            message: None,
            error: None,
            data: None,
        });
        let policy = SecurityPolicy::new(Vec::new(), false);
        let mut engine = engine_with(policy, HandlerKind::Files, handler);

        let result = engine
            .execute(&command("read_file", json!({"path": "/tmp/x"})))
            .await;
        assert_eq!(result.error.as_deref(), Some("handler reported failure"));
    }

    #[tokio::test]
    async fn slow_handler_times_out_with_timeout_kind() {
        let (handler, calls) =
            ScriptedHandler::slow(HandlerOutcome::ok("late"), Duration::from_secs(10));
        let policy = SecurityPolicy::new(Vec::new(), false);
        let mut engine = engine_with(policy, HandlerKind::System, handler);

        let result = engine
            .execute(&command("run_command", json!({"command": "sleep 60"})))
            .await;

        assert!(!result.success);
        assert_eq!(result.kind, Some(FailureKind::Timeout));
        assert_eq!(result.error.as_deref(), Some("timeout"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unregistered_handler_is_a_handler_error() {
        let policy = SecurityPolicy::new(Vec::new(), false);
        let mut engine = ExecutionEngine::new(
            policy,
            DispatchTable::standard(),
            EngineConfig::default(),
        );

        let result = engine
            .execute(&command("run_command", json!({"command": "ls"})))
            .await;
        assert_eq!(result.kind, Some(FailureKind::Handler));
        assert!(result.error.unwrap().contains("system"));
    }

    #[tokio::test]
    async fn confirmation_without_gate_denies() {
        let (handler, calls) = ScriptedHandler::new(HandlerOutcome::ok("ran"));
        let policy = SecurityPolicy::new(Vec::new(), true);
        let mut engine = engine_with(policy, HandlerKind::System, handler);

        let result = engine
            .execute(&command("run_command", json!({"command": "ls"})))
            .await;

        assert_eq!(result.kind, Some(FailureKind::Policy));
        assert_eq!(result.error.as_deref(), Some("policy: confirmation denied"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn confirmation_deny_all_gate_denies() {
        let (handler, calls) = ScriptedHandler::new(HandlerOutcome::ok("ran"));
        let policy = SecurityPolicy::new(Vec::new(), true);
        let mut engine = engine_with(policy, HandlerKind::System, handler);
        engine.with_confirmation_gate(Box::new(DenyAllGate));

        let result = engine
            .execute(&command("run_command", json!({"command": "ls"})))
            .await;

        assert!(!result.success);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn approved_confirmation_proceeds_to_handler() {
        let (handler, calls) = ScriptedHandler::new(HandlerOutcome::ok("ran"));
        let policy = SecurityPolicy::new(Vec::new(), true);
        let mut engine = engine_with(policy, HandlerKind::System, handler);

        let (gate, mut rx) = ChannelGate::new(1);
        engine.with_confirmation_gate(Box::new(gate));

        let approver = tokio::spawn(async move {
            let request = rx.recv().await.expect("approval request");
            assert_eq!(request.operation, "echo hi");
            let _ = request.reply.send(true);
        });

        let result = engine
            .execute(&command("run_command", json!({"command": "echo hi"})))
            .await;

        assert!(result.success);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        approver.await.unwrap();
    }

    #[tokio::test]
    async fn unanswered_confirmation_times_out_to_denial() {
        let (handler, calls) = ScriptedHandler::new(HandlerOutcome::ok("ran"));
        let policy = SecurityPolicy::new(Vec::new(), true);
        let mut engine = engine_with(policy, HandlerKind::System, handler);

        // Gate whose receiver never answers (but stays alive).
        let (gate, _rx) = ChannelGate::new(1);
        engine.with_confirmation_gate(Box::new(gate));

        let result = engine
            .execute(&command("run_command", json!({"command": "ls"})))
            .await;

        assert_eq!(result.kind, Some(FailureKind::Policy));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
