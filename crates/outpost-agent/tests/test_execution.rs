//! Cross-crate execution pipeline tests: policy gate, dispatch, handler
//! invocation, and result normalization through the assembled engine.

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use serde_json::json;

use common::{test_budgets, test_engine, SlowHandler, StubBackend};
use outpost_browser::BrowserHandler;
use outpost_engine::{DispatchTable, EngineConfig, ExecutionEngine, HandlerKind};
use outpost_files::FilesHandler;
use outpost_harness::command;
use outpost_policy::SecurityPolicy;
use outpost_types::FailureKind;

#[tokio::test]
async fn blocked_pattern_denies_and_skips_handler() {
    let (mut engine, _, system, _) = test_engine(&["format"], false);

    let cmd = command("c1", "run_command", json!({"command": "format C:"}));
    let result = engine.execute(&cmd).await;

    assert!(!result.success);
    assert_eq!(result.kind, Some(FailureKind::Policy));
    assert_eq!(result.error.as_deref(), Some("policy: matched 'format'"));
    assert_eq!(system.call_count(), 0);

    // Exact wire shape for the remote side.
    let wire = result.to_wire();
    assert_eq!(wire, json!({"success": false, "error": "policy: matched 'format'"}));
}

#[tokio::test]
async fn unknown_action_yields_typed_failure_without_invocation() {
    let (mut engine, browser, system, files) = test_engine(&[], false);

    let cmd = command("c2", "send_email", json!({"to": "a@example.com"}));
    let result = engine.execute(&cmd).await;

    assert_eq!(result.kind, Some(FailureKind::UnknownAction));
    assert_eq!(browser.call_count() + system.call_count() + files.call_count(), 0);
}

#[tokio::test]
async fn error_kinds_stay_distinguishable() {
    let (mut engine, _, system, _) = test_engine(&["format"], false);
    system.push_outcome(outpost_types::HandlerOutcome::err("boom"));

    let validation = engine.execute(&command("v", "run_command", json!({}))).await;
    let policy = engine
        .execute(&command("p", "run_command", json!({"command": "format C:"})))
        .await;
    let unknown = engine.execute(&command("u", "no_such_action", json!({}))).await;
    let handler = engine
        .execute(&command("h", "run_command", json!({"command": "ls"})))
        .await;

    assert_eq!(validation.kind, Some(FailureKind::Validation));
    assert_eq!(policy.kind, Some(FailureKind::Policy));
    assert_eq!(unknown.kind, Some(FailureKind::UnknownAction));
    assert_eq!(handler.kind, Some(FailureKind::Handler));
}

#[tokio::test]
async fn accepted_command_invokes_exactly_one_handler() {
    let (mut engine, browser, system, files) = test_engine(&[], false);

    let cmd = command("c3", "read_file", json!({"path": "/tmp/x"}));
    let result = engine.execute(&cmd).await;

    assert!(result.success);
    assert_eq!(files.call_count(), 1);
    assert_eq!(browser.call_count(), 0);
    assert_eq!(system.call_count(), 0);
    assert_eq!(files.calls()[0].0, "read_file");
}

#[tokio::test(start_paused = true)]
async fn slow_handler_times_out_exactly_once() {
    let policy = SecurityPolicy::new(Vec::<String>::new(), false);
    let mut engine = ExecutionEngine::new(policy, DispatchTable::standard(), test_budgets());
    let (slow, calls) = SlowHandler::new(Duration::from_secs(30));
    engine.register_handler(HandlerKind::System, Box::new(slow));

    let cmd = command("c4", "run_command", json!({"command": "sleep 999"}));
    let result = engine.execute(&cmd).await;

    assert!(!result.success);
    assert_eq!(result.kind, Some(FailureKind::Timeout));
    assert_eq!(result.error.as_deref(), Some("timeout"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.to_wire(), json!({"success": false, "error": "timeout"}));
}

#[tokio::test]
async fn files_handler_end_to_end_through_engine() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.txt");
    let path_str = path.to_str().unwrap();

    let policy = SecurityPolicy::new(Vec::<String>::new(), false);
    let mut engine = ExecutionEngine::new(policy, DispatchTable::standard(), EngineConfig::default());
    engine.register_handler(HandlerKind::Files, Box::new(FilesHandler::new()));

    let create = engine
        .execute(&command(
            "c5",
            "create_file",
            json!({"path": path_str, "content": "findings"}),
        ))
        .await;
    assert!(create.success, "{:?}", create.error);

    let read = engine
        .execute(&command("c6", "read_file", json!({"path": path_str})))
        .await;
    assert!(read.success);
    assert_eq!(read.data.unwrap()["content"], "findings");

    let delete = engine
        .execute(&command("c7", "delete_file", json!({"path": path_str})))
        .await;
    assert!(delete.success);
    assert!(!path.exists());
}

#[tokio::test]
async fn open_browser_with_no_session_creates_one() {
    let policy = SecurityPolicy::new(Vec::<String>::new(), false);
    let mut engine = ExecutionEngine::new(policy, DispatchTable::standard(), EngineConfig::default());
    let (backend, opens) = StubBackend::new();
    engine.register_handler(
        HandlerKind::Browser,
        Box::new(BrowserHandler::with_backend(Box::new(backend))),
    );

    let result = engine.execute(&command("c8", "open_browser", json!({}))).await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(opens.load(Ordering::SeqCst), 1);

    // A second browser command reuses the session.
    let result = engine
        .execute(&command("c9", "get_page_content", json!({})))
        .await;
    assert!(result.success);
    assert_eq!(opens.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn browser_commands_pass_the_policy_realization() {
    // Patterns match browser targets, not just shell lines.
    let (mut engine, browser, _, _) = test_engine(&["malware.example"], false);

    let result = engine
        .execute(&command(
            "c10",
            "open_browser",
            json!({"url": "https://malware.example/payload"}),
        ))
        .await;

    assert_eq!(result.kind, Some(FailureKind::Policy));
    assert_eq!(browser.call_count(), 0);
}
