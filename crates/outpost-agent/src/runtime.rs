//! Building and running the agent from a resolved configuration.

use serde_json::{Map, Value};
use tokio::sync::{mpsc, watch};

use outpost_browser::BrowserHandler;
use outpost_engine::{DispatchTable, EngineConfig, ExecutionEngine, HandlerKind};
use outpost_files::FilesHandler;
use outpost_policy::SecurityPolicy;
use outpost_system::SystemHandler;
use outpost_transport::{CloudClient, Poller, PollerConfig};
use outpost_types::{Command, CommandId, CommandResult, OutpostConfig, OutpostError};

/// Assemble the execution engine: policy, dispatch table, and the three
/// capability handlers.
pub fn build_engine(config: &OutpostConfig) -> ExecutionEngine {
    let policy = SecurityPolicy::from_config(&config.security);
    let engine_config = EngineConfig {
        command_timeout: config.security.command_timeout(),
        confirmation_timeout: config.security.confirmation_timeout(),
    };

    let mut engine = ExecutionEngine::new(policy, DispatchTable::standard(), engine_config);
    engine.register_handler(
        HandlerKind::Browser,
        Box::new(BrowserHandler::new(config.browser.clone())),
    );
    engine.register_handler(HandlerKind::System, Box::new(SystemHandler::new()));
    engine.register_handler(HandlerKind::Files, Box::new(FilesHandler::new()));
    engine
}

/// Run the agent until the shutdown signal fires (or connectivity is lost
/// with offline mode disabled).
pub async fn run(
    config: OutpostConfig,
    shutdown: watch::Receiver<bool>,
    local_commands: Option<mpsc::Receiver<Command>>,
) -> Result<(), OutpostError> {
    tracing::info!(agent = %config.agent.name, endpoint = %config.cloud.endpoint, "starting agent");

    let engine = build_engine(&config);
    let transport =
        CloudClient::new(&config.cloud).map_err(|e| OutpostError::Config(e.to_string()))?;
    let poller_config = PollerConfig::from_config(&config);

    let mut poller = Poller::new(transport, engine, poller_config, shutdown);
    if let Some(rx) = local_commands {
        poller = poller.with_local_commands(rx);
    }

    poller.run().await;
    Ok(())
}

/// Execute one locally-sourced command through the full engine pipeline
/// (policy, dispatch, timeout) without touching the transport.
pub async fn exec_local(
    config: &OutpostConfig,
    action: &str,
    params: Map<String, Value>,
) -> CommandResult {
    let mut engine = build_engine(config);
    let command = Command::new(CommandId::random(), action, params);
    let result = engine.execute(&command).await;
    engine.shutdown_handlers().await;
    result
}
