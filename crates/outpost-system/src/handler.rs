//! The system capability handler.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::process::Command as OsCommand;

use outpost_types::{CapabilityHandler, HandlerOutcome};

use crate::pkgmgr;

#[cfg(windows)]
const SHELL: (&str, &str) = ("cmd", "/C");
#[cfg(not(windows))]
const SHELL: (&str, &str) = ("sh", "-c");

/// Executes shell commands, package operations, and application launches.
///
/// Stateless by design: the engine serializes invocations, and every method
/// spawns a fresh process. Children are NOT killed when an invocation is
/// abandoned at the engine's timeout — a timed-out `run_command` may still
/// complete at the OS level.
#[derive(Debug, Default)]
pub struct SystemHandler;

impl SystemHandler {
    pub fn new() -> Self {
        Self
    }

    /// Run a line through the platform shell and capture its output.
    async fn run_shell(&self, line: &str) -> HandlerOutcome {
        tracing::info!(command = line, "running shell command");

        let output = OsCommand::new(SHELL.0)
            .arg(SHELL.1)
            .arg(line)
            .kill_on_drop(false)
            .output()
            .await;

        match output {
            Ok(output) => {
                let exit_code = output.status.code().unwrap_or(-1);
                let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
                let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
                let data = json!({
                    "stdout": stdout,
                    "stderr": stderr,
                    "exit_code": exit_code,
                });

                if output.status.success() {
                    HandlerOutcome {
                        success: true,
                        message: Some(format!("command exited with code {exit_code}")),
                        error: None,
                        data: Some(data),
                    }
                } else {
                    HandlerOutcome {
                        success: false,
                        message: None,
                        error: Some(format!("command exited with code {exit_code}")),
                        data: Some(data),
                    }
                }
            }
            Err(e) => HandlerOutcome::err(format!("failed to spawn command: {e}")),
        }
    }

    async fn install_program(&self, program: &str) -> HandlerOutcome {
        let line = pkgmgr::install_line(program);
        let outcome = self.run_shell(&line).await;
        if outcome.success {
            HandlerOutcome {
                message: Some(format!("installed {program}")),
                ..outcome
            }
        } else {
            HandlerOutcome {
                error: Some(format!(
                    "failed to install {program}: {}",
                    outcome.error.as_deref().unwrap_or("unknown error")
                )),
                ..outcome
            }
        }
    }

    async fn uninstall_program(&self, program: &str) -> HandlerOutcome {
        let line = pkgmgr::uninstall_line(program);
        let outcome = self.run_shell(&line).await;
        if outcome.success {
            HandlerOutcome {
                message: Some(format!("uninstalled {program}")),
                ..outcome
            }
        } else {
            HandlerOutcome {
                error: Some(format!(
                    "failed to uninstall {program}: {}",
                    outcome.error.as_deref().unwrap_or("unknown error")
                )),
                ..outcome
            }
        }
    }

    /// Launch an application without waiting for it to exit.
    async fn open_application(&self, app_name: &str) -> HandlerOutcome {
        tracing::info!(app = app_name, "opening application");

        let spawned = OsCommand::new(SHELL.0)
            .arg(SHELL.1)
            .arg(app_name)
            .kill_on_drop(false)
            .spawn();

        match spawned {
            Ok(_child) => HandlerOutcome::ok(format!("opened {app_name}")),
            Err(e) => HandlerOutcome::err(format!("failed to open {app_name}: {e}")),
        }
    }
}

fn str_param<'a>(params: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    params.get(key).and_then(Value::as_str)
}

#[async_trait]
impl CapabilityHandler for SystemHandler {
    fn name(&self) -> &'static str {
        "system"
    }

    async fn execute(&mut self, method: &str, params: &Map<String, Value>) -> HandlerOutcome {
        match method {
            "run_command" => match str_param(params, "command") {
                Some(line) => self.run_shell(line).await,
                None => HandlerOutcome::err("missing parameter 'command'"),
            },
            "install_program" => match str_param(params, "program") {
                Some(program) => self.install_program(program).await,
                None => HandlerOutcome::err("missing parameter 'program'"),
            },
            "uninstall_program" => match str_param(params, "program") {
                Some(program) => self.uninstall_program(program).await,
                None => HandlerOutcome::err("missing parameter 'program'"),
            },
            "open_application" => match str_param(params, "app_name") {
                Some(app) => self.open_application(app).await,
                None => HandlerOutcome::err("missing parameter 'app_name'"),
            },
            other => HandlerOutcome::err(format!("system handler has no method '{other}'")),
        }
    }
}
