//! Browser discovery, launch, and DevTools HTTP tab endpoints.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use tokio::process::{Child, Command};

use outpost_types::BrowserConfig;

use crate::error::BrowserError;

/// How long to wait for the DevTools HTTP endpoint after spawning.
const STARTUP_TIMEOUT: Duration = Duration::from_secs(15);

/// One debuggable target, as reported by `/json/list`.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetInfo {
    /// Target identifier used by `/json/close`.
    pub id: String,
    /// Target type; tabs are `"page"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Current URL of the target.
    #[serde(default)]
    pub url: String,
    /// WebSocket endpoint for attaching a CDP client.
    #[serde(rename = "webSocketDebuggerUrl")]
    pub ws_url: Option<String>,
}

impl TargetInfo {
    /// Whether this target is an attachable tab.
    pub fn is_page(&self) -> bool {
        self.kind == "page"
    }
}

/// Client for the browser's DevTools HTTP interface.
pub struct DevtoolsEndpoint {
    http: reqwest::Client,
    base: String,
}

impl DevtoolsEndpoint {
    /// Endpoint for a DevTools port on localhost.
    pub fn for_port(port: u16) -> Result<Self, BrowserError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base: format!("http://127.0.0.1:{port}"),
        })
    }

    /// Poll `/json/version` until the endpoint answers.
    pub async fn wait_ready(&self) -> Result<(), BrowserError> {
        let deadline = tokio::time::Instant::now() + STARTUP_TIMEOUT;
        loop {
            match self.http.get(format!("{}/json/version", self.base)).send().await {
                Ok(response) if response.status().is_success() => return Ok(()),
                _ if tokio::time::Instant::now() >= deadline => {
                    return Err(BrowserError::Launch {
                        reason: format!(
                            "DevTools endpoint {} not ready after {STARTUP_TIMEOUT:?}",
                            self.base
                        ),
                    });
                }
                _ => tokio::time::sleep(Duration::from_millis(200)).await,
            }
        }
    }

    /// List all debuggable targets.
    pub async fn list_targets(&self) -> Result<Vec<TargetInfo>, BrowserError> {
        let response = self.http.get(format!("{}/json/list", self.base)).send().await?;
        Ok(response.json().await?)
    }

    /// Open a new tab at `url`. Chrome requires PUT here since 111.
    pub async fn create_target(&self, url: &str) -> Result<TargetInfo, BrowserError> {
        let encoded: String = url::form_urlencoded::byte_serialize(url.as_bytes()).collect();
        let response = self
            .http
            .put(format!("{}/json/new?{encoded}", self.base))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(BrowserError::Protocol {
                detail: format!("/json/new returned {}", response.status()),
            });
        }
        Ok(response.json().await?)
    }

    /// Close a tab by target id.
    pub async fn close_target(&self, id: &str) -> Result<(), BrowserError> {
        let response = self
            .http
            .get(format!("{}/json/close/{id}", self.base))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(BrowserError::Protocol {
                detail: format!("/json/close returned {}", response.status()),
            });
        }
        Ok(())
    }
}

/// Locate the browser binary: explicit config first, then well-known
/// install locations.
pub fn find_browser(config: &BrowserConfig) -> Result<PathBuf, BrowserError> {
    if let Some(binary) = &config.binary {
        if binary.exists() {
            return Ok(binary.clone());
        }
        return Err(BrowserError::Launch {
            reason: format!("configured binary not found: {}", binary.display()),
        });
    }

    for candidate in default_candidates() {
        let path = PathBuf::from(candidate);
        if path.exists() {
            return Ok(path);
        }
    }

    Err(BrowserError::Launch {
        reason: "no Chrome/Chromium binary found; set browser.binary in the config".to_string(),
    })
}

#[cfg(target_os = "macos")]
fn default_candidates() -> &'static [&'static str] {
    &[
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
    ]
}

#[cfg(target_os = "windows")]
fn default_candidates() -> &'static [&'static str] {
    &[
        "C:\\Program Files\\Google\\Chrome\\Application\\chrome.exe",
        "C:\\Program Files (x86)\\Google\\Chrome\\Application\\chrome.exe",
    ]
}

#[cfg(all(unix, not(target_os = "macos")))]
fn default_candidates() -> &'static [&'static str] {
    &[
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
    ]
}

/// Spawn the browser with remote debugging enabled and wait until its
/// DevTools endpoint answers.
pub async fn spawn_browser(
    config: &BrowserConfig,
) -> Result<(Child, DevtoolsEndpoint), BrowserError> {
    let binary = find_browser(config)?;
    tracing::info!(
        binary = %binary.display(),
        port = config.devtools_port,
        headless = config.headless,
        "launching browser"
    );

    let mut command = Command::new(&binary);
    command
        .arg(format!("--remote-debugging-port={}", config.devtools_port))
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("about:blank");
    if config.headless {
        command.arg("--headless=new");
    }
    if let Some(dir) = &config.user_data_dir {
        command.arg(format!("--user-data-dir={}", dir.display()));
    }

    let child = command
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| BrowserError::Launch {
            reason: format!("failed to spawn {}: {e}", binary.display()),
        })?;

    let endpoint = DevtoolsEndpoint::for_port(config.devtools_port)?;
    endpoint.wait_ready().await?;

    Ok((child, endpoint))
}
