//! The live browser session: one launched process, one or more tabs.
//!
//! At most one session exists per handler instance. The session owns the
//! child process exclusively; killing it on close (or drop) is what tears
//! the session down. Element interaction goes through `Runtime.evaluate`
//! rather than synthesized input events, which keeps one code path for
//! queries and actions alike.

use std::time::Duration;

use serde_json::{json, Value};
use tokio::process::Child;

use outpost_types::BrowserConfig;

use crate::cdp::CdpConnection;
use crate::error::BrowserError;
use crate::handler::{PageContent, SearchResult};
use crate::launch::{self, DevtoolsEndpoint};

/// Where `open_browser` lands when no URL is given.
pub const DEFAULT_START_URL: &str = "https://www.google.com";

/// HTML search endpoint used by `search_web`; scrapeable without JS.
const SEARCH_URL: &str = "https://duckduckgo.com/html/?q=";

/// How long to wait for `document.readyState` to reach `complete`.
const LOAD_TIMEOUT: Duration = Duration::from_secs(20);

/// Maximum page-content excerpt returned to the remote side.
const CONTENT_LIMIT: usize = 5000;

/// Search results returned per query.
const SEARCH_RESULT_LIMIT: usize = 5;

struct Tab {
    target_id: String,
    conn: CdpConnection,
}

/// A launched browser with its open tabs. See the module docs for
/// ownership rules.
pub struct BrowserSession {
    child: Child,
    devtools: DevtoolsEndpoint,
    tabs: Vec<Tab>,
    active: usize,
}

impl BrowserSession {
    /// Launch the browser and attach to its initial tab.
    pub async fn open(config: &BrowserConfig) -> Result<Self, BrowserError> {
        let (child, devtools) = launch::spawn_browser(config).await?;

        let targets = devtools.list_targets().await?;
        let first_page = targets.into_iter().find(|t| t.is_page());

        let target = match first_page {
            Some(target) => target,
            None => devtools.create_target("about:blank").await?,
        };

        let tab = attach(target.id.clone(), target.ws_url.as_deref()).await?;

        Ok(Self {
            child,
            devtools,
            tabs: vec![tab],
            active: 0,
        })
    }

    fn active_tab(&self) -> Result<&Tab, BrowserError> {
        self.tabs.get(self.active).ok_or(BrowserError::NoTab)
    }

    /// Navigate the active tab and wait for the document to finish loading.
    pub async fn navigate(&mut self, url: &str) -> Result<String, BrowserError> {
        let result = self
            .active_tab()?
            .conn
            .call("Page.navigate", json!({"url": url}))
            .await?;

        if let Some(error_text) = result.get("errorText").and_then(Value::as_str) {
            if !error_text.is_empty() {
                return Err(BrowserError::NavigationFailed {
                    reason: error_text.to_string(),
                });
            }
        }

        self.wait_loaded().await?;
        self.current_url().await
    }

    /// Poll `document.readyState` until the page is fully loaded.
    async fn wait_loaded(&self) -> Result<(), BrowserError> {
        let deadline = tokio::time::Instant::now() + LOAD_TIMEOUT;
        loop {
            let state = self.evaluate("document.readyState").await?;
            if state.as_str() == Some("complete") {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(BrowserError::NavigationFailed {
                    reason: format!("page did not finish loading within {LOAD_TIMEOUT:?}"),
                });
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Evaluate a JavaScript expression in the active tab, by value.
    pub async fn evaluate(&self, expression: &str) -> Result<Value, BrowserError> {
        let result = self
            .active_tab()?
            .conn
            .call(
                "Runtime.evaluate",
                json!({"expression": expression, "returnByValue": true}),
            )
            .await?;

        if let Some(exception) = result.get("exceptionDetails") {
            let message = exception
                .get("exception")
                .and_then(|e| e.get("description"))
                .and_then(Value::as_str)
                .unwrap_or("unknown exception")
                .to_string();
            return Err(BrowserError::JsException { message });
        }

        Ok(result
            .get("result")
            .and_then(|r| r.get("value"))
            .cloned()
            .unwrap_or(Value::Null))
    }

    /// URL of the active tab.
    pub async fn current_url(&self) -> Result<String, BrowserError> {
        let value = self.evaluate("window.location.href").await?;
        Ok(value.as_str().unwrap_or("about:blank").to_string())
    }

    /// Click the first element matching a CSS selector.
    pub async fn click(&self, selector: &str) -> Result<(), BrowserError> {
        let quoted = js_string(selector);
        let expression = format!(
            "(() => {{ const el = document.querySelector({quoted}); \
             if (!el) return false; el.click(); return true; }})()"
        );
        match self.evaluate(&expression).await?.as_bool() {
            Some(true) => Ok(()),
            _ => Err(BrowserError::ElementNotFound {
                selector: selector.to_string(),
            }),
        }
    }

    /// Replace the value of the first element matching a CSS selector,
    /// firing input/change events so framework listeners see the text.
    pub async fn type_text(&self, selector: &str, text: &str) -> Result<(), BrowserError> {
        let quoted_selector = js_string(selector);
        let quoted_text = js_string(text);
        let expression = format!(
            "(() => {{ const el = document.querySelector({quoted_selector}); \
             if (!el) return false; el.focus(); el.value = {quoted_text}; \
             el.dispatchEvent(new Event('input', {{bubbles: true}})); \
             el.dispatchEvent(new Event('change', {{bubbles: true}})); \
             return true; }})()"
        );
        match self.evaluate(&expression).await?.as_bool() {
            Some(true) => Ok(()),
            _ => Err(BrowserError::ElementNotFound {
                selector: selector.to_string(),
            }),
        }
    }

    /// Title, URL, and a bounded excerpt of the active tab's HTML.
    pub async fn page_content(&self) -> Result<PageContent, BrowserError> {
        let value = self
            .evaluate(
                "({title: document.title, url: window.location.href, \
                  html: document.documentElement.outerHTML})",
            )
            .await?;

        let mut content = value
            .get("html")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        content.truncate(CONTENT_LIMIT);

        Ok(PageContent {
            title: value
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            url: value
                .get("url")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            content,
        })
    }

    /// Run a web search and scrape the top results.
    pub async fn search(&mut self, query: &str) -> Result<Vec<SearchResult>, BrowserError> {
        let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
        self.navigate(&format!("{SEARCH_URL}{encoded}")).await?;

        let expression = format!(
            "Array.from(document.querySelectorAll('a.result__a')) \
             .slice(0, {SEARCH_RESULT_LIMIT}) \
             .map(a => ({{title: a.textContent.trim(), url: a.href}}))"
        );
        let value = self.evaluate(&expression).await?;

        let results = value
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        Some(SearchResult {
                            title: item.get("title")?.as_str()?.to_string(),
                            url: item.get("url")?.as_str()?.to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(results)
    }

    /// Open a new tab, make it active, and return the open-tab count.
    pub async fn new_tab(&mut self, url: Option<&str>) -> Result<usize, BrowserError> {
        let url = url.unwrap_or("about:blank");
        let target = self.devtools.create_target(url).await?;
        let tab = attach(target.id.clone(), target.ws_url.as_deref()).await?;
        self.tabs.push(tab);
        self.active = self.tabs.len() - 1;
        if url != "about:blank" {
            self.wait_loaded().await?;
        }
        Ok(self.tabs.len())
    }

    /// Close a tab by index (or the active tab), returning how many remain.
    pub async fn close_tab(&mut self, index: Option<usize>) -> Result<usize, BrowserError> {
        let index = index.unwrap_or(self.active);
        if index >= self.tabs.len() {
            return Err(BrowserError::NoTab);
        }

        let tab = self.tabs.remove(index);
        self.devtools.close_target(&tab.target_id).await?;
        self.active = 0;
        Ok(self.tabs.len())
    }

    /// Tear the session down: drop all connections, kill the process.
    pub async fn close(&mut self) {
        self.tabs.clear();
        if let Err(e) = self.child.kill().await {
            tracing::warn!(error = %e, "failed to kill browser process");
        }
    }
}

/// Attach a CDP connection to a target and enable its domains.
async fn attach(target_id: String, ws_url: Option<&str>) -> Result<Tab, BrowserError> {
    let ws_url = ws_url.ok_or_else(|| BrowserError::ConnectionFailed {
        endpoint: target_id.clone(),
        reason: "target has no webSocketDebuggerUrl (another client attached?)".to_string(),
    })?;

    let conn = CdpConnection::connect(ws_url).await?;
    conn.enable_domains().await?;
    Ok(Tab { target_id, conn })
}

/// Quote a string as a JavaScript literal.
fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}
