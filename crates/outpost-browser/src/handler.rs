//! The browser capability handler.
//!
//! Owns zero-or-one live session, created lazily by the first command that
//! needs one and reused until `close_session` or shutdown. `close_tab` is
//! the one action that semantically requires an existing session: with
//! none open it fails instead of launching a browser just to close a tab.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use outpost_types::{
    BrowserConfig, CapabilityHandler, HandlerOutcome, OutpostError, SessionLifecycle,
};

use crate::error::BrowserError;
use crate::session::{BrowserSession, DEFAULT_START_URL};

/// Title, URL, and content excerpt of a page.
#[derive(Debug, Clone)]
pub struct PageContent {
    pub title: String,
    pub url: String,
    pub content: String,
}

/// One scraped search result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
}

/// The session surface the handler drives. [`BrowserSession`] is the real
/// implementation; tests substitute a fake.
#[async_trait]
pub trait Browser: Send + Sync {
    async fn navigate(&mut self, url: &str) -> Result<String, BrowserError>;
    async fn search(&mut self, query: &str) -> Result<Vec<SearchResult>, BrowserError>;
    async fn click(&mut self, selector: &str) -> Result<(), BrowserError>;
    async fn type_text(&mut self, selector: &str, text: &str) -> Result<(), BrowserError>;
    async fn page_content(&mut self) -> Result<PageContent, BrowserError>;
    async fn new_tab(&mut self, url: Option<&str>) -> Result<usize, BrowserError>;
    async fn close_tab(&mut self, index: Option<usize>) -> Result<usize, BrowserError>;
    async fn current_url(&mut self) -> Result<String, BrowserError>;
    async fn close(&mut self);
}

#[async_trait]
impl Browser for BrowserSession {
    async fn navigate(&mut self, url: &str) -> Result<String, BrowserError> {
        BrowserSession::navigate(self, url).await
    }

    async fn search(&mut self, query: &str) -> Result<Vec<SearchResult>, BrowserError> {
        BrowserSession::search(self, query).await
    }

    async fn click(&mut self, selector: &str) -> Result<(), BrowserError> {
        BrowserSession::click(self, selector).await
    }

    async fn type_text(&mut self, selector: &str, text: &str) -> Result<(), BrowserError> {
        BrowserSession::type_text(self, selector, text).await
    }

    async fn page_content(&mut self) -> Result<PageContent, BrowserError> {
        BrowserSession::page_content(self).await
    }

    async fn new_tab(&mut self, url: Option<&str>) -> Result<usize, BrowserError> {
        BrowserSession::new_tab(self, url).await
    }

    async fn close_tab(&mut self, index: Option<usize>) -> Result<usize, BrowserError> {
        BrowserSession::close_tab(self, index).await
    }

    async fn current_url(&mut self) -> Result<String, BrowserError> {
        BrowserSession::current_url(self).await
    }

    async fn close(&mut self) {
        BrowserSession::close(self).await;
    }
}

/// Factory for opening a session. The seam that makes the handler testable
/// without a real browser.
#[async_trait]
pub trait BrowserBackend: Send + Sync {
    async fn open(&self) -> Result<Box<dyn Browser>, BrowserError>;
}

/// Launches a real Chrome/Chromium via the DevTools protocol.
pub struct CdpBackend {
    config: BrowserConfig,
}

#[async_trait]
impl BrowserBackend for CdpBackend {
    async fn open(&self) -> Result<Box<dyn Browser>, BrowserError> {
        let session = BrowserSession::open(&self.config).await?;
        Ok(Box::new(session))
    }
}

/// Handles the `browser` capability domain.
pub struct BrowserHandler {
    backend: Box<dyn BrowserBackend>,
    session: Option<Box<dyn Browser>>,
}

impl BrowserHandler {
    /// Handler backed by a real browser launch.
    pub fn new(config: BrowserConfig) -> Self {
        Self::with_backend(Box::new(CdpBackend { config }))
    }

    /// Handler with an injected backend (tests).
    pub fn with_backend(backend: Box<dyn BrowserBackend>) -> Self {
        Self {
            backend,
            session: None,
        }
    }

    /// Get the live session, opening one if needed.
    async fn session(&mut self) -> Result<&mut Box<dyn Browser>, OutpostError> {
        self.ensure_session().await?;
        self.session
            .as_mut()
            .ok_or_else(|| OutpostError::Session("session closed during command".to_string()))
    }

    async fn open_browser(&mut self, url: Option<&str>) -> HandlerOutcome {
        let target = url.unwrap_or(DEFAULT_START_URL);
        let session = match self.session().await {
            Ok(session) => session,
            Err(e) => return HandlerOutcome::err(e.to_string()),
        };
        match session.navigate(target).await {
            Ok(final_url) => {
                HandlerOutcome::ok_with("browser opened", json!({"url": final_url}))
            }
            Err(e) => HandlerOutcome::err(e.to_string()),
        }
    }

    async fn new_tab(&mut self, url: Option<&str>) -> HandlerOutcome {
        let session = match self.session().await {
            Ok(session) => session,
            Err(e) => return HandlerOutcome::err(e.to_string()),
        };
        match session.new_tab(url).await {
            Ok(count) => HandlerOutcome::ok_with(
                "new tab opened",
                json!({"url": url.unwrap_or("about:blank"), "open_tabs": count}),
            ),
            Err(e) => HandlerOutcome::err(e.to_string()),
        }
    }

    async fn close_tab(&mut self, index: Option<usize>) -> HandlerOutcome {
        // Requires an existing session: closing a tab in a browser that is
        // not running is a semantic error, not a reason to launch one.
        let Some(session) = self.session.as_mut() else {
            return HandlerOutcome::err("no browser session open");
        };
        match session.close_tab(index).await {
            Ok(remaining) => {
                HandlerOutcome::ok_with("tab closed", json!({"open_tabs": remaining}))
            }
            Err(e) => HandlerOutcome::err(e.to_string()),
        }
    }

    async fn search_web(&mut self, query: &str) -> HandlerOutcome {
        let session = match self.session().await {
            Ok(session) => session,
            Err(e) => return HandlerOutcome::err(e.to_string()),
        };
        match session.search(query).await {
            Ok(results) => {
                let url = session.current_url().await.unwrap_or_default();
                let results: Vec<Value> = results
                    .iter()
                    .map(|r| json!({"title": r.title, "url": r.url}))
                    .collect();
                HandlerOutcome::ok_with(
                    format!("searched for '{query}'"),
                    json!({"query": query, "results": results, "url": url}),
                )
            }
            Err(e) => HandlerOutcome::err(e.to_string()),
        }
    }

    async fn click_element(&mut self, selector: &str) -> HandlerOutcome {
        let session = match self.session().await {
            Ok(session) => session,
            Err(e) => return HandlerOutcome::err(e.to_string()),
        };
        match session.click(selector).await {
            Ok(()) => HandlerOutcome::ok(format!("clicked element: {selector}")),
            Err(e) => HandlerOutcome::err(e.to_string()),
        }
    }

    async fn type_text(&mut self, selector: &str, text: &str) -> HandlerOutcome {
        let session = match self.session().await {
            Ok(session) => session,
            Err(e) => return HandlerOutcome::err(e.to_string()),
        };
        match session.type_text(selector, text).await {
            Ok(()) => HandlerOutcome::ok(format!("typed text into: {selector}")),
            Err(e) => HandlerOutcome::err(e.to_string()),
        }
    }

    async fn get_page_content(&mut self) -> HandlerOutcome {
        let session = match self.session().await {
            Ok(session) => session,
            Err(e) => return HandlerOutcome::err(e.to_string()),
        };
        match session.page_content().await {
            Ok(page) => HandlerOutcome::ok_with(
                "page content captured",
                json!({"title": page.title, "url": page.url, "content": page.content}),
            ),
            Err(e) => HandlerOutcome::err(e.to_string()),
        }
    }
}

#[async_trait]
impl SessionLifecycle for BrowserHandler {
    async fn ensure_session(&mut self) -> Result<(), OutpostError> {
        if self.session.is_some() {
            return Ok(());
        }
        tracing::info!("opening browser session");
        let session = self
            .backend
            .open()
            .await
            .map_err(|e| OutpostError::Session(e.to_string()))?;
        self.session = Some(session);
        Ok(())
    }

    async fn close_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            tracing::info!("closing browser session");
            session.close().await;
        }
    }

    fn has_session(&self) -> bool {
        self.session.is_some()
    }
}

fn str_param<'a>(params: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    params.get(key).and_then(Value::as_str)
}

#[async_trait]
impl CapabilityHandler for BrowserHandler {
    fn name(&self) -> &'static str {
        "browser"
    }

    async fn execute(&mut self, method: &str, params: &Map<String, Value>) -> HandlerOutcome {
        match method {
            "open_browser" => self.open_browser(str_param(params, "url")).await,
            "new_tab" => self.new_tab(str_param(params, "url")).await,
            "close_tab" => {
                let index = params
                    .get("index")
                    .and_then(Value::as_u64)
                    .map(|i| i as usize);
                self.close_tab(index).await
            }
            "search_web" => match str_param(params, "query") {
                Some(query) => self.search_web(query).await,
                None => HandlerOutcome::err("missing parameter 'query'"),
            },
            "click_element" => match str_param(params, "selector") {
                Some(selector) => self.click_element(selector).await,
                None => HandlerOutcome::err("missing parameter 'selector'"),
            },
            "type_text" => {
                let (Some(selector), Some(text)) =
                    (str_param(params, "selector"), str_param(params, "text"))
                else {
                    return HandlerOutcome::err("missing parameter 'selector' or 'text'");
                };
                self.type_text(selector, text).await
            }
            "get_page_content" => self.get_page_content().await,
            other => HandlerOutcome::err(format!("browser handler has no method '{other}'")),
        }
    }

    async fn shutdown(&mut self) {
        self.close_session().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Fake session: records operations, keeps a tab count.
    struct FakeBrowser {
        log: Arc<Mutex<Vec<String>>>,
        tabs: usize,
        closed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Browser for FakeBrowser {
        async fn navigate(&mut self, url: &str) -> Result<String, BrowserError> {
            self.log.lock().unwrap().push(format!("navigate {url}"));
            Ok(url.to_string())
        }

        async fn search(&mut self, query: &str) -> Result<Vec<SearchResult>, BrowserError> {
            self.log.lock().unwrap().push(format!("search {query}"));
            Ok(vec![SearchResult {
                title: "Result".into(),
                url: "https://example.com".into(),
            }])
        }

        async fn click(&mut self, selector: &str) -> Result<(), BrowserError> {
            self.log.lock().unwrap().push(format!("click {selector}"));
            if selector == "#missing" {
                return Err(BrowserError::ElementNotFound {
                    selector: selector.to_string(),
                });
            }
            Ok(())
        }

        async fn type_text(&mut self, selector: &str, text: &str) -> Result<(), BrowserError> {
            self.log
                .lock()
                .unwrap()
                .push(format!("type {selector} {text}"));
            Ok(())
        }

        async fn page_content(&mut self) -> Result<PageContent, BrowserError> {
            Ok(PageContent {
                title: "Fake".into(),
                url: "about:blank".into(),
                content: "<html></html>".into(),
            })
        }

        async fn new_tab(&mut self, _url: Option<&str>) -> Result<usize, BrowserError> {
            self.tabs += 1;
            Ok(self.tabs)
        }

        async fn close_tab(&mut self, _index: Option<usize>) -> Result<usize, BrowserError> {
            if self.tabs == 0 {
                return Err(BrowserError::NoTab);
            }
            self.tabs -= 1;
            Ok(self.tabs)
        }

        async fn current_url(&mut self) -> Result<String, BrowserError> {
            Ok("https://duckduckgo.com".into())
        }

        async fn close(&mut self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Fake backend: counts how many sessions it opened.
    struct FakeBackend {
        opens: Arc<AtomicUsize>,
        log: Arc<Mutex<Vec<String>>>,
        closed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl BrowserBackend for FakeBackend {
        async fn open(&self) -> Result<Box<dyn Browser>, BrowserError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeBrowser {
                log: Arc::clone(&self.log),
                tabs: 1,
                closed: Arc::clone(&self.closed),
            }))
        }
    }

    fn handler() -> (BrowserHandler, Arc<AtomicUsize>, Arc<Mutex<Vec<String>>>, Arc<AtomicUsize>) {
        let opens = Arc::new(AtomicUsize::new(0));
        let log = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(AtomicUsize::new(0));
        let backend = FakeBackend {
            opens: Arc::clone(&opens),
            log: Arc::clone(&log),
            closed: Arc::clone(&closed),
        };
        (
            BrowserHandler::with_backend(Box::new(backend)),
            opens,
            log,
            closed,
        )
    }

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn open_browser_creates_session_lazily() {
        let (mut h, opens, log, _) = handler();
        assert!(!h.has_session());

        let outcome = h.execute("open_browser", &Map::new()).await;
        assert!(outcome.success, "{:?}", outcome.error);
        assert!(h.has_session());
        assert_eq!(opens.load(Ordering::SeqCst), 1);
        assert_eq!(
            log.lock().unwrap().as_slice(),
            &[format!("navigate {DEFAULT_START_URL}")]
        );
    }

    #[tokio::test]
    async fn ensure_session_is_idempotent() {
        let (mut h, opens, _, _) = handler();
        h.ensure_session().await.unwrap();
        h.ensure_session().await.unwrap();
        assert_eq!(opens.load(Ordering::SeqCst), 1);
        assert!(h.has_session());
    }

    #[tokio::test]
    async fn session_is_reused_across_commands() {
        let (mut h, opens, _, _) = handler();
        h.execute("open_browser", &params(json!({"url": "https://a.example"})))
            .await;
        h.execute("search_web", &params(json!({"query": "rust"})))
            .await;
        h.execute("get_page_content", &Map::new()).await;
        assert_eq!(opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn close_tab_without_session_fails_instead_of_launching() {
        let (mut h, opens, _, _) = handler();
        let outcome = h.execute("close_tab", &Map::new()).await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("no browser session"));
        assert_eq!(opens.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn search_returns_results_payload() {
        let (mut h, _, _, _) = handler();
        let outcome = h
            .execute("search_web", &params(json!({"query": "weather"})))
            .await;
        assert!(outcome.success);
        let data = outcome.data.unwrap();
        assert_eq!(data["query"], "weather");
        assert_eq!(data["results"][0]["url"], "https://example.com");
    }

    #[tokio::test]
    async fn click_missing_element_reports_failure() {
        let (mut h, _, _, _) = handler();
        let outcome = h
            .execute("click_element", &params(json!({"selector": "#missing"})))
            .await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("#missing"));
    }

    #[tokio::test]
    async fn close_session_then_next_command_reopens() {
        let (mut h, opens, _, closed) = handler();
        h.execute("open_browser", &Map::new()).await;
        h.close_session().await;
        assert!(!h.has_session());
        assert_eq!(closed.load(Ordering::SeqCst), 1);

        h.execute("open_browser", &Map::new()).await;
        assert_eq!(opens.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn shutdown_closes_the_session() {
        let (mut h, _, _, closed) = handler();
        h.execute("open_browser", &Map::new()).await;
        h.shutdown().await;
        assert!(!h.has_session());
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn type_text_requires_both_params() {
        let (mut h, _, _, _) = handler();
        let outcome = h
            .execute("type_text", &params(json!({"selector": "#q"})))
            .await;
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn new_tab_then_close_tab_tracks_count() {
        let (mut h, _, _, _) = handler();
        h.execute("open_browser", &Map::new()).await;
        let outcome = h.execute("new_tab", &Map::new()).await;
        assert!(outcome.success);
        assert_eq!(outcome.data.unwrap()["open_tabs"], 2);

        let outcome = h.execute("close_tab", &params(json!({"index": 0}))).await;
        assert!(outcome.success);
        assert_eq!(outcome.data.unwrap()["open_tabs"], 1);
    }
}
