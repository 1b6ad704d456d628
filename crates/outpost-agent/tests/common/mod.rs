//! Shared helpers for integration tests.
//!
//! Each integration test file compiles common/ as its own module, so not
//! every helper is used in every file.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use outpost_browser::{Browser, BrowserBackend, BrowserError, PageContent, SearchResult};
use outpost_engine::{DispatchTable, EngineConfig, ExecutionEngine, HandlerKind};
use outpost_harness::RecordingHandler;
use outpost_policy::SecurityPolicy;
use outpost_types::{CapabilityHandler, HandlerOutcome};

/// Engine with recording handlers on every domain and short time budgets.
pub fn test_engine(
    patterns: &[&str],
    require_confirmation: bool,
) -> (ExecutionEngine, RecordingHandler, RecordingHandler, RecordingHandler) {
    let policy = SecurityPolicy::new(
        patterns.iter().map(|p| p.to_string()),
        require_confirmation,
    );
    let mut engine = ExecutionEngine::new(policy, DispatchTable::standard(), test_budgets());

    let browser = RecordingHandler::new();
    let system = RecordingHandler::new();
    let files = RecordingHandler::new();
    engine.register_handler(HandlerKind::Browser, Box::new(browser.clone()));
    engine.register_handler(HandlerKind::System, Box::new(system.clone()));
    engine.register_handler(HandlerKind::Files, Box::new(files.clone()));

    (engine, browser, system, files)
}

/// Short time budgets so timeout paths run fast.
pub fn test_budgets() -> EngineConfig {
    EngineConfig {
        command_timeout: Duration::from_millis(100),
        confirmation_timeout: Duration::from_millis(100),
    }
}

/// Handler that sleeps before answering; for timeout and ordering tests.
pub struct SlowHandler {
    pub delay: Duration,
    pub calls: Arc<AtomicUsize>,
}

impl SlowHandler {
    pub fn new(delay: Duration) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                delay,
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }
}

#[async_trait]
impl CapabilityHandler for SlowHandler {
    fn name(&self) -> &'static str {
        "slow"
    }

    async fn execute(&mut self, method: &str, _params: &Map<String, Value>) -> HandlerOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        HandlerOutcome::ok(format!("{method} finished"))
    }
}

/// Minimal fake browser session for exercising the real browser handler
/// without launching Chrome.
pub struct StubBrowser {
    pub tabs: usize,
}

#[async_trait]
impl Browser for StubBrowser {
    async fn navigate(&mut self, url: &str) -> Result<String, BrowserError> {
        Ok(url.to_string())
    }

    async fn search(&mut self, _query: &str) -> Result<Vec<SearchResult>, BrowserError> {
        Ok(Vec::new())
    }

    async fn click(&mut self, _selector: &str) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn type_text(&mut self, _selector: &str, _text: &str) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn page_content(&mut self) -> Result<PageContent, BrowserError> {
        Ok(PageContent {
            title: String::new(),
            url: "about:blank".into(),
            content: String::new(),
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
        Ok("about:blank".into())
    }

    async fn close(&mut self) {}
}

/// Backend producing [`StubBrowser`] sessions, counting opens.
pub struct StubBackend {
    pub opens: Arc<AtomicUsize>,
}

impl StubBackend {
    pub fn new() -> (Self, Arc<AtomicUsize>) {
        let opens = Arc::new(AtomicUsize::new(0));
        (
            Self {
                opens: Arc::clone(&opens),
            },
            opens,
        )
    }
}

#[async_trait]
impl BrowserBackend for StubBackend {
    async fn open(&self) -> Result<Box<dyn Browser>, BrowserError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StubBrowser { tabs: 1 }))
    }
}
