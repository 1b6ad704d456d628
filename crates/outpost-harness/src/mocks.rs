//! Mock implementations of the transport and handler contracts.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value};

use outpost_transport::{CommandTransport, TransportError};
use outpost_types::{CapabilityHandler, Command, CommandId, CommandResult, HandlerOutcome};

// ---------------------------------------------------------------------------
// MockTransport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum FetchScript {
    Batch(Vec<Command>),
    Fail,
}

#[derive(Default)]
struct MockTransportInner {
    probes: VecDeque<bool>,
    fetches: VecDeque<FetchScript>,
    failing_submits: usize,
    submitted: Vec<(CommandId, CommandResult)>,
    fetch_count: usize,
    probe_count: usize,
}

/// A scriptable remote boundary.
///
/// Unscripted probes succeed and unscripted fetches return an empty batch,
/// so a test only scripts the interesting steps. Clones share state, so
/// keep one handle for assertions after moving another into the poller.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a batch for the next unscripted fetch.
    pub fn push_batch(&self, commands: Vec<Command>) {
        self.inner
            .lock()
            .expect("mock transport lock poisoned")
            .fetches
            .push_back(FetchScript::Batch(commands));
    }

    /// Queue a fetch failure.
    pub fn push_fetch_failure(&self) {
        self.inner
            .lock()
            .expect("mock transport lock poisoned")
            .fetches
            .push_back(FetchScript::Fail);
    }

    /// Queue a probe outcome.
    pub fn push_probe(&self, ok: bool) {
        self.inner
            .lock()
            .expect("mock transport lock poisoned")
            .probes
            .push_back(ok);
    }

    /// Make the next `count` submissions fail.
    pub fn fail_submits(&self, count: usize) {
        self.inner
            .lock()
            .expect("mock transport lock poisoned")
            .failing_submits = count;
    }

    /// All successfully submitted results, in submission order.
    pub fn submitted(&self) -> Vec<(CommandId, CommandResult)> {
        self.inner
            .lock()
            .expect("mock transport lock poisoned")
            .submitted
            .clone()
    }

    /// Ids of submitted results, in submission order.
    pub fn submitted_ids(&self) -> Vec<String> {
        self.submitted()
            .iter()
            .map(|(id, _)| id.to_string())
            .collect()
    }

    /// How many fetches have happened.
    pub fn fetch_count(&self) -> usize {
        self.inner
            .lock()
            .expect("mock transport lock poisoned")
            .fetch_count
    }

    /// How many probes have happened.
    pub fn probe_count(&self) -> usize {
        self.inner
            .lock()
            .expect("mock transport lock poisoned")
            .probe_count
    }
}

#[async_trait]
impl CommandTransport for MockTransport {
    async fn probe(&self) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().expect("mock transport lock poisoned");
        inner.probe_count += 1;
        match inner.probes.pop_front() {
            Some(true) | None => Ok(()),
            Some(false) => Err(TransportError::Status(503)),
        }
    }

    async fn fetch_pending(&self) -> Result<Vec<Command>, TransportError> {
        let mut inner = self.inner.lock().expect("mock transport lock poisoned");
        inner.fetch_count += 1;
        match inner.fetches.pop_front() {
            Some(FetchScript::Batch(batch)) => Ok(batch),
            Some(FetchScript::Fail) => Err(TransportError::Status(502)),
            None => Ok(Vec::new()),
        }
    }

    async fn submit_result(
        &self,
        id: &CommandId,
        result: &CommandResult,
    ) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().expect("mock transport lock poisoned");
        if inner.failing_submits > 0 {
            inner.failing_submits -= 1;
            return Err(TransportError::Status(500));
        }
        inner.submitted.push((id.clone(), result.clone()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RecordingHandler
// ---------------------------------------------------------------------------

#[derive(Default)]
struct RecordingHandlerInner {
    calls: Vec<(String, Map<String, Value>)>,
    outcomes: VecDeque<HandlerOutcome>,
}

/// A capability handler that records invocations and answers from a
/// scripted queue (defaulting to success).
#[derive(Clone, Default)]
pub struct RecordingHandler {
    inner: Arc<Mutex<RecordingHandlerInner>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the outcome for the next invocation.
    pub fn push_outcome(&self, outcome: HandlerOutcome) {
        self.inner
            .lock()
            .expect("recording handler lock poisoned")
            .outcomes
            .push_back(outcome);
    }

    /// Every `(method, params)` invocation, in order.
    pub fn calls(&self) -> Vec<(String, Map<String, Value>)> {
        self.inner
            .lock()
            .expect("recording handler lock poisoned")
            .calls
            .clone()
    }

    /// Invocation count.
    pub fn call_count(&self) -> usize {
        self.inner
            .lock()
            .expect("recording handler lock poisoned")
            .calls
            .len()
    }
}

#[async_trait]
impl CapabilityHandler for RecordingHandler {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn execute(&mut self, method: &str, params: &Map<String, Value>) -> HandlerOutcome {
        let mut inner = self.inner.lock().expect("recording handler lock poisoned");
        inner.calls.push((method.to_string(), params.clone()));
        inner
            .outcomes
            .pop_front()
            .unwrap_or_else(|| HandlerOutcome::ok(format!("{method} ok")))
    }
}
