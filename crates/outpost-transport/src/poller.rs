//! The transport poller state machine.
//!
//! A single logical worker drives the fetch → execute → report cycle:
//! commands execute strictly in arrival order, and results are reported in
//! that same order before the next fetch. Transport failures never surface
//! as command results; they move the machine through
//! `Connected → Degraded → Offline` with bounded exponential backoff.
//!
//! Delivery guarantees while the process is alive:
//! - at most one execution per command id, even under remote re-delivery;
//! - every executed command's result is eventually reported exactly once
//!   (the outbox retains results across degraded periods);
//! - a shutdown signal lets the in-flight command finish before exiting.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use outpost_types::{Command, CommandExecutor, CommandId, CommandResult, OutpostConfig};

use crate::backoff::Backoff;
use crate::client::CommandTransport;

/// How many completed command ids to remember for duplicate suppression.
const COMPLETED_CAPACITY: usize = 1024;

/// Connectivity states of the poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    /// Probing the remote boundary before the first cycle.
    Connecting,
    /// Polling and executing on the configured interval.
    Connected,
    /// A fetch or report failed; retrying with backoff.
    Degraded,
    /// The boundary has been unreachable past the failure threshold.
    Offline,
    /// Terminal: finish in-flight work and exit.
    ShuttingDown,
}

impl std::fmt::Display for PollerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PollerState::Connecting => "connecting",
            PollerState::Connected => "connected",
            PollerState::Degraded => "degraded",
            PollerState::Offline => "offline",
            PollerState::ShuttingDown => "shutting down",
        };
        f.write_str(s)
    }
}

/// Tunables for the poller.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Interval between fetches while connected.
    pub poll_interval: Duration,
    /// Probe attempts before giving up on the initial connect.
    pub connect_attempts: u32,
    /// Consecutive failures before Degraded becomes Offline.
    pub degraded_threshold: u32,
    /// Initial retry backoff.
    pub backoff_initial: Duration,
    /// Backoff cap.
    pub backoff_max: Duration,
    /// Re-probe interval while offline.
    pub offline_probe_interval: Duration,
    /// Whether losing connectivity keeps the agent alive (local commands,
    /// periodic re-probes) or halts it.
    pub offline_mode: bool,
}

impl PollerConfig {
    /// Derive poller tunables from the agent configuration.
    pub fn from_config(config: &OutpostConfig) -> Self {
        Self {
            poll_interval: Duration::from_secs(config.agent.poll_interval_secs),
            connect_attempts: config.transport.connect_attempts,
            degraded_threshold: config.transport.degraded_threshold,
            backoff_initial: Duration::from_millis(config.transport.backoff_initial_ms),
            backoff_max: Duration::from_secs(config.transport.backoff_max_secs),
            offline_probe_interval: Duration::from_secs(config.transport.offline_probe_secs),
            offline_mode: config.agent.offline_mode,
        }
    }
}

/// Bounded set of completed command ids for duplicate suppression.
#[derive(Debug, Default)]
struct CompletedIds {
    order: VecDeque<CommandId>,
    set: HashSet<CommandId>,
}

impl CompletedIds {
    fn contains(&self, id: &CommandId) -> bool {
        self.set.contains(id)
    }

    fn insert(&mut self, id: CommandId) {
        if self.set.insert(id.clone()) {
            self.order.push_back(id);
            if self.order.len() > COMPLETED_CAPACITY {
                if let Some(oldest) = self.order.pop_front() {
                    self.set.remove(&oldest);
                }
            }
        }
    }
}

/// The polling worker. Owns the transport session state exclusively.
pub struct Poller<T: CommandTransport, E: CommandExecutor> {
    transport: T,
    executor: E,
    config: PollerConfig,
    state: PollerState,
    consecutive_failures: u32,
    backoff: Backoff,
    /// Results awaiting submission, oldest first. Retained across degraded
    /// periods so every executed command reports exactly once.
    outbox: VecDeque<(CommandId, CommandResult)>,
    completed: CompletedIds,
    /// Locally-sourced commands, drained while offline.
    local_rx: Option<mpsc::Receiver<Command>>,
    shutdown: watch::Receiver<bool>,
}

impl<T: CommandTransport, E: CommandExecutor> Poller<T, E> {
    /// Create a poller in the `Connecting` state.
    pub fn new(
        transport: T,
        executor: E,
        config: PollerConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let backoff = Backoff::new(config.backoff_initial, config.backoff_max);
        Self {
            transport,
            executor,
            config,
            state: PollerState::Connecting,
            consecutive_failures: 0,
            backoff,
            outbox: VecDeque::new(),
            completed: CompletedIds::default(),
            local_rx: None,
            shutdown,
        }
    }

    /// Attach a channel of locally-sourced commands.
    pub fn with_local_commands(mut self, rx: mpsc::Receiver<Command>) -> Self {
        self.local_rx = Some(rx);
        self
    }

    /// Current connectivity state.
    pub fn state(&self) -> PollerState {
        self.state
    }

    /// Drive the state machine until shutdown (or a halt when offline mode
    /// is disabled), then release handler resources.
    pub async fn run(mut self) {
        tracing::info!("transport poller starting");
        loop {
            if *self.shutdown.borrow() {
                self.state = PollerState::ShuttingDown;
            }

            match self.state {
                PollerState::Connecting => self.connect().await,
                PollerState::Connected => {
                    self.cycle().await;
                    if self.state == PollerState::Connected {
                        self.idle(self.config.poll_interval).await;
                    }
                }
                PollerState::Degraded => {
                    let delay = self.backoff.next_delay();
                    tracing::info!(
                        delay_ms = delay.as_millis() as u64,
                        failures = self.consecutive_failures,
                        "transport degraded, backing off"
                    );
                    self.idle(delay).await;
                    if !*self.shutdown.borrow() {
                        self.retry().await;
                    }
                }
                PollerState::Offline => {
                    if !self.config.offline_mode {
                        tracing::error!(
                            "remote boundary unreachable and offline mode disabled, halting"
                        );
                        self.state = PollerState::ShuttingDown;
                        continue;
                    }
                    self.drain_local().await;
                    self.idle(self.config.offline_probe_interval).await;
                    if !*self.shutdown.borrow() && self.transport.probe().await.is_ok() {
                        tracing::info!("connectivity restored, reconnecting");
                        self.state = PollerState::Connecting;
                    }
                }
                PollerState::ShuttingDown => break,
            }
        }

        self.executor.shutdown().await;
        tracing::info!("transport poller stopped");
    }

    /// Initial connect: probe up to the configured attempt count.
    async fn connect(&mut self) {
        for attempt in 1..=self.config.connect_attempts.max(1) {
            if *self.shutdown.borrow() {
                self.state = PollerState::ShuttingDown;
                return;
            }
            match self.transport.probe().await {
                Ok(()) => {
                    tracing::info!(attempt, "connected to remote boundary");
                    self.mark_healthy();
                    return;
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "connectivity probe failed");
                    if attempt < self.config.connect_attempts.max(1) {
                        let delay = self.backoff.next_delay();
                        self.idle(delay).await;
                    }
                }
            }
        }

        if self.config.offline_mode {
            tracing::warn!("could not connect, entering offline mode");
            self.state = PollerState::Offline;
        } else {
            tracing::error!("could not connect and offline mode disabled, halting");
            self.state = PollerState::ShuttingDown;
        }
    }

    /// One connected cycle: report any retained results, fetch the pending
    /// batch, execute it in arrival order, report.
    async fn cycle(&mut self) {
        if !self.flush_outbox().await {
            self.degrade();
            return;
        }

        let batch = match self.transport.fetch_pending().await {
            Ok(batch) => batch,
            Err(e) => {
                tracing::warn!(error = %e, "fetch failed");
                self.degrade();
                return;
            }
        };

        // The whole retrieved batch executes even if reporting later
        // degrades; results wait in the outbox.
        for command in &batch {
            if *self.shutdown.borrow() {
                break;
            }
            self.execute_one(command).await;
        }

        if !self.flush_outbox().await {
            self.degrade();
        }
    }

    /// Execute a single command unless its id already completed.
    async fn execute_one(&mut self, command: &Command) {
        if self.completed.contains(&command.id) {
            tracing::warn!(command = %command.id, "duplicate delivery ignored");
            return;
        }

        let result = self.executor.execute(command).await;
        self.completed.insert(command.id.clone());
        self.outbox.push_back((command.id.clone(), result));
    }

    /// Submit retained results oldest-first. Stops at the first failure so
    /// report order always matches execution order.
    async fn flush_outbox(&mut self) -> bool {
        while let Some((id, result)) = self.outbox.front() {
            match self.transport.submit_result(id, result).await {
                Ok(()) => {
                    self.outbox.pop_front();
                }
                Err(e) => {
                    tracing::warn!(command = %id, error = %e, "result submission failed");
                    return false;
                }
            }
        }
        true
    }

    /// Degraded retry: a successful probe restores the connected cycle.
    async fn retry(&mut self) {
        match self.transport.probe().await {
            Ok(()) => {
                tracing::info!("transport recovered");
                self.mark_healthy();
            }
            Err(e) => {
                tracing::warn!(error = %e, "retry probe failed");
                self.degrade();
            }
        }
    }

    /// Record a transport failure and pick the next state.
    fn degrade(&mut self) {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.config.degraded_threshold {
            tracing::warn!(
                failures = self.consecutive_failures,
                "failure threshold reached, going offline"
            );
            self.state = PollerState::Offline;
        } else {
            self.state = PollerState::Degraded;
        }
    }

    /// Reset failure tracking after any successful transport operation.
    fn mark_healthy(&mut self) {
        self.state = PollerState::Connected;
        self.consecutive_failures = 0;
        self.backoff.reset();
    }

    /// Execute any locally-sourced commands. Their results queue in the
    /// outbox and are reported when connectivity returns.
    async fn drain_local(&mut self) {
        let Some(rx) = self.local_rx.as_mut() else {
            return;
        };
        let mut drained = Vec::new();
        while let Ok(command) = rx.try_recv() {
            drained.push(command);
        }
        for command in &drained {
            tracing::info!(command = %command.id, "executing locally-sourced command");
            self.execute_one(command).await;
        }
    }

    /// Sleep that wakes early on shutdown.
    async fn idle(&mut self, duration: Duration) {
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = self.shutdown.changed() => {}
        }
    }
}
