//! Run controller
//!
//! Owns the lifecycle of one experiment run: opens the transport, drives
//! its chunks through decode → parse → classify → reduce strictly in
//! arrival order, and publishes an immutable [`RunState`] snapshot after
//! every applied event. At most one run is active per controller; starting
//! another while one is live is rejected synchronously.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use super::EngineConfig;
use super::decode::LineDecoder;
use super::diag::{Diagnostic, DiagnosticSink, TracingSink};
use super::error::{EngineError, Result};
use super::event::events_from_line;
use super::state::{RunState, RunStatus};
use super::transport::{HttpTransport, RunMode, RunParams, RunRequest, Transport};

/// Stable identifier for one run instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    /// Mint a fresh run id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a run's lifecycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The stream was consumed (or cancelled) without transport failure
    Ok,
    /// A transport-level failure ended the run
    Error,
}

/// Lifecycle phase of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// No run has been started
    Idle,
    /// A run was accepted; the transport is being opened
    Starting,
    /// Chunks are being consumed
    Active,
    /// The run ended; a new one may be started
    Terminated(Termination),
}

struct Shared {
    phase: Mutex<RunPhase>,
    state: RwLock<Arc<RunState>>,
    task: Mutex<Option<JoinHandle<()>>>,
    run_id: Mutex<Option<RunId>>,
}

impl Shared {
    fn new() -> Self {
        Self {
            phase: Mutex::new(RunPhase::Idle),
            state: RwLock::new(Arc::new(RunState::new())),
            task: Mutex::new(None),
            run_id: Mutex::new(None),
        }
    }

    fn set_phase(&self, phase: RunPhase) {
        *self.phase.lock() = phase;
    }

    /// Fold one decoded line into the state, one snapshot per event
    fn apply_line(&self, line: &str, sink: &dyn DiagnosticSink) {
        for event in events_from_line(line, sink) {
            let mut slot = self.state.write();
            let state = take_state(&mut slot);
            *slot = Arc::new(state.apply(event, sink));
        }
    }

    /// Freeze the run as failed with the given message
    fn freeze_failed(&self, message: String, termination: Termination) {
        {
            let mut slot = self.state.write();
            let mut state = take_state(&mut slot);
            state.status = RunStatus::Failed;
            state.error = Some(message);
            *slot = Arc::new(state);
        }
        self.set_phase(RunPhase::Terminated(termination));
    }
}

/// Reclaim the state from its snapshot slot without cloning when possible
///
/// Snapshots handed to consumers keep their own reference; only then is a
/// copy taken.
fn take_state(slot: &mut Arc<RunState>) -> RunState {
    match Arc::try_unwrap(std::mem::take(slot)) {
        Ok(state) => state,
        Err(shared) => (*shared).clone(),
    }
}

/// Controller for one experiment run at a time
pub struct RunController {
    transport: Arc<dyn Transport>,
    sink: Arc<dyn DiagnosticSink>,
    shared: Arc<Shared>,
}

impl RunController {
    /// Controller talking HTTP to the configured backend
    pub fn new(config: EngineConfig) -> Self {
        Self::with_transport(
            Arc::new(HttpTransport::new(config.base_url)),
            Arc::new(TracingSink),
        )
    }

    /// Controller over an arbitrary transport and diagnostic sink
    pub fn with_transport(transport: Arc<dyn Transport>, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            transport,
            sink,
            shared: Arc::new(Shared::new()),
        }
    }

    /// Start a run, spawning the stream-driving task
    ///
    /// Rejected with [`EngineError::AlreadyActive`] while a run is live;
    /// the rejection changes no state. A terminated controller may start a
    /// fresh run, which resets the published state.
    pub fn start(&self, mode: RunMode, params: RunParams) -> Result<RunId> {
        {
            let mut phase = self.shared.phase.lock();
            if matches!(*phase, RunPhase::Starting | RunPhase::Active) {
                return Err(EngineError::AlreadyActive);
            }
            *phase = RunPhase::Starting;
        }

        let run_id = RunId::new();
        *self.shared.run_id.lock() = Some(run_id);
        *self.shared.state.write() = Arc::new(RunState::started());

        info!(%run_id, %mode, "starting experiment run");

        let shared = Arc::clone(&self.shared);
        let transport = Arc::clone(&self.transport);
        let sink = Arc::clone(&self.sink);
        let request = RunRequest { mode, params };

        let handle = tokio::spawn(async move {
            drive(shared, transport, sink, request, run_id).await;
        });
        *self.shared.task.lock() = Some(handle);

        Ok(run_id)
    }

    /// Cancel the active run, if any
    ///
    /// Best-effort: an in-flight read may complete and is discarded. Once
    /// the cancellation is acknowledged the run is frozen (status `failed`
    /// unless already terminal) and no further state mutation occurs.
    /// Stopping an idle or already-terminated controller is a no-op.
    pub async fn stop(&self) {
        let handle = self.shared.task.lock().take();
        let Some(handle) = handle else {
            return;
        };

        handle.abort();
        let _ = handle.await;

        let phase = self.phase();
        if !matches!(phase, RunPhase::Terminated(_)) && phase != RunPhase::Idle {
            info!("run stopped before completion");
            self.shared.freeze_failed(
                "run stopped before completion".to_string(),
                Termination::Ok,
            );
        }
    }

    /// Wait for the active run's driving task to finish
    pub async fn wait(&self) {
        let handle = self.shared.task.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> RunPhase {
        *self.shared.phase.lock()
    }

    /// Immutable snapshot of the current run state
    ///
    /// Each applied event produces a new version; snapshots are never
    /// mutated in place.
    pub fn state(&self) -> Arc<RunState> {
        self.shared.state.read().clone()
    }

    /// Identifier of the current (or last) run
    pub fn run_id(&self) -> Option<RunId> {
        *self.shared.run_id.lock()
    }

    /// Failure message from a transport or truncation failure, if any
    pub fn error(&self) -> Option<String> {
        self.state().error.clone()
    }
}

/// Sequential drive loop: the transport read is the only suspension point
async fn drive(
    shared: Arc<Shared>,
    transport: Arc<dyn Transport>,
    sink: Arc<dyn DiagnosticSink>,
    request: RunRequest,
    run_id: RunId,
) {
    let started = Utc::now();

    let mut chunks = match transport.open(request).await {
        Ok(chunks) => chunks,
        Err(err) => {
            warn!(%run_id, error = %err, "failed to open experiment stream");
            shared.freeze_failed(err.to_string(), Termination::Error);
            return;
        }
    };

    shared.set_phase(RunPhase::Active);

    let mut decoder = LineDecoder::new();
    while let Some(chunk) = chunks.next().await {
        match chunk {
            Ok(bytes) => {
                for line in decoder.push(&bytes) {
                    shared.apply_line(&line, sink.as_ref());
                }
            }
            Err(err) => {
                warn!(%run_id, error = %err, "transport failed mid-stream");
                shared.freeze_failed(err.to_string(), Termination::Error);
                return;
            }
        }
    }

    if let Some(leftover) = decoder.finish() {
        sink.report(Diagnostic::TruncatedFinalRecord {
            content: leftover.clone(),
        });
        shared.apply_line(&leftover, sink.as_ref());
    }

    finalize_natural_end(&shared);
    info!(
        %run_id,
        elapsed_ms = (Utc::now() - started).num_milliseconds(),
        "experiment stream ended"
    );
}

/// The stream ended on its own: terminal status comes from the summary
/// record if one was applied; otherwise the run is incomplete and fails
fn finalize_natural_end(shared: &Shared) {
    {
        let mut slot = shared.state.write();
        if !slot.is_terminal() {
            let mut state = take_state(&mut slot);
            state.status = RunStatus::Failed;
            state.error = Some("stream ended before a summary record".to_string());
            *slot = Arc::new(state);
        }
    }
    shared.set_phase(RunPhase::Terminated(Termination::Ok));
}
