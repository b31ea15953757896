//! Stream ingestion and state synthesis for live research runs
//!
//! The engine consumes one newline-delimited JSON stream per experiment
//! run and folds it into two consistent, incrementally updated views: a
//! flat chronological console log and a structured model of per-agent
//! notebooks plus the orchestration timeline. Pipeline, in order:
//!
//! 1. [`decode::LineDecoder`]: byte chunks to complete lines
//! 2. [`wire::parse_record`]: lines to wire records
//! 3. [`event::classify`]: wire records to domain events
//! 4. [`state::RunState::apply`]: pure fold into the synthesized state
//!
//! [`controller::RunController`] owns the lifecycle around the pipeline.

use serde::{Deserialize, Serialize};

// Submodules
pub mod controller;
pub mod decode;
pub mod diag;
pub mod error;
pub mod event;
pub mod state;
pub mod transport;
pub mod wire;

/// Configuration for the engine's production transport
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Base URL of the research backend
    pub base_url: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
        }
    }
}

// Re-export commonly used types
pub use controller::{RunController, RunId, RunPhase, Termination};
pub use decode::LineDecoder;
pub use diag::{Diagnostic, DiagnosticSink, MemorySink, TracingSink};
pub use error::{EngineError, Result, TransportError};
pub use event::{DomainEvent, MARKER, classify, events_from_line};
pub use state::{
    AgentState, AgentStatus, ChartSeries, ChartSpec, ChartType, ConsoleEntry, RunOutcome,
    RunState, RunStatus, Step, StepKind, TimelineItem,
};
pub use transport::{ChunkStream, HttpTransport, RunMode, RunParams, RunRequest, Transport};
pub use wire::{LineRecord, StreamKind, SummaryRecord, WireRecord, parse_record};
