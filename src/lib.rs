//! Labscope – live viewer engine for multi-agent research experiment runs
//!
//! This crate implements the stream-ingestion and state-synthesis core of a
//! research-run viewer:
//! - One long-lived, unidirectional byte stream per experiment run
//! - Newline-delimited JSON records decoded across arbitrary chunk boundaries
//! - A closed set of domain events folded into per-agent notebooks, an
//!   orchestration timeline, and a flat console log
//! - Recoverable anomalies reported on an advisory side channel; only
//!   transport failures are fatal to a run
//! - Idempotent, exactly-once lifecycle completion per run

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Engine modules implementing ingestion, classification, and synthesis
pub mod engine;

// Re-export key types for convenience
pub use engine::{EngineConfig, RunController};

/// Current version of the labscope engine
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
