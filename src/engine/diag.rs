//! Advisory diagnostics side channel
//!
//! Recoverable anomalies (malformed records, unknown markers, duplicate
//! step ids) never terminate a run and are never raised as errors. They are
//! reported through a [`DiagnosticSink`] so operators and tests can observe
//! them without coupling the pipeline to any particular logging backend.

use parking_lot::Mutex;

/// A recoverable anomaly observed while ingesting a stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A line failed structural validation and was dropped
    MalformedRecord {
        /// The offending line, verbatim
        line: String,
        /// Parser failure description
        reason: String,
    },

    /// A structured marker carried an unknown or unparseable payload
    ///
    /// The line still reaches the console view; only the structured
    /// interpretation is abandoned.
    UnknownMarker {
        /// The marker payload, verbatim
        payload: String,
        /// Decoder failure description
        reason: String,
    },

    /// A step id collided with an existing step on the same agent
    DuplicateStepId {
        /// Agent whose step log rejected the event
        agent_id: String,
        /// The colliding step id
        step_id: u64,
    },

    /// A summary record arrived after the run was already terminal
    SummaryAfterTermination,

    /// The stream ended with unterminated non-whitespace content
    ///
    /// The content is still parsed as an implicitly terminated final record.
    TruncatedFinalRecord {
        /// The unterminated trailing content
        content: String,
    },
}

/// Side channel receiving advisory diagnostics
pub trait DiagnosticSink: Send + Sync {
    /// Report one diagnostic. Must not panic or block.
    fn report(&self, diagnostic: Diagnostic);
}

/// Default sink forwarding diagnostics to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, diagnostic: Diagnostic) {
        match &diagnostic {
            Diagnostic::MalformedRecord { line, reason } => {
                tracing::warn!(reason = %reason, line = %line, "dropped malformed record");
            }
            Diagnostic::UnknownMarker { payload, reason } => {
                tracing::debug!(reason = %reason, payload = %payload, "unrecognized structured marker");
            }
            Diagnostic::DuplicateStepId { agent_id, step_id } => {
                tracing::warn!(agent_id = %agent_id, step_id = *step_id, "ignored duplicate step id");
            }
            Diagnostic::SummaryAfterTermination => {
                tracing::warn!("summary record after terminal status");
            }
            Diagnostic::TruncatedFinalRecord { content } => {
                tracing::warn!(len = content.len(), "stream ended mid-record");
            }
        }
    }
}

/// Collecting sink for tests and in-process inspection
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<Diagnostic>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all diagnostics reported so far
    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries.lock().clone()
    }

    /// Remove and return all diagnostics reported so far
    pub fn drain(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.entries.lock())
    }

    /// True if nothing has been reported
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl DiagnosticSink for MemorySink {
    fn report(&self, diagnostic: Diagnostic) {
        self.entries.lock().push(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_collects_in_order() {
        let sink = MemorySink::new();
        sink.report(Diagnostic::SummaryAfterTermination);
        sink.report(Diagnostic::DuplicateStepId {
            agent_id: "1".to_string(),
            step_id: 4,
        });

        let entries = sink.drain();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], Diagnostic::SummaryAfterTermination);
        assert!(sink.is_empty());
    }
}
