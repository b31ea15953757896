//! Event classification and the structured sub-protocol
//!
//! Every parsed [`WireRecord`] is mapped onto a closed set of
//! [`DomainEvent`]s. A `summary` record terminates the run; a `line` record
//! always feeds the console view and, when its payload carries the reserved
//! structured marker, additionally yields an agent or timeline event.
//! Classification never fails: unrecognized markers degrade to plain
//! console lines with a diagnostic.
//!
//! Sub-protocol: a structured line's payload is the marker [`MARKER`]
//! followed by one JSON object with an `event` tag, e.g.
//!
//! ```text
//! @@lab {"event":"agent_status","agent":"1","status":"running","gpu":"A100"}
//! @@lab {"event":"agent_step","agent":"1","id":0,"kind":"code","content":"print(1)"}
//! @@lab {"event":"pi_thought","content":"Batching three hypotheses."}
//! ```
//!
//! The marker is looked for in `raw` first, then `plain`, so a backend can
//! ship the machine payload in `raw` and a human rendering in `plain`.

use serde::Deserialize;

use super::diag::{Diagnostic, DiagnosticSink};
use super::state::{AgentStatus, ChartSpec, Step, StepKind};
use super::wire::{LineRecord, StreamKind, WireRecord, parse_record};

/// Reserved prefix identifying a structured sub-protocol line
pub const MARKER: &str = "@@lab ";

/// A classified domain event, ready for the reducer
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    /// One entry for the flat console log
    ConsoleLine {
        /// Output stream the line came from
        stream: StreamKind,
        /// Wall-clock timestamp string, verbatim
        timestamp: String,
        /// Display text
        text: String,
    },

    /// An agent's lifecycle status changed
    AgentStatusChanged {
        /// Agent id; created on first mention
        agent_id: String,
        /// New status
        status: AgentStatus,
        /// Resource label, when the backend reported one
        gpu: Option<String>,
    },

    /// An agent's working hypothesis was replaced
    AgentHypothesisSet {
        /// Agent id; created on first mention
        agent_id: String,
        /// New hypothesis text
        text: String,
    },

    /// A step was appended to an agent's notebook
    AgentStepAppended {
        /// Agent id; created on first mention
        agent_id: String,
        /// The appended step
        step: Step,
    },

    /// Principal-investigator narration for the timeline
    TimelineThought {
        /// Narration text
        content: String,
    },

    /// An activation batch opened on the timeline
    TimelineAgentGroupOpened {
        /// Activated agent ids; forward references are legal
        agent_ids: Vec<String>,
    },

    /// The final paper was published on the timeline
    TimelinePaperPublished {
        /// Paper body (markdown)
        content: String,
        /// Charts referenced by the paper
        charts: Vec<ChartSpec>,
    },

    /// The run terminated; exactly one per well-formed stream
    RunTerminated {
        /// Process exit code; zero means success
        exit_code: i32,
        /// Total run duration in seconds
        duration_seconds: f64,
    },
}

/// Wire shape of a structured marker payload
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum MarkerPayload {
    AgentStatus {
        agent: String,
        status: AgentStatus,
        #[serde(default)]
        gpu: Option<String>,
    },
    AgentHypothesis {
        agent: String,
        text: String,
    },
    AgentStep {
        agent: String,
        id: u64,
        kind: StepKind,
        content: String,
    },
    PiThought {
        content: String,
    },
    AgentsActive {
        agents: Vec<String>,
    },
    Paper {
        content: String,
        #[serde(default)]
        charts: Vec<ChartSpec>,
    },
}

impl MarkerPayload {
    fn into_event(self) -> DomainEvent {
        match self {
            MarkerPayload::AgentStatus { agent, status, gpu } => DomainEvent::AgentStatusChanged {
                agent_id: agent,
                status,
                gpu,
            },
            MarkerPayload::AgentHypothesis { agent, text } => DomainEvent::AgentHypothesisSet {
                agent_id: agent,
                text,
            },
            MarkerPayload::AgentStep {
                agent,
                id,
                kind,
                content,
            } => DomainEvent::AgentStepAppended {
                agent_id: agent,
                step: Step { id, kind, content },
            },
            MarkerPayload::PiThought { content } => DomainEvent::TimelineThought { content },
            MarkerPayload::AgentsActive { agents } => DomainEvent::TimelineAgentGroupOpened {
                agent_ids: agents,
            },
            MarkerPayload::Paper { content, charts } => DomainEvent::TimelinePaperPublished {
                content,
                charts,
            },
        }
    }
}

/// Map a parsed record onto its domain events
///
/// A `line` record always yields a [`DomainEvent::ConsoleLine`]; a
/// structured line yields its structured event as well, so the console and
/// structured views stay independently complete.
pub fn classify(record: WireRecord, sink: &dyn DiagnosticSink) -> Vec<DomainEvent> {
    match record {
        WireRecord::Summary(summary) => vec![DomainEvent::RunTerminated {
            exit_code: summary.exit_code,
            duration_seconds: summary.duration_seconds,
        }],
        WireRecord::Line(line) => {
            let structured = decode_marker(&line, sink);
            let mut events = Vec::with_capacity(2);
            events.push(DomainEvent::ConsoleLine {
                text: line.text().to_owned(),
                stream: line.stream,
                timestamp: line.timestamp,
            });
            events.extend(structured);
            events
        }
    }
}

/// Parse and classify one decoded line
///
/// Blank lines are skipped silently; a line that fails structural
/// validation is reported through the sink and dropped, never halting the
/// pipeline.
pub fn events_from_line(line: &str, sink: &dyn DiagnosticSink) -> Vec<DomainEvent> {
    if line.trim().is_empty() {
        return Vec::new();
    }
    match parse_record(line) {
        Ok(record) => classify(record, sink),
        Err(err) => {
            sink.report(Diagnostic::MalformedRecord {
                line: line.to_owned(),
                reason: err.to_string(),
            });
            Vec::new()
        }
    }
}

fn decode_marker(line: &LineRecord, sink: &dyn DiagnosticSink) -> Option<DomainEvent> {
    let payload = line
        .raw
        .strip_prefix(MARKER)
        .or_else(|| line.plain.strip_prefix(MARKER))?;

    match serde_json::from_str::<MarkerPayload>(payload) {
        Ok(decoded) => Some(decoded.into_event()),
        Err(err) => {
            sink.report(Diagnostic::UnknownMarker {
                payload: payload.to_owned(),
                reason: err.to_string(),
            });
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::diag::MemorySink;
    use crate::engine::state::ChartType;

    fn line_json(raw: &str) -> String {
        serde_json::json!({
            "type": "line",
            "stream": "stdout",
            "timestamp": "2024-05-01T10:00:00",
            "raw": raw,
            "plain": raw,
        })
        .to_string()
    }

    #[test]
    fn test_plain_line_is_console_only() {
        let sink = MemorySink::new();
        let events = events_from_line(&line_json("training epoch 3"), &sink);

        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            DomainEvent::ConsoleLine { text, .. } if text == "training epoch 3"
        ));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_structured_line_is_echoed_and_classified() {
        let sink = MemorySink::new();
        let raw = r#"@@lab {"event":"agent_status","agent":"2","status":"running","gpu":"T4"}"#;
        let events = events_from_line(&line_json(raw), &sink);

        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], DomainEvent::ConsoleLine { .. }));
        assert_eq!(
            events[1],
            DomainEvent::AgentStatusChanged {
                agent_id: "2".to_string(),
                status: AgentStatus::Running,
                gpu: Some("T4".to_string()),
            }
        );
    }

    #[test]
    fn test_marker_in_raw_with_human_plain() {
        let sink = MemorySink::new();
        let line = serde_json::json!({
            "type": "line",
            "stream": "stdout",
            "timestamp": "T",
            "raw": r#"@@lab {"event":"pi_thought","content":"narrow the search"}"#,
            "plain": "Orchestrator: narrow the search",
        })
        .to_string();
        let events = events_from_line(&line, &sink);

        assert_eq!(events.len(), 2);
        // Console shows the human rendering, not the marker payload.
        assert!(matches!(
            &events[0],
            DomainEvent::ConsoleLine { text, .. } if text == "Orchestrator: narrow the search"
        ));
        assert_eq!(
            events[1],
            DomainEvent::TimelineThought {
                content: "narrow the search".to_string(),
            }
        );
    }

    #[test]
    fn test_each_marker_kind_classifies() {
        let sink = MemorySink::new();
        let cases = [
            (
                r#"@@lab {"event":"agent_hypothesis","agent":"1","text":"lr too high"}"#,
                DomainEvent::AgentHypothesisSet {
                    agent_id: "1".to_string(),
                    text: "lr too high".to_string(),
                },
            ),
            (
                r#"@@lab {"event":"agent_step","agent":"1","id":2,"kind":"result","content":"loss=0.1"}"#,
                DomainEvent::AgentStepAppended {
                    agent_id: "1".to_string(),
                    step: Step {
                        id: 2,
                        kind: StepKind::Result,
                        content: "loss=0.1".to_string(),
                    },
                },
            ),
            (
                r#"@@lab {"event":"agents_active","agents":["1","2"]}"#,
                DomainEvent::TimelineAgentGroupOpened {
                    agent_ids: vec!["1".to_string(), "2".to_string()],
                },
            ),
            (
                r##"@@lab {"event":"paper","content":"# Title"}"##,
                DomainEvent::TimelinePaperPublished {
                    content: "# Title".to_string(),
                    charts: Vec::new(),
                },
            ),
        ];

        for (raw, expected) in cases {
            let events = events_from_line(&line_json(raw), &sink);
            assert_eq!(events.len(), 2, "for {raw}");
            assert_eq!(events[1], expected, "for {raw}");
        }
        assert!(sink.is_empty());
    }

    #[test]
    fn test_paper_charts_decode() {
        let sink = MemorySink::new();
        let raw = r##"@@lab {"event":"paper","content":"# T","charts":[{"title":"loss","type":"line","labels":["a","b"],"series":[{"name":"run","values":[1.0,0.5]}]}]}"##;
        let events = events_from_line(&line_json(raw), &sink);

        match &events[1] {
            DomainEvent::TimelinePaperPublished { charts, .. } => {
                assert_eq!(charts.len(), 1);
                assert_eq!(charts[0].chart_type, ChartType::Line);
                assert_eq!(charts[0].series[0].values, vec![1.0, 0.5]);
            }
            other => panic!("expected paper event, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_marker_degrades_to_console() {
        let sink = MemorySink::new();
        let raw = r#"@@lab {"event":"teleport","to":"mars"}"#;
        let events = events_from_line(&line_json(raw), &sink);

        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], DomainEvent::ConsoleLine { .. }));
        assert!(matches!(
            &sink.drain()[..],
            [Diagnostic::UnknownMarker { .. }]
        ));
    }

    #[test]
    fn test_unparseable_marker_degrades_to_console() {
        let sink = MemorySink::new();
        let events = events_from_line(&line_json("@@lab not json"), &sink);

        assert_eq!(events.len(), 1);
        assert_eq!(sink.drain().len(), 1);
    }

    #[test]
    fn test_malformed_record_reports_and_continues() {
        let sink = MemorySink::new();
        let events = events_from_line("not-json", &sink);

        assert!(events.is_empty());
        assert!(matches!(
            &sink.drain()[..],
            [Diagnostic::MalformedRecord { line, .. }] if line == "not-json"
        ));
    }

    #[test]
    fn test_blank_line_skipped_silently() {
        let sink = MemorySink::new();
        assert!(events_from_line("   ", &sink).is_empty());
        assert!(sink.is_empty());
    }

    #[test]
    fn test_summary_classifies_to_run_terminated() {
        let sink = MemorySink::new();
        let events = events_from_line(
            r#"{"type":"summary","timestamp":"T","exit_code":1,"duration_seconds":2.0}"#,
            &sink,
        );

        assert_eq!(
            events,
            vec![DomainEvent::RunTerminated {
                exit_code: 1,
                duration_seconds: 2.0,
            }]
        );
    }
}
