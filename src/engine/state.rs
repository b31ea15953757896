//! Run state and the state-synthesis reducer
//!
//! [`RunState`] is an explicitly owned, versioned value: the reducer
//! ([`RunState::apply`]) is a pure fold `(RunState, DomainEvent) -> RunState`
//! applied strictly in arrival order. It never fails; an event it cannot
//! apply is a no-op plus diagnostic, preserving liveness of the rest of the
//! stream. Consumers only ever see immutable snapshots.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::diag::{Diagnostic, DiagnosticSink};
use super::event::DomainEvent;
use super::wire::StreamKind;

/// Lifecycle status of an agent, mirrored from the backend
///
/// Transitions are not validated: the backend is authoritative and any
/// value may overwrite any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Created but not yet assigned work
    Idle,
    /// Designing the next experiment
    Planning,
    /// Executing an experiment
    Running,
    /// Finished successfully
    Completed,
    /// Finished with an error
    Failed,
}

/// Kind of a notebook step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    /// Natural-language reasoning
    Thought,
    /// Code submitted for execution
    Code,
    /// Execution output
    Result,
}

/// One atomic unit of an agent's activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Unique within the owning agent, monotonically assigned by the producer
    pub id: u64,
    /// What kind of activity this step records
    pub kind: StepKind,
    /// Step text
    pub content: String,
}

/// One simulated researcher tracked by id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    /// Stable identifier, unique within a run
    pub id: String,
    /// Resource label (GPU type), if the backend reported one
    pub gpu: Option<String>,
    /// Current lifecycle status
    pub status: AgentStatus,
    /// Current working hypothesis; replaced wholesale on update
    pub hypothesis: Option<String>,
    /// Append-only step log; insertion order is causal order
    pub steps: Vec<Step>,
}

impl AgentState {
    /// A freshly mentioned agent: idle, no hypothesis, no gpu, no steps
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            gpu: None,
            status: AgentStatus::Idle,
            hypothesis: None,
            steps: Vec::new(),
        }
    }
}

/// Chart rendering style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    /// Connected line chart
    Line,
    /// Bar chart
    Bar,
}

/// One data series within a chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    /// Series label
    #[serde(default)]
    pub name: Option<String>,
    /// Data points, in x order
    pub values: Vec<f64>,
}

/// Declarative chart attached to a published paper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    /// Chart title
    #[serde(default)]
    pub title: Option<String>,
    /// Rendering style
    #[serde(rename = "type")]
    pub chart_type: ChartType,
    /// X-axis labels; positional when absent
    #[serde(default)]
    pub labels: Vec<String>,
    /// Data series
    #[serde(default)]
    pub series: Vec<ChartSeries>,
}

/// One entry of the orchestration timeline
///
/// The timeline is append-only and never reordered or deduplicated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TimelineItem {
    /// Principal-investigator narration
    Thought {
        /// Narration text
        content: String,
    },
    /// An activation batch referencing agents by id
    ///
    /// References are resolved against the agent map at render time, so a
    /// group may legally precede its agents' first state events.
    #[serde(rename = "agents")]
    AgentGroup {
        /// Activated agent ids, in activation order
        agent_ids: Vec<String>,
    },
    /// The terminal research artifact; immutable once published
    Paper {
        /// Paper body (markdown)
        content: String,
        /// Charts referenced by the paper
        #[serde(default)]
        charts: Vec<ChartSpec>,
    },
}

/// One entry of the flat chronological console log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleEntry {
    /// Output stream the line came from
    pub stream: StreamKind,
    /// Wall-clock timestamp string, kept verbatim from the wire
    pub timestamp: String,
    /// Display text
    pub text: String,
}

/// Exit data recorded from the run's summary record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    /// Process exit code; zero means success
    pub exit_code: i32,
    /// Total run duration in seconds
    pub duration_seconds: f64,
}

/// Lifecycle status of the run as a whole
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// No run has started
    Idle,
    /// Stream is being consumed
    Running,
    /// Terminated with exit code zero
    Completed,
    /// Terminated with a nonzero exit code, transport failure, or truncation
    Failed,
}

/// Aggregate state synthesized from one experiment stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    /// Run lifecycle status; monotone once terminal
    pub status: RunStatus,
    /// Agents by id; insertion order is irrelevant, access is keyed
    pub agents: HashMap<String, AgentState>,
    /// Orchestration timeline, in arrival order
    pub timeline: Vec<TimelineItem>,
    /// Flat chronological console log
    pub console: Vec<ConsoleEntry>,
    /// Exit data from the summary record, if one arrived
    pub outcome: Option<RunOutcome>,
    /// Failure message for transport or truncation failures
    pub error: Option<String>,
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

impl RunState {
    /// Fresh, empty state with status [`RunStatus::Idle`]
    pub fn new() -> Self {
        Self {
            status: RunStatus::Idle,
            agents: HashMap::new(),
            timeline: Vec::new(),
            console: Vec::new(),
            outcome: None,
            error: None,
        }
    }

    /// Fresh, empty state for a run that has just started
    pub fn started() -> Self {
        Self {
            status: RunStatus::Running,
            ..Self::new()
        }
    }

    /// True once the run reached `completed` or `failed`
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, RunStatus::Completed | RunStatus::Failed)
    }

    /// Pure fold step: apply one event, returning the successor state
    ///
    /// Events that arrive after the run is terminal are still folded into
    /// history for audit, but the terminal status and recorded outcome are
    /// never altered again.
    #[must_use]
    pub fn apply(mut self, event: DomainEvent, sink: &dyn DiagnosticSink) -> Self {
        match event {
            DomainEvent::ConsoleLine {
                stream,
                timestamp,
                text,
            } => {
                self.console.push(ConsoleEntry {
                    stream,
                    timestamp,
                    text,
                });
            }

            DomainEvent::AgentStatusChanged {
                agent_id,
                status,
                gpu,
            } => {
                let agent = self.agent_entry(agent_id);
                agent.status = status;
                if gpu.is_some() {
                    agent.gpu = gpu;
                }
            }

            DomainEvent::AgentHypothesisSet { agent_id, text } => {
                // Last write wins; no merging.
                self.agent_entry(agent_id).hypothesis = Some(text);
            }

            DomainEvent::AgentStepAppended { agent_id, step } => {
                let agent = self.agent_entry(agent_id);
                if agent.steps.iter().any(|existing| existing.id == step.id) {
                    sink.report(Diagnostic::DuplicateStepId {
                        agent_id: agent.id.clone(),
                        step_id: step.id,
                    });
                } else {
                    agent.steps.push(step);
                }
            }

            DomainEvent::TimelineThought { content } => {
                self.timeline.push(TimelineItem::Thought { content });
            }

            DomainEvent::TimelineAgentGroupOpened { agent_ids } => {
                self.timeline.push(TimelineItem::AgentGroup { agent_ids });
            }

            DomainEvent::TimelinePaperPublished { content, charts } => {
                self.timeline.push(TimelineItem::Paper { content, charts });
            }

            DomainEvent::RunTerminated {
                exit_code,
                duration_seconds,
            } => {
                if self.is_terminal() {
                    sink.report(Diagnostic::SummaryAfterTermination);
                } else {
                    self.status = if exit_code == 0 {
                        RunStatus::Completed
                    } else {
                        RunStatus::Failed
                    };
                    self.outcome = Some(RunOutcome {
                        exit_code,
                        duration_seconds,
                    });
                }
            }
        }
        self
    }

    fn agent_entry(&mut self, id: String) -> &mut AgentState {
        self.agents
            .entry(id.clone())
            .or_insert_with(|| AgentState::new(id))
    }
}
