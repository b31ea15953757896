//! Stream transports
//!
//! A [`Transport`] opens one unidirectional byte stream per experiment run;
//! the production implementation POSTs to the backend's mode-selected
//! endpoint and streams the response body. The trait keeps the rest of the
//! pipeline independent of any network, so tests can script chunk sequences
//! directly.

use std::fmt;

use bytes::Bytes;
use futures::TryStreamExt;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use serde_json::{Map, Value};

use super::error::{TransportError, TransportResult};

/// Byte-chunk stream produced by a transport for one run
pub type ChunkStream = BoxStream<'static, TransportResult<Bytes>>;

/// Execution mode, selecting the backend endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum RunMode {
    /// One researcher agent verifying a single hypothesis
    Single,
    /// A principal investigator coordinating several researcher agents
    Orchestrator,
}

impl RunMode {
    /// Streaming endpoint path for this mode
    pub fn endpoint(&self) -> &'static str {
        match self {
            RunMode::Single => "/api/experiments/single/stream",
            RunMode::Orchestrator => "/api/experiments/orchestrator/stream",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Single => write!(f, "single"),
            RunMode::Orchestrator => write!(f, "orchestrator"),
        }
    }
}

/// Experiment parameters, passed through to the backend opaquely
///
/// The engine does not validate their semantics beyond presence; the
/// orchestrator-only fields are simply omitted from single-mode requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunParams {
    /// Research task or hypothesis text
    pub task: String,
    /// GPU resource hint (e.g. "T4", "A100", "any"); omitted when absent
    pub gpu: Option<String>,
    /// Conceptual team size (orchestrator mode only)
    pub num_agents: u32,
    /// Maximum orchestration rounds (orchestrator mode only)
    pub max_rounds: u32,
    /// Maximum concurrently active agents (orchestrator mode only)
    pub max_parallel: u32,
    /// Ask the backend for canned test responses
    pub test_mode: bool,
}

impl RunParams {
    /// Parameters for the given task with the backend's default knobs
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            gpu: None,
            num_agents: 3,
            max_rounds: 3,
            max_parallel: 2,
            test_mode: false,
        }
    }
}

/// One run request: a mode plus its opaque parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    /// Execution mode
    pub mode: RunMode,
    /// Pass-through parameters
    pub params: RunParams,
}

impl RunRequest {
    fn into_value(self) -> Value {
        let mut map = Map::new();
        map.insert("task".to_string(), Value::String(self.params.task));
        if let Some(gpu) = self.params.gpu {
            map.insert("gpu".to_string(), Value::String(gpu));
        }
        if self.mode == RunMode::Orchestrator {
            map.insert(
                "num_agents".to_string(),
                Value::Number(self.params.num_agents.into()),
            );
            map.insert(
                "max_rounds".to_string(),
                Value::Number(self.params.max_rounds.into()),
            );
            map.insert(
                "max_parallel".to_string(),
                Value::Number(self.params.max_parallel.into()),
            );
        }
        map.insert("test_mode".to_string(), Value::Bool(self.params.test_mode));
        Value::Object(map)
    }
}

/// Source of the raw byte stream for one experiment run
pub trait Transport: Send + Sync + 'static {
    /// Open the stream for the given request
    ///
    /// A non-success response is a [`TransportError`], fatal to the run.
    fn open(&self, request: RunRequest) -> BoxFuture<'static, TransportResult<ChunkStream>>;
}

/// Production transport: streamed HTTP response from the research backend
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Transport targeting the given backend base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

impl Transport for HttpTransport {
    fn open(&self, request: RunRequest) -> BoxFuture<'static, TransportResult<ChunkStream>> {
        let client = self.client.clone();
        let url = format!("{}{}", self.base_url, request.mode.endpoint());
        let body = request.into_value();

        Box::pin(async move {
            let response = client.post(&url).json(&body).send().await?;

            let status = response.status();
            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(TransportError::Status {
                    status: status.as_u16(),
                    message,
                });
            }

            let chunks = response.bytes_stream().map_err(TransportError::from);
            Ok(Box::pin(chunks) as ChunkStream)
        })
    }
}
