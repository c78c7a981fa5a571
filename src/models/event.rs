use serde::{Deserialize, Serialize};
use super::run::{RunMode, RunSummary};

/// Wire name of each stream event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Start,
    AgentStart,
    AgentDone,
    Error,
    Complete,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::AgentStart => "agent_start",
            Self::AgentDone => "agent_done",
            Self::Error => "error",
            Self::Complete => "complete",
        }
    }

    /// Map a wire name to a kind. `pipeline_done` is the synonym some
    /// backends send for `complete`.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "start" => Some(Self::Start),
            "agent_start" => Some(Self::AgentStart),
            "agent_done" => Some(Self::AgentDone),
            "error" => Some(Self::Error),
            "complete" | "pipeline_done" => Some(Self::Complete),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Agent output: markdown text from the copilot agents, or a JSON document
/// from the infrastructure agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AgentOutput {
    Text(String),
    Structured(serde_json::Value),
}

impl Default for AgentOutput {
    fn default() -> Self {
        AgentOutput::Text(String::new())
    }
}

impl AgentOutput {
    pub fn as_text(&self) -> String {
        match self {
            AgentOutput::Text(text) => text.clone(),
            AgentOutput::Structured(value) => {
                serde_json::to_string_pretty(value).unwrap_or_default()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            AgentOutput::Text(text) => text.is_empty(),
            AgentOutput::Structured(value) => value.is_null(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StartPayload {
    #[serde(default)]
    pub request: String,
    /// Number of agents the backend is about to run.
    #[serde(default)]
    pub agents: usize,
    #[serde(default)]
    pub mock: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStartPayload {
    pub agent: String,
    #[serde(default)]
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDonePayload {
    pub agent: String,
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub output: AgentOutput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub mock: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    #[serde(default = "default_error_message")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
}

fn default_error_message() -> String {
    "An error occurred".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CompletePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub mock: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<RunMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<RunSummary>,
}

/// One decoded stream event. The payload shape is fixed by the variant.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    Start(StartPayload),
    AgentStart(AgentStartPayload),
    AgentDone(AgentDonePayload),
    Error(ErrorPayload),
    Complete(CompletePayload),
}

impl PipelineEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Start(_) => EventKind::Start,
            Self::AgentStart(_) => EventKind::AgentStart,
            Self::AgentDone(_) => EventKind::AgentDone,
            Self::Error(_) => EventKind::Error,
            Self::Complete(_) => EventKind::Complete,
        }
    }

    /// Terminal events end a run; nothing for the same run follows them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error(_) | Self::Complete(_))
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(ErrorPayload { message: message.into(), agent: None })
    }

    /// Serialize the payload as the frame's `data` JSON.
    pub fn payload_json(&self) -> Result<String, serde_json::Error> {
        match self {
            Self::Start(p) => serde_json::to_string(p),
            Self::AgentStart(p) => serde_json::to_string(p),
            Self::AgentDone(p) => serde_json::to_string(p),
            Self::Error(p) => serde_json::to_string(p),
            Self::Complete(p) => serde_json::to_string(p),
        }
    }

    /// Parse a payload according to its kind.
    pub fn from_payload(kind: EventKind, data: &str) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            EventKind::Start => Self::Start(serde_json::from_str(data)?),
            EventKind::AgentStart => Self::AgentStart(serde_json::from_str(data)?),
            EventKind::AgentDone => Self::AgentDone(serde_json::from_str(data)?),
            EventKind::Error => Self::Error(serde_json::from_str(data)?),
            EventKind::Complete => Self::Complete(serde_json::from_str(data)?),
        })
    }
}
