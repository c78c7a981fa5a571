use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::{
    AgentDonePayload, AgentOutput, CompletePayload, PipelineEvent, PipelineRun, RunMode,
    RunSummary,
};
use super::phase::AgentDefinition;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Done,
    Error,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Done | RunStatus::Error)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    #[default]
    Pending,
    Running,
    Done,
    Error,
}

impl AgentStatus {
    /// Position in `pending → running → done|error`. Terminal states share a rank.
    pub fn rank(self) -> u8 {
        match self {
            AgentStatus::Pending => 0,
            AgentStatus::Running => 1,
            AgentStatus::Done | AgentStatus::Error => 2,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.rank() == 2
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentState {
    pub name: String,
    pub label: String,
    pub status: AgentStatus,
    pub output: Option<AgentOutput>,
    pub error: Option<String>,
    pub duration_ms: Option<u64>,
}

impl AgentState {
    fn pending(def: &AgentDefinition) -> Self {
        Self {
            name: def.name.clone(),
            label: def.label.clone(),
            status: AgentStatus::Pending,
            output: None,
            error: None,
            duration_ms: None,
        }
    }

    fn matches(&self, key: &str) -> bool {
        self.name.eq_ignore_ascii_case(key) || self.label.eq_ignore_ascii_case(key)
    }

    /// Move forward only; a lower or equal rank is ignored.
    fn advance(&mut self, next: AgentStatus) -> bool {
        if next.rank() > self.status.rank() {
            self.status = next;
            true
        } else {
            false
        }
    }
}

/// Client-side view of one pipeline run, rebuilt from events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RunState {
    pub status: RunStatus,
    pub request: String,
    pub run_id: Option<String>,
    pub agents: Vec<AgentState>,
    pub active_agent: Option<usize>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub mock: bool,
    pub mode: Option<RunMode>,
    pub model: Option<String>,
    pub message: Option<String>,
    pub summary: Option<RunSummary>,
    pub ignored_events: usize,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, request: &str, agents: &[AgentDefinition], started_at: DateTime<Utc>) {
        *self = Self {
            status: RunStatus::Running,
            request: request.to_string(),
            agents: agents.iter().map(AgentState::pending).collect(),
            started_at: Some(started_at),
            ..Self::default()
        };
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_running(&self) -> bool {
        self.status == RunStatus::Running
    }

    pub fn agent(&self, key: &str) -> Option<&AgentState> {
        self.agents.iter().find(|a| a.matches(key))
    }

    pub fn completed_agents(&self) -> usize {
        self.agents.iter().filter(|a| a.status == AgentStatus::Done).count()
    }

    /// Apply one stream event. Events outside a running run are dropped.
    pub fn apply(&mut self, event: &PipelineEvent) {
        if self.status != RunStatus::Running {
            warn!(kind = %event.kind(), status = ?self.status, "Ignoring stale pipeline event");
            self.ignored_events += 1;
            return;
        }
        debug!(kind = %event.kind(), "Applying pipeline event");

        match event {
            PipelineEvent::Start(p) => {
                self.mock = p.mock;
                self.run_id = p.run_id.clone().or_else(|| self.run_id.take());
                if p.agents > self.agents.len() {
                    debug!(announced = p.agents, known = self.agents.len(), "Backend announced more agents");
                }
            }
            PipelineEvent::AgentStart(p) => {
                let idx = self.resolve_agent(&p.agent, p.index);
                if self.agents[idx].advance(AgentStatus::Running) {
                    self.active_agent = Some(idx);
                }
            }
            PipelineEvent::AgentDone(p) => self.agent_done(p),
            PipelineEvent::Error(p) => {
                // A pending agent never ran, so it stays pending and the
                // active agent takes the error instead.
                let target = match &p.agent {
                    Some(agent) => self
                        .agents
                        .iter()
                        .position(|a| a.matches(agent) && a.status == AgentStatus::Running),
                    None => None,
                }
                .or(self.active_agent);
                if let Some(idx) = target {
                    let agent = &mut self.agents[idx];
                    if agent.status == AgentStatus::Running {
                        agent.status = AgentStatus::Error;
                        agent.error = Some(p.message.clone());
                    }
                }
                self.finish_error(p.message.clone());
            }
            PipelineEvent::Complete(p) => self.complete(p),
        }
    }

    fn agent_done(&mut self, p: &AgentDonePayload) {
        let idx = self.resolve_agent(&p.agent, p.index);
        let agent = &mut self.agents[idx];
        match agent.status {
            AgentStatus::Pending => {
                warn!(agent = %agent.name, "Ignoring agent_done for an agent that never started");
                self.ignored_events += 1;
                return;
            }
            AgentStatus::Running | AgentStatus::Done => {
                agent.status = AgentStatus::Done;
                agent.output = Some(p.output.clone());
                agent.duration_ms = p.duration_ms.or(agent.duration_ms);
            }
            AgentStatus::Error => {
                warn!(agent = %agent.name, "Ignoring agent_done for an errored agent");
                return;
            }
        }
        if p.mock {
            self.mock = true;
        }
        if self.active_agent == Some(idx) {
            self.active_agent = None;
        }
    }

    fn complete(&mut self, p: &CompletePayload) {
        self.mock = self.mock || p.mock;
        self.mode = p.mode.or(if p.mock { Some(RunMode::Mock) } else { self.mode });
        self.model = p.model.clone().or_else(|| self.model.take());
        self.message = p.message.clone();
        self.summary = p.summary.clone();
        if let Some(summary) = &self.summary {
            self.run_id = Some(summary.run_id.clone());
        }
        self.active_agent = None;
        self.settle(Utc::now());
    }

    /// Close the run as done, or as an error naming every agent that did not finish.
    fn settle(&mut self, finished_at: DateTime<Utc>) {
        let unfinished: Vec<&str> = self
            .agents
            .iter()
            .filter(|a| a.status != AgentStatus::Done)
            .map(|a| a.name.as_str())
            .collect();
        if unfinished.is_empty() {
            self.status = RunStatus::Done;
            self.finished_at = Some(finished_at);
        } else {
            let message = format!(
                "pipeline reported completion with unfinished agents: {}",
                unfinished.join(", ")
            );
            self.finish_error(message);
        }
    }

    /// Find the agent an event refers to: name or label first, then position.
    fn resolve_agent(&mut self, key: &str, index: usize) -> usize {
        if let Some(idx) = self.agents.iter().position(|a| a.matches(key)) {
            return idx;
        }
        if key.trim().is_empty() && index < self.agents.len() {
            return index;
        }
        if index < self.agents.len() && self.agents[index].status == AgentStatus::Pending {
            debug!(agent = key, index, "Matched agent by position");
            return index;
        }
        warn!(agent = key, index, "Event for unknown agent, appending");
        self.agents.push(AgentState::pending(&AgentDefinition::new(key, key, "")));
        self.agents.len() - 1
    }

    fn finish_error(&mut self, message: String) {
        self.status = RunStatus::Error;
        self.error = Some(message);
        self.active_agent = None;
        self.finished_at = Some(Utc::now());
    }

    /// Move every pending agent to running. A synchronous run has no
    /// per-agent events, so all agents run for the duration of the call.
    pub fn start_all(&mut self) {
        if !self.is_running() {
            return;
        }
        for agent in &mut self.agents {
            agent.advance(AgentStatus::Running);
        }
    }

    /// Apply the result of a synchronous run. Only running agents complete.
    pub fn finish_with_run(&mut self, run: &PipelineRun) {
        if !self.is_running() {
            self.ignored_events += 1;
            return;
        }
        for agent in &mut self.agents {
            if agent.status == AgentStatus::Running {
                agent.status = AgentStatus::Done;
            }
        }
        self.run_id = Some(run.run_id.clone());
        self.mode = run.mode;
        self.mock = run.mode == Some(RunMode::Mock);
        self.model = run.model.clone();
        self.summary = Some(run.summary());
        self.active_agent = None;
        self.settle(run.completed_at.unwrap_or_else(Utc::now));
    }

    /// Mark a run failed without any event from the backend.
    pub fn fail(&mut self, message: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        let message = message.into();
        for agent in &mut self.agents {
            if agent.status == AgentStatus::Running {
                agent.status = AgentStatus::Error;
                agent.error = Some(message.clone());
            }
        }
        self.finish_error(message);
    }
}
