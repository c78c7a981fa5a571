//! Deterministic stand-in for the live pipeline stream.

use std::time::Duration;

use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::errors::ConsoleError;
use crate::models::{
    AgentDonePayload, AgentOutput, AgentStartPayload, CompletePayload, PipelineEvent, RunMode,
    StartPayload,
};
use crate::pipeline::phase::AgentDefinition;
use super::canned::canned_output;

pub const COMPLETE_MESSAGE: &str = "Pipeline complete";

/// Agent `i` takes `base_delay_ms + step_ms * i`, then `gap_ms` passes before the next one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackTiming {
    pub base_delay_ms: u64,
    pub step_ms: u64,
    pub gap_ms: u64,
}

impl Default for FallbackTiming {
    fn default() -> Self {
        Self { base_delay_ms: 800, step_ms: 200, gap_ms: 200 }
    }
}

impl FallbackTiming {
    pub fn agent_duration(&self, index: usize) -> Duration {
        Duration::from_millis(self.base_delay_ms + self.step_ms * index as u64)
    }

    pub fn gap(&self) -> Duration {
        Duration::from_millis(self.gap_ms)
    }
}

/// An event and how long to wait before emitting it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledEvent {
    pub delay: Duration,
    pub event: PipelineEvent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FallbackSchedule {
    pub events: Vec<ScheduledEvent>,
}

impl FallbackSchedule {
    pub fn total_duration(&self) -> Duration {
        self.events.iter().map(|e| e.delay).sum()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn into_events(self) -> Vec<PipelineEvent> {
        self.events.into_iter().map(|e| e.event).collect()
    }
}

#[derive(Debug, Clone)]
pub struct FallbackProducer {
    agents: Vec<AgentDefinition>,
    timing: FallbackTiming,
}

impl FallbackProducer {
    pub fn new(agents: Vec<AgentDefinition>, timing: FallbackTiming) -> Self {
        Self { agents, timing }
    }

    /// Build the full schedule for one request.
    ///
    /// `start`, then per agent `agent_start` immediately after the previous
    /// gap and `agent_done` after the agent's duration, then `complete`.
    pub fn schedule(&self, request: &str) -> FallbackSchedule {
        let mut events = Vec::with_capacity(self.agents.len() * 2 + 2);
        events.push(ScheduledEvent {
            delay: Duration::ZERO,
            event: PipelineEvent::Start(StartPayload {
                request: request.to_string(),
                agents: self.agents.len(),
                mock: true,
                run_id: Some(format!("sandbox-{}", Uuid::new_v4())),
            }),
        });

        let mut pending_gap = Duration::ZERO;
        for (index, agent) in self.agents.iter().enumerate() {
            let duration = self.timing.agent_duration(index);
            events.push(ScheduledEvent {
                delay: pending_gap,
                event: PipelineEvent::AgentStart(AgentStartPayload {
                    agent: agent.label.clone(),
                    index,
                    message: None,
                }),
            });
            events.push(ScheduledEvent {
                delay: duration,
                event: PipelineEvent::AgentDone(AgentDonePayload {
                    agent: agent.label.clone(),
                    index,
                    output: AgentOutput::Text(canned_output(agent, request)),
                    duration_ms: Some(duration.as_millis() as u64),
                    mock: true,
                }),
            });
            pending_gap = self.timing.gap();
        }

        events.push(ScheduledEvent {
            delay: pending_gap,
            event: PipelineEvent::Complete(CompletePayload {
                message: Some(COMPLETE_MESSAGE.to_string()),
                mock: true,
                mode: Some(RunMode::Mock),
                model: None,
                summary: None,
            }),
        });

        FallbackSchedule { events }
    }

    /// Emit the schedule in real time. Returns `false` if cancelled first.
    pub async fn play<F>(&self, request: &str, cancel: &CancellationToken, mut on_event: F) -> bool
    where
        F: FnMut(PipelineEvent),
    {
        for scheduled in self.schedule(request).events {
            if !scheduled.delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => return false,
                    _ = tokio::time::sleep(scheduled.delay) => {}
                }
            }
            if cancel.is_cancelled() {
                return false;
            }
            debug!(kind = %scheduled.event.kind(), "Fallback event");
            on_event(scheduled.event);
        }
        true
    }

    /// Encoded frames, paced like `play`, for serving over HTTP.
    pub fn frames(&self, request: &str) -> impl Stream<Item = Result<String, ConsoleError>> + Send + 'static {
        let events = self.schedule(request).events;
        stream::iter(events).then(|scheduled| async move {
            if !scheduled.delay.is_zero() {
                tokio::time::sleep(scheduled.delay).await;
            }
            super::codec::encode_event(&scheduled.event)
        })
    }
}
