use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::review::ReviewItem;

/// How the backend produced a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Live,
    #[serde(alias = "sandbox")]
    Mock,
    Demo,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Mock => "mock",
            Self::Demo => "demo",
        }
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single infrastructure signal collected by the monitor stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct InfraEvent {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub source: String,
    /// Raw severity label as the backend reported it.
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub metric: String,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub threshold: f64,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub resource: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Reasoning-stage analysis of one infrastructure event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Analysis {
    #[serde(default)]
    pub event_id: String,
    #[serde(default)]
    pub root_cause: String,
    /// 0.0 to 1.0
    #[serde(default, alias = "confidence_score")]
    pub confidence: f64,
    #[serde(default)]
    pub impact: String,
    #[serde(default, alias = "reasoning_chain")]
    pub reasoning_steps: Vec<String>,
    /// `auto_fix`, `escalate` or `monitor`
    #[serde(default)]
    pub recommended_action: String,
    #[serde(default)]
    pub fix_description: String,
    #[serde(default)]
    pub related_services: Vec<String>,
    #[serde(default)]
    pub estimated_resolution_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// One entry of a run: the event, its analysis and what was done about it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub event: InfraEvent,
    #[serde(default)]
    pub analysis: Analysis,
    #[serde(default)]
    pub action_taken: String,
    #[serde(default)]
    pub execution: Option<serde_json::Value>,
    #[serde(default)]
    pub escalation: Option<ReviewItem>,
    #[serde(default, alias = "estimated_monthly_savings_usd")]
    pub estimated_savings_usd: f64,
}

/// A complete pipeline run as returned by the synchronous trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    #[serde(alias = "pipeline_run_id")]
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub mode: Option<RunMode>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default, alias = "total_incidents")]
    pub events_processed: u64,
    #[serde(default, alias = "auto_remediated")]
    pub auto_fixed: u64,
    #[serde(default, alias = "pending_hitl")]
    pub escalated: u64,
    #[serde(default)]
    pub total_savings_usd: f64,
    #[serde(default)]
    pub results: Vec<RunResult>,
}

impl PipelineRun {
    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Review items the run escalated to a human.
    pub fn escalations(&self) -> Vec<ReviewItem> {
        self.results
            .iter()
            .filter_map(|r| r.escalation.clone())
            .collect()
    }

    /// Derive the counters the dashboard folds in.
    pub fn summary(&self) -> RunSummary {
        let mut severity_breakdown = BTreeMap::new();
        for result in &self.results {
            let label = result.event.severity.trim().to_lowercase();
            if label.is_empty() {
                continue;
            }
            *severity_breakdown.entry(label).or_insert(0) += 1;
        }

        let savings_from_results: f64 = self.results.iter().map(|r| r.estimated_savings_usd).sum();

        RunSummary {
            run_id: self.run_id.clone(),
            started_at: self.started_at,
            mode: self.mode,
            model: self.model.clone(),
            events_processed: self.events_processed.max(self.results.len() as u64),
            auto_fixed: self.auto_fixed,
            escalated: self.escalated,
            total_savings_usd: if self.total_savings_usd > 0.0 {
                self.total_savings_usd
            } else {
                savings_from_results
            },
            severity_breakdown,
        }
    }
}

/// The part of a finished run that the dashboard reconciler folds in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub mode: Option<RunMode>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default, alias = "total_incidents")]
    pub events_processed: u64,
    #[serde(default, alias = "auto_remediated")]
    pub auto_fixed: u64,
    #[serde(default, alias = "pending_hitl")]
    pub escalated: u64,
    #[serde(default)]
    pub total_savings_usd: f64,
    #[serde(default)]
    pub severity_breakdown: BTreeMap<String, u64>,
}
