use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::run::RunMode;

/// Aggregate counters shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DashboardSummary {
    #[serde(default, alias = "total_incidents")]
    pub total_events: u64,
    #[serde(default)]
    pub severity_breakdown: BTreeMap<String, u64>,
    #[serde(default)]
    pub source_breakdown: BTreeMap<String, u64>,
    #[serde(default, alias = "pending_hitl")]
    pub pending_escalations: u64,
    #[serde(default)]
    pub total_pipeline_runs: u64,
    #[serde(default, alias = "auto_remediated")]
    pub auto_fixed: u64,
    #[serde(default, alias = "total_monthly_savings_usd")]
    pub total_savings_usd: f64,
    #[serde(default)]
    pub last_run: Option<DateTime<Utc>>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub mode: Option<RunMode>,
    /// Run ids already folded into these counters locally.
    #[serde(skip)]
    pub folded_runs: BTreeSet<String>,
    /// Run that supplied `last_run`, `mode` and `model`.
    #[serde(skip)]
    pub last_run_id: Option<String>,
}

impl DashboardSummary {
    pub fn has_folded(&self, run_id: &str) -> bool {
        self.folded_runs.contains(run_id)
    }

    /// Severity labels ordered critical first, unknown labels last.
    pub fn severity_rows(&self) -> Vec<(&str, u64)> {
        let order = ["critical", "high", "medium", "low", "info"];
        let mut rows: Vec<(&str, u64)> = self
            .severity_breakdown
            .iter()
            .map(|(label, count)| (label.as_str(), *count))
            .collect();
        rows.sort_by_key(|(label, _)| {
            order.iter().position(|o| o == label).unwrap_or(order.len())
        });
        rows
    }
}
