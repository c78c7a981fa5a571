//! Folding finished runs into the dashboard counters.
//!
//! Both operations are pure: they take the current summary by reference and
//! return the next one.

use tracing::debug;

use crate::models::{DashboardSummary, RunSummary};

/// Fold one run into the aggregate. A run id already folded is a no-op.
pub fn apply_run_summary(current: &DashboardSummary, run: &RunSummary) -> DashboardSummary {
    if current.has_folded(&run.run_id) {
        debug!(run_id = %run.run_id, "Run already folded into dashboard");
        return current.clone();
    }

    let mut next = current.clone();
    next.total_events += run.events_processed;
    next.total_pipeline_runs += 1;
    next.auto_fixed += run.auto_fixed;
    next.pending_escalations += run.escalated;
    next.total_savings_usd += run.total_savings_usd;
    for (label, count) in &run.severity_breakdown {
        *next.severity_breakdown.entry(label.to_lowercase()).or_insert(0) += count;
    }

    if is_newer(run, current) {
        next.last_run = Some(run.started_at);
        next.last_run_id = Some(run.run_id.clone());
        if run.mode.is_some() {
            next.mode = run.mode;
        }
        if run.model.is_some() {
            next.model = run.model.clone();
        }
    }

    next.folded_runs.insert(run.run_id.clone());
    next
}

/// Adopt counters fetched from the backend, keeping track of local folds.
pub fn hard_refresh(fetched: DashboardSummary, previous: &DashboardSummary) -> DashboardSummary {
    let mut next = fetched;
    next.folded_runs = previous.folded_runs.clone();
    next.last_run_id = if next.last_run.is_some() && next.last_run == previous.last_run {
        previous.last_run_id.clone()
    } else {
        None
    };
    next
}

/// Ties on `started_at` go to the larger run id so fold order never matters.
fn is_newer(run: &RunSummary, current: &DashboardSummary) -> bool {
    match current.last_run {
        None => true,
        Some(last) if run.started_at > last => true,
        Some(last) if run.started_at == last => match &current.last_run_id {
            Some(id) => run.run_id > *id,
            None => true,
        },
        Some(_) => false,
    }
}
