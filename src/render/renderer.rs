use console::style;

use crate::models::{AgentOutput, DashboardSummary, PipelineEvent, ReviewItem, ReviewStatus, RunMode, Severity};
use crate::pipeline::state::{AgentStatus, RunState, RunStatus};
use crate::utils::formatting::{format_confidence, format_duration, format_usd};
use crate::utils::truncation::{truncate_chars, truncate_lines};

const OUTPUT_PREVIEW_LINES: usize = 40;

/// Render a pipeline event as one styled terminal line.
pub fn render_event(event: &PipelineEvent) -> String {
    match event {
        PipelineEvent::Start(p) => {
            let source = if p.mock { style("sandbox").yellow() } else { style("live").green() };
            format!(
                "\n{} Running pipeline: {} ({} agents, {})",
                style("▶").green().bold(),
                style(truncate_chars(&p.request, 80)).white().bold(),
                p.agents,
                source,
            )
        }
        PipelineEvent::AgentStart(p) => {
            let message = p
                .message
                .as_deref()
                .map(|m| format!(" {}", style(m).dim()))
                .unwrap_or_default();
            format!("  {} {}{}", style("⏳").yellow(), style(&p.agent).yellow(), message)
        }
        PipelineEvent::AgentDone(p) => {
            let duration = p.duration_ms.map(format_duration).unwrap_or_else(|| "-".into());
            format!("  {} {} ({})", style("✓").green(), style(&p.agent).green(), duration)
        }
        PipelineEvent::Error(p) => {
            format!("\n{} {}\n", style("✗ Pipeline failed:").red().bold(), style(&p.message).red())
        }
        PipelineEvent::Complete(p) => {
            let message = p.message.as_deref().unwrap_or("Pipeline complete");
            let mode = p.mode.or(if p.mock { Some(RunMode::Mock) } else { None });
            format!("\n{} {}\n", style(format!("✓ {}", message)).green().bold(), render_mode_tag(mode))
        }
    }
}

pub fn render_severity_badge(severity: &Severity) -> String {
    match severity {
        Severity::Critical => style(" CRITICAL ").on_red().white().bold().to_string(),
        Severity::High => style(" HIGH ").red().bold().to_string(),
        Severity::Medium => style(" MEDIUM ").yellow().bold().to_string(),
        Severity::Low => style(" LOW ").blue().to_string(),
        Severity::Info => style(" INFO ").dim().to_string(),
    }
}

pub fn render_mode_tag(mode: Option<RunMode>) -> String {
    match mode {
        Some(RunMode::Live) => style(" LIVE ").on_green().black().to_string(),
        Some(RunMode::Mock) => style(" SANDBOX ").on_yellow().black().to_string(),
        Some(RunMode::Demo) => style(" DEMO ").on_blue().white().to_string(),
        None => String::new(),
    }
}

fn render_status_icon(status: AgentStatus) -> String {
    match status {
        AgentStatus::Pending => style("○").dim().to_string(),
        AgentStatus::Running => style("⏳").yellow().to_string(),
        AgentStatus::Done => style("✓").green().to_string(),
        AgentStatus::Error => style("✗").red().to_string(),
    }
}

/// Per-agent status list for a run.
pub fn render_run_state(state: &RunState) -> String {
    let mut out = String::new();
    let status = match state.status {
        RunStatus::Idle => style("idle").white().to_string(),
        RunStatus::Running => style("running").green().bold().to_string(),
        RunStatus::Done => style("done").cyan().to_string(),
        RunStatus::Error => style("error").red().to_string(),
    };
    let run_id = state
        .run_id
        .as_deref()
        .map(|id| format!(" {}", style(id).dim()))
        .unwrap_or_default();
    out.push_str(&format!("\n  {} {}{} {}\n", style("Status:").dim(), status, run_id, render_mode_tag(state.mode)));
    for agent in &state.agents {
        let duration = agent
            .duration_ms
            .map(|ms| format!(" {}", style(format_duration(ms)).dim()))
            .unwrap_or_default();
        out.push_str(&format!("  {} {}{}\n", render_status_icon(agent.status), agent.label, duration));
        if let Some(error) = &agent.error {
            out.push_str(&format!("      {}\n", style(error).red().dim()));
        }
    }
    if let Some(error) = &state.error {
        out.push_str(&format!("  {} {}\n", style("Error:").red().bold(), error));
    }
    out
}

/// Outputs of finished agents, each under its label.
pub fn render_agent_outputs(state: &RunState) -> String {
    let mut out = String::new();
    for agent in state.agents.iter().filter(|a| a.status == AgentStatus::Done) {
        let text = match &agent.output {
            Some(AgentOutput::Text(t)) if t.is_empty() => continue,
            Some(output) => output.as_text(),
            None => continue,
        };
        out.push_str(&format!("\n{}\n", style(format!("── {} ──", agent.label)).cyan().bold()));
        out.push_str(&truncate_lines(&text, OUTPUT_PREVIEW_LINES));
        out.push('\n');
    }
    out
}

pub fn render_dashboard(summary: &DashboardSummary) -> String {
    let mut out = String::new();
    out.push_str(&format!("\n{} {}\n\n", style("Dashboard").white().bold(), render_mode_tag(summary.mode)));

    let rows = [
        ("Events", summary.total_events.to_string()),
        ("Pipeline runs", summary.total_pipeline_runs.to_string()),
        ("Auto-fixed", summary.auto_fixed.to_string()),
        ("Pending escalations", summary.pending_escalations.to_string()),
        ("Savings", format_usd(summary.total_savings_usd)),
    ];
    for (label, value) in rows {
        out.push_str(&format!("  {:<22} {}\n", style(label).dim(), style(value).white().bold()));
    }
    if let Some(model) = &summary.model {
        out.push_str(&format!("  {:<22} {}\n", style("Model").dim(), model));
    }
    let last_run = summary
        .last_run
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "never".into());
    out.push_str(&format!("  {:<22} {}\n", style("Last run").dim(), last_run));

    if !summary.severity_breakdown.is_empty() {
        out.push_str(&format!("\n  {}\n", style("By severity").white().bold()));
        for (label, count) in summary.severity_rows() {
            out.push_str(&format!("    {} {}\n", render_severity_badge(&Severity::from(label.to_string())), count));
        }
    }
    if !summary.source_breakdown.is_empty() {
        out.push_str(&format!("\n  {}\n", style("By source").white().bold()));
        for (source, count) in &summary.source_breakdown {
            out.push_str(&format!("    {:<20} {}\n", source, count));
        }
    }
    out
}

fn render_review_status(status: ReviewStatus) -> String {
    match status {
        ReviewStatus::Pending => style("pending").yellow().to_string(),
        ReviewStatus::Approved | ReviewStatus::Remediated => style(status.as_str()).green().to_string(),
        ReviewStatus::Rejected => style("rejected").red().to_string(),
        ReviewStatus::Deferred => style("deferred").dim().to_string(),
    }
}

pub fn render_review_item(item: &ReviewItem, last_error: Option<&str>) -> String {
    let mut out = format!(
        "\n{} {} {} [{}]\n",
        render_severity_badge(&item.severity),
        style(&item.title).white().bold(),
        style(&item.id).dim(),
        render_review_status(item.status),
    );
    if !item.message.is_empty() && item.message != item.title {
        out.push_str(&format!("  {}\n", item.message));
    }
    if !item.root_cause.is_empty() {
        out.push_str(&format!("  {} {}\n", style("Root cause:").dim(), item.root_cause));
    }
    for (i, step) in item.reasoning_steps.iter().enumerate() {
        out.push_str(&format!("    {}. {}\n", i + 1, step));
    }
    if !item.recommended_action.is_empty() {
        out.push_str(&format!(
            "  {} {} ({} confidence)\n",
            style("Proposed:").dim(),
            item.recommended_action,
            format_confidence(item.confidence),
        ));
    }
    if let (Some(by), Some(at)) = (&item.resolved_by, item.resolved_at) {
        out.push_str(&format!(
            "  {} {} at {}\n",
            style("Resolved by").dim(),
            by,
            at.format("%Y-%m-%d %H:%M UTC")
        ));
    }
    if let Some(error) = last_error {
        out.push_str(&format!("  {} {}\n", style("✗").red(), style(error).red()));
    }
    out
}

pub fn render_review_queue(items: &[ReviewItem]) -> String {
    if items.is_empty() {
        return format!("\n  {}\n", style("No pending escalations.").dim());
    }
    let mut sorted: Vec<&ReviewItem> = items.iter().collect();
    sorted.sort_by_key(|i| (i.severity.rank(), i.id.clone()));
    sorted.into_iter().map(|i| render_review_item(i, None)).collect()
}

pub fn render_version() -> String {
    let version = env!("CARGO_PKG_VERSION");
    let git_hash = option_env!("GIT_HASH").unwrap_or("dev");
    let build_ts = option_env!("BUILD_TIMESTAMP").unwrap_or("unknown");
    format!("agentdeck {} ({} built {})", version, git_hash, build_ts)
}
