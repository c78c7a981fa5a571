use console::style;

use crate::cli::commands::RunsArgs;
use crate::cli::{http_backend, load_settings, GlobalArgs};
use crate::config::Overrides;
use crate::errors::ConsoleError;
use crate::models::PipelineRun;
use crate::render::{render_mode_tag, render_review_queue};
use crate::utils::formatting::format_usd;

pub async fn handle_runs(global: &GlobalArgs, args: RunsArgs) -> Result<(), ConsoleError> {
    let settings = load_settings(global, Overrides::default()).await?;
    let backend = http_backend(&settings);

    if let Some(run_id) = &args.run_id {
        let run = backend.run(run_id).await?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&run)?);
        } else {
            println!("{}", render_run_row(&run));
            print!("{}", render_review_queue(&run.escalations()));
        }
        return Ok(());
    }

    let runs = backend.runs().await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&runs)?);
    } else if runs.is_empty() {
        println!("  {}", style("No pipeline runs yet.").dim());
    } else {
        for run in &runs {
            println!("{}", render_run_row(run));
        }
    }
    Ok(())
}

fn render_run_row(run: &PipelineRun) -> String {
    format!(
        "  {:<22} {}  {} events | {} auto-fixed | {} escalated | {} {}",
        style(&run.run_id).cyan(),
        run.started_at.format("%Y-%m-%d %H:%M:%S"),
        run.events_processed,
        run.auto_fixed,
        run.escalated,
        format_usd(run.total_savings_usd),
        render_mode_tag(run.mode),
    )
}
