use tracing::debug;

use crate::cli::commands::DashboardArgs;
use crate::cli::{http_backend, load_settings, GlobalArgs};
use crate::config::Overrides;
use crate::errors::ConsoleError;
use crate::pipeline::Console;
use crate::render::{render_dashboard, render_mode_tag};
use crate::utils::formatting::format_usd;

pub async fn handle_dashboard(global: &GlobalArgs, args: DashboardArgs) -> Result<(), ConsoleError> {
    let settings = load_settings(global, Overrides::default()).await?;
    let backend = http_backend(&settings);
    let mut console = Console::new(settings, backend);
    let summary = console.refresh_dashboard().await?.clone();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }
    print!("{}", render_dashboard(&summary));

    // History is optional on older backends.
    match console.refresh_latest_run().await {
        Ok(Some(run)) => println!(
            "  Latest run {} {} auto-fixed, {} escalated, {} {}",
            run.run_id,
            run.auto_fixed,
            run.escalated,
            format_usd(run.total_savings_usd),
            render_mode_tag(run.mode),
        ),
        Ok(None) => {}
        Err(e) => debug!(error = %e, "Run history unavailable"),
    }
    Ok(())
}
