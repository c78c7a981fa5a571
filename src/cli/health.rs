use console::style;

use crate::cli::commands::HealthArgs;
use crate::cli::{http_backend, load_settings, GlobalArgs};
use crate::config::{BackendAvailability, Overrides};
use crate::errors::ConsoleError;
use crate::render::render_version;

pub async fn handle_health(global: &GlobalArgs, args: HealthArgs) -> Result<(), ConsoleError> {
    let settings = load_settings(global, Overrides::default()).await?;
    let backend = http_backend(&settings);

    if let BackendAvailability::Unconfigured = backend.availability() {
        if !args.json {
            println!("{} No backend configured; runs use sandbox output", style("•").dim());
        }
    }
    let health = backend.health().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&health)?);
    } else {
        println!("{}", style(render_version()).dim());
        let status = if health.ok { style("ok").green().bold() } else { style("degraded").red().bold() };
        println!(
            "Backend {}: {} {}",
            settings.backend.base_url.as_deref().unwrap_or("-"),
            status,
            style(health.timestamp.as_deref().unwrap_or("")).dim()
        );
    }
    Ok(())
}
