use clap::Parser;
use tracing_subscriber::EnvFilter;

use agentdeck::cli::{self, Cli, Commands};
use agentdeck::config;
use agentdeck::errors::ConsoleError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let global = &cli.global;

    // Logs go to stderr so `--json` output stays machine readable.
    let log_level = match global.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_ansi(!global.no_color);
    if global.log_json {
        builder.json().init();
    } else {
        builder.init();
    }

    if global.no_color {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    let result = match cli.command {
        Commands::Run(args) => cli::run::handle_run(global, args).await,
        Commands::Dashboard(args) => cli::dashboard::handle_dashboard(global, args).await,
        Commands::Escalations(args) => cli::escalations::handle_escalations(global, args).await,
        Commands::Runs(args) => cli::runs::handle_runs(global, args).await,
        Commands::Events(args) => cli::events::handle_events(global, args).await,
        Commands::Health(args) => cli::health::handle_health(global, args).await,
        Commands::Serve(args) => cli::serve::handle_serve(global, args).await,
        Commands::Validate(args) => handle_validate(args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        let exit_code = match &e {
            ConsoleError::Configuration(_) | ConsoleError::Yaml(_) => 2,
            ConsoleError::Connectivity { .. } | ConsoleError::Timeout { .. } => 3,
            ConsoleError::HttpStatus { .. } => 4,
            _ => 1,
        };
        std::process::exit(exit_code);
    }
}

async fn handle_validate(args: cli::commands::ValidateArgs) -> Result<(), ConsoleError> {
    let config = config::parse_config(&args.file).await?;
    let settings = config::ConsoleSettings::resolve(Some(&config), &config::Overrides::default());
    println!("Configuration is valid: {}", args.file.display());
    println!(
        "  backend: {}  profile: {}  agents: {}",
        settings.backend.base_url.as_deref().unwrap_or("none (sandbox)"),
        settings.profile,
        settings.agents.len()
    );
    Ok(())
}
