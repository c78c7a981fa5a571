use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::models::Resolution;
use crate::pipeline::phase::PipelineProfile;

#[derive(Parser)]
#[command(name = "agentdeck", version, about = "Operator console for multi-agent automation pipelines")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

#[derive(Args, Clone, Debug, Default)]
pub struct GlobalArgs {
    /// Increase log verbosity (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// YAML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Backend base URL (overrides AGENTDECK_API_URL and the config file)
    #[arg(long, global = true)]
    pub api_url: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the pipeline and follow its progress
    Run(RunArgs),
    /// Show aggregate dashboard counters
    Dashboard(DashboardArgs),
    /// List or resolve human review items
    Escalations(EscalationsArgs),
    /// Show pipeline run history
    Runs(RunsArgs),
    /// List infrastructure events the backend has collected
    Events(EventsArgs),
    /// Check that the backend is reachable
    Health(HealthArgs),
    /// Serve the streaming relay over HTTP
    Serve(ServeArgs),
    /// Validate a configuration file
    Validate(ValidateArgs),
}

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// What the pipeline should do
    pub request: Option<String>,

    /// Use the one-shot endpoint instead of streaming
    #[arg(long)]
    pub sync: bool,

    /// Fail instead of using the offline fallback
    #[arg(long)]
    pub no_fallback: bool,

    /// Agent profile
    #[arg(long, value_enum)]
    pub profile: Option<PipelineProfile>,

    /// Print the final run state as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Clone, Debug)]
pub struct DashboardArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Clone, Debug)]
pub struct EscalationsArgs {
    #[command(subcommand)]
    pub action: EscalationAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum EscalationAction {
    /// List review items
    List {
        /// Include resolved items
        #[arg(long)]
        all: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Approve, reject or defer an item
    Resolve {
        /// Review item id
        id: String,

        /// approved | rejected | deferred
        resolution: Resolution,

        /// Name recorded as the resolver
        #[arg(long = "by")]
        resolved_by: Option<String>,
    },
}

#[derive(Args, Clone, Debug)]
pub struct RunsArgs {
    /// Show a single run
    pub run_id: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Clone, Debug)]
pub struct EventsArgs {
    /// Only show events of this severity
    #[arg(long)]
    pub severity: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Clone, Debug)]
pub struct HealthArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Clone, Debug)]
pub struct ServeArgs {
    /// Listen port
    #[arg(long, default_value = "8080")]
    pub port: u16,

    /// Listen address
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Upstream backend to relay (defaults to the configured backend)
    #[arg(long)]
    pub upstream: Option<String>,
}

#[derive(Args, Clone, Debug)]
pub struct ValidateArgs {
    /// Config file to validate
    #[arg(value_name = "CONFIG")]
    pub file: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_globals() {
        let cli = Cli::try_parse_from([
            "agentdeck", "run", "Deploy my app", "--no-fallback", "--profile", "ops", "--api-url", "https://api.example.com", "-vv",
        ])
        .unwrap();
        assert_eq!(cli.global.verbose, 2);
        assert_eq!(cli.global.api_url.as_deref(), Some("https://api.example.com"));
        let Commands::Run(args) = cli.command else { panic!("expected run") };
        assert_eq!(args.request.as_deref(), Some("Deploy my app"));
        assert!(args.no_fallback);
        assert_eq!(args.profile, Some(PipelineProfile::Ops));
    }

    #[test]
    fn test_parse_resolve() {
        let cli = Cli::try_parse_from(["agentdeck", "escalations", "resolve", "esc-1", "approve", "--by", "dana"]).unwrap();
        let Commands::Escalations(EscalationsArgs { action: EscalationAction::Resolve { id, resolution, resolved_by } }) = cli.command else {
            panic!("expected resolve")
        };
        assert_eq!(id, "esc-1");
        assert_eq!(resolution, Resolution::Approved);
        assert_eq!(resolved_by.as_deref(), Some("dana"));
    }

    #[test]
    fn test_rejects_unknown_resolution() {
        assert!(Cli::try_parse_from(["agentdeck", "escalations", "resolve", "esc-1", "maybe"]).is_err());
    }

    #[test]
    fn test_parse_validate_alongside_global_config() {
        let cli = Cli::try_parse_from(["agentdeck", "validate", "agentdeck.yaml"]).unwrap();
        let Commands::Validate(args) = cli.command else { panic!("expected validate") };
        assert_eq!(args.file, PathBuf::from("agentdeck.yaml"));
        assert!(cli.global.config.is_none());
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
