use console::style;
use tracing::info;

use crate::cli::commands::RunArgs;
use crate::cli::{http_backend, load_settings, GlobalArgs};
use crate::config::Overrides;
use crate::errors::ConsoleError;
use crate::pipeline::state::RunStatus;
use crate::pipeline::{Console, DEFAULT_REQUEST};
use crate::render::{render_agent_outputs, render_event, render_run_state, RunProgress};
use crate::stream::Transport;

pub async fn handle_run(global: &GlobalArgs, args: RunArgs) -> Result<(), ConsoleError> {
    let overrides = Overrides {
        allow_fallback: args.no_fallback.then_some(false),
        profile: args.profile,
        ..Default::default()
    };
    let settings = load_settings(global, overrides).await?;
    let backend = http_backend(&settings);
    let mut console = Console::new(settings, backend);
    let agent_count = console.settings().agents.len();

    let request = args
        .request
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(DEFAULT_REQUEST)
        .to_string();

    if args.sync {
        console.run_once(&request).await;
    } else {
        let mut progress = if args.json {
            RunProgress::hidden(agent_count)
        } else {
            RunProgress::new(agent_count)
        };
        console.start_run(&request);
        console
            .drive(|event, _| {
                progress.handle_event(event);
                if !args.json && event.is_terminal() {
                    progress.println(&render_event(event));
                }
            })
            .await;
        if let Some(outcome) = console.last_outcome() {
            info!(transport = ?outcome.transport, events = outcome.events, "Run stream closed");
            if outcome.transport == Transport::Fallback && !args.json {
                eprintln!(
                    "{} Backend unavailable, showing sandbox output",
                    style("⚠").yellow().bold()
                );
            }
        }
    }

    let state = console.state();
    if args.json {
        println!("{}", serde_json::to_string_pretty(state)?);
    } else {
        print!("{}", render_agent_outputs(state));
        print!("{}", render_run_state(state));
    }

    match state.status {
        RunStatus::Error => Err(ConsoleError::Internal(format!(
            "Pipeline run failed: {}",
            state.error.as_deref().unwrap_or("unknown error")
        ))),
        _ => Ok(()),
    }
}
