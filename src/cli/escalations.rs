use console::style;

use crate::cli::commands::{EscalationAction, EscalationsArgs};
use crate::cli::{http_backend, load_settings, GlobalArgs};
use crate::config::Overrides;
use crate::errors::ConsoleError;
use crate::escalation::{EscalationWorkflow, ResolveOutcome};
use crate::models::Resolution;
use crate::render::{render_review_item, render_review_queue};

pub async fn handle_escalations(global: &GlobalArgs, args: EscalationsArgs) -> Result<(), ConsoleError> {
    match args.action {
        EscalationAction::List { all, json } => list(global, all, json).await,
        EscalationAction::Resolve { id, resolution, resolved_by } => {
            resolve(global, &id, resolution, resolved_by).await
        }
    }
}

async fn list(global: &GlobalArgs, all: bool, json: bool) -> Result<(), ConsoleError> {
    let settings = load_settings(global, Overrides::default()).await?;
    let workflow = EscalationWorkflow::new(http_backend(&settings), &settings.operator);
    if all {
        workflow.refresh_all().await?;
    } else {
        workflow.refresh().await?;
    }
    let items = if all { workflow.items().await } else { workflow.pending().await };

    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        print!("{}", render_review_queue(&items));
    }
    Ok(())
}

async fn resolve(
    global: &GlobalArgs,
    id: &str,
    resolution: Resolution,
    resolved_by: Option<String>,
) -> Result<(), ConsoleError> {
    let overrides = Overrides { operator: resolved_by, ..Default::default() };
    let settings = load_settings(global, overrides).await?;
    let workflow = EscalationWorkflow::new(http_backend(&settings), &settings.operator);

    // Older backends only list pending items.
    match workflow.refresh_all().await {
        Ok(_) => {}
        Err(ConsoleError::HttpStatus { status: 404, .. }) | Err(ConsoleError::NotFound(_)) => {
            workflow.refresh().await?;
        }
        Err(e) => return Err(e),
    }

    match workflow.resolve(id, resolution).await {
        Ok(ResolveOutcome::Resolved(item)) => {
            println!("{} {} {}", style("✓").green(), id, resolution);
            print!("{}", render_review_item(&item, None));
            Ok(())
        }
        Ok(ResolveOutcome::AlreadyResolved(item)) => {
            println!("{} {} is already {}", style("•").dim(), id, item.status);
            Ok(())
        }
        Ok(ResolveOutcome::InFlight) => {
            println!("{} {} is already being resolved", style("•").dim(), id);
            Ok(())
        }
        Err(e) => {
            if let Some(item) = workflow.get(id).await {
                eprint!("{}", render_review_item(&item, workflow.last_error(id).as_deref()));
            }
            Err(e)
        }
    }
}
