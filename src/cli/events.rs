use console::style;

use crate::cli::commands::EventsArgs;
use crate::cli::{http_backend, load_settings, GlobalArgs};
use crate::config::Overrides;
use crate::errors::ConsoleError;
use crate::models::{InfraEvent, Severity};
use crate::render::render_severity_badge;
use crate::utils::truncation::truncate_chars;

pub async fn handle_events(global: &GlobalArgs, args: EventsArgs) -> Result<(), ConsoleError> {
    let settings = load_settings(global, Overrides::default()).await?;
    let events = http_backend(&settings).events().await?;
    let events = filter_by_severity(events, args.severity.as_deref());

    if args.json {
        println!("{}", serde_json::to_string_pretty(&events)?);
    } else if events.is_empty() {
        println!("  {}", style("No events.").dim());
    } else {
        for event in &events {
            println!("{}", render_event_row(event));
        }
    }
    Ok(())
}

fn filter_by_severity(events: Vec<InfraEvent>, severity: Option<&str>) -> Vec<InfraEvent> {
    match severity {
        Some(wanted) => events
            .into_iter()
            .filter(|e| e.severity.eq_ignore_ascii_case(wanted.trim()))
            .collect(),
        None => events,
    }
}

fn render_event_row(event: &InfraEvent) -> String {
    let severity = Severity::from(event.severity.clone());
    format!(
        "  {} {:<18} {:<14} {}",
        render_severity_badge(&severity),
        style(&event.service).cyan(),
        style(&event.source).dim(),
        truncate_chars(&event.message, 90),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(severity: &str) -> InfraEvent {
        InfraEvent { severity: severity.into(), service: "api".into(), ..Default::default() }
    }

    #[test]
    fn test_filter_is_case_insensitive() {
        let events = vec![event("CRITICAL"), event("low"), event("critical")];
        assert_eq!(filter_by_severity(events.clone(), Some("critical")).len(), 2);
        assert_eq!(filter_by_severity(events, None).len(), 3);
    }

    #[test]
    fn test_row_shows_service() {
        console::set_colors_enabled(false);
        let row = render_event_row(&InfraEvent { message: "CPU high".into(), ..event("high") });
        assert!(row.contains("api"));
        assert!(row.contains("CPU high"));
    }
}
