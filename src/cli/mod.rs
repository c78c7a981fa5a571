pub mod commands;
pub mod dashboard;
pub mod escalations;
pub mod events;
pub mod health;
pub mod run;
pub mod runs;
pub mod serve;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::client::{Backend, HttpBackend};
use crate::config::{parse_config, ConsoleSettings, Overrides};
use crate::errors::ConsoleError;

pub use commands::{Cli, Commands, GlobalArgs};

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "agentdeck.yaml";

/// Resolve settings from the config file, environment and command line.
pub async fn load_settings(
    global: &GlobalArgs,
    mut overrides: Overrides,
) -> Result<ConsoleSettings, ConsoleError> {
    let path: Option<PathBuf> = match &global.config {
        Some(path) => Some(path.clone()),
        None => Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.exists()),
    };
    let file = match &path {
        Some(path) => {
            debug!(path = %path.display(), "Loading config file");
            Some(parse_config(path).await?)
        }
        None => None,
    };
    if overrides.api_url.is_none() {
        overrides.api_url = global.api_url.clone();
    }
    Ok(ConsoleSettings::resolve(file.as_ref(), &overrides))
}

pub fn http_backend(settings: &ConsoleSettings) -> Arc<dyn Backend> {
    Arc::new(HttpBackend::new(settings.backend.clone()))
}
