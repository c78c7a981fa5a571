use std::sync::Arc;

use tracing::info;

use crate::api::{self, RelayState};
use crate::cli::commands::ServeArgs;
use crate::cli::{load_settings, GlobalArgs};
use crate::client::{Backend, HttpBackend};
use crate::config::Overrides;
use crate::errors::ConsoleError;

pub async fn handle_serve(global: &GlobalArgs, args: ServeArgs) -> Result<(), ConsoleError> {
    let overrides = Overrides { api_url: args.upstream.clone(), ..Default::default() };
    let settings = load_settings(global, overrides).await?;
    let upstream: Arc<dyn Backend> = Arc::new(HttpBackend::new(settings.backend.clone()));
    info!(
        host = %args.host,
        port = args.port,
        upstream = settings.backend.base_url.as_deref().unwrap_or("none"),
        "Starting relay server"
    );

    let app = api::build_router(RelayState::new(upstream, &settings));

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| ConsoleError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}
