use axum::{
    body::Body,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use futures::StreamExt;
use serde::Deserialize;
use tracing::{info, warn};

use crate::api::RelayState;
use crate::client::ByteStream;
use crate::config::BackendAvailability;
use crate::errors::ConsoleError;

#[derive(Debug, Default, Deserialize)]
pub struct StreamBody {
    #[serde(default)]
    pub request: Option<String>,
}

/// Proxy the live stream when the upstream answers, otherwise serve the fallback schedule.
pub async fn stream_pipeline(
    State(state): State<RelayState>,
    body: Option<Json<StreamBody>>,
) -> Response {
    let request = body
        .and_then(|Json(b)| b.request)
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| state.default_request.clone());

    if let BackendAvailability::Configured(url) = state.upstream.availability() {
        match state.upstream.open_stream(&request).await {
            Ok(stream) => {
                info!(upstream = %url, "Relaying live pipeline stream");
                return event_stream(Body::from_stream(stream));
            }
            Err(e) if state.allow_fallback => {
                warn!(upstream = %url, error = %e, "Upstream stream failed, serving fallback");
            }
            Err(e) => return e.into_response(),
        }
    } else if !state.allow_fallback {
        return ConsoleError::Configuration("no upstream backend configured".into()).into_response();
    }

    let frames: ByteStream = Box::pin(
        state.fallback.frames(&request).map(|frame| frame.map(String::into_bytes)),
    );
    event_stream(Body::from_stream(frames))
}

/// One-shot run proxied to the upstream.
pub async fn run_pipeline(State(state): State<RelayState>) -> Result<Response, ConsoleError> {
    let run = state.upstream.run_pipeline().await?;
    Ok(Json(run).into_response())
}

fn event_stream(body: Body) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        body,
    )
        .into_response()
}
