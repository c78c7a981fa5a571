use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::{BackendAvailability, BackendSettings, API_URL_ENV};
use crate::errors::ConsoleError;
use crate::models::{DashboardSummary, InfraEvent, PipelineRun, Resolution, ReviewItem};
use super::{
    Backend, ByteStream, EscalationsEnvelope, EventsEnvelope, HealthStatus, ResolveRequest,
    RunsEnvelope, StreamRequest,
};

const ERROR_BODY_LIMIT: usize = 200;

/// `Backend` over HTTP/JSON.
pub struct HttpBackend {
    client: Client,
    settings: BackendSettings,
}

impl HttpBackend {
    pub fn new(settings: BackendSettings) -> Self {
        Self { client: Client::new(), settings }
    }

    pub fn settings(&self) -> &BackendSettings {
        &self.settings
    }

    /// Base URL usable for a live call, or the reason there is none.
    fn base_url(&self) -> Result<&str, ConsoleError> {
        match self.settings.availability() {
            BackendAvailability::Unconfigured => Err(ConsoleError::Configuration(format!(
                "Backend URL is not configured. Set {} or pass --api-url.",
                API_URL_ENV
            ))),
            BackendAvailability::LocalInDeployment(url) => Err(ConsoleError::Configuration(format!(
                "Backend URL {} is a local address and is unreachable from a deployed console",
                url
            ))),
            BackendAvailability::Configured(_) => Ok(self
                .settings
                .base_url
                .as_deref()
                .unwrap_or_default()),
        }
    }

    fn url(&self, path: &str) -> Result<String, ConsoleError> {
        Ok(format!("{}{}", self.base_url()?, path))
    }

    async fn send(
        &self,
        url: &str,
        builder: RequestBuilder,
        timeout: Duration,
    ) -> Result<Response, ConsoleError> {
        let resp = match tokio::time::timeout(timeout, builder.send()).await {
            Ok(result) => result.map_err(|e| map_transport_error(url, timeout, e))?,
            Err(_) => {
                return Err(ConsoleError::Timeout {
                    url: url.to_string(),
                    after_ms: timeout.as_millis() as u64,
                })
            }
        };

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ConsoleError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }
        Ok(resp)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ConsoleError> {
        let url = self.url(path)?;
        let timeout = self.settings.request_timeout;
        let builder = self.client.get(&url).timeout(timeout);
        let resp = self.send(&url, builder, timeout).await?;
        decode_json(&url, resp).await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ConsoleError>
    where
        B: serde::Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = self.url(path)?;
        let timeout = self.settings.request_timeout;
        let builder = self.client.post(&url).timeout(timeout).json(body);
        let resp = self.send(&url, builder, timeout).await?;
        decode_json(&url, resp).await
    }
}

#[async_trait]
impl Backend for HttpBackend {
    fn availability(&self) -> BackendAvailability {
        self.settings.availability()
    }

    async fn health(&self) -> Result<HealthStatus, ConsoleError> {
        self.get_json("/health").await
    }

    async fn dashboard(&self) -> Result<DashboardSummary, ConsoleError> {
        self.get_json("/dashboard/summary").await
    }

    async fn run_pipeline(&self) -> Result<PipelineRun, ConsoleError> {
        self.post_json("/pipeline/run", &serde_json::json!({})).await
    }

    async fn runs(&self) -> Result<Vec<PipelineRun>, ConsoleError> {
        let envelope: RunsEnvelope = self.get_json("/pipeline/runs").await?;
        Ok(envelope.runs)
    }

    async fn run(&self, run_id: &str) -> Result<PipelineRun, ConsoleError> {
        match self.get_json(&format!("/pipeline/runs/{}", run_id)).await {
            Err(ConsoleError::HttpStatus { status: 404, .. }) => {
                Err(ConsoleError::NotFound(format!("Run {} not found", run_id)))
            }
            other => other,
        }
    }

    async fn escalations(&self) -> Result<Vec<ReviewItem>, ConsoleError> {
        let envelope: EscalationsEnvelope = self.get_json("/escalations").await?;
        Ok(envelope.escalations)
    }

    async fn all_escalations(&self) -> Result<Vec<ReviewItem>, ConsoleError> {
        let envelope: EscalationsEnvelope = self.get_json("/escalations/all").await?;
        Ok(envelope.escalations)
    }

    async fn resolve_escalation(
        &self,
        id: &str,
        resolution: Resolution,
        resolved_by: &str,
    ) -> Result<ReviewItem, ConsoleError> {
        let body = ResolveRequest { resolution, resolved_by: resolved_by.to_string() };
        match self.post_json(&format!("/escalations/{}/resolve", id), &body).await {
            Err(ConsoleError::HttpStatus { status: 404, .. }) => {
                Err(ConsoleError::NotFound(format!("Escalation {} not found", id)))
            }
            other => other,
        }
    }

    async fn events(&self) -> Result<Vec<InfraEvent>, ConsoleError> {
        let envelope: EventsEnvelope = self.get_json("/events").await?;
        Ok(envelope.events)
    }

    async fn open_stream(&self, request: &str) -> Result<ByteStream, ConsoleError> {
        let url = self.url("/pipeline/stream")?;
        let timeout = self.settings.stream_timeout;
        let builder = self
            .client
            .post(&url)
            .header("accept", "text/event-stream")
            .json(&StreamRequest { request: request.to_string() });
        let resp = self.send(&url, builder, timeout).await?;
        debug!(url = %url, status = resp.status().as_u16(), "Stream opened");

        let stream_url = url.clone();
        let bytes = resp.bytes_stream().map(move |chunk| {
            chunk
                .map(|b| b.to_vec())
                .map_err(|e| ConsoleError::Connectivity {
                    url: stream_url.clone(),
                    message: format!("stream read failed: {}", e),
                })
        });
        Ok(Box::pin(bytes))
    }
}

async fn decode_json<T: DeserializeOwned>(url: &str, resp: Response) -> Result<T, ConsoleError> {
    let text = resp.text().await.map_err(|e| ConsoleError::Connectivity {
        url: url.to_string(),
        message: format!("failed to read response body: {}", e),
    })?;
    serde_json::from_str(&text)
        .map_err(|e| ConsoleError::Protocol(format!("Unexpected response from {}: {}", url, e)))
}

fn map_transport_error(url: &str, timeout: Duration, e: reqwest::Error) -> ConsoleError {
    if e.is_timeout() {
        ConsoleError::Timeout { url: url.to_string(), after_ms: timeout.as_millis() as u64 }
    } else {
        ConsoleError::Connectivity { url: url.to_string(), message: e.to_string() }
    }
}

fn truncate_body(body: &str) -> String {
    body.chars().take(ERROR_BODY_LIMIT).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_backend_is_configuration_error() {
        let backend = HttpBackend::new(BackendSettings::default());
        let err = backend.dashboard().await.unwrap_err();
        assert!(matches!(err, ConsoleError::Configuration(_)));
        assert!(err.to_string().contains(API_URL_ENV));
        assert!(err.classify().fallback_eligible);
    }

    #[tokio::test]
    async fn test_local_address_blocked_when_deployed() {
        let mut settings = BackendSettings::with_base_url("http://localhost:8000");
        settings.deployed = true;
        let backend = HttpBackend::new(settings);
        let err = backend.open_stream("x").await.err().unwrap();
        assert!(err.to_string().contains("http://localhost:8000"));
    }

    #[tokio::test]
    async fn test_connection_refused_is_connectivity_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let backend = HttpBackend::new(BackendSettings::with_base_url(&format!("http://{}", addr)));
        let err = backend.health().await.unwrap_err();
        assert!(matches!(err, ConsoleError::Connectivity { .. }), "got {:?}", err);
        assert!(err.url().unwrap().ends_with("/health"));
    }

    #[test]
    fn test_truncate_body_is_char_safe() {
        let body = "é".repeat(300);
        assert_eq!(truncate_body(&body).chars().count(), ERROR_BODY_LIMIT);
    }
}
