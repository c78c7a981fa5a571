pub mod http;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::config::BackendAvailability;
use crate::errors::ConsoleError;
use crate::models::{DashboardSummary, InfraEvent, PipelineRun, Resolution, ReviewItem};

pub use http::HttpBackend;

/// Raw body chunks of an event stream.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, ConsoleError>> + Send>>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthStatus {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RunsEnvelope {
    #[serde(default)]
    pub runs: Vec<PipelineRun>,
    #[serde(default)]
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EscalationsEnvelope {
    #[serde(default)]
    pub escalations: Vec<ReviewItem>,
    #[serde(default)]
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EventsEnvelope {
    #[serde(default)]
    pub events: Vec<InfraEvent>,
    #[serde(default)]
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveRequest {
    pub resolution: Resolution,
    pub resolved_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamRequest {
    pub request: String,
}

/// Everything the console asks of the pipeline backend.
#[async_trait]
pub trait Backend: Send + Sync {
    fn availability(&self) -> BackendAvailability;

    async fn health(&self) -> Result<HealthStatus, ConsoleError>;

    async fn dashboard(&self) -> Result<DashboardSummary, ConsoleError>;

    /// Synchronous pipeline execution; returns the finished run.
    async fn run_pipeline(&self) -> Result<PipelineRun, ConsoleError>;

    async fn runs(&self) -> Result<Vec<PipelineRun>, ConsoleError>;

    async fn run(&self, run_id: &str) -> Result<PipelineRun, ConsoleError>;

    /// Pending review items.
    async fn escalations(&self) -> Result<Vec<ReviewItem>, ConsoleError>;

    /// Review items in every status.
    async fn all_escalations(&self) -> Result<Vec<ReviewItem>, ConsoleError>;

    async fn resolve_escalation(
        &self,
        id: &str,
        resolution: Resolution,
        resolved_by: &str,
    ) -> Result<ReviewItem, ConsoleError>;

    async fn events(&self) -> Result<Vec<InfraEvent>, ConsoleError>;

    /// Open the pipeline event stream. Errors before the first byte are
    /// returned here; later failures arrive as stream items.
    async fn open_stream(&self, request: &str) -> Result<ByteStream, ConsoleError>;
}
