use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::client::Backend;
use crate::config::ConsoleSettings;
use crate::dashboard::{apply_run_summary, hard_refresh};
use crate::errors::{with_retry, ConsoleError, RetryConfig};
use crate::escalation::EscalationWorkflow;
use crate::models::{DashboardSummary, PipelineEvent, PipelineRun};
use crate::stream::{StreamConsumer, StreamHandle, StreamOutcome};
use super::state::{RunState, RunStatus};

type TaggedEvent = (u64, PipelineEvent);

pub const WORKER_STOPPED_MESSAGE: &str = "stream worker stopped before the pipeline completed";

/// One operator session: the current run, the dashboard and the review queue.
///
/// Every run gets a fresh generation number. Events are tagged with the
/// generation of the run that produced them and dropped if it is no longer
/// current, so a cancelled stream can never touch a newer run.
pub struct Console {
    settings: ConsoleSettings,
    backend: Arc<dyn Backend>,
    consumer: StreamConsumer,
    state: RunState,
    dashboard: DashboardSummary,
    latest_run: Option<PipelineRun>,
    last_outcome: Option<StreamOutcome>,
    escalations: Arc<EscalationWorkflow>,
    retry: RetryConfig,
    generation: u64,
    active: Option<StreamHandle>,
    event_tx: mpsc::UnboundedSender<TaggedEvent>,
    event_rx: mpsc::UnboundedReceiver<TaggedEvent>,
}

impl Console {
    pub fn new(settings: ConsoleSettings, backend: Arc<dyn Backend>) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let consumer = StreamConsumer::from_settings(backend.clone(), &settings);
        let escalations = Arc::new(EscalationWorkflow::new(backend.clone(), &settings.operator));
        Self {
            settings,
            backend,
            consumer,
            state: RunState::new(),
            dashboard: DashboardSummary::default(),
            latest_run: None,
            last_outcome: None,
            escalations,
            retry: RetryConfig::default(),
            generation: 0,
            active: None,
            event_tx,
            event_rx,
        }
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn settings(&self) -> &ConsoleSettings {
        &self.settings
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn dashboard(&self) -> &DashboardSummary {
        &self.dashboard
    }

    pub fn latest_run(&self) -> Option<&PipelineRun> {
        self.latest_run.as_ref()
    }

    pub fn last_outcome(&self) -> Option<&StreamOutcome> {
        self.last_outcome.as_ref()
    }

    pub fn escalations(&self) -> Arc<EscalationWorkflow> {
        self.escalations.clone()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Start a streamed run, cancelling any run still in progress.
    pub fn start_run(&mut self, request: &str) -> u64 {
        self.cancel_active();
        self.generation += 1;
        let generation = self.generation;
        self.state.begin(request, &self.settings.agents, Utc::now());
        self.last_outcome = None;
        info!(generation, request, agents = self.settings.agents.len(), "Starting pipeline run");

        let tx = self.event_tx.clone();
        let handle = self.consumer.start(request, move |event| {
            let _ = tx.send((generation, event));
        });
        self.active = Some(handle);
        generation
    }

    /// Wait for and apply the next event of the current run.
    ///
    /// Returns `None` once the run is no longer running. If the stream worker
    /// stops without a terminal event, an error event is synthesized for it.
    pub async fn next_event(&mut self) -> Option<PipelineEvent> {
        while self.state.is_running() {
            // Buffered events win over the worker's exit, so nothing it sent is lost.
            let received = match self.active.as_ref() {
                Some(handle) => {
                    let finished = handle.finished();
                    tokio::select! {
                        biased;
                        received = self.event_rx.recv() => received,
                        _ = finished => self.event_rx.try_recv().ok(),
                    }
                }
                None => self.event_rx.try_recv().ok(),
            };
            let Some((generation, event)) = received else {
                warn!(generation = self.generation, "Stream worker stopped without a terminal event");
                let event = PipelineEvent::error(WORKER_STOPPED_MESSAGE);
                self.state.apply(&event);
                self.on_run_finished().await;
                return Some(event);
            };
            if generation != self.generation {
                debug!(generation, current = self.generation, kind = %event.kind(), "Dropping event from a replaced run");
                continue;
            }
            self.state.apply(&event);
            if self.state.status.is_terminal() {
                self.on_run_finished().await;
            }
            return Some(event);
        }
        None
    }

    /// Apply events until the run ends, reporting each one.
    pub async fn drive<F>(&mut self, mut on_event: F) -> &RunState
    where
        F: FnMut(&PipelineEvent, &RunState),
    {
        while let Some(event) = self.next_event().await {
            on_event(&event, &self.state);
        }
        &self.state
    }

    /// Run the pipeline synchronously and apply the returned run.
    pub async fn run_once(&mut self, request: &str) -> &RunState {
        self.cancel_active();
        self.generation += 1;
        self.state.begin(request, &self.settings.agents, Utc::now());
        self.state.start_all();
        info!(generation = self.generation, "Running pipeline synchronously");

        match self.backend.run_pipeline().await {
            Ok(run) => {
                self.state.finish_with_run(&run);
                self.dashboard = apply_run_summary(&self.dashboard, &run.summary());
                self.escalations.load(run.escalations()).await;
                info!(run_id = %run.run_id, auto_fixed = run.auto_fixed, escalated = run.escalated, "Pipeline run finished");
                self.latest_run = Some(run);
            }
            Err(e) => {
                warn!(error = %e, "Pipeline run failed");
                self.state.fail(e.to_string());
            }
        }
        &self.state
    }

    /// Drop the current run and return to idle.
    pub fn reset(&mut self) {
        self.cancel_active();
        self.generation += 1;
        self.state.reset();
        self.last_outcome = None;
    }

    /// Replace the dashboard with the backend's counters.
    pub async fn refresh_dashboard(&mut self) -> Result<&DashboardSummary, ConsoleError> {
        let backend = self.backend.clone();
        let fetched = with_retry("dashboard", &self.retry, || {
            let backend = backend.clone();
            async move { backend.dashboard().await }
        })
        .await?;
        self.dashboard = hard_refresh(fetched, &self.dashboard);
        Ok(&self.dashboard)
    }

    /// Fetch the most recent run from the backend's history.
    pub async fn refresh_latest_run(&mut self) -> Result<Option<&PipelineRun>, ConsoleError> {
        let runs = self.backend.runs().await?;
        if let Some(run) = runs.into_iter().max_by_key(|r| r.started_at) {
            self.latest_run = Some(run);
        }
        Ok(self.latest_run.as_ref())
    }

    fn cancel_active(&mut self) {
        if let Some(handle) = self.active.take() {
            if !handle.is_finished() {
                info!(generation = self.generation, "Cancelling active run");
            }
            handle.cancel();
        }
    }

    async fn on_run_finished(&mut self) {
        if let Some(handle) = self.active.take() {
            self.last_outcome = Some(handle.join().await);
        }
        if self.state.status == RunStatus::Done {
            if let Some(summary) = &self.state.summary {
                self.dashboard = apply_run_summary(&self.dashboard, summary);
            }
        }
        info!(
            status = ?self.state.status,
            completed = self.state.completed_agents(),
            mock = self.state.mock,
            "Pipeline run ended"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ByteStream, HealthStatus};
    use crate::config::{BackendAvailability, BackendSettings};
    use crate::models::{EventKind, InfraEvent, Resolution, ReviewItem};
    use crate::pipeline::state::AgentStatus;
    use crate::stream::{StreamStatus, Transport};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// No backend configured: every call fails as unconfigured.
    struct OfflineBackend {
        dashboard_calls: AtomicUsize,
        crash_stream: bool,
    }

    fn unconfigured() -> ConsoleError {
        ConsoleError::Configuration("Backend URL is not configured".into())
    }

    #[async_trait]
    impl Backend for OfflineBackend {
        fn availability(&self) -> BackendAvailability {
            BackendAvailability::Unconfigured
        }
        async fn health(&self) -> Result<HealthStatus, ConsoleError> { Err(unconfigured()) }
        async fn dashboard(&self) -> Result<DashboardSummary, ConsoleError> {
            self.dashboard_calls.fetch_add(1, Ordering::SeqCst);
            Err(ConsoleError::Timeout { url: "http://backend.test/dashboard/summary".into(), after_ms: 10_000 })
        }
        async fn run_pipeline(&self) -> Result<PipelineRun, ConsoleError> {
            Err(ConsoleError::HttpStatus {
                url: "http://backend.test/pipeline/run".into(),
                status: 500,
                body: "Internal Server Error".into(),
            })
        }
        async fn runs(&self) -> Result<Vec<PipelineRun>, ConsoleError> { Err(unconfigured()) }
        async fn run(&self, _: &str) -> Result<PipelineRun, ConsoleError> { Err(unconfigured()) }
        async fn escalations(&self) -> Result<Vec<ReviewItem>, ConsoleError> { Err(unconfigured()) }
        async fn all_escalations(&self) -> Result<Vec<ReviewItem>, ConsoleError> { Err(unconfigured()) }
        async fn resolve_escalation(&self, _: &str, _: Resolution, _: &str) -> Result<ReviewItem, ConsoleError> {
            Err(unconfigured())
        }
        async fn events(&self) -> Result<Vec<InfraEvent>, ConsoleError> { Err(unconfigured()) }
        async fn open_stream(&self, _: &str) -> Result<ByteStream, ConsoleError> {
            if self.crash_stream {
                panic!("stream worker crashed");
            }
            Err(unconfigured())
        }
    }

    fn console() -> (Console, Arc<OfflineBackend>) {
        console_with(false)
    }

    fn console_with(crash_stream: bool) -> (Console, Arc<OfflineBackend>) {
        let backend = Arc::new(OfflineBackend { dashboard_calls: AtomicUsize::new(0), crash_stream });
        let settings = ConsoleSettings { backend: BackendSettings::default(), ..Default::default() };
        (Console::new(settings, backend.clone()), backend)
    }

    #[tokio::test(start_paused = true)]
    async fn test_offline_run_completes_with_fallback() {
        let (mut console, _) = console();
        let started = tokio::time::Instant::now();
        console.start_run("Deploy my app");
        let mut kinds = Vec::new();
        let state = console.drive(|event, _| kinds.push(event.kind())).await;
        assert_eq!(state.status, RunStatus::Done);
        assert!(state.mock);
        assert!(state.agents.iter().all(|a| a.status == AgentStatus::Done && a.output.is_some()));
        assert_eq!(kinds.len(), 10);
        assert!(started.elapsed() <= Duration::from_millis(5200));
        assert_eq!(console.last_outcome().map(|o| o.transport), Some(Transport::Fallback));
        assert_eq!(console.dashboard().total_pipeline_runs, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_mid_run_keeps_only_second_run() {
        let (mut console, _) = console();
        let first = console.start_run("first request");
        // start, agent_start(0), agent_done(0) and agent_start(1) of the first run
        for _ in 0..4 {
            console.next_event().await;
        }
        assert_eq!(console.state().completed_agents(), 1);

        let second = console.start_run("second request");
        assert_ne!(first, second);
        assert_eq!(console.generation(), second);
        assert_eq!(console.state().request, "second request");
        assert_eq!(console.state().completed_agents(), 0);

        let state = console.drive(|_, _| {}).await;
        assert_eq!(state.status, RunStatus::Done);
        assert_eq!(state.request, "second request");
        assert_eq!(state.ignored_events, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_returns_to_idle() {
        let (mut console, _) = console();
        console.start_run("x");
        console.next_event().await;
        console.reset();
        assert_eq!(console.state().status, RunStatus::Idle);
        assert!(console.next_event().await.is_none());
    }

    #[tokio::test]
    async fn test_sync_run_http_500_is_error() {
        let (mut console, _) = console();
        let state = console.run_once("x").await;
        assert_eq!(state.status, RunStatus::Error);
        assert!(state.error.as_deref().unwrap().contains("500"));
        assert!(state.agents.iter().all(|a| a.status != AgentStatus::Done));
        assert!(console.latest_run().is_none());
    }

    #[tokio::test]
    async fn test_sync_run_marks_agents_running_then_done() {
        struct CompletingBackend;

        #[async_trait]
        impl Backend for CompletingBackend {
            fn availability(&self) -> BackendAvailability {
                BackendAvailability::Configured("http://backend.test".into())
            }
            async fn health(&self) -> Result<HealthStatus, ConsoleError> { Err(unconfigured()) }
            async fn dashboard(&self) -> Result<DashboardSummary, ConsoleError> { Err(unconfigured()) }
            async fn run_pipeline(&self) -> Result<PipelineRun, ConsoleError> {
                Ok(serde_json::from_value(serde_json::json!({
                    "run_id": "run-7",
                    "started_at": "2026-01-01T00:00:00Z",
                    "completed_at": "2026-01-01T00:00:04Z",
                    "mode": "live",
                    "events_processed": 2,
                    "auto_fixed": 2,
                    "escalated": 0,
                    "results": []
                }))?)
            }
            async fn runs(&self) -> Result<Vec<PipelineRun>, ConsoleError> { Err(unconfigured()) }
            async fn run(&self, _: &str) -> Result<PipelineRun, ConsoleError> { Err(unconfigured()) }
            async fn escalations(&self) -> Result<Vec<ReviewItem>, ConsoleError> { Err(unconfigured()) }
            async fn all_escalations(&self) -> Result<Vec<ReviewItem>, ConsoleError> { Err(unconfigured()) }
            async fn resolve_escalation(&self, _: &str, _: Resolution, _: &str) -> Result<ReviewItem, ConsoleError> {
                Err(unconfigured())
            }
            async fn events(&self) -> Result<Vec<InfraEvent>, ConsoleError> { Err(unconfigured()) }
            async fn open_stream(&self, _: &str) -> Result<ByteStream, ConsoleError> { Err(unconfigured()) }
        }

        let mut console = Console::new(ConsoleSettings::default(), Arc::new(CompletingBackend));
        let state = console.run_once("x").await;
        assert_eq!(state.status, RunStatus::Done);
        assert!(state.agents.iter().all(|a| a.status == AgentStatus::Done));
        assert_eq!(state.run_id.as_deref(), Some("run-7"));
        assert_eq!(console.dashboard().total_pipeline_runs, 1);
    }

    #[tokio::test]
    async fn test_worker_exit_without_terminal_event_fails_run() {
        let (mut console, _) = console_with(true);
        console.start_run("x");
        let mut kinds = Vec::new();
        let state = tokio::time::timeout(
            Duration::from_secs(5),
            console.drive(|event, _| kinds.push(event.kind())),
        )
        .await
        .expect("drive must return once the worker is gone");
        assert_eq!(state.status, RunStatus::Error);
        assert_eq!(state.error.as_deref(), Some(WORKER_STOPPED_MESSAGE));
        assert!(state.agents.iter().all(|a| a.status == AgentStatus::Pending));
        assert_eq!(kinds, vec![EventKind::Error]);
        assert!(matches!(
            console.last_outcome().map(|o| &o.status),
            Some(StreamStatus::Failed(_))
        ));
        assert!(console.next_event().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_dashboard_retries_timeouts() {
        let (console, backend) = console();
        let mut console = console.with_retry_config(RetryConfig { max_retries: 2, ..Default::default() });
        let err = console.refresh_dashboard().await.unwrap_err();
        assert!(matches!(err, ConsoleError::Timeout { .. }));
        assert_eq!(backend.dashboard_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_are_applied_in_order() {
        let (mut console, _) = console();
        console.start_run("x");
        let mut order = Vec::new();
        console
            .drive(|event, _| {
                if let PipelineEvent::AgentDone(p) = event {
                    order.push(p.index);
                }
            })
            .await;
        assert_eq!(order, vec![0, 1, 2, 3]);
    }
}
