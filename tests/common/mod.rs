#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};

use agentdeck::models::{
    AgentDonePayload, AgentOutput, AgentStartPayload, CompletePayload, PipelineEvent, RunMode,
    RunSummary, StartPayload,
};
use agentdeck::pipeline::PipelineProfile;
use agentdeck::stream::encode_event;

/// How the mock backend answers `POST /pipeline/stream`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    Complete,
    ServerError,
    Truncated,
}

pub struct MockBackend {
    pub stream_mode: Mutex<StreamMode>,
    pub escalations: Mutex<Vec<Value>>,
    pub stream_requests: Mutex<Vec<String>>,
    pub resolve_calls: AtomicUsize,
}

impl MockBackend {
    pub fn new(stream_mode: StreamMode) -> Arc<Self> {
        Arc::new(Self {
            stream_mode: Mutex::new(stream_mode),
            escalations: Mutex::new(vec![
                json!({
                    "escalation_id": "esc-1",
                    "status": "PENDING",
                    "created_at": "2026-10-01T09:00:00Z",
                    "event": {
                        "id": "evt-1",
                        "source": "cloudwatch",
                        "severity": "CRITICAL",
                        "service": "payments-api",
                        "resource": "i-0abc",
                        "message": "CPU above 95% for 10 minutes"
                    },
                    "analysis": {
                        "root_cause": "Runaway batch job",
                        "confidence": 0.72,
                        "reasoning_steps": ["CPU spike", "Batch job started at 08:58"],
                        "recommended_action": "Scale out the service"
                    }
                }),
                json!({
                    "id": "esc-2",
                    "severity": "low",
                    "title": "Disk usage warning",
                    "status": "approved",
                    "resolved_by": "sam"
                }),
            ]),
            stream_requests: Mutex::new(Vec::new()),
            resolve_calls: AtomicUsize::new(0),
        })
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }
}

pub fn live_summary() -> RunSummary {
    RunSummary {
        run_id: "run-live-1".into(),
        started_at: Utc.with_ymd_and_hms(2026, 10, 1, 9, 0, 0).unwrap(),
        mode: Some(RunMode::Live),
        model: Some("claude-sonnet".into()),
        events_processed: 5,
        auto_fixed: 3,
        escalated: 1,
        total_savings_usd: 1250.0,
        severity_breakdown: [("critical".to_string(), 1), ("high".to_string(), 4)].into_iter().collect(),
    }
}

/// Events a healthy backend streams for the devops profile.
pub fn live_events(request: &str) -> Vec<PipelineEvent> {
    let agents = PipelineProfile::Devops.agents();
    let mut events = vec![PipelineEvent::Start(StartPayload {
        request: request.to_string(),
        agents: agents.len(),
        mock: false,
        run_id: Some("run-live-1".into()),
    })];
    for (index, agent) in agents.iter().enumerate() {
        events.push(PipelineEvent::AgentStart(AgentStartPayload {
            agent: agent.name.clone(),
            index,
            message: None,
        }));
        events.push(PipelineEvent::AgentDone(AgentDonePayload {
            agent: agent.name.clone(),
            index,
            output: AgentOutput::Text(format!("## {}\n\nlive output", agent.label)),
            duration_ms: Some(120),
            mock: false,
        }));
    }
    events.push(PipelineEvent::Complete(CompletePayload {
        message: Some("Pipeline complete".into()),
        mock: false,
        mode: Some(RunMode::Live),
        model: Some("claude-sonnet".into()),
        summary: Some(live_summary()),
    }));
    events
}

fn sse_body(events: &[PipelineEvent]) -> String {
    events.iter().map(|e| encode_event(e).unwrap()).collect()
}

async fn health() -> Json<Value> {
    Json(json!({"ok": true, "timestamp": "2026-10-01T09:00:00Z"}))
}

async fn stream(State(mock): State<Arc<MockBackend>>, Json(body): Json<Value>) -> Response {
    let request = body["request"].as_str().unwrap_or_default().to_string();
    mock.stream_requests.lock().unwrap().push(request.clone());
    let mode = *mock.stream_mode.lock().unwrap();
    let events = live_events(&request);
    let body = match mode {
        StreamMode::ServerError => {
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
        StreamMode::Complete => sse_body(&events),
        StreamMode::Truncated => sse_body(&events[..2]),
    };
    ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
}

fn sync_run() -> Value {
    json!({
        "pipeline_run_id": "run-sync-1",
        "started_at": "2026-10-01T10:00:00Z",
        "completed_at": "2026-10-01T10:00:07Z",
        "mode": "sandbox",
        "total_incidents": 2,
        "auto_remediated": 1,
        "pending_hitl": 1,
        "total_savings_usd": 400.0,
        "results": []
    })
}

async fn run_pipeline() -> Json<Value> {
    Json(sync_run())
}

async fn runs() -> Json<Value> {
    let older = json!({
        "run_id": "run-old",
        "started_at": "2026-09-30T10:00:00Z",
        "mode": "live"
    });
    Json(json!({"runs": [older, sync_run()], "count": 2}))
}

async fn run_by_id(Path(id): Path<String>) -> Response {
    if id == "run-sync-1" {
        Json(sync_run()).into_response()
    } else {
        (StatusCode::NOT_FOUND, Json(json!({"error": "Run not found"}))).into_response()
    }
}

async fn events() -> Json<Value> {
    Json(json!({
        "events": [
            {"id": "evt-1", "source": "cloudwatch", "severity": "CRITICAL", "service": "payments-api", "message": "CPU above 95%"},
            {"id": "evt-2", "source": "datadog", "severity": "LOW", "service": "search", "message": "Slow query"}
        ],
        "count": 2
    }))
}

async fn dashboard() -> Json<Value> {
    Json(json!({
        "total_incidents": 42,
        "severity_breakdown": {"critical": 2, "high": 10, "medium": 30},
        "pending_hitl": 1,
        "total_pipeline_runs": 7,
        "auto_remediated": 20,
        "total_monthly_savings_usd": 12500.5,
        "last_run": "2026-10-01T08:00:00Z",
        "mode": "live"
    }))
}

async fn escalations(State(mock): State<Arc<MockBackend>>) -> Json<Value> {
    let items: Vec<Value> = mock
        .escalations
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e["status"].as_str().map(|s| s.eq_ignore_ascii_case("pending")).unwrap_or(false))
        .cloned()
        .collect();
    let count = items.len();
    Json(json!({"escalations": items, "count": count}))
}

async fn all_escalations(State(mock): State<Arc<MockBackend>>) -> Json<Value> {
    let items = mock.escalations.lock().unwrap().clone();
    let count = items.len();
    Json(json!({"escalations": items, "count": count}))
}

async fn resolve(
    State(mock): State<Arc<MockBackend>>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    mock.resolve_calls.fetch_add(1, Ordering::SeqCst);
    let resolution = body["resolution"].as_str().unwrap_or_default().to_string();
    if !["approved", "rejected", "deferred"].contains(&resolution.as_str()) {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid resolution"}))).into_response();
    }
    let mut items = mock.escalations.lock().unwrap();
    let Some(item) = items
        .iter_mut()
        .find(|e| e["escalation_id"] == id.as_str() || e["id"] == id.as_str())
    else {
        return (StatusCode::NOT_FOUND, Json(json!({"error": "not found"}))).into_response();
    };
    item["status"] = json!(resolution);
    item["resolved_by"] = body["resolved_by"].clone();
    item["resolved_at"] = json!("2026-10-01T09:30:00Z");
    Json(item.clone()).into_response()
}

pub fn router(mock: Arc<MockBackend>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/pipeline/stream", post(stream))
        .route("/pipeline/run", post(run_pipeline))
        .route("/pipeline/runs", get(runs))
        .route("/pipeline/runs/:id", get(run_by_id))
        .route("/events", get(events))
        .route("/dashboard/summary", get(dashboard))
        .route("/escalations", get(escalations))
        .route("/escalations/all", get(all_escalations))
        .route("/escalations/:id/resolve", post(resolve))
        .with_state(mock)
}

/// Serve the mock backend on an ephemeral port and return its base URL.
pub async fn spawn(mock: Arc<MockBackend>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(mock)).await.unwrap();
    });
    format!("http://{}", addr)
}
