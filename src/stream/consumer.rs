//! One streaming connection per run, dispatched in arrival order.

use std::cell::Cell;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{debug, info, warn};

use crate::client::{Backend, ByteStream};
use crate::config::ConsoleSettings;
use crate::models::PipelineEvent;
use super::codec::FrameDecoder;
use super::fallback::FallbackProducer;

pub const STREAM_ENDED_MESSAGE: &str = "stream ended before the pipeline completed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Live,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamStatus {
    Completed,
    Failed(String),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOutcome {
    pub status: StreamStatus,
    pub transport: Transport,
    pub events: usize,
}

thread_local! {
    /// Gate whose callback is running on this thread, 0 when none.
    static DISPATCHING: Cell<usize> = const { Cell::new(0) };
}

/// Serializes dispatch against `cancel()` so no callback runs after cancel returns.
#[derive(Clone)]
struct DispatchGate {
    token: CancellationToken,
    lock: Arc<Mutex<()>>,
}

/// Restores the previous `DISPATCHING` value, also when the callback panics.
struct DispatchScope {
    previous: usize,
}

impl DispatchScope {
    fn enter(gate: usize) -> Self {
        Self { previous: DISPATCHING.with(|d| d.replace(gate)) }
    }
}

impl Drop for DispatchScope {
    fn drop(&mut self) {
        DISPATCHING.with(|d| d.set(self.previous));
    }
}

impl DispatchGate {
    fn new() -> Self {
        Self { token: CancellationToken::new(), lock: Arc::new(Mutex::new(())) }
    }

    fn id(&self) -> usize {
        Arc::as_ptr(&self.lock) as usize
    }

    fn cancel(&self) {
        // Called from inside our own callback: the lock is already held by this
        // thread and dispatch re-checks the token before the next callback.
        if DISPATCHING.with(|d| d.get()) == self.id() {
            self.token.cancel();
            return;
        }
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        self.token.cancel();
    }

    fn dispatch<F: FnMut(PipelineEvent)>(&self, on_event: &mut F, event: PipelineEvent) -> bool {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if self.token.is_cancelled() {
            return false;
        }
        let _scope = DispatchScope::enter(self.id());
        on_event(event);
        true
    }
}

pub struct StreamHandle {
    gate: DispatchGate,
    finished: CancellationToken,
    task: JoinHandle<StreamOutcome>,
}

impl StreamHandle {
    /// Stop the run. No callback fires once this returns.
    pub fn cancel(&self) {
        self.gate.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.gate.token.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Resolves once the worker task has stopped, whether it returned or panicked.
    pub fn finished(&self) -> WaitForCancellationFuture<'_> {
        self.finished.cancelled()
    }

    pub async fn join(self) -> StreamOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => StreamOutcome {
                status: StreamStatus::Failed(format!("stream task failed: {}", e)),
                transport: Transport::Live,
                events: 0,
            },
        }
    }
}

#[derive(Clone)]
pub struct StreamConsumer {
    backend: Arc<dyn Backend>,
    fallback: FallbackProducer,
    allow_fallback: bool,
    idle_timeout: Duration,
}

impl StreamConsumer {
    pub fn new(
        backend: Arc<dyn Backend>,
        fallback: FallbackProducer,
        allow_fallback: bool,
        idle_timeout: Duration,
    ) -> Self {
        Self { backend, fallback, allow_fallback, idle_timeout }
    }

    pub fn from_settings(backend: Arc<dyn Backend>, settings: &ConsoleSettings) -> Self {
        Self::new(
            backend,
            FallbackProducer::new(settings.agents.clone(), settings.fallback.clone()),
            settings.backend.allow_fallback,
            settings.backend.stream_timeout,
        )
    }

    /// Spawn the run. `on_event` is called once per event, in order.
    pub fn start<F>(&self, request: &str, on_event: F) -> StreamHandle
    where
        F: FnMut(PipelineEvent) + Send + 'static,
    {
        let gate = DispatchGate::new();
        let run = StreamRun {
            consumer: self.clone(),
            request: request.to_string(),
            gate: gate.clone(),
            dispatched: 0,
        };
        let finished = CancellationToken::new();
        let guard = finished.clone().drop_guard();
        let task = tokio::spawn(async move {
            let _guard = guard;
            run.execute(on_event).await
        });
        StreamHandle { gate, finished, task }
    }
}

struct StreamRun {
    consumer: StreamConsumer,
    request: String,
    gate: DispatchGate,
    dispatched: usize,
}

impl StreamRun {
    async fn execute<F: FnMut(PipelineEvent)>(mut self, mut on_event: F) -> StreamOutcome {
        let token = self.gate.token.clone();
        let opened = tokio::select! {
            _ = token.cancelled() => return self.outcome(StreamStatus::Cancelled, Transport::Live),
            opened = self.consumer.backend.open_stream(&self.request) => opened,
        };

        match opened {
            Ok(stream) => {
                info!(request = %self.request, "Streaming pipeline run from backend");
                self.consume_live(stream, &mut on_event).await
            }
            Err(e) => {
                let class = e.classify();
                if self.consumer.allow_fallback && class.fallback_eligible {
                    warn!(error = %e, error_type = class.error_type, "Backend stream unavailable, using fallback");
                    self.play_fallback(&mut on_event).await
                } else {
                    warn!(error = %e, "Backend stream unavailable");
                    let message = e.to_string();
                    self.emit(&mut on_event, PipelineEvent::error(message.clone()));
                    self.outcome(StreamStatus::Failed(message), Transport::Live)
                }
            }
        }
    }

    async fn consume_live<F: FnMut(PipelineEvent)>(
        &mut self,
        mut stream: ByteStream,
        on_event: &mut F,
    ) -> StreamOutcome {
        let token = self.gate.token.clone();
        let idle = self.consumer.idle_timeout;
        let mut decoder = FrameDecoder::new();

        loop {
            let next = tokio::select! {
                _ = token.cancelled() => return self.outcome(StreamStatus::Cancelled, Transport::Live),
                next = tokio::time::timeout(idle, stream.next()) => next,
            };

            let chunk = match next {
                Err(_) => {
                    let message = format!("no event received for {}s", idle.as_secs());
                    return self.fail(on_event, message);
                }
                Ok(None) => break,
                Ok(Some(Err(e))) => {
                    warn!(error = %e, "Stream read failed");
                    return self.fail(on_event, format!("{}: {}", STREAM_ENDED_MESSAGE, e));
                }
                Ok(Some(Ok(chunk))) => chunk,
            };

            for frame in decoder.push(&chunk) {
                let event = match PipelineEvent::from_frame(&frame) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(error = %e, kind = %frame.event, "Dropping malformed frame");
                        continue;
                    }
                };
                debug!(kind = %event.kind(), "Stream event");
                let terminal = event.is_terminal();
                let failed = match &event {
                    PipelineEvent::Error(p) => Some(p.message.clone()),
                    _ => None,
                };
                if !self.emit(on_event, event) {
                    return self.outcome(StreamStatus::Cancelled, Transport::Live);
                }
                if terminal {
                    let status = match failed {
                        Some(message) => StreamStatus::Failed(message),
                        None => StreamStatus::Completed,
                    };
                    return self.outcome(status, Transport::Live);
                }
            }
        }

        if let Err(e) = decoder.finish() {
            warn!(error = %e, "Discarding truncated frame");
        }
        self.fail(on_event, STREAM_ENDED_MESSAGE.to_string())
    }

    async fn play_fallback<F: FnMut(PipelineEvent)>(&mut self, on_event: &mut F) -> StreamOutcome {
        let gate = self.gate.clone();
        let producer = self.consumer.fallback.clone();
        let mut dispatched = 0;
        let finished = producer
            .play(&self.request, &gate.token, |event| {
                if gate.dispatch(on_event, event) {
                    dispatched += 1;
                }
            })
            .await;
        self.dispatched += dispatched;
        let status = if finished && !gate.token.is_cancelled() {
            StreamStatus::Completed
        } else {
            StreamStatus::Cancelled
        };
        self.outcome(status, Transport::Fallback)
    }

    fn emit<F: FnMut(PipelineEvent)>(&mut self, on_event: &mut F, event: PipelineEvent) -> bool {
        let delivered = self.gate.dispatch(on_event, event);
        if delivered {
            self.dispatched += 1;
        }
        delivered
    }

    fn fail<F: FnMut(PipelineEvent)>(&mut self, on_event: &mut F, message: String) -> StreamOutcome {
        if !self.emit(on_event, PipelineEvent::error(message.clone())) {
            return self.outcome(StreamStatus::Cancelled, Transport::Live);
        }
        self.outcome(StreamStatus::Failed(message), Transport::Live)
    }

    fn outcome(&self, status: StreamStatus, transport: Transport) -> StreamOutcome {
        info!(?status, ?transport, events = self.dispatched, "Stream finished");
        StreamOutcome { status, transport, events: self.dispatched }
    }
}
