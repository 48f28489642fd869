//! Batch window, debounce timer and chunked drain.
//!
//! Requests accumulate in a [`BatchWindow`] until the size threshold is hit,
//! the debounce timer fires, or the owner calls [`BatchDispatcher::flush`].
//! Each drained batch runs `concurrency` requests at a time; the next chunk
//! starts only after every request in the current one has settled.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use futures::future::join_all;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::domain::{RequestId, ScoringRequest, ScoringResult};
use super::failover::FailoverInvoker;
use crate::config::{ConfigError, DispatchConfig};

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("dispatcher is shut down and no longer accepts requests")]
    ShutDown,
    #[error("request {0} is already pending")]
    DuplicateRequest(RequestId),
    #[error("dispatcher must be created inside a tokio runtime")]
    RuntimeUnavailable,
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),
}

/// Point-in-time counters for operators and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatcherStats {
    pub submitted: u64,
    pub batches_drained: u64,
    pub completed: u64,
    pub failed: u64,
    pub pending: usize,
}

#[derive(Debug, Clone, Copy)]
enum DrainTrigger {
    SizeThreshold,
    Debounce,
    Flush,
    Shutdown,
}

impl DrainTrigger {
    fn label(self) -> &'static str {
        match self {
            DrainTrigger::SizeThreshold => "size_threshold",
            DrainTrigger::Debounce => "debounce",
            DrainTrigger::Flush => "flush",
            DrainTrigger::Shutdown => "shutdown",
        }
    }
}

struct PendingRequest {
    request: ScoringRequest,
    responder: oneshot::Sender<ScoringResult>,
}

/// Accumulator state. Only touched with the window mutex held.
#[derive(Default)]
struct BatchWindow {
    pending: Vec<PendingRequest>,
    /// Bumped whenever the armed timer is superseded; a timer whose
    /// generation no longer matches must not drain.
    generation: u64,
    timer: Option<JoinHandle<()>>,
    drains: Vec<JoinHandle<()>>,
    closed: bool,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    batches_drained: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

struct Shared {
    invoker: Arc<FailoverInvoker>,
    config: DispatchConfig,
    runtime: Handle,
    window: Mutex<BatchWindow>,
    /// Serializes drains so overlapping batches never exceed `concurrency`.
    drain_lane: tokio::sync::Mutex<()>,
    /// Held while a shutdown awaits its drains; later callers wait behind it.
    shutdown_gate: tokio::sync::Mutex<()>,
    counters: Counters,
}

/// Accepts scoring requests and resolves each one independently.
#[derive(Clone)]
pub struct BatchDispatcher {
    shared: Arc<Shared>,
}

impl BatchDispatcher {
    pub fn new(invoker: Arc<FailoverInvoker>, config: DispatchConfig) -> Result<Self, DispatchError> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| DispatchError::RuntimeUnavailable)?;

        Ok(Self {
            shared: Arc::new(Shared {
                invoker,
                config,
                runtime,
                window: Mutex::new(BatchWindow::default()),
                drain_lane: tokio::sync::Mutex::new(()),
                shutdown_gate: tokio::sync::Mutex::new(()),
                counters: Counters::default(),
            }),
        })
    }

    pub fn invoker(&self) -> &FailoverInvoker {
        &self.shared.invoker
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.shared.config
    }

    /// Queue a request. The returned handle resolves once this request has an
    /// outcome, whatever happens to the rest of its batch.
    pub fn submit(&self, request: ScoringRequest) -> Result<ScoringHandle, DispatchError> {
        let mut window = self.shared.lock_window();
        if window.closed {
            return Err(DispatchError::ShutDown);
        }
        if window
            .pending
            .iter()
            .any(|pending| pending.request.id == request.id)
        {
            return Err(DispatchError::DuplicateRequest(request.id));
        }

        let (responder, receiver) = oneshot::channel();
        let handle = ScoringHandle {
            request_id: request.id.clone(),
            receiver,
        };
        debug!(request_id = %request.id, pending = window.pending.len() + 1, "request queued");
        window.pending.push(PendingRequest { request, responder });

        self.shared.counters.submitted.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("dispatch_requests_submitted_total").increment(1);

        if window.pending.len() >= self.shared.config.batch_size {
            self.shared.drain_now(&mut window, DrainTrigger::SizeThreshold);
        } else {
            self.shared.restart_timer(&mut window);
        }

        Ok(handle)
    }

    /// Drain whatever is pending right away. In-flight calls are unaffected.
    pub fn flush(&self) {
        let mut window = self.shared.lock_window();
        self.shared.drain_now(&mut window, DrainTrigger::Flush);
    }

    /// Stop accepting requests, drain the window and wait for every batch.
    /// Safe to call more than once; every caller returns after the last drain.
    pub async fn shutdown(&self) {
        let _gate = self.shared.shutdown_gate.lock().await;
        let drains = {
            let mut window = self.shared.lock_window();
            window.closed = true;
            self.shared.drain_now(&mut window, DrainTrigger::Shutdown);
            std::mem::take(&mut window.drains)
        };

        for drain in drains {
            if let Err(err) = drain.await {
                error!(error = %err, "drain task ended abnormally");
            }
        }
        info!("dispatcher shut down");
    }

    pub fn stats(&self) -> DispatcherStats {
        let pending = self.shared.lock_window().pending.len();
        let counters = &self.shared.counters;
        DispatcherStats {
            submitted: counters.submitted.load(Ordering::Relaxed),
            batches_drained: counters.batches_drained.load(Ordering::Relaxed),
            completed: counters.completed.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
            pending,
        }
    }
}

impl Shared {
    fn lock_window(&self) -> MutexGuard<'_, BatchWindow> {
        self.window.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn restart_timer(self: &Arc<Self>, window: &mut BatchWindow) {
        window.generation += 1;
        if let Some(timer) = window.timer.take() {
            timer.abort();
        }

        let generation = window.generation;
        let delay = self.config.debounce;
        let shared = Arc::clone(self);
        window.timer = Some(self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            shared.on_timer(generation);
        }));
    }

    fn on_timer(self: &Arc<Self>, generation: u64) {
        let mut window = self.lock_window();
        if window.generation != generation {
            return;
        }
        window.timer = None;
        self.drain_now(&mut window, DrainTrigger::Debounce);
    }

    /// Moves every pending request into a new drain. The timer is disarmed in
    /// the same critical section, so no request can be drained twice.
    fn drain_now(self: &Arc<Self>, window: &mut BatchWindow, trigger: DrainTrigger) {
        window.generation += 1;
        if let Some(timer) = window.timer.take() {
            timer.abort();
        }
        if window.pending.is_empty() {
            return;
        }

        let batch = std::mem::take(&mut window.pending);
        window.drains.retain(|drain| !drain.is_finished());

        let shared = Arc::clone(self);
        let drain = self
            .runtime
            .spawn(async move { shared.drain(batch, trigger).await });
        window.drains.push(drain);
    }

    async fn drain(self: Arc<Self>, batch: Vec<PendingRequest>, trigger: DrainTrigger) {
        let _lane = self.drain_lane.lock().await;

        info!(
            size = batch.len(),
            trigger = trigger.label(),
            concurrency = self.config.concurrency,
            "draining batch"
        );
        self.counters.batches_drained.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("dispatch_batches_drained_total", "trigger" => trigger.label())
            .increment(1);

        let mut remaining = batch.into_iter().peekable();
        let mut first_chunk = true;
        while remaining.peek().is_some() {
            if !first_chunk && !self.config.chunk_delay.is_zero() {
                tokio::time::sleep(self.config.chunk_delay).await;
            }
            first_chunk = false;

            let chunk: Vec<PendingRequest> =
                remaining.by_ref().take(self.config.concurrency).collect();
            join_all(chunk.into_iter().map(|pending| self.settle(pending))).await;
        }
    }

    async fn settle(&self, pending: PendingRequest) {
        let PendingRequest { request, responder } = pending;

        let result = match self
            .invoker
            .score(&request, request.preferred_slot)
            .await
        {
            Ok(invocation) => {
                self.counters.completed.fetch_add(1, Ordering::Relaxed);
                invocation.value
            }
            Err(err) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("dispatch_requests_failed_total").increment(1);
                warn!(request_id = %request.id, error = %err, "scoring failed; returning isolated failure");
                ScoringResult::failure(request.id.clone(), err.to_string())
            }
        };

        if responder.send(result).is_err() {
            debug!(request_id = %request.id, "caller dropped handle before result arrived");
        }
    }
}

/// Resolves to the outcome of one submitted request.
#[derive(Debug)]
pub struct ScoringHandle {
    request_id: RequestId,
    receiver: oneshot::Receiver<ScoringResult>,
}

impl ScoringHandle {
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }
}

impl Future for ScoringHandle {
    type Output = ScoringResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        Pin::new(&mut this.receiver).poll(cx).map(|outcome| {
            outcome.unwrap_or_else(|_| {
                ScoringResult::failure(
                    this.request_id.clone(),
                    "dispatcher dropped the request before it was scored",
                )
            })
        })
    }
}
