use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::DispatchConfig;
use crate::inference::credentials::{BackendError, CredentialPool, ModelBackend};
use crate::inference::dispatcher::BatchDispatcher;
use crate::inference::domain::{CredentialSlot, ModelPrompt, ScoringPayload, ScoringRequest};
use crate::inference::failover::FailoverInvoker;

pub(super) const FLAG_REPLY: &str =
    r#"{"score":72,"status":"FLAG","reasoning":"partial match"}"#;

pub(super) const POISON: &str = "POISON-PILL";

#[derive(Clone)]
pub(super) enum Script {
    Reply(String),
    Fail(BackendError),
    /// Fails whenever the prompt mentions the marker, replies otherwise.
    FailOnMarker { marker: &'static str, reply: String },
    /// Alternates failure and success, starting with a failure.
    Flaky(String),
    Hang,
}

pub(super) struct ScriptedBackend {
    script: Script,
    latency: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedBackend {
    pub(super) fn new(script: Script) -> Arc<Self> {
        Self::with_latency(script, Duration::ZERO)
    }

    pub(super) fn with_latency(script: Script, latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            script,
            latency,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    pub(super) fn replying(reply: &str) -> Arc<Self> {
        Self::new(Script::Reply(reply.to_string()))
    }

    pub(super) fn failing() -> Arc<Self> {
        Self::new(Script::Fail(BackendError::RateLimited))
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(super) fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
    async fn generate(&self, prompt: &ModelPrompt) -> Result<String, BackendError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let outcome = match &self.script {
            Script::Reply(reply) => Ok(reply.clone()),
            Script::Fail(err) => Err(err.clone()),
            Script::FailOnMarker { marker, reply } => {
                if prompt.text.contains(marker) {
                    Err(BackendError::Status {
                        status: 500,
                        body: "upstream exploded".to_string(),
                    })
                } else {
                    Ok(reply.clone())
                }
            }
            Script::Flaky(reply) => {
                if call % 2 == 0 {
                    Err(BackendError::Transport("connection reset".to_string()))
                } else {
                    Ok(reply.clone())
                }
            }
            Script::Hang => std::future::pending().await,
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

pub(super) fn pool(slots: &[(CredentialSlot, &Arc<ScriptedBackend>)]) -> Arc<CredentialPool> {
    let builder = slots
        .iter()
        .fold(CredentialPool::builder(), |builder, (slot, backend)| {
            let shared: Arc<dyn ModelBackend> = Arc::clone(*backend) as Arc<dyn ModelBackend>;
            builder.shared_backend(*slot, shared)
        });
    Arc::new(builder.build())
}

pub(super) fn invoker(slots: &[(CredentialSlot, &Arc<ScriptedBackend>)]) -> FailoverInvoker {
    FailoverInvoker::new(pool(slots))
}

pub(super) fn dispatch_config(
    batch_size: usize,
    debounce_ms: u64,
    concurrency: usize,
    chunk_delay_ms: u64,
) -> DispatchConfig {
    DispatchConfig {
        batch_size,
        debounce: Duration::from_millis(debounce_ms),
        concurrency,
        chunk_delay: Duration::from_millis(chunk_delay_ms),
        call_timeout: None,
    }
}

pub(super) fn dispatcher(
    slots: &[(CredentialSlot, &Arc<ScriptedBackend>)],
    config: DispatchConfig,
) -> BatchDispatcher {
    BatchDispatcher::new(Arc::new(invoker(slots)), config).expect("dispatcher builds in runtime")
}

pub(super) fn request(id: &str) -> ScoringRequest {
    ScoringRequest::new(ScoringPayload {
        job_description: "Senior backend engineer, Rust and Postgres".to_string(),
        candidate_text: format!("Candidate {id}: eight years building services"),
        company_context: Some("Series B logistics startup".to_string()),
    })
    .with_id(id)
}

pub(super) fn poisoned_request(id: &str) -> ScoringRequest {
    let mut request = request(id);
    request.payload.candidate_text = format!("{POISON} candidate {id}");
    request
}
