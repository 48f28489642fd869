use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, error, warn};

use super::credentials::{BackendError, CredentialPool, PoolError};
use super::domain::{CredentialSlot, ModelPrompt, ResumeProfile, ScoringRequest, ScoringResult};
use super::extract::{extract, ExtractError};
use super::prompt::{decode_resume, decode_scoring, resume_prompt, scoring_prompt};

/// One failed attempt against one configured slot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttemptFailure {
    #[error("{slot}: remote call failed: {source}")]
    RemoteCallFailed {
        slot: CredentialSlot,
        #[source]
        source: BackendError,
    },
    #[error("{slot}: {source}")]
    MalformedResponse {
        slot: CredentialSlot,
        #[source]
        source: ExtractError,
    },
}

impl AttemptFailure {
    pub fn slot(&self) -> CredentialSlot {
        match self {
            AttemptFailure::RemoteCallFailed { slot, .. }
            | AttemptFailure::MalformedResponse { slot, .. } => *slot,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AttemptFailure::RemoteCallFailed { source, .. } => source.kind(),
            AttemptFailure::MalformedResponse { .. } => "malformed",
        }
    }
}

/// Terminal failure after the whole attempt order was walked.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvocationError {
    #[error("no model credential is configured")]
    NoCredentialConfigured,
    #[error("all {attempts} configured credentials failed; last error: {last}")]
    AllCredentialsExhausted {
        attempts: usize,
        #[source]
        last: AttemptFailure,
    },
}

/// Successful invocation along with the attempts that failed before it.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation<T> {
    pub value: T,
    pub slot: CredentialSlot,
    pub failed_attempts: Vec<AttemptFailure>,
}

/// Natural slot priority, optionally with one slot promoted to the front.
pub fn attempt_order(preferred: Option<CredentialSlot>) -> Vec<CredentialSlot> {
    let mut order = Vec::with_capacity(CredentialSlot::ALL.len());
    order.extend(preferred);
    order.extend(
        CredentialSlot::ALL
            .into_iter()
            .filter(|slot| Some(*slot) != preferred),
    );
    order
}

/// Walks credential slots until one returns a usable structured response.
#[derive(Debug, Clone)]
pub struct FailoverInvoker {
    pool: Arc<CredentialPool>,
    call_timeout: Option<Duration>,
}

impl FailoverInvoker {
    pub fn new(pool: Arc<CredentialPool>) -> Self {
        Self {
            pool,
            call_timeout: None,
        }
    }

    /// Abandons a remote call that has not answered within `timeout`.
    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn pool(&self) -> &CredentialPool {
        &self.pool
    }

    pub async fn score(
        &self,
        request: &ScoringRequest,
        preferred: Option<CredentialSlot>,
    ) -> Result<Invocation<ScoringResult>, InvocationError> {
        let prompt = scoring_prompt(&request.payload);
        self.invoke_with(&prompt, preferred, |slot, value| {
            decode_scoring(&request.id, slot, value)
        })
        .await
    }

    pub async fn parse_resume(
        &self,
        resume_text: &str,
        preferred: Option<CredentialSlot>,
    ) -> Result<Invocation<ResumeProfile>, InvocationError> {
        let prompt = resume_prompt(resume_text);
        self.invoke_with(&prompt, preferred, |_, value| decode_resume(value))
            .await
    }

    pub async fn invoke_with<T, F>(
        &self,
        prompt: &ModelPrompt,
        preferred: Option<CredentialSlot>,
        decode: F,
    ) -> Result<Invocation<T>, InvocationError>
    where
        F: Fn(CredentialSlot, Value) -> Result<T, ExtractError>,
    {
        let mut failed_attempts: Vec<AttemptFailure> = Vec::new();

        for slot in attempt_order(preferred) {
            if !self.pool.is_configured(slot) {
                continue;
            }

            let failure = match self.call(slot, prompt).await {
                Ok(raw) => match extract(&raw).and_then(|value| decode(slot, value)) {
                    Ok(value) => {
                        debug!(%slot, failed = failed_attempts.len(), "model call succeeded");
                        return Ok(Invocation {
                            value,
                            slot,
                            failed_attempts,
                        });
                    }
                    Err(source) => AttemptFailure::MalformedResponse { slot, source },
                },
                Err(PoolError::RemoteCallFailed { source, .. }) => {
                    AttemptFailure::RemoteCallFailed { slot, source }
                }
                Err(PoolError::CredentialUnavailable(_)) => continue,
            };

            warn!(%slot, error = %failure, "attempt failed, trying next credential");
            metrics::counter!(
                "inference_attempt_failures_total",
                "slot" => slot.label(),
                "kind" => failure.kind()
            )
            .increment(1);
            failed_attempts.push(failure);
        }

        let attempts = failed_attempts.len();
        match failed_attempts.pop() {
            Some(last) => {
                error!(attempts, error = %last, "all credentials exhausted");
                Err(InvocationError::AllCredentialsExhausted { attempts, last })
            }
            None => Err(InvocationError::NoCredentialConfigured),
        }
    }

    async fn call(&self, slot: CredentialSlot, prompt: &ModelPrompt) -> Result<String, PoolError> {
        let Some(limit) = self.call_timeout else {
            return self.pool.invoke(slot, prompt).await;
        };

        match tokio::time::timeout(limit, self.pool.invoke(slot, prompt)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(PoolError::RemoteCallFailed {
                slot,
                source: BackendError::Timeout {
                    elapsed_ms: limit.as_millis() as u64,
                },
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_order_is_natural_priority() {
        assert_eq!(
            attempt_order(None),
            vec![
                CredentialSlot::Primary,
                CredentialSlot::Secondary,
                CredentialSlot::Tertiary
            ]
        );
    }

    #[test]
    fn preferred_slot_moves_to_front() {
        assert_eq!(
            attempt_order(Some(CredentialSlot::Secondary)),
            vec![
                CredentialSlot::Secondary,
                CredentialSlot::Primary,
                CredentialSlot::Tertiary
            ]
        );
        assert_eq!(
            attempt_order(Some(CredentialSlot::Tertiary)),
            vec![
                CredentialSlot::Tertiary,
                CredentialSlot::Primary,
                CredentialSlot::Secondary
            ]
        );
    }
}
