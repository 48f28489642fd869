use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::backend::GenerativeLanguageBackend;
use super::domain::{CredentialSlot, ModelPrompt};
use crate::config::CredentialConfig;

/// One remote model endpoint bound to one credential.
///
/// A call is a single attempt; retrying and failover belong to the caller.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn generate(&self, prompt: &ModelPrompt) -> Result<String, BackendError>;
}

/// Failure reported by a backend call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("rate limited by provider")]
    RateLimited,
    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("provider response had no text")]
    EmptyResponse,
    #[error("call timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },
}

impl BackendError {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            BackendError::Transport(_) => "transport",
            BackendError::RateLimited => "rate_limited",
            BackendError::Status { .. } => "status",
            BackendError::EmptyResponse => "empty",
            BackendError::Timeout { .. } => "timeout",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("no credential configured for the {0} slot")]
    CredentialUnavailable(CredentialSlot),
    #[error("remote call via {slot} failed: {source}")]
    RemoteCallFailed {
        slot: CredentialSlot,
        #[source]
        source: BackendError,
    },
}

/// Fixed mapping of credential slots to backends, built once at startup.
#[derive(Clone, Default)]
pub struct CredentialPool {
    backends: BTreeMap<CredentialSlot, Arc<dyn ModelBackend>>,
}

impl fmt::Debug for CredentialPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPool")
            .field("configured", &self.configured_slots())
            .finish()
    }
}

impl CredentialPool {
    pub fn builder() -> CredentialPoolBuilder {
        CredentialPoolBuilder::default()
    }

    /// Binds an HTTP backend to every slot whose key is present. Each client
    /// gives up on a request after `request_timeout`.
    pub fn from_config(
        config: &CredentialConfig,
        request_timeout: Option<Duration>,
    ) -> Result<Self, BackendError> {
        let mut builder = Self::builder();
        for slot in CredentialSlot::ALL {
            if let Some(key) = config.key(slot) {
                let backend = GenerativeLanguageBackend::new(
                    &config.base_url,
                    &config.model,
                    key.clone(),
                    request_timeout,
                )?;
                builder = builder.backend(slot, backend);
            }
        }

        let pool = builder.build();
        if pool.any_configured() {
            tracing::info!(slots = ?pool.configured_slots(), "credential pool ready");
        } else {
            tracing::warn!("no model credentials configured; every request will fail");
        }
        Ok(pool)
    }

    pub fn is_configured(&self, slot: CredentialSlot) -> bool {
        self.backends.contains_key(&slot)
    }

    pub fn any_configured(&self) -> bool {
        !self.backends.is_empty()
    }

    pub fn configured_slots(&self) -> Vec<CredentialSlot> {
        self.backends.keys().copied().collect()
    }

    pub async fn invoke(
        &self,
        slot: CredentialSlot,
        prompt: &ModelPrompt,
    ) -> Result<String, PoolError> {
        let backend = self
            .backends
            .get(&slot)
            .ok_or(PoolError::CredentialUnavailable(slot))?;

        backend
            .generate(prompt)
            .await
            .map_err(|source| PoolError::RemoteCallFailed { slot, source })
    }
}

#[derive(Default)]
pub struct CredentialPoolBuilder {
    backends: BTreeMap<CredentialSlot, Arc<dyn ModelBackend>>,
}

impl CredentialPoolBuilder {
    pub fn backend<B>(self, slot: CredentialSlot, backend: B) -> Self
    where
        B: ModelBackend + 'static,
    {
        self.shared_backend(slot, Arc::new(backend))
    }

    pub fn shared_backend(mut self, slot: CredentialSlot, backend: Arc<dyn ModelBackend>) -> Self {
        self.backends.insert(slot, backend);
        self
    }

    pub fn build(self) -> CredentialPool {
        CredentialPool {
            backends: self.backends,
        }
    }
}
