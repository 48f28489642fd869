//! Candidate scoring and resume parsing against remote language models.
//!
//! Composition, leaf first: [`CredentialPool`] owns one backend per configured
//! slot, [`extract`] turns raw model text into JSON, [`FailoverInvoker`] walks
//! the slots in priority order, and [`BatchDispatcher`] batches submissions and
//! drains them under a concurrency bound.

pub mod backend;
pub mod credentials;
pub mod dispatcher;
pub mod domain;
pub mod extract;
pub mod failover;
pub mod prompt;

#[cfg(test)]
mod tests;

pub use backend::GenerativeLanguageBackend;
pub use credentials::{BackendError, CredentialPool, CredentialPoolBuilder, ModelBackend, PoolError};
pub use dispatcher::{BatchDispatcher, DispatchError, DispatcherStats, ScoringHandle};
pub use domain::{
    CredentialSlot, ModelPrompt, RequestId, ResumeProfile, ScoringPayload, ScoringRequest,
    ScoringResult, ScreeningStatus, UnknownSlot, WorkHistoryEntry,
};
pub use extract::{extract, ExtractError};
pub use failover::{attempt_order, AttemptFailure, FailoverInvoker, Invocation, InvocationError};
