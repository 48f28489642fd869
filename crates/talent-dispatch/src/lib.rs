//! Inference dispatch for candidate scoring and resume parsing.
//!
//! Requests are accumulated into batch windows, drained in concurrency-bounded
//! chunks, and sent through a failover invoker that walks the configured
//! credential slots in priority order. Model output is reduced to structured
//! JSON before any caller sees it.

pub mod config;
pub mod error;
pub mod inference;
pub mod intake;
pub mod telemetry;
