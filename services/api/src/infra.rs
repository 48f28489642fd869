use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use talent_dispatch::config::AppConfig;
use talent_dispatch::error::AppError;
use talent_dispatch::inference::{BatchDispatcher, CredentialPool, FailoverInvoker};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Composition root for the dispatch stack. Must run inside the tokio runtime.
pub(crate) fn build_dispatcher(config: &AppConfig) -> Result<BatchDispatcher, AppError> {
    let pool = CredentialPool::from_config(&config.credentials, config.dispatch.call_timeout)?;
    let invoker =
        FailoverInvoker::new(Arc::new(pool)).with_call_timeout(config.dispatch.call_timeout);
    let dispatcher = BatchDispatcher::new(Arc::new(invoker), config.dispatch.clone())?;
    Ok(dispatcher)
}

pub(crate) async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "unable to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
