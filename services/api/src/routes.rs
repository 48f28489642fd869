use crate::infra::AppState;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use talent_dispatch::error::AppError;
use talent_dispatch::inference::{
    BatchDispatcher, CredentialSlot, DispatcherStats, ResumeProfile, ScoringPayload,
    ScoringRequest, ScoringResult,
};

#[derive(Debug, Deserialize)]
pub(crate) struct ScoringSubmission {
    #[serde(default)]
    pub(crate) id: Option<String>,
    pub(crate) job_description: String,
    pub(crate) candidate_text: String,
    #[serde(default)]
    pub(crate) company_context: Option<String>,
    #[serde(default)]
    pub(crate) preferred_slot: Option<CredentialSlot>,
}

impl ScoringSubmission {
    fn into_request(self) -> ScoringRequest {
        let mut request = ScoringRequest::new(ScoringPayload {
            job_description: self.job_description,
            candidate_text: self.candidate_text,
            company_context: self.company_context,
        });
        if let Some(id) = self.id {
            request = request.with_id(id);
        }
        request.preferred_slot = self.preferred_slot;
        request
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResumeParseRequest {
    pub(crate) resume_text: String,
    #[serde(default)]
    pub(crate) preferred_slot: Option<CredentialSlot>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ResumeParseResponse {
    pub(crate) profile: ResumeProfile,
    pub(crate) served_by: CredentialSlot,
    pub(crate) failed_attempts: usize,
}

pub(crate) fn with_dispatch_routes(dispatcher: BatchDispatcher) -> Router {
    Router::new()
        .route("/api/v1/scoring", post(scoring_endpoint))
        .route("/api/v1/resumes/parse", post(resume_parse_endpoint))
        .route("/api/v1/dispatch/stats", get(stats_endpoint))
        .with_state(dispatcher)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Waits for this request's own outcome; failures come back as a rejected result.
pub(crate) async fn scoring_endpoint(
    State(dispatcher): State<BatchDispatcher>,
    Json(submission): Json<ScoringSubmission>,
) -> Result<Json<ScoringResult>, AppError> {
    let handle = dispatcher.submit(submission.into_request())?;
    Ok(Json(handle.await))
}

pub(crate) async fn resume_parse_endpoint(
    State(dispatcher): State<BatchDispatcher>,
    Json(request): Json<ResumeParseRequest>,
) -> Result<Json<ResumeParseResponse>, AppError> {
    let invocation = dispatcher
        .invoker()
        .parse_resume(&request.resume_text, request.preferred_slot)
        .await?;

    Ok(Json(ResumeParseResponse {
        profile: invocation.value,
        served_by: invocation.slot,
        failed_attempts: invocation.failed_attempts.len(),
    }))
}

pub(crate) async fn stats_endpoint(State(dispatcher): State<BatchDispatcher>) -> Json<DispatcherStats> {
    Json(dispatcher.stats())
}
