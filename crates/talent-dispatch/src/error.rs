use crate::config::ConfigError;
use crate::inference::{BackendError, DispatchError, InvocationError};
use crate::intake::IntakeError;
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Intake(IntakeError),
    Backend(BackendError),
    Dispatch(DispatchError),
    Inference(InvocationError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Intake(err) => write!(f, "intake error: {}", err),
            AppError::Backend(err) => write!(f, "model backend error: {}", err),
            AppError::Dispatch(err) => write!(f, "dispatch error: {}", err),
            AppError::Inference(err) => write!(f, "inference error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Intake(err) => Some(err),
            AppError::Backend(err) => Some(err),
            AppError::Dispatch(err) => Some(err),
            AppError::Inference(err) => Some(err),
        }
    }
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Intake(_) => StatusCode::BAD_REQUEST,
            AppError::Dispatch(DispatchError::DuplicateRequest(_)) => StatusCode::CONFLICT,
            AppError::Dispatch(DispatchError::ShutDown) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Inference(_) => StatusCode::BAD_GATEWAY,
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Backend(_)
            | AppError::Dispatch(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<IntakeError> for AppError {
    fn from(value: IntakeError) -> Self {
        Self::Intake(value)
    }
}

impl From<BackendError> for AppError {
    fn from(value: BackendError) -> Self {
        Self::Backend(value)
    }
}

impl From<DispatchError> for AppError {
    fn from(value: DispatchError) -> Self {
        Self::Dispatch(value)
    }
}

impl From<InvocationError> for AppError {
    fn from(value: InvocationError) -> Self {
        Self::Inference(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::RequestId;

    #[test]
    fn maps_caller_mistakes_to_client_errors() {
        let duplicate = AppError::from(DispatchError::DuplicateRequest(RequestId(
            "cand-1".to_string(),
        )));
        assert_eq!(duplicate.status(), StatusCode::CONFLICT);

        let closed = AppError::from(DispatchError::ShutDown);
        assert_eq!(closed.status(), StatusCode::SERVICE_UNAVAILABLE);

        let exhausted = AppError::from(InvocationError::NoCredentialConfigured);
        assert_eq!(exhausted.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn renders_error_body() {
        let response = AppError::from(ConfigError::InvalidPort).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
