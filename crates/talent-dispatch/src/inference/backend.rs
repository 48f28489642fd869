//! HTTP client for the Generative Language `generateContent` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::credentials::{BackendError, ModelBackend};
use super::domain::ModelPrompt;
use crate::config::ApiKey;

/// Longest error body kept from a failed provider response.
const ERROR_BODY_LIMIT: usize = 300;

pub struct GenerativeLanguageBackend {
    client: Client,
    endpoint: String,
    api_key: ApiKey,
    request_timeout: Option<Duration>,
}

impl GenerativeLanguageBackend {
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: ApiKey,
        request_timeout: Option<Duration>,
    ) -> Result<Self, BackendError> {
        let mut builder = Client::builder();
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|err| BackendError::Transport(err.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint_url(base_url, model),
            api_key,
            request_timeout,
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> BackendError {
        match self.request_timeout {
            Some(limit) if err.is_timeout() => BackendError::Timeout {
                elapsed_ms: limit.as_millis() as u64,
            },
            _ => BackendError::Transport(err.to_string()),
        }
    }
}

fn endpoint_url(base_url: &str, model: &str) -> String {
    format!(
        "{}/v1beta/models/{}:generateContent",
        base_url.trim_end_matches('/'),
        model
    )
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl<'a> GenerateRequest<'a> {
    fn from_prompt(prompt: &'a ModelPrompt) -> Self {
        Self {
            contents: vec![Content {
                role: Some("user"),
                parts: vec![RequestPart { text: &prompt.text }],
            }],
            system_instruction: prompt.system.as_deref().map(|system| Content {
                role: None,
                parts: vec![RequestPart { text: system }],
            }),
        }
    }
}

impl GenerateResponse {
    fn into_text(self) -> Option<String> {
        let parts = self.candidates.into_iter().next()?.content?.parts;
        let text: String = parts.into_iter().filter_map(|part| part.text).collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

#[async_trait]
impl ModelBackend for GenerativeLanguageBackend {
    async fn generate(&self, prompt: &ModelPrompt) -> Result<String, BackendError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", self.api_key.expose())
            .json(&GenerateRequest::from_prompt(prompt))
            .send()
            .await
            .map_err(|err| self.transport_error(err))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(BackendError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body: body.chars().take(ERROR_BODY_LIMIT).collect(),
            });
        }

        let payload: GenerateResponse = response
            .json()
            .await
            .map_err(|err| self.transport_error(err))?;

        payload.into_text().ok_or(BackendError::EmptyResponse)
    }
}
