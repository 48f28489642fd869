use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Correlates a submitted request with its eventual result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn generate() -> Self {
        Self(format!("req-{}", uuid::Uuid::new_v4()))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Named credential position. Declaration order is the natural failover priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSlot {
    Primary,
    Secondary,
    Tertiary,
}

impl CredentialSlot {
    pub const ALL: [CredentialSlot; 3] = [
        CredentialSlot::Primary,
        CredentialSlot::Secondary,
        CredentialSlot::Tertiary,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            CredentialSlot::Primary => "primary",
            CredentialSlot::Secondary => "secondary",
            CredentialSlot::Tertiary => "tertiary",
        }
    }
}

impl fmt::Display for CredentialSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown credential slot '{0}' (expected primary, secondary or tertiary)")]
pub struct UnknownSlot(pub String);

impl FromStr for CredentialSlot {
    type Err = UnknownSlot;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "primary" => Ok(CredentialSlot::Primary),
            "secondary" => Ok(CredentialSlot::Secondary),
            "tertiary" => Ok(CredentialSlot::Tertiary),
            _ => Err(UnknownSlot(value.to_string())),
        }
    }
}

/// Inputs for a single scoring call. Treated as read-only once submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringPayload {
    pub job_description: String,
    pub candidate_text: String,
    #[serde(default)]
    pub company_context: Option<String>,
}

/// Unit of work accepted by the batch dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringRequest {
    pub id: RequestId,
    pub payload: ScoringPayload,
    #[serde(default)]
    pub preferred_slot: Option<CredentialSlot>,
}

impl ScoringRequest {
    pub fn new(payload: ScoringPayload) -> Self {
        Self {
            id: RequestId::generate(),
            payload,
            preferred_slot: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = RequestId(id.into());
        self
    }

    pub fn prefer(mut self, slot: CredentialSlot) -> Self {
        self.preferred_slot = Some(slot);
        self
    }
}

/// Screening categories a score can land in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScreeningStatus {
    Shortlisted,
    Flagged,
    Rejected,
}

impl ScreeningStatus {
    /// Accepts both the imperative labels the prompt asks for and past-tense variants.
    pub fn from_model_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_uppercase().as_str() {
            "SHORTLIST" | "SHORTLISTED" => Some(ScreeningStatus::Shortlisted),
            "FLAG" | "FLAGGED" => Some(ScreeningStatus::Flagged),
            "REJECT" | "REJECTED" => Some(ScreeningStatus::Rejected),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ScreeningStatus::Shortlisted => "Shortlisted",
            ScreeningStatus::Flagged => "Flagged",
            ScreeningStatus::Rejected => "Rejected",
        }
    }
}

/// Outcome of one scoring request, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringResult {
    pub request_id: RequestId,
    pub score: u8,
    pub status: ScreeningStatus,
    pub reasoning: String,
    /// Slot that produced the score; `None` marks an isolated failure.
    pub served_by: Option<CredentialSlot>,
    pub completed_at: DateTime<Utc>,
}

impl ScoringResult {
    /// Conservative outcome used when every credential failed for this request.
    pub fn failure(request_id: RequestId, reason: impl Into<String>) -> Self {
        Self {
            request_id,
            score: 0,
            status: ScreeningStatus::Rejected,
            reasoning: reason.into(),
            served_by: None,
            completed_at: Utc::now(),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.served_by.is_none()
    }
}

/// Models answer "unknown" with an explicit `null`; treat it like a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Employment entry extracted from a resume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkHistoryEntry {
    #[serde(default, deserialize_with = "null_as_default")]
    pub company: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

/// Structured view of a resume returned by the parsing operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeProfile {
    #[serde(default, deserialize_with = "null_as_default")]
    pub full_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub skills: Vec<String>,
    #[serde(default)]
    pub years_experience: Option<f32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub work_history: Vec<WorkHistoryEntry>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub education: Vec<String>,
}

/// Text handed to a model backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPrompt {
    pub system: Option<String>,
    pub text: String,
}
