//! Bulk intake of scoring requests from CSV exports.

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Deserializer};

use crate::inference::{CredentialSlot, RequestId, ScoringPayload, ScoringRequest, UnknownSlot};

#[derive(Debug)]
pub enum IntakeError {
    Io(std::io::Error),
    Csv(csv::Error),
    InvalidSlot { row: usize, source: UnknownSlot },
    MissingField { row: usize, field: &'static str },
    DuplicateId { row: usize, id: String },
}

impl std::fmt::Display for IntakeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntakeError::Io(err) => write!(f, "failed to read candidate export: {}", err),
            IntakeError::Csv(err) => write!(f, "invalid candidate CSV data: {}", err),
            IntakeError::InvalidSlot { row, source } => write!(f, "row {}: {}", row, source),
            IntakeError::MissingField { row, field } => {
                write!(f, "row {}: `{}` must not be empty", row, field)
            }
            IntakeError::DuplicateId { row, id } => {
                write!(f, "row {}: request id '{}' appears more than once", row, id)
            }
        }
    }
}

impl std::error::Error for IntakeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IntakeError::Io(err) => Some(err),
            IntakeError::Csv(err) => Some(err),
            IntakeError::InvalidSlot { source, .. } => Some(source),
            IntakeError::MissingField { .. } | IntakeError::DuplicateId { .. } => None,
        }
    }
}

impl From<std::io::Error> for IntakeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for IntakeError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

#[derive(Debug, Deserialize)]
struct CandidateRow {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    id: Option<String>,
    job_description: String,
    candidate_text: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    company_context: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    preferred_slot: Option<String>,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|raw| !raw.trim().is_empty()))
}

/// Reads `id,job_description,candidate_text,company_context,preferred_slot`
/// rows into scoring requests. Rows without an id get a generated one.
pub struct ScoringBatchImporter;

impl ScoringBatchImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<ScoringRequest>, IntakeError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<ScoringRequest>, IntakeError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut requests = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for (index, record) in csv_reader.deserialize::<CandidateRow>().enumerate() {
            let row = index + 1;
            let record = record?;

            if record.job_description.is_empty() {
                return Err(IntakeError::MissingField {
                    row,
                    field: "job_description",
                });
            }
            if record.candidate_text.is_empty() {
                return Err(IntakeError::MissingField {
                    row,
                    field: "candidate_text",
                });
            }

            let preferred_slot = record
                .preferred_slot
                .as_deref()
                .map(str::parse::<CredentialSlot>)
                .transpose()
                .map_err(|source| IntakeError::InvalidSlot { row, source })?;

            let id = match record.id {
                Some(id) => RequestId(id),
                None => RequestId::generate(),
            };
            if !seen.insert(id.0.clone()) {
                return Err(IntakeError::DuplicateId { row, id: id.0 });
            }

            requests.push(ScoringRequest {
                id,
                payload: ScoringPayload {
                    job_description: record.job_description,
                    candidate_text: record.candidate_text,
                    company_context: record.company_context,
                },
                preferred_slot,
            });
        }

        Ok(requests)
    }
}
