use std::fmt::Write as _;

use chrono::Utc;
use serde_json::Value;

use super::domain::{
    CredentialSlot, ModelPrompt, RequestId, ResumeProfile, ScoringPayload, ScoringResult,
    ScreeningStatus,
};
use super::extract::ExtractError;

const SCORING_SYSTEM: &str = "You are a recruiting assistant that screens candidates against a job \
description. Respond with a single JSON object and nothing else.";

const RESUME_SYSTEM: &str = "You extract structured data from resumes. Respond with a single JSON \
object and nothing else.";

pub fn scoring_prompt(payload: &ScoringPayload) -> ModelPrompt {
    let mut text = String::new();
    let _ = writeln!(text, "Job description:\n{}\n", payload.job_description.trim());
    if let Some(context) = payload
        .company_context
        .as_deref()
        .map(str::trim)
        .filter(|context| !context.is_empty())
    {
        let _ = writeln!(text, "Company context:\n{context}\n");
    }
    let _ = writeln!(text, "Candidate:\n{}\n", payload.candidate_text.trim());
    text.push_str(
        "Score the candidate from 0 to 100 and pick a status of SHORTLIST, FLAG or REJECT.\n\
         Reply as {\"score\": <number>, \"status\": \"<STATUS>\", \"reasoning\": \"<one paragraph>\"}.",
    );

    ModelPrompt {
        system: Some(SCORING_SYSTEM.to_string()),
        text,
    }
}

pub fn resume_prompt(resume_text: &str) -> ModelPrompt {
    let mut text = String::from(
        "Extract the following fields from the resume below: full_name, email, phone, summary, \
         skills (array of strings), years_experience (number), work_history (array of \
         {company, title, start, end}), education (array of strings). Use null for unknown \
         values.\n\nResume:\n",
    );
    text.push_str(resume_text.trim());

    ModelPrompt {
        system: Some(RESUME_SYSTEM.to_string()),
        text,
    }
}

/// Validates an extracted value against the scoring schema.
pub fn decode_scoring(
    request_id: &RequestId,
    slot: CredentialSlot,
    value: Value,
) -> Result<ScoringResult, ExtractError> {
    let object = value
        .as_object()
        .ok_or_else(|| ExtractError::schema("score", "expected a JSON object"))?;

    let score = object
        .get("score")
        .ok_or_else(|| ExtractError::schema("score", "missing"))
        .and_then(parse_score)?;

    let status = match object.get("status") {
        Some(Value::String(label)) => ScreeningStatus::from_model_label(label)
            .ok_or_else(|| ExtractError::schema("status", format!("unknown label '{label}'")))?,
        Some(_) => return Err(ExtractError::schema("status", "expected a string")),
        None => return Err(ExtractError::schema("status", "missing")),
    };

    let reasoning = match object.get("reasoning") {
        Some(Value::String(text)) => text.trim().to_string(),
        Some(Value::Null) | None => String::new(),
        Some(_) => return Err(ExtractError::schema("reasoning", "expected a string")),
    };

    Ok(ScoringResult {
        request_id: request_id.clone(),
        score,
        status,
        reasoning,
        served_by: Some(slot),
        completed_at: Utc::now(),
    })
}

fn parse_score(value: &Value) -> Result<u8, ExtractError> {
    let raw = match value {
        Value::Number(number) => number
            .as_f64()
            .ok_or_else(|| ExtractError::schema("score", "not representable"))?,
        Value::String(text) => text
            .trim()
            .trim_end_matches('%')
            .parse::<f64>()
            .map_err(|_| ExtractError::schema("score", format!("'{text}' is not a number")))?,
        _ => return Err(ExtractError::schema("score", "expected a number")),
    };

    if !raw.is_finite() {
        return Err(ExtractError::schema("score", "not finite"));
    }
    Ok(raw.round().clamp(0.0, 100.0) as u8)
}

pub fn decode_resume(value: Value) -> Result<ResumeProfile, ExtractError> {
    let profile: ResumeProfile = serde_json::from_value(value)
        .map_err(|err| ExtractError::schema("resume", err.to_string()))?;
    if profile.full_name.trim().is_empty() {
        return Err(ExtractError::schema("full_name", "empty"));
    }
    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id() -> RequestId {
        RequestId("req-1".to_string())
    }

    #[test]
    fn maps_flag_label_to_flagged() {
        let value = json!({"score": 72, "status": "FLAG", "reasoning": "partial match"});
        let result = decode_scoring(&id(), CredentialSlot::Primary, value).expect("decodes");
        assert_eq!(result.score, 72);
        assert_eq!(result.status, ScreeningStatus::Flagged);
        assert_eq!(result.reasoning, "partial match");
        assert_eq!(result.served_by, Some(CredentialSlot::Primary));
    }

    #[test]
    fn clamps_and_rounds_scores() {
        let high = json!({"score": 140.2, "status": "shortlisted"});
        let result = decode_scoring(&id(), CredentialSlot::Primary, high).expect("decodes");
        assert_eq!(result.score, 100);
        assert_eq!(result.status, ScreeningStatus::Shortlisted);

        let text = json!({"score": "64.6%", "status": "Reject"});
        let result = decode_scoring(&id(), CredentialSlot::Primary, text).expect("decodes");
        assert_eq!(result.score, 65);
        assert!(result.reasoning.is_empty());
    }

    #[test]
    fn rejects_unknown_status() {
        let value = json!({"score": 50, "status": "MAYBE"});
        match decode_scoring(&id(), CredentialSlot::Secondary, value) {
            Err(ExtractError::Schema { field, .. }) => assert_eq!(field, "status"),
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_missing_score() {
        let value = json!({"status": "FLAG"});
        assert!(matches!(
            decode_scoring(&id(), CredentialSlot::Primary, value),
            Err(ExtractError::Schema { field: "score", .. })
        ));
    }

    #[test]
    fn scoring_prompt_omits_blank_company_context() {
        let payload = ScoringPayload {
            job_description: "Backend engineer".to_string(),
            candidate_text: "Ten years of Rust".to_string(),
            company_context: Some("   ".to_string()),
        };
        let prompt = scoring_prompt(&payload);
        assert!(!prompt.text.contains("Company context"));
        assert!(prompt.text.contains("Ten years of Rust"));
        assert!(prompt.system.is_some());
    }

    #[test]
    fn decodes_resume_with_defaults() {
        let value = json!({
            "full_name": "Ada Example",
            "email": "ada@example.com",
            "skills": ["Rust", "SQL"],
            "work_history": [{"company": "Acme", "title": "Engineer"}]
        });
        let profile = decode_resume(value).expect("decodes");
        assert_eq!(profile.skills.len(), 2);
        assert_eq!(profile.work_history[0].start, None);
        assert!(profile.education.is_empty());
    }

    #[test]
    fn null_resume_fields_fall_back_to_defaults() {
        let value = json!({
            "full_name": "Ada Example",
            "email": null,
            "phone": null,
            "summary": null,
            "skills": null,
            "years_experience": null,
            "work_history": [{"company": "Acme", "title": null, "start": null, "end": null}],
            "education": null
        });
        let profile = decode_resume(value).expect("decodes");
        assert!(profile.skills.is_empty());
        assert!(profile.education.is_empty());
        assert_eq!(profile.email, None);
        assert_eq!(profile.work_history[0].company, "Acme");
        assert_eq!(profile.work_history[0].title, "");

        let value = json!({"full_name": "Ada Example", "work_history": null});
        assert!(decode_resume(value).expect("decodes").work_history.is_empty());
    }

    #[test]
    fn null_name_is_reported_as_missing_name() {
        let value = json!({"full_name": null, "skills": ["Rust"]});
        assert!(matches!(
            decode_resume(value),
            Err(ExtractError::Schema { field: "full_name", .. })
        ));
    }

    #[test]
    fn reasoning_is_optional_but_typed() {
        let value = json!({"score": 40, "status": "REJECT", "reasoning": null});
        let result = decode_scoring(&id(), CredentialSlot::Primary, value).expect("decodes");
        assert!(result.reasoning.is_empty());

        let value = json!({"score": 40, "status": "REJECT", "reasoning": 7});
        assert!(matches!(
            decode_scoring(&id(), CredentialSlot::Primary, value),
            Err(ExtractError::Schema { field: "reasoning", .. })
        ));
    }

    #[test]
    fn resume_requires_a_name() {
        let value = json!({"full_name": " "});
        assert!(matches!(
            decode_resume(value),
            Err(ExtractError::Schema { field: "full_name", .. })
        ));
    }
}
