use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::PredictionError;

/// Structured answer recovered from the vision model.
///
/// Unrecognized keys the model adds are kept in `extra` and serialized back inline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisReport {
    pub disease: String,
    pub duration: String,
    pub causative_agents: Vec<String>,
    pub untreated_result: String,
    pub preventive_measures: Vec<String>,
    pub treatment: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub fn diagnosis_instruction() -> &'static str {
    "You are a crop disease expert AI. From the given image, detect the crop disease and respond in this exact JSON format:\n\n{\n  \"disease\": \"Disease name\",\n  \"duration\": \"How long the disease lasts or affects the crop\",\n  \"causative_agents\": [\"List of bacteria, fungi, or reasons\"],\n  \"untreated_result\": \"What happens if it's not treated\",\n  \"preventive_measures\": [\"List of preventive steps\"],\n  \"treatment\": [\"List of treatment methods\"]\n}\n\nOnly respond with valid JSON, no explanation, no markdown."
}

/// Text of the first part of the first candidate in a `generateContent` response.
pub fn candidate_text(response: &Value) -> Result<&str, PredictionError> {
    response
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .and_then(|parts| parts.first())
        .and_then(|part| part.get("text"))
        .and_then(Value::as_str)
        .ok_or_else(|| {
            PredictionError::DiagnosisParseFailed(
                "response has no candidates[0].content.parts[0].text".to_string(),
            )
        })
}

/// Greedy brace span: from the first `{` to the last `}` anywhere in the text.
///
/// With two sibling objects the span covers both plus whatever sits between them, so it
/// only parses if the text in between keeps it valid JSON. That tie-break is intentional.
pub fn greedy_json_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

pub fn parse_diagnosis_text(text: &str) -> Result<DiagnosisReport, PredictionError> {
    let span = greedy_json_span(text).ok_or_else(|| {
        PredictionError::DiagnosisParseFailed("no brace-delimited span in model text".to_string())
    })?;
    let parsed: Value = serde_json::from_str(span)
        .map_err(|err| PredictionError::DiagnosisParseFailed(format!("invalid JSON: {err}")))?;
    if !parsed.is_object() {
        return Err(PredictionError::DiagnosisParseFailed(
            "JSON span is not an object".to_string(),
        ));
    }
    serde_json::from_value(parsed).map_err(|err| {
        PredictionError::DiagnosisParseFailed(format!("diagnosis fields invalid: {err}"))
    })
}

pub fn parse_diagnosis_response(response: &Value) -> Result<DiagnosisReport, PredictionError> {
    parse_diagnosis_text(candidate_text(response)?)
}
