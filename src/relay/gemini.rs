//! Gemini generateContent client.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::relay::engine::{GenerationClient, GenerationOutcome};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Upper bound on one generation call, well under Telegram's webhook
/// delivery timeout.
const GENERATION_TIMEOUT: Duration = Duration::from_secs(15);

pub struct GeminiClient {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
    error: Option<ApiError>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize, Debug)]
struct PromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiError {
    code: Option<i64>,
    message: String,
    status: Option<String>,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(GENERATION_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            api_key,
            model,
            client,
        }
    }
}

impl GenerationClient for GeminiClient {
    async fn generate(&self, prompt: &str) -> GenerationOutcome {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        };

        let url = format!(
            "{GEMINI_API_BASE}/{}:generateContent?key={}",
            self.model, self.api_key
        );

        let response = match self.client.post(&url).json(&request).send().await {
            Ok(r) => r,
            Err(e) => return GenerationOutcome::Transient(format!("HTTP error: {e}")),
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => {
                return GenerationOutcome::Transient(format!("Failed to read response: {e}"));
            }
        };

        debug!("Gemini response status: {status}");

        if !status.is_success() {
            return classify_failure(status.as_u16(), &body);
        }

        outcome_from_body(&body)
    }
}

/// Quota-indicating tokens in a failure description.
fn is_quota_signal(description: &str) -> bool {
    let lower = description.to_lowercase();
    lower.contains("quota")
        || lower.contains("exceeded")
        || lower.contains("limit")
        || lower.contains("429")
        || lower.contains("resource_exhausted")
        || lower.contains("resource exhausted")
}

fn classify_failure(status: u16, body: &str) -> GenerationOutcome {
    if status == 429 || is_quota_signal(body) {
        GenerationOutcome::QuotaExceeded
    } else {
        GenerationOutcome::Transient(format!("API error {status}: {body}"))
    }
}

/// Classify a 200 response body.
///
/// A successful call with no usable text means the safety filter withheld
/// the content: blocked prompt, a SAFETY finish reason, or simply no
/// candidates at all.
fn outcome_from_body(body: &str) -> GenerationOutcome {
    let parsed: GenerateResponse = match serde_json::from_str(body) {
        Ok(p) => p,
        Err(e) => return GenerationOutcome::Transient(format!("Failed to parse response: {e}")),
    };

    if let Some(error) = parsed.error {
        return if error.code == Some(429)
            || error.status.as_deref() == Some("RESOURCE_EXHAUSTED")
            || is_quota_signal(&error.message)
        {
            GenerationOutcome::QuotaExceeded
        } else {
            GenerationOutcome::Transient(format!("Gemini error: {}", error.message))
        };
    }

    if let Some(feedback) = parsed.prompt_feedback
        && feedback.block_reason.is_some()
    {
        return GenerationOutcome::SafetyBlocked;
    }

    let Some(candidate) = parsed.candidates.and_then(|c| c.into_iter().next()) else {
        return GenerationOutcome::SafetyBlocked;
    };

    if candidate.finish_reason.as_deref() == Some("SAFETY") {
        return GenerationOutcome::SafetyBlocked;
    }

    let text = candidate
        .content
        .map(|c| {
            c.parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.is_empty() {
        GenerationOutcome::SafetyBlocked
    } else {
        GenerationOutcome::Success(text)
    }
}
