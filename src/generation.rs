use std::{future::Future, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::{Error, Result},
    settings::GenerationSettings,
};

/// A text-generation service. Replies are free text and untrusted.
pub trait Generator: Send + Sync {
    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String>> + Send;
}

/// Harm categories relaxed for every request. Assessment descriptions are
/// professional text, and a blocked reply would only force the fallback.
pub const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

/// Client for the Gemini `generateContent` endpoint.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    safety_settings: Vec<SafetySetting>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [RequestPart<'a>; 1],
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GeminiClient {
    /// Build a client. Fails if no API key is configured.
    pub fn new(settings: &GenerationSettings) -> Result<Self> {
        let api_key = settings.api_key.clone().ok_or_else(|| {
            Error::Config(format!(
                "no generation API key; set {} or generation.api_key",
                crate::settings::GENERATION_KEY_ENV
            ))
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| {
                Error::Config(format!("cannot build generation client: {e}"))
            })?;

        Ok(Self {
            client,
            url: format!(
                "{}/v1beta/models/{}:generateContent",
                settings.endpoint.trim_end_matches('/'),
                settings.model
            ),
            api_key,
        })
    }

    fn request_body(prompt: &str) -> GenerateRequest<'_> {
        GenerateRequest {
            contents: [Content {
                role: "user",
                parts: [RequestPart { text: prompt }],
            }],
            safety_settings: SAFETY_CATEGORIES
                .iter()
                .map(|&category| SafetySetting {
                    category,
                    threshold: "BLOCK_NONE",
                })
                .collect(),
        }
    }
}

impl Generator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let response = self
            .client
            .post(&self.url)
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::request_body(prompt))
            .send()
            .await
            .map_err(|e| Error::UpstreamGeneration(format!("HTTP error: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::UpstreamGeneration(format!(
                "service returned {status}: {body}"
            )));
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            Error::UpstreamGeneration(format!("malformed response: {e}"))
        })?;

        let text = reply_text(parsed)?;
        debug!(chars = text.len(), "generation reply received");
        Ok(text)
    }
}

/// Concatenate the text parts of the first candidate.
fn reply_text(response: GenerateResponse) -> Result<String> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        let reason = response
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "no candidates returned".into());
        return Err(Error::UpstreamGeneration(reason));
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(Error::UpstreamGeneration("empty reply".into()));
    }
    Ok(text)
}
