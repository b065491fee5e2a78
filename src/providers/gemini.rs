//! Context-aware translation provider backed by the Gemini API.
//!
//! This is the primary provider: it honors glossary hints and cleanup
//! instructions, and it is the only provider that can reject content on
//! policy grounds. Safety blocks are surfaced as `ContentPolicy` errors so
//! the orchestrator falls back instead of retrying.

use crate::config::ApiConfig;
use crate::error::ProviderError;
use crate::providers::{TranslateRequest, TranslationProvider};
use crate::utils::check_response_status;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::Duration;

/// Refusal phrases that indicate the model declined to translate.
static REFUSAL_PHRASES: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    vec![
        "i'm sorry",
        "i cannot",
        "i am unable",
        "as an ai",
        "my apologies",
        "i am not programmed",
        "i do not have the ability",
    ]
});

/// Finish reasons that mean the model stopped on content-policy grounds.
const POLICY_FINISH_REASONS: &[&str] = &["SAFETY", "PROHIBITED_CONTENT", "BLOCKLIST"];

/// Request body for the generateContent API.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<RequestContent>,
    generation_config: GenerationConfig,
}

/// A content block in the request.
#[derive(Debug, Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

/// A text part in the request.
#[derive(Debug, Serialize)]
struct RequestPart {
    text: String,
}

/// Generation parameters.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
}

/// Response from the generateContent API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

/// A single candidate in the response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<ResponseContent>,
    finish_reason: Option<String>,
}

/// Content block in a candidate.
#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

/// A text part in a candidate.
#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Feedback on the prompt itself (set when the input was blocked).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// Context-aware provider for Chinese-to-English translation.
pub struct GeminiProvider {
    /// HTTP client for API requests.
    client: Client,
    /// API configuration.
    config: ApiConfig,
    /// Sampling temperature for generation.
    temperature: f32,
}

impl GeminiProvider {
    /// Create a new GeminiProvider.
    pub fn new(config: ApiConfig, temperature: f32) -> Self {
        Self {
            client: Client::new(),
            config,
            temperature,
        }
    }

    /// Build the full prompt from instructions, glossary hints, and text.
    fn build_prompt(&self, request: &TranslateRequest) -> String {
        let mut prompt = String::new();

        if !request.instructions.is_empty() {
            prompt.push_str(&request.instructions);
            prompt.push_str("\n\n");
        }

        if !request.glossary_hints.is_empty() {
            prompt.push_str("Use this glossary for consistent translations:\n");
            prompt.push_str(&request.glossary_hints);
            prompt.push_str("\n\n");
        }

        prompt.push_str("Chinese text to translate:\n");
        prompt.push_str(&request.text);
        prompt.push_str("\n\nEnglish translation:");

        prompt
    }

    /// Extract the translated text from a parsed response.
    ///
    /// Safety blocks can appear either as prompt feedback or as a candidate
    /// finish reason; both map to `ContentPolicy`.
    fn extract_text(response: GenerateResponse) -> Result<String, ProviderError> {
        if let Some(feedback) = response.prompt_feedback {
            if let Some(reason) = feedback.block_reason {
                return Err(ProviderError::ContentPolicy(format!(
                    "prompt blocked: {}",
                    reason
                )));
            }
        }

        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or(ProviderError::EmptyResponse)?;

        if let Some(reason) = candidate.finish_reason.as_deref() {
            if POLICY_FINISH_REASONS.contains(&reason) {
                return Err(ProviderError::ContentPolicy(format!(
                    "generation stopped: {}",
                    reason
                )));
            }
        }

        let text: String = candidate
            .content
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let trimmed = text.trim().to_string();
        if trimmed.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }

        // A refusal is deterministic for this content; treat it like a
        // safety block so the orchestrator falls back instead of retrying.
        let lower = trimmed.to_lowercase();
        for phrase in REFUSAL_PHRASES.iter() {
            if lower.starts_with(phrase) {
                return Err(ProviderError::ContentPolicy(format!(
                    "response starts with refusal phrase: {}",
                    phrase
                )));
            }
        }

        Ok(trimmed)
    }
}

#[async_trait]
impl TranslationProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn honors_instructions(&self) -> bool {
        true
    }

    async fn translate(&self, request: &TranslateRequest) -> Result<String, ProviderError> {
        let body = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart {
                    text: self.build_prompt(request),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        };

        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url, self.config.model
        );
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.key)
            .timeout(Duration::from_secs(120))
            .json(&body)
            .send()
            .await?;

        let response = check_response_status(response).await?;

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        Self::extract_text(parsed)
    }
}
