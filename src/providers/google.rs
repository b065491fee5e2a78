//! Fast-literal translation provider using the web translate endpoint.
//!
//! This is the fallback provider and the one used for all titles. It has
//! no instruction-following capability: glossary hints and prompts are
//! ignored, so term consistency is best-effort for anything it translates.

use crate::config::LiteralConfig;
use crate::error::ProviderError;
use crate::providers::{TranslateRequest, TranslationProvider};
use crate::utils::{check_response_status, split_into_paragraph_chunks};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Fast-literal provider for Chinese-to-English translation.
pub struct GoogleProvider {
    /// HTTP client for API requests.
    client: Client,
    /// Endpoint and language-pair configuration.
    config: LiteralConfig,
}

impl GoogleProvider {
    /// Create a new GoogleProvider.
    pub fn new(config: LiteralConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Translate a single chunk that fits under the endpoint's size limit.
    async fn translate_chunk(&self, chunk: &str) -> Result<String, ProviderError> {
        let url = format!("{}/translate_a/single", self.config.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("client", "gtx"),
                ("sl", self.config.source_lang.as_str()),
                ("tl", self.config.target_lang.as_str()),
                ("dt", "t"),
                ("q", chunk),
            ])
            .timeout(Duration::from_secs(30))
            .send()
            .await?;

        let response = check_response_status(response).await?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        Self::extract_segments(&body)
    }

    /// Extract translated text from the endpoint's nested-array reply.
    ///
    /// The reply shape is `[[["translated","original",...],...],...]`: the
    /// first element is a list of segments whose first field is the
    /// translated text.
    fn extract_segments(body: &Value) -> Result<String, ProviderError> {
        let segments = body
            .get(0)
            .and_then(Value::as_array)
            .ok_or_else(|| ProviderError::ParseError("missing segment list".to_string()))?;

        let mut result = String::new();
        for segment in segments {
            if let Some(text) = segment.get(0).and_then(Value::as_str) {
                result.push_str(text);
            }
        }

        let trimmed = result.trim().to_string();
        if trimmed.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(trimmed)
    }
}

#[async_trait]
impl TranslationProvider for GoogleProvider {
    fn name(&self) -> &'static str {
        "google"
    }

    fn honors_instructions(&self) -> bool {
        false
    }

    async fn translate(&self, request: &TranslateRequest) -> Result<String, ProviderError> {
        let text = request.text.trim();
        if text.is_empty() {
            return Ok(String::new());
        }

        if text.chars().count() <= self.config.chunk_size_chars {
            return self.translate_chunk(text).await;
        }

        // Long chapters go over in paragraph groups; the endpoint rejects
        // requests near 5000 characters.
        let chunks = split_into_paragraph_chunks(text, self.config.chunk_size_chars);
        let mut translated = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            translated.push(self.translate_chunk(chunk).await?);
        }

        Ok(translated.join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_segments() {
        let body: Value = serde_json::from_str(
            r#"[[["Lin Yu looked up. ","林羽抬起头。",null,null,3],["The sky was dark.","天色很暗。",null,null,3]],null,"zh-CN"]"#,
        )
        .unwrap();

        let text = GoogleProvider::extract_segments(&body).unwrap();
        assert_eq!(text, "Lin Yu looked up. The sky was dark.");
    }

    #[test]
    fn test_extract_segments_missing_list() {
        let body: Value = serde_json::from_str(r#"{"error":"unexpected"}"#).unwrap();
        assert!(matches!(
            GoogleProvider::extract_segments(&body),
            Err(ProviderError::ParseError(_))
        ));
    }

    #[test]
    fn test_extract_segments_empty() {
        let body: Value = serde_json::from_str(r#"[[],null,"zh-CN"]"#).unwrap();
        assert!(matches!(
            GoogleProvider::extract_segments(&body),
            Err(ProviderError::EmptyResponse)
        ));
    }

    #[test]
    fn test_does_not_honor_instructions() {
        let provider = GoogleProvider::new(LiteralConfig::default());
        assert!(!provider.honors_instructions());
    }

    #[tokio::test]
    async fn test_empty_text_short_circuits() {
        let provider = GoogleProvider::new(LiteralConfig::default());
        let result = provider
            .translate(&TranslateRequest::bare("   "))
            .await
            .unwrap();
        assert_eq!(result, "");
    }
}
