//! Glossary builder - derive a term glossary from a chapter sample.
//!
//! Analyzes the first few chapters of a work with one context-aware
//! provider call and parses the categorized JSON reply into a
//! [`GlossaryStore`]. Building is strictly best-effort: any failure
//! degrades to an empty store with a warning so chapter translation can
//! proceed without glossary assistance instead of blocking the run.

use crate::config::{ApiConfig, GlossaryConfig};
use crate::console::Console;
use crate::error::ProviderError;
use crate::glossary::{GlossaryEntry, GlossaryStore, TermCategory};
use crate::utils::check_response_status;
use crate::work::Chapter;
use regex::Regex;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::sync::LazyLock;
use std::time::Duration;

/// Regex to extract JSON from markdown code fences.
static CODE_FENCE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^```[a-zA-Z]*\s*(.*?)\s*```$").expect("Invalid CODE_FENCE_REGEX")
});

/// Refusal phrases that indicate the model declined to process.
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

/// Extraction uses a lower temperature than translation; term lists should
/// be as deterministic as the model allows.
const EXTRACTION_TEMPERATURE: f32 = 0.2;

/// Attempts for transient errors and unparseable replies.
const BUILD_RETRIES: u32 = 3;

/// JSON object keys mapped to glossary categories.
const CATEGORY_KEYS: [(&str, TermCategory); 3] = [
    ("characters", TermCategory::Character),
    ("places", TermCategory::Place),
    ("terms", TermCategory::Term),
];

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

/// Builder for deriving a work's glossary from sample chapters.
pub struct GlossaryBuilder {
    /// HTTP client for API requests.
    client: Client,
    /// API configuration for the context-aware provider.
    api_config: ApiConfig,
    /// Sampling bounds.
    config: GlossaryConfig,
    /// System prompt for term extraction.
    prompt: String,
    /// Console for output.
    console: Console,
}

impl GlossaryBuilder {
    /// Create a new GlossaryBuilder.
    pub fn new(api_config: ApiConfig, config: GlossaryConfig, prompt: String) -> Self {
        Self {
            client: Client::new(),
            api_config,
            config,
            prompt,
            console: Console::new(),
        }
    }

    /// Build a glossary from the leading chapters of a work.
    ///
    /// Only the first `max_sample_chapters` chapters are analyzed, each
    /// truncated, so cost stays bounded for long works. Returns an empty
    /// store (after warning) if the sample is empty, the provider is
    /// unavailable, or the reply cannot be parsed.
    pub async fn build(&self, chapters: &[Chapter]) -> GlossaryStore {
        if chapters.is_empty() {
            self.console
                .warning("No chapters available to sample; continuing without glossary");
            return GlossaryStore::new();
        }

        match self.try_build(chapters).await {
            Ok(store) => {
                self.console.success(&format!(
                    "Glossary built with {} entries ({} characters, {} places, {} terms)",
                    store.len(),
                    store.category_len(TermCategory::Character),
                    store.category_len(TermCategory::Place),
                    store.category_len(TermCategory::Term),
                ));
                store
            }
            Err(e) => {
                self.console.warning(&format!(
                    "Glossary build failed ({}); continuing without glossary",
                    e
                ));
                GlossaryStore::new()
            }
        }
    }

    async fn try_build(&self, chapters: &[Chapter]) -> Result<GlossaryStore, ProviderError> {
        let payload = self.build_sample_payload(chapters);

        let mut attempt = 0;
        loop {
            match self.call_model(&payload).await {
                Ok(raw) => match self.parse_response(&raw) {
                    Ok(store) => return Ok(store),
                    Err(e) => {
                        attempt += 1;
                        if attempt >= BUILD_RETRIES {
                            return Err(e);
                        }
                        self.console.warning(&format!(
                            "Failed to parse glossary reply ({}), retrying...",
                            e
                        ));
                        tokio::time::sleep(Duration::from_secs(2u64.pow(attempt))).await;
                    }
                },
                Err(e) if e.is_content_policy() => return Err(e),
                Err(e) => {
                    attempt += 1;
                    if attempt >= BUILD_RETRIES {
                        return Err(e);
                    }
                    self.console
                        .warning(&format!("Glossary extraction call failed ({}), retrying...", e));
                    tokio::time::sleep(Duration::from_secs(2u64.pow(attempt))).await;
                }
            }
        }
    }

    /// Assemble the bounded sample payload from the leading chapters.
    fn build_sample_payload(&self, chapters: &[Chapter]) -> String {
        let sections: Vec<String> = chapters
            .iter()
            .take(self.config.max_sample_chapters)
            .map(|chapter| {
                let content: String = chapter
                    .content
                    .chars()
                    .take(self.config.sample_chars_per_chapter)
                    .collect();
                format!("Chapter {}:\n{}", chapter.number, content)
            })
            .collect();

        let combined = sections.join("\n\n");
        combined.chars().take(self.config.max_payload_chars).collect()
    }

    /// Call the model once for term extraction.
    async fn call_model(&self, payload: &str) -> Result<String, ProviderError> {
        let prompt = format!(
            "{}\n\nChinese chapters:\n{}\n\nJSON glossary:",
            self.prompt, payload
        );

        let body = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: EXTRACTION_TEMPERATURE,
            },
        };

        let url = format!(
            "{}/models/{}:generateContent",
            self.api_config.base_url, self.api_config.model
        );
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_config.key)
            .timeout(Duration::from_secs(120))
            .json(&body)
            .send()
            .await?;

        let response = check_response_status(response).await?;

        let parsed: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        let text = parsed["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or(ProviderError::EmptyResponse)?
            .trim()
            .to_string();

        let lower = text.to_lowercase();
        if REFUSAL_PHRASES.iter().any(|p| lower.starts_with(p)) {
            return Err(ProviderError::ContentPolicy(
                "model refused term extraction".to_string(),
            ));
        }

        Ok(text)
    }

    /// Parse the model reply into a glossary store.
    ///
    /// Tolerates markdown code fences and surrounding prose; duplicate
    /// terms keep their first rendering via the store's insert rule.
    fn parse_response(&self, raw: &str) -> Result<GlossaryStore, ProviderError> {
        let trimmed = raw.trim();

        // Remove markdown code fence if present
        let json_str = if trimmed.starts_with("```") {
            if let Some(captures) = CODE_FENCE_REGEX.captures(trimmed) {
                captures.get(1).map(|m| m.as_str()).unwrap_or(trimmed)
            } else {
                trimmed
                    .trim_start_matches("```json")
                    .trim_start_matches("```")
                    .trim_end_matches("```")
                    .trim()
            }
        } else {
            trimmed
        };

        // Find JSON object boundaries
        let start = json_str.find('{');
        let end = json_str.rfind('}');

        let json_content = match (start, end) {
            (Some(s), Some(e)) if s < e => &json_str[s..=e],
            _ => {
                return Err(ProviderError::ParseError(
                    "no JSON object found in reply".to_string(),
                ));
            }
        };

        let parsed: Value = serde_json::from_str(json_content)
            .map_err(|e| ProviderError::ParseError(format!("JSON parse error: {}", e)))?;

        let mut store = GlossaryStore::new();
        for (key, category) in CATEGORY_KEYS {
            let Some(group) = parsed.get(key).and_then(Value::as_object) else {
                continue;
            };
            for (source, rendering) in group {
                if let Some(rendering) = rendering.as_str() {
                    store.insert(GlossaryEntry {
                        category,
                        source: source.clone(),
                        rendering: rendering.to_string(),
                    });
                }
            }
        }

        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_builder() -> GlossaryBuilder {
        GlossaryBuilder::new(
            ApiConfig::default(),
            GlossaryConfig::default(),
            "Extract terms".to_string(),
        )
    }

    #[test]
    fn test_parse_valid_json() {
        let builder = make_builder();
        let raw = r#"{"characters":{"林羽":"Lin Yu"},"places":{"天剑宗":"Heavenly Sword Sect"},"terms":{"灵气":"spiritual qi"}}"#;

        let store = builder.parse_response(raw).unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.get(TermCategory::Character, "林羽"), Some("Lin Yu"));
        assert_eq!(
            store.get(TermCategory::Place, "天剑宗"),
            Some("Heavenly Sword Sect")
        );
        assert_eq!(store.get(TermCategory::Term, "灵气"), Some("spiritual qi"));
    }

    #[test]
    fn test_parse_json_with_code_fence() {
        let builder = make_builder();
        let raw = "```json\n{\"characters\":{\"林羽\":\"Lin Yu\"}}\n```";

        let store = builder.parse_response(raw).unwrap();
        assert_eq!(store.get(TermCategory::Character, "林羽"), Some("Lin Yu"));
    }

    #[test]
    fn test_parse_json_with_surrounding_text() {
        let builder = make_builder();
        let raw = "Here is the glossary:\n{\"terms\":{\"筑基\":\"Foundation Establishment\"}}\nHope this helps!";

        let store = builder.parse_response(raw).unwrap();
        assert_eq!(
            store.get(TermCategory::Term, "筑基"),
            Some("Foundation Establishment")
        );
    }

    #[test]
    fn test_parse_missing_categories() {
        let builder = make_builder();
        let store = builder.parse_response(r#"{"characters":{}}"#).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_parse_skips_non_string_renderings() {
        let builder = make_builder();
        let raw = r#"{"characters":{"林羽":"Lin Yu","坏条目":42}}"#;

        let store = builder.parse_response(raw).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_parse_invalid_json() {
        let builder = make_builder();
        assert!(builder.parse_response("This is not JSON at all").is_err());
    }

    #[test]
    fn test_parse_is_deterministic() {
        let builder = make_builder();
        let raw = r#"{"characters":{"林羽":"Lin Yu","苏清雪":"Su Qingxue"},"terms":{"灵气":"spiritual qi"}}"#;

        let first: Vec<_> = builder.parse_response(raw).unwrap().entries().collect();
        let second: Vec<_> = builder.parse_response(raw).unwrap().entries().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_sample_payload_bounds() {
        let builder = GlossaryBuilder::new(
            ApiConfig::default(),
            GlossaryConfig {
                max_sample_chapters: 2,
                sample_chars_per_chapter: 5,
                max_payload_chars: 1000,
            },
            String::new(),
        );

        let chapters = vec![
            Chapter::new(1, "一", "第一章的正文内容很长"),
            Chapter::new(2, "二", "第二章的正文内容很长"),
            Chapter::new(3, "三", "第三章不应该被采样"),
        ];

        let payload = builder.build_sample_payload(&chapters);
        assert!(payload.contains("Chapter 1:\n第一章的正"));
        assert!(payload.contains("Chapter 2:\n第二章的正"));
        assert!(!payload.contains("第三章"));
    }

    #[test]
    fn test_sample_payload_total_cap() {
        let builder = GlossaryBuilder::new(
            ApiConfig::default(),
            GlossaryConfig {
                max_sample_chapters: 10,
                sample_chars_per_chapter: 100,
                max_payload_chars: 20,
            },
            String::new(),
        );

        let chapters = vec![Chapter::new(1, "一", "正文".repeat(50))];
        let payload = builder.build_sample_payload(&chapters);
        assert_eq!(payload.chars().count(), 20);
    }
}
