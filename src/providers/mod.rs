//! Translation provider trait and common request type.
//!
//! Two providers cooperate in a fallback relationship: the context-aware
//! provider honors glossary hints and cleanup instructions, the fast-literal
//! provider ignores both. The orchestrator dispatches through this trait so
//! fallback logic stays in one place.

mod gemini;
mod google;

pub use gemini::GeminiProvider;
pub use google::GoogleProvider;

use crate::error::ProviderError;
use async_trait::async_trait;

/// A single translation request.
///
/// `instructions` and `glossary_hints` are advisory: providers without
/// instruction-following capability translate `text` literally and ignore
/// the rest.
#[derive(Debug, Clone)]
pub struct TranslateRequest {
    /// Source-language text to translate.
    pub text: String,

    /// Task prompt (translation style, cleanup rules).
    pub instructions: String,

    /// Glossary rendered as an instruction block; empty when no glossary
    /// applies.
    pub glossary_hints: String,
}

impl TranslateRequest {
    /// A bare request with no instructions, for literal translation.
    pub fn bare(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            instructions: String::new(),
            glossary_hints: String::new(),
        }
    }

    /// A request carrying a task prompt.
    pub fn with_instructions(text: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            instructions: instructions.into(),
            glossary_hints: String::new(),
        }
    }

    /// Attaches a rendered glossary block.
    pub fn glossary(mut self, hints: impl Into<String>) -> Self {
        self.glossary_hints = hints.into();
        self
    }
}

/// Trait for translation providers.
///
/// Implementations are stateless wrappers around one remote endpoint; rate
/// shaping and retries live in the orchestrator, not here.
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    /// Returns the human-readable name of this provider.
    fn name(&self) -> &'static str;

    /// Whether this provider honors instructions and glossary hints.
    fn honors_instructions(&self) -> bool;

    /// Translates the request text to the target language.
    async fn translate(&self, request: &TranslateRequest) -> Result<String, ProviderError>;
}
