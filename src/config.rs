//! Configuration management for Lianzai.
//!
//! Handles loading, saving, and validating configuration from
//! platform-specific config directories. All settings are read once at
//! startup and passed into the pipeline as immutable values.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application name used for config directory.
const APP_NAME: &str = "Lianzai";

/// Default config filename.
const CONFIG_FILENAME: &str = "config.toml";

/// Placeholder value for unconfigured API keys.
const API_KEY_PLACEHOLDER: &str = "YOUR_API_KEY_HERE";

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Context-aware provider (Gemini) API configuration.
    pub gemini: ApiConfig,

    /// Fast-literal provider configuration.
    pub literal: LiteralConfig,

    /// Translation behavior settings.
    pub translation: TranslationConfig,

    /// Glossary building settings.
    pub glossary: GlossaryConfig,

    /// Content platform publishing settings.
    pub publish: PublishConfig,

    /// LLM prompts.
    pub prompts: PromptsConfig,

    /// File paths.
    pub paths: PathsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gemini: ApiConfig::default(),
            literal: LiteralConfig::default(),
            translation: TranslationConfig::default(),
            glossary: GlossaryConfig::default(),
            publish: PublishConfig::default(),
            prompts: PromptsConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

/// API configuration for the context-aware provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// API key (required when the context provider is enabled).
    pub key: String,

    /// Base URL for the API.
    pub base_url: String,

    /// Model identifier.
    pub model: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            key: API_KEY_PLACEHOLDER.to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.0-flash".to_string(),
        }
    }
}

impl ApiConfig {
    /// Checks if the API key is configured (not placeholder).
    pub fn is_configured(&self) -> bool {
        !self.key.is_empty() && self.key != API_KEY_PLACEHOLDER
    }
}

/// Configuration for the fast-literal provider.
///
/// This provider has no instruction-following capability, so it carries
/// the language pair explicitly instead of prompts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LiteralConfig {
    /// Base URL for the translation endpoint.
    pub base_url: String,

    /// Source language code.
    pub source_lang: String,

    /// Target language code.
    pub target_lang: String,

    /// Maximum characters per request (the endpoint rejects ~5000).
    pub chunk_size_chars: usize,
}

impl Default for LiteralConfig {
    fn default() -> Self {
        Self {
            base_url: "https://translate.googleapis.com".to_string(),
            source_lang: "zh-CN".to_string(),
            target_lang: "en".to_string(),
            chunk_size_chars: 4500,
        }
    }
}

/// Translation behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    /// Number of attempts for transient provider errors.
    pub retries: u32,

    /// Minimum delay between any two provider requests, in seconds.
    pub delay_between_requests_sec: f64,

    /// Maximum pending chapters translated in one run. 0 means no cap.
    pub max_chapters_per_run: u32,

    /// Whether chapter/description content goes through the context-aware
    /// provider at all. When false, everything uses the literal provider.
    pub use_context_provider: bool,

    /// Sampling temperature for context-provider translation calls.
    pub temperature: f32,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            retries: 3,
            delay_between_requests_sec: 1.0,
            max_chapters_per_run: 0,
            use_context_provider: true,
            temperature: 0.3,
        }
    }
}

/// Glossary building configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlossaryConfig {
    /// How many chapters from the start of the work are sampled.
    pub max_sample_chapters: usize,

    /// Per-chapter character cap inside the sample payload.
    pub sample_chars_per_chapter: usize,

    /// Overall character cap for the combined sample payload.
    pub max_payload_chars: usize,
}

impl Default for GlossaryConfig {
    fn default() -> Self {
        Self {
            max_sample_chapters: 10,
            sample_chars_per_chapter: 3000,
            max_payload_chars: 15000,
        }
    }
}

/// Content platform publishing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Base URL of the platform. Empty disables the publish pass.
    pub base_url: String,

    /// API key sent in the X-API-Key header.
    pub api_key: String,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
        }
    }
}

impl PublishConfig {
    /// Checks if publishing is configured.
    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty() && !self.api_key.is_empty()
    }
}

/// LLM system prompts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    /// Prompt for chapter content translation.
    pub chapter_translation: String,

    /// Prompt for work description translation (includes boilerplate cleanup).
    pub description_translation: String,

    /// Prompt for glossary term extraction.
    pub glossary_extraction: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            chapter_translation: "You are a professional translator for Chinese web novels. \
Translate the chapter to natural, fluent English. Maintain narrative flow, keep the same \
paragraph structure, translate cultivation terms naturally, and remove all markdown \
formatting. Use the provided glossary for consistency with previous chapters. Output only \
the translated chapter content, with no notes or meta-commentary.".to_string(),
            description_translation: "You are a professional translator for Chinese web novels. \
Translate the novel description to English. Return only the main story synopsis as plain \
text: strip markdown formatting, character profiles, tags, reading guides, author notes, \
update footers, and advertisements. Keep only the core plot description with natural \
paragraph breaks. No explanations, only the synopsis text.".to_string(),
            glossary_extraction: r#"You are a professional translator for Chinese web novels. Analyze the chapters and build a consistent English glossary for character names, place names, and special or cultivation terms. Use pinyin or natural English equivalents for names. Return ONLY a JSON object in this exact format:
{"characters":{"中文名":"English Name"},"places":{"中文地名":"English Place"},"terms":{"中文术语":"English Term"}}"#.to_string(),
        }
    }
}

/// File path configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding per-work state, glossaries, and raw chapters.
    pub library_directory: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            library_directory: PathBuf::from("."),
        }
    }
}

impl PathsConfig {
    /// Directory for a single work's artifacts.
    pub fn work_dir(&self, work_id: &str) -> PathBuf {
        self.library_directory.join(work_id)
    }

    /// Path to a work's state file.
    pub fn work_state_path(&self, work_id: &str) -> PathBuf {
        self.work_dir(work_id).join("work.json")
    }

    /// Path to a work's glossary file.
    pub fn glossary_path(&self, work_id: &str) -> PathBuf {
        self.work_dir(work_id).join("glossary.json")
    }

    /// Directory holding a work's pre-crawled raw chapters.
    pub fn raw_dir(&self, work_id: &str) -> PathBuf {
        self.work_dir(work_id).join("raw")
    }
}

impl Config {
    /// Returns the platform-specific config directory path.
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|p| p.join(APP_NAME))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Returns the full path to the config file.
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join(CONFIG_FILENAME))
    }

    /// Loads configuration from the default location.
    ///
    /// If the config file doesn't exist, creates a default one.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Config::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        Ok(config)
    }

    /// Saves configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.translation.use_context_provider && !self.gemini.is_configured() {
            return Err(ConfigError::MissingValue(
                "gemini.key (set your API key in the config file, or disable \
                 translation.use_context_provider)"
                    .to_string(),
            ));
        }

        if self.literal.chunk_size_chars == 0 {
            return Err(ConfigError::InvalidValue {
                key: "literal.chunk_size_chars".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        if self.glossary.max_sample_chapters == 0 {
            return Err(ConfigError::InvalidValue {
                key: "glossary.max_sample_chapters".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        if self.translation.delay_between_requests_sec < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "translation.delay_between_requests_sec".to_string(),
                message: "must not be negative".to_string(),
            });
        }

        if !self.publish.base_url.is_empty() {
            url::Url::parse(&self.publish.base_url).map_err(|e| ConfigError::InvalidValue {
                key: "publish.base_url".to_string(),
                message: e.to_string(),
            })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.gemini.is_configured());
        assert!(!config.publish.is_configured());
        assert_eq!(config.glossary.max_sample_chapters, 10);
        assert_eq!(config.literal.chunk_size_chars, 4500);
        assert_eq!(config.translation.retries, 3);
        assert!(config.translation.use_context_provider);
    }

    #[test]
    fn test_api_configured_check() {
        let mut api = ApiConfig::default();
        assert!(!api.is_configured());

        api.key = "real-key".to_string();
        assert!(api.is_configured());
    }

    #[test]
    fn test_config_round_trip() {
        let config = Config::default();
        let file = NamedTempFile::new().unwrap();

        config.save_to(file.path()).unwrap();

        let loaded = Config::load_from(file.path()).unwrap();
        assert_eq!(loaded.gemini.model, config.gemini.model);
        assert_eq!(loaded.literal.source_lang, config.literal.source_lang);
        assert_eq!(
            loaded.glossary.max_sample_chapters,
            config.glossary.max_sample_chapters
        );
    }

    #[test]
    fn test_config_validation() {
        let config = Config::default();
        assert!(config.validate().is_err()); // gemini key not set

        let mut config = Config::default();
        config.gemini.key = "real-key".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_without_context_provider() {
        let mut config = Config::default();
        config.translation.use_context_provider = false;
        // Literal-only mode needs no API key at all.
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_publish_url() {
        let mut config = Config::default();
        config.gemini.key = "real-key".to_string();
        config.publish.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_work_paths() {
        let paths = PathsConfig {
            library_directory: PathBuf::from("/tmp/library"),
        };
        assert_eq!(
            paths.work_state_path("novel_42"),
            PathBuf::from("/tmp/library/novel_42/work.json")
        );
        assert_eq!(
            paths.glossary_path("novel_42"),
            PathBuf::from("/tmp/library/novel_42/glossary.json")
        );
        assert_eq!(
            paths.raw_dir("novel_42"),
            PathBuf::from("/tmp/library/novel_42/raw")
        );
    }
}
