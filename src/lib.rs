//! Lianzai - Chinese web novel translation pipeline.
//!
//! This library provides functionality for:
//! - Translating crawled chapters through two cooperating providers
//!   (context-aware primary, fast-literal fallback)
//! - Building and persisting a per-work term glossary for consistent
//!   renderings across chapters
//! - Resumable batch runs that publish completed chapters to a content
//!   platform

pub mod config;
pub mod console;
pub mod error;
pub mod glossary;
pub mod glossary_builder;
pub mod orchestrator;
pub mod pipeline;
pub mod providers;
pub mod publisher;
pub mod source;
pub mod utils;
pub mod work;

// Re-export commonly used types
pub use config::Config;
pub use console::Console;
pub use error::{
    ConfigError, GlossaryError, ProviderError, PublishError, SourceError, StoreError,
};
pub use glossary::{GlossaryEntry, GlossaryStore, TermCategory};
pub use glossary_builder::GlossaryBuilder;
pub use orchestrator::{TranslationAttempt, TranslationOrchestrator};
pub use pipeline::{WorkPipeline, WorkResult};
pub use providers::{GeminiProvider, GoogleProvider, TranslateRequest, TranslationProvider};
pub use publisher::{PublishResult, Publisher, WordPressPublisher};
pub use source::{ChapterSource, DirChapterSource, RawChapter};
pub use work::{Chapter, TranslatedBy, TranslationStatus, Work, WorkStore};
