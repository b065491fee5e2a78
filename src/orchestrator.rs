//! Translation orchestrator - the per-chapter fallback state machine.
//!
//! Sequences provider calls for one chapter at a time: the context-aware
//! provider first (with glossary instructions), then the fast-literal
//! provider when the primary rejects the content or exhausts its transient
//! retries. Titles skip the primary entirely; short strings need speed over
//! context. The orchestrator also owns rate shaping: a minimum delay
//! between any two provider requests, regardless of which provider is hit.

use crate::config::{PromptsConfig, TranslationConfig};
use crate::console::Console;
use crate::error::ProviderError;
use crate::glossary::GlossaryStore;
use crate::providers::{TranslateRequest, TranslationProvider};
use crate::work::{Chapter, TranslatedBy, TranslationStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Glossary instruction blocks are capped so prompts stay bounded on works
/// with sprawling casts.
const MAX_GLOSSARY_HINTS: usize = 50;

/// Ephemeral record of one provider attempt, for run observability.
#[derive(Debug, Clone)]
pub struct TranslationAttempt {
    /// Chapter the attempt was for.
    pub chapter: u32,
    /// Provider tried.
    pub provider: TranslatedBy,
    /// Error detail when the attempt failed.
    pub error: Option<String>,
}

impl TranslationAttempt {
    /// Whether the attempt produced a translation.
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of orchestrating one chapter.
#[derive(Debug)]
pub struct ChapterOutcome {
    /// The chapter with its new status and translated fields.
    pub chapter: Chapter,
    /// Provider attempts made for this chapter, in order.
    pub attempts: Vec<TranslationAttempt>,
}

/// Orchestrates provider calls, fallback, retries, and rate shaping.
pub struct TranslationOrchestrator {
    /// Context-aware provider (honors glossary and cleanup instructions).
    primary: Arc<dyn TranslationProvider>,
    /// Fast-literal provider (fallback, and all titles).
    fallback: Arc<dyn TranslationProvider>,
    /// Behavior configuration.
    config: TranslationConfig,
    /// Prompts for the context-aware provider.
    prompts: PromptsConfig,
    /// Console for output.
    console: Console,
    /// Completion time of the last provider request, for the rate gate.
    last_request: Mutex<Option<Instant>>,
}

impl TranslationOrchestrator {
    /// Create a new TranslationOrchestrator.
    pub fn new(
        primary: Arc<dyn TranslationProvider>,
        fallback: Arc<dyn TranslationProvider>,
        config: TranslationConfig,
        prompts: PromptsConfig,
    ) -> Self {
        Self {
            primary,
            fallback,
            config,
            prompts,
            console: Console::new(),
            last_request: Mutex::new(None),
        }
    }

    /// Translate one chapter, applying the fallback state machine.
    ///
    /// Returns a new chapter record with its status set. A chapter that is
    /// already `Translated` is returned unchanged without any provider
    /// call; completed translations are immutable across runs.
    pub async fn translate_chapter(
        &self,
        chapter: &Chapter,
        glossary: &GlossaryStore,
    ) -> ChapterOutcome {
        if chapter.is_translated() {
            return ChapterOutcome {
                chapter: chapter.clone(),
                attempts: Vec::new(),
            };
        }

        let mut updated = chapter.clone();
        let mut attempts = Vec::new();

        let body = self
            .translate_body(chapter.number, &chapter.content, glossary, &mut attempts)
            .await;

        match body {
            Some((text, provider)) => {
                // Titles always go through the fast-literal provider; on
                // failure the source title is kept rather than failing a
                // chapter whose body already translated.
                let title = match self.translate_title(&chapter.title).await {
                    Ok(title) => title,
                    Err(e) => {
                        self.console.warning(&format!(
                            "Title translation failed for chapter {} ({}); keeping source title",
                            chapter.number, e
                        ));
                        chapter.title.clone()
                    }
                };

                updated.translated_title = Some(title);
                updated.translated_content = Some(text);
                updated.translated_by = Some(provider);
                updated.status = TranslationStatus::Translated;
            }
            None => {
                updated.status = TranslationStatus::Failed;
                updated.translated_by = None;
            }
        }

        ChapterOutcome {
            chapter: updated,
            attempts,
        }
    }

    /// Translate chapter body text, recording attempts.
    ///
    /// Returns the translated text and the provider that produced it, or
    /// `None` when both providers are exhausted.
    async fn translate_body(
        &self,
        chapter_number: u32,
        content: &str,
        glossary: &GlossaryStore,
        attempts: &mut Vec<TranslationAttempt>,
    ) -> Option<(String, TranslatedBy)> {
        if self.config.use_context_provider {
            let request =
                TranslateRequest::with_instructions(content, &self.prompts.chapter_translation)
                    .glossary(glossary.render_hints(MAX_GLOSSARY_HINTS));

            match self.call_with_retries(self.primary.as_ref(), &request).await {
                Ok(text) => {
                    attempts.push(TranslationAttempt {
                        chapter: chapter_number,
                        provider: TranslatedBy::Primary,
                        error: None,
                    });
                    return Some((text, TranslatedBy::Primary));
                }
                Err(e) => {
                    attempts.push(TranslationAttempt {
                        chapter: chapter_number,
                        provider: TranslatedBy::Primary,
                        error: Some(e.to_string()),
                    });
                    self.console.warning(&format!(
                        "{} failed for chapter {} ({}); falling back to {}",
                        self.primary.name(),
                        chapter_number,
                        e,
                        self.fallback.name()
                    ));
                }
            }
        }

        // The literal provider gets the raw body; it cannot follow glossary
        // instructions, so consistency is best-effort from here on.
        if !self.fallback.honors_instructions() && !glossary.is_empty() {
            self.console.info(&format!(
                "Glossary not enforceable on {}; term consistency is best-effort for chapter {}",
                self.fallback.name(),
                chapter_number
            ));
        }

        let request = TranslateRequest::bare(content);
        match self.call_with_retries(self.fallback.as_ref(), &request).await {
            Ok(text) => {
                attempts.push(TranslationAttempt {
                    chapter: chapter_number,
                    provider: TranslatedBy::Fallback,
                    error: None,
                });
                Some((text, TranslatedBy::Fallback))
            }
            Err(e) => {
                attempts.push(TranslationAttempt {
                    chapter: chapter_number,
                    provider: TranslatedBy::Fallback,
                    error: Some(e.to_string()),
                });
                None
            }
        }
    }

    /// Translate a title with the fast-literal provider.
    pub async fn translate_title(&self, title: &str) -> Result<String, ProviderError> {
        self.call_with_retries(self.fallback.as_ref(), &TranslateRequest::bare(title))
            .await
    }

    /// Translate a work description.
    ///
    /// Descriptions go through the context-aware provider with a cleanup
    /// instruction (site boilerplate stripped), falling back like chapter
    /// bodies. The raw work title is appended when provided so readers can
    /// find the source.
    pub async fn translate_description(
        &self,
        description: &str,
        raw_title: Option<&str>,
        glossary: &GlossaryStore,
    ) -> Result<String, ProviderError> {
        let mut translated = if self.config.use_context_provider {
            let request = TranslateRequest::with_instructions(
                description,
                &self.prompts.description_translation,
            )
            .glossary(glossary.render_hints(MAX_GLOSSARY_HINTS));

            match self.call_with_retries(self.primary.as_ref(), &request).await {
                Ok(text) => text,
                Err(e) => {
                    self.console.warning(&format!(
                        "Description translation via {} failed ({}); using {}",
                        self.primary.name(),
                        e,
                        self.fallback.name()
                    ));
                    self.call_with_retries(
                        self.fallback.as_ref(),
                        &TranslateRequest::bare(description),
                    )
                    .await?
                }
            }
        } else {
            self.call_with_retries(self.fallback.as_ref(), &TranslateRequest::bare(description))
                .await?
        };

        if let Some(raw) = raw_title {
            translated.push_str("\n\nRaw Novel Name: ");
            translated.push_str(raw);
        }

        Ok(translated)
    }

    /// Call one provider with transient-error retries and backoff.
    ///
    /// Content-policy rejections are deterministic and returned
    /// immediately; retrying them on the same provider would only burn
    /// quota.
    async fn call_with_retries(
        &self,
        provider: &dyn TranslationProvider,
        request: &TranslateRequest,
    ) -> Result<String, ProviderError> {
        let max_attempts = self.config.retries.max(1);
        let mut attempt = 0;

        loop {
            self.throttle().await;

            match provider.translate(request).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_content_policy() => return Err(e),
                Err(e) => {
                    attempt += 1;
                    if attempt >= max_attempts {
                        return Err(e);
                    }
                    let delay = Duration::from_secs(2u64.pow(attempt));
                    self.console.warning(&format!(
                        "{} request failed ({}), retrying in {:?} (attempt {}/{})",
                        provider.name(),
                        e,
                        delay,
                        attempt + 1,
                        max_attempts
                    ));
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Enforce the minimum delay between provider requests.
    async fn throttle(&self) {
        let min_delay = Duration::from_secs_f64(self.config.delay_between_requests_sec);
        let mut last = self.last_request.lock().await;

        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < min_delay {
                tokio::time::sleep(min_delay - elapsed).await;
            }
        }

        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glossary::{GlossaryEntry, TermCategory};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Provider fixture replaying a scripted sequence of results.
    struct ScriptedProvider {
        name: &'static str,
        honors: bool,
        responses: StdMutex<VecDeque<Result<String, ProviderError>>>,
        calls: AtomicU32,
        requests: StdMutex<Vec<TranslateRequest>>,
    }

    impl ScriptedProvider {
        fn new(name: &'static str, honors: bool) -> Self {
            Self {
                name,
                honors,
                responses: StdMutex::new(VecDeque::new()),
                calls: AtomicU32::new(0),
                requests: StdMutex::new(Vec::new()),
            }
        }

        fn push(&self, result: Result<&str, ProviderError>) {
            self.responses
                .lock()
                .unwrap()
                .push_back(result.map(String::from));
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }

        fn requests(&self) -> Vec<TranslateRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TranslationProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        fn honors_instructions(&self) -> bool {
            self.honors
        }

        async fn translate(&self, request: &TranslateRequest) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(ProviderError::ApiError("script exhausted".to_string())))
        }
    }

    fn config() -> TranslationConfig {
        TranslationConfig {
            retries: 3,
            delay_between_requests_sec: 0.0,
            max_chapters_per_run: 0,
            use_context_provider: true,
            temperature: 0.3,
        }
    }

    fn orchestrator(
        primary: Arc<ScriptedProvider>,
        fallback: Arc<ScriptedProvider>,
        config: TranslationConfig,
    ) -> TranslationOrchestrator {
        TranslationOrchestrator::new(primary, fallback, config, PromptsConfig::default())
    }

    fn chapter() -> Chapter {
        Chapter::new(3, "第三章", "林羽抬头。林羽冷笑。林羽离开了。")
    }

    fn glossary_with_lin_yu() -> GlossaryStore {
        let mut store = GlossaryStore::new();
        store.insert(GlossaryEntry {
            category: TermCategory::Character,
            source: "林羽".to_string(),
            rendering: "Lin Yu".to_string(),
        });
        store
    }

    #[tokio::test]
    async fn test_primary_success() {
        let primary = Arc::new(ScriptedProvider::new("primary", true));
        let fallback = Arc::new(ScriptedProvider::new("fallback", false));
        primary.push(Ok("Lin Yu looked up. Lin Yu sneered. Lin Yu left."));
        fallback.push(Ok("Chapter Three"));

        let orch = orchestrator(primary.clone(), fallback.clone(), config());
        let outcome = orch
            .translate_chapter(&chapter(), &glossary_with_lin_yu())
            .await;

        let chapter = outcome.chapter;
        assert_eq!(chapter.status, TranslationStatus::Translated);
        assert_eq!(chapter.translated_by, Some(TranslatedBy::Primary));
        assert_eq!(
            chapter.translated_content.as_deref(),
            Some("Lin Yu looked up. Lin Yu sneered. Lin Yu left.")
        );
        assert_eq!(chapter.translated_title.as_deref(), Some("Chapter Three"));
        assert_eq!(primary.calls(), 1);
        // Fallback saw only the title.
        assert_eq!(fallback.calls(), 1);
        assert_eq!(fallback.requests()[0].text, "第三章");
    }

    #[tokio::test]
    async fn test_glossary_rendered_into_primary_request() {
        let primary = Arc::new(ScriptedProvider::new("primary", true));
        let fallback = Arc::new(ScriptedProvider::new("fallback", false));
        primary.push(Ok("translated"));
        fallback.push(Ok("title"));

        let orch = orchestrator(primary.clone(), fallback.clone(), config());
        orch.translate_chapter(&chapter(), &glossary_with_lin_yu())
            .await;

        let request = &primary.requests()[0];
        assert!(request.glossary_hints.contains("- 林羽 = Lin Yu"));
        assert!(!request.instructions.is_empty());
    }

    #[tokio::test]
    async fn test_content_policy_falls_back_without_retry() {
        let primary = Arc::new(ScriptedProvider::new("primary", true));
        let fallback = Arc::new(ScriptedProvider::new("fallback", false));
        primary.push(Err(ProviderError::ContentPolicy("safety".to_string())));
        fallback.push(Ok("literal body"));
        fallback.push(Ok("title"));

        let orch = orchestrator(primary.clone(), fallback.clone(), config());
        let outcome = orch
            .translate_chapter(&chapter(), &GlossaryStore::new())
            .await;

        assert_eq!(outcome.chapter.status, TranslationStatus::Translated);
        assert_eq!(outcome.chapter.translated_by, Some(TranslatedBy::Fallback));
        // Content-policy rejections are never retried on the same provider.
        assert_eq!(primary.calls(), 1);
        assert_eq!(outcome.attempts.len(), 2);
        assert!(!outcome.attempts[0].succeeded());
        assert!(outcome.attempts[1].succeeded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_error_retried_with_backoff() {
        let primary = Arc::new(ScriptedProvider::new("primary", true));
        let fallback = Arc::new(ScriptedProvider::new("fallback", false));
        primary.push(Err(ProviderError::RateLimited("HTTP 429".to_string())));
        primary.push(Ok("recovered"));
        fallback.push(Ok("title"));

        let orch = orchestrator(primary.clone(), fallback.clone(), config());
        let outcome = orch
            .translate_chapter(&chapter(), &GlossaryStore::new())
            .await;

        assert_eq!(outcome.chapter.status, TranslationStatus::Translated);
        assert_eq!(outcome.chapter.translated_by, Some(TranslatedBy::Primary));
        assert_eq!(primary.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_both_providers_exhausted_marks_failed() {
        let primary = Arc::new(ScriptedProvider::new("primary", true));
        let fallback = Arc::new(ScriptedProvider::new("fallback", false));
        for _ in 0..3 {
            primary.push(Err(ProviderError::ApiError("HTTP 500".to_string())));
        }
        for _ in 0..3 {
            fallback.push(Err(ProviderError::ApiError("HTTP 502".to_string())));
        }

        let orch = orchestrator(primary.clone(), fallback.clone(), config());
        let outcome = orch
            .translate_chapter(&chapter(), &GlossaryStore::new())
            .await;

        assert_eq!(outcome.chapter.status, TranslationStatus::Failed);
        assert_eq!(outcome.chapter.translated_by, None);
        assert!(outcome.chapter.translated_content.is_none());
        assert_eq!(primary.calls(), 3);
        assert_eq!(fallback.calls(), 3);
        assert_eq!(outcome.attempts.len(), 2);
        assert!(outcome.attempts.iter().all(|a| !a.succeeded()));
    }

    #[tokio::test]
    async fn test_translated_chapter_is_never_reattempted() {
        let primary = Arc::new(ScriptedProvider::new("primary", true));
        let fallback = Arc::new(ScriptedProvider::new("fallback", false));

        let mut done = chapter();
        done.status = TranslationStatus::Translated;
        done.translated_by = Some(TranslatedBy::Primary);
        done.translated_content = Some("Already done.".to_string());
        done.translated_title = Some("Chapter Three".to_string());

        let orch = orchestrator(primary.clone(), fallback.clone(), config());
        let outcome = orch.translate_chapter(&done, &GlossaryStore::new()).await;

        assert_eq!(
            outcome.chapter.translated_content.as_deref(),
            Some("Already done.")
        );
        assert!(outcome.attempts.is_empty());
        assert_eq!(primary.calls(), 0);
        assert_eq!(fallback.calls(), 0);
    }

    #[tokio::test]
    async fn test_context_provider_disabled_goes_straight_to_fallback() {
        let primary = Arc::new(ScriptedProvider::new("primary", true));
        let fallback = Arc::new(ScriptedProvider::new("fallback", false));
        fallback.push(Ok("literal body"));
        fallback.push(Ok("title"));

        let mut config = config();
        config.use_context_provider = false;

        let orch = orchestrator(primary.clone(), fallback.clone(), config);
        let outcome = orch
            .translate_chapter(&chapter(), &GlossaryStore::new())
            .await;

        assert_eq!(outcome.chapter.status, TranslationStatus::Translated);
        assert_eq!(outcome.chapter.translated_by, Some(TranslatedBy::Fallback));
        assert_eq!(primary.calls(), 0);
    }

    #[tokio::test]
    async fn test_title_failure_keeps_source_title() {
        let primary = Arc::new(ScriptedProvider::new("primary", true));
        let fallback = Arc::new(ScriptedProvider::new("fallback", false));
        primary.push(Ok("translated body"));
        for _ in 0..3 {
            fallback.push(Err(ProviderError::ApiError("down".to_string())));
        }

        let mut config = config();
        config.retries = 1;

        let orch = orchestrator(primary.clone(), fallback.clone(), config);
        let outcome = orch
            .translate_chapter(&chapter(), &GlossaryStore::new())
            .await;

        assert_eq!(outcome.chapter.status, TranslationStatus::Translated);
        assert_eq!(outcome.chapter.translated_title.as_deref(), Some("第三章"));
    }

    #[tokio::test]
    async fn test_description_cleanup_instructions_and_suffix() {
        let primary = Arc::new(ScriptedProvider::new("primary", true));
        let fallback = Arc::new(ScriptedProvider::new("fallback", false));
        primary.push(Ok("A story about a sect disciple."));

        let orch = orchestrator(primary.clone(), fallback.clone(), config());
        let result = orch
            .translate_description("简介：宗门弟子的故事。", Some("测试小说"), &GlossaryStore::new())
            .await
            .unwrap();

        assert_eq!(
            result,
            "A story about a sect disciple.\n\nRaw Novel Name: 测试小说"
        );
        let request = &primary.requests()[0];
        assert!(request.instructions.contains("synopsis"));
    }

    #[tokio::test]
    async fn test_description_falls_back_on_policy_rejection() {
        let primary = Arc::new(ScriptedProvider::new("primary", true));
        let fallback = Arc::new(ScriptedProvider::new("fallback", false));
        primary.push(Err(ProviderError::ContentPolicy("blocked".to_string())));
        fallback.push(Ok("Literal description."));

        let orch = orchestrator(primary.clone(), fallback.clone(), config());
        let result = orch
            .translate_description("简介", None, &GlossaryStore::new())
            .await
            .unwrap();

        assert_eq!(result, "Literal description.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_gate_spaces_requests() {
        let primary = Arc::new(ScriptedProvider::new("primary", true));
        let fallback = Arc::new(ScriptedProvider::new("fallback", false));
        fallback.push(Ok("one"));
        fallback.push(Ok("two"));

        let mut config = config();
        config.delay_between_requests_sec = 5.0;

        let orch = orchestrator(primary, fallback, config);

        let start = Instant::now();
        orch.translate_title("第一章").await.unwrap();
        orch.translate_title("第二章").await.unwrap();

        // The second call must wait out the configured gap.
        assert!(start.elapsed() >= Duration::from_secs(5));
    }
}
