//! Work pipeline - sequencing the passes over one work.
//!
//! Pass order is fixed: ensure raw chapters are present, build or load the
//! glossary, translate pending chapters in ascending order, publish what
//! completed. Every pass is a no-op when its artifact already exists, so
//! the whole pipeline is safe to re-invoke at any point; interruption
//! between chapters leaves in-flight chapters pending because state is
//! saved only after a completed provider response.

use crate::config::Config;
use crate::console::Console;
use crate::error::Result;
use crate::glossary::GlossaryStore;
use crate::glossary_builder::GlossaryBuilder;
use crate::orchestrator::TranslationOrchestrator;
use crate::publisher::Publisher;
use crate::source::ChapterSource;
use crate::work::{TranslatedBy, TranslationStatus, WorkStore};
use anyhow::{Context, bail};

/// Summary of one pipeline run over a work.
#[derive(Debug, Default)]
pub struct WorkResult {
    /// Chapters translated by the context-aware provider this run.
    pub translated_primary: u32,

    /// Chapters translated by the fast-literal provider this run.
    pub translated_fallback: u32,

    /// Chapters already translated before this run started.
    pub skipped: u32,

    /// Chapter numbers that exhausted both providers this run. Listed
    /// explicitly so they can be targeted for manual retry.
    pub failed: Vec<u32>,

    /// Chapters handed to the publisher successfully.
    pub published: u32,
}

impl WorkResult {
    /// Chapters that reached a translated state this run.
    pub fn translated(&self) -> u32 {
        self.translated_primary + self.translated_fallback
    }

    /// Whether any chapter failed this run.
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Drives the orchestrator and glossary builder across a whole work.
pub struct WorkPipeline {
    /// Per-chapter translation state machine.
    orchestrator: TranslationOrchestrator,
    /// Glossary builder for the first run over a work.
    builder: GlossaryBuilder,
    /// Immutable run configuration.
    config: Config,
    /// Console for output.
    console: Console,
}

impl WorkPipeline {
    /// Create a new WorkPipeline.
    pub fn new(
        orchestrator: TranslationOrchestrator,
        builder: GlossaryBuilder,
        config: Config,
    ) -> Self {
        Self {
            orchestrator,
            builder,
            config,
            console: Console::new(),
        }
    }

    /// Run all passes over the work.
    ///
    /// Safe to re-invoke: existing artifacts are reused, translated
    /// chapters are skipped, and a failed chapter never aborts the batch.
    pub async fn run(
        &self,
        store: &mut WorkStore,
        source: &dyn ChapterSource,
        publisher: Option<&dyn Publisher>,
    ) -> Result<WorkResult> {
        self.ensure_raw_chapters(store, source).await?;

        let glossary = self.load_or_build_glossary(store).await?;

        self.translate_metadata(store, &glossary).await?;

        let mut result = self.translate_chapters(store, &glossary).await?;

        if let Some(publisher) = publisher {
            self.publish(store, publisher, &mut result).await;
        }

        self.print_summary(&result);
        Ok(result)
    }

    /// Pass 1: check raw chapter presence, filling gaps from the source.
    async fn ensure_raw_chapters(
        &self,
        store: &mut WorkStore,
        source: &dyn ChapterSource,
    ) -> Result<()> {
        let work_id = store.work().id.clone();

        if store.work().chapters.is_empty() {
            bail!("work '{}' has no chapters; run the crawler first", work_id);
        }

        let missing: Vec<u32> = store
            .work()
            .chapters
            .iter()
            .filter(|c| !c.has_source() && !c.is_translated())
            .map(|c| c.number)
            .collect();

        if missing.is_empty() {
            return Ok(());
        }

        if !source.has_work(&work_id).await {
            bail!(
                "{} raw chapters missing for '{}' and the source has none",
                missing.len(),
                work_id
            );
        }

        self.console.step(&format!(
            "Fetching {} missing raw chapters...",
            missing.len()
        ));

        for number in missing {
            let raw = source
                .fetch_chapter(&work_id, number)
                .await
                .with_context(|| format!("failed to fetch raw chapter {}", number))?;

            if let Some(chapter) = store.work_mut().chapter_mut(number) {
                if chapter.title.is_empty() {
                    chapter.title = raw.title;
                }
                chapter.content = raw.content;
            }
        }

        store.save()?;
        Ok(())
    }

    /// Pass 2: load the persisted glossary, or build one from the sample.
    ///
    /// A degraded (empty) build result is not persisted, so the next run
    /// gets another chance at building before chapters drift apart.
    async fn load_or_build_glossary(&self, store: &WorkStore) -> Result<GlossaryStore> {
        if !self.config.translation.use_context_provider {
            // The literal provider cannot follow glossary instructions.
            return Ok(GlossaryStore::new());
        }

        let path = self.config.paths.glossary_path(&store.work().id);
        if let Some(glossary) = GlossaryStore::load(&path)? {
            self.console.info(&format!(
                "Loaded existing glossary with {} entries",
                glossary.len()
            ));
            return Ok(glossary);
        }

        self.console.step(&format!(
            "Building glossary from the first {} chapters...",
            self.config.glossary.max_sample_chapters
        ));
        let glossary = self.builder.build(&store.work().chapters).await;

        if !glossary.is_empty() {
            glossary.save(&path)?;
            self.console
                .success(&format!("Glossary saved to {}", path.display()));
        }

        Ok(glossary)
    }

    /// Translate work title and description if not already done.
    ///
    /// Titles use the literal provider directly; descriptions go through
    /// the context provider with boilerplate cleanup. Metadata failures
    /// are warnings, never run failures.
    async fn translate_metadata(
        &self,
        store: &mut WorkStore,
        glossary: &GlossaryStore,
    ) -> Result<()> {
        let title = store.work().title.clone();
        let description = store.work().description.clone();
        let mut changed = false;

        if store.work().translated_title.is_none() {
            match self.orchestrator.translate_title(&title).await {
                Ok(translated) => {
                    store.work_mut().translated_title = Some(translated);
                    changed = true;
                }
                Err(e) => self
                    .console
                    .warning(&format!("Work title translation failed: {}", e)),
            }
        }

        if store.work().translated_description.is_none() && !description.trim().is_empty() {
            match self
                .orchestrator
                .translate_description(&description, Some(&title), glossary)
                .await
            {
                Ok(translated) => {
                    store.work_mut().translated_description = Some(translated);
                    changed = true;
                }
                Err(e) => self
                    .console
                    .warning(&format!("Work description translation failed: {}", e)),
            }
        }

        if changed {
            store.save()?;
        }
        Ok(())
    }

    /// Pass 3: translate pending chapters in ascending order.
    async fn translate_chapters(
        &self,
        store: &mut WorkStore,
        glossary: &GlossaryStore,
    ) -> Result<WorkResult> {
        let total = store.work().chapters.len();
        let mut result = WorkResult {
            skipped: store
                .work()
                .chapters
                .iter()
                .filter(|c| c.is_translated())
                .count() as u32,
            ..WorkResult::default()
        };

        let pending = store.work().pending_numbers();
        let cap = self.config.translation.max_chapters_per_run as usize;
        let selected: Vec<u32> = if cap > 0 {
            pending.iter().copied().take(cap).collect()
        } else {
            pending.clone()
        };

        if selected.len() < pending.len() {
            self.console.info(&format!(
                "Chapter cap reached; {} pending chapters left for the next run",
                pending.len() - selected.len()
            ));
        }

        for number in selected {
            let Some(chapter) = store.work().chapter(number).cloned() else {
                continue;
            };

            self.console.step(&format!(
                "{} Translating: {}",
                self.console.chapter_progress(number, total),
                chapter.title
            ));

            let outcome = self.orchestrator.translate_chapter(&chapter, glossary).await;

            match (outcome.chapter.status, outcome.chapter.translated_by) {
                (TranslationStatus::Translated, Some(TranslatedBy::Primary)) => {
                    result.translated_primary += 1;
                    self.console
                        .success(&format!("Chapter {} translated (primary)", number));
                }
                (TranslationStatus::Translated, _) => {
                    result.translated_fallback += 1;
                    self.console
                        .success(&format!("Chapter {} translated (fallback)", number));
                }
                _ => {
                    result.failed.push(number);
                    self.console.error(&format!(
                        "Chapter {} failed on both providers; will need manual retry",
                        number
                    ));
                }
            }

            if let Some(slot) = store.work_mut().chapter_mut(number) {
                *slot = outcome.chapter;
            }

            // Persist after every chapter so an interrupted run resumes
            // exactly here, with in-flight chapters still pending.
            store.save()?;
        }

        Ok(result)
    }

    /// Pass 4: hand completed chapters to the publisher.
    ///
    /// Publish errors are recorded and skipped; retries belong to the
    /// publisher, not the pipeline.
    async fn publish(
        &self,
        store: &WorkStore,
        publisher: &dyn Publisher,
        result: &mut WorkResult,
    ) {
        let work = store.work();

        if let Err(e) = publisher.publish_work(work).await {
            self.console
                .warning(&format!("Failed to publish work entry: {}", e));
            return;
        }

        for chapter in work.chapters.iter().filter(|c| c.is_translated()) {
            match publisher.publish_chapter(work, chapter).await {
                Ok(_) => result.published += 1,
                Err(e) => self.console.warning(&format!(
                    "Failed to publish chapter {}: {}",
                    chapter.number, e
                )),
            }
        }
    }

    /// Print the end-of-run summary.
    fn print_summary(&self, result: &WorkResult) {
        self.console.section("Run summary");
        self.console.info(&format!(
            "Translated by primary: {}",
            result.translated_primary
        ));
        self.console.info(&format!(
            "Translated by fallback: {}",
            result.translated_fallback
        ));
        self.console
            .info(&format!("Skipped (already done): {}", result.skipped));
        self.console
            .info(&format!("Published: {}", result.published));

        if result.has_failures() {
            self.console.error(&format!(
                "Failed chapters: {}",
                result
                    .failed
                    .iter()
                    .map(u32::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }
    }
}
