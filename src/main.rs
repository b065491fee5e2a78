//! Lianzai CLI - Chinese web novel translation pipeline.

use anyhow::{Context, Result};
use clap::Parser;
use lianzai::config::Config;
use lianzai::console::Console;
use lianzai::glossary_builder::GlossaryBuilder;
use lianzai::orchestrator::TranslationOrchestrator;
use lianzai::pipeline::WorkPipeline;
use lianzai::providers::{GeminiProvider, GoogleProvider};
use lianzai::publisher::{Publisher, WordPressPublisher};
use lianzai::source::DirChapterSource;
use lianzai::work::WorkStore;
use std::sync::Arc;

/// Chinese web novel translation pipeline.
#[derive(Parser, Debug)]
#[command(name = "lianzai")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Identifier of the work to process (its library directory name).
    work_id: String,

    /// Override the maximum pending chapters translated this run.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    max_chapters: Option<u32>,

    /// Reset failed chapters to pending before translating.
    #[arg(long)]
    retry_failed: bool,

    /// Skip the publish pass even when a platform is configured.
    #[arg(long)]
    no_publish: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let console = Console::new();

    console.section("Lianzai - Web Novel Translation Pipeline");

    // Load configuration
    console.step("Loading configuration...");
    let mut config = Config::load().context("Failed to load configuration")?;

    // Check if this is first run (API key not configured)
    if config.translation.use_context_provider && !config.gemini.is_configured() {
        let config_path = Config::config_path()?;
        console.warning(&format!(
            "API key not configured. Please edit: {}",
            config_path.display()
        ));
        console.info("Set your Gemini API key in the config file and run again.");
        return Ok(());
    }

    config.validate().context("Invalid configuration")?;
    if let Some(max) = args.max_chapters {
        config.translation.max_chapters_per_run = max;
    }
    console.success("Configuration loaded");

    // Open work state
    console.step(&format!("Opening work '{}'...", args.work_id));
    let state_path = config.paths.work_state_path(&args.work_id);
    let mut store = WorkStore::load(&state_path).with_context(|| {
        format!(
            "No work state at {}; run the crawler first",
            state_path.display()
        )
    })?;
    console.success(&format!(
        "Found: {} ({} chapters)",
        store.work().title,
        store.work().chapters.len()
    ));

    if args.retry_failed {
        let reset = store.work_mut().reset_failed();
        if reset > 0 {
            store.save()?;
            console.info(&format!("Reset {} failed chapters to pending", reset));
        }
    }

    // Assemble the pipeline
    let orchestrator = TranslationOrchestrator::new(
        Arc::new(GeminiProvider::new(
            config.gemini.clone(),
            config.translation.temperature,
        )),
        Arc::new(GoogleProvider::new(config.literal.clone())),
        config.translation.clone(),
        config.prompts.clone(),
    );
    let builder = GlossaryBuilder::new(
        config.gemini.clone(),
        config.glossary.clone(),
        config.prompts.glossary_extraction.clone(),
    );
    let source = DirChapterSource::new(config.paths.library_directory.clone());

    let wordpress = if !args.no_publish && config.publish.is_configured() {
        let publisher = WordPressPublisher::new(config.publish.clone());
        console.step("Checking platform connectivity...");
        match publisher.health_check().await {
            Ok(()) => console.success("Platform reachable"),
            Err(e) => console.warning(&format!(
                "Platform health check failed ({}); publishing may not succeed",
                e
            )),
        }
        Some(publisher)
    } else {
        if !args.no_publish {
            console.info("Publishing not configured; skipping publish pass");
        }
        None
    };
    let publisher = wordpress.as_ref().map(|p| p as &dyn Publisher);

    let pipeline = WorkPipeline::new(orchestrator, builder, config);
    let result = pipeline
        .run(&mut store, &source, publisher)
        .await
        .context("Pipeline run failed")?;

    if result.has_failures() {
        console.info("Re-run with --retry-failed to reattempt failed chapters.");
    }

    Ok(())
}
