//! End-to-end `build` pipeline: fragments → math extraction → Markdown →
//! heading restructuring → tables → placeholder resolution → output folder.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, instrument, warn};

use lessonbuild_markdown::{BoxVocabulary, CodeHighlighter, ConvertOptions, RestructureStats};
use lessonbuild_math::{ExtractStats, MathExtractor, MathMlRenderer, MathRenderer};
use lessonbuild_shared::{BuildSettings, LessonError, Result};

use crate::{emitter, source};

/// Configuration for one `build` run.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Folder holding the lesson fragments.
    pub source_dir: PathBuf,
    /// Lesson title, substituted for `${title}` in the template.
    pub title: String,
    /// Resolved settings (config file merged with CLI flags).
    pub settings: BuildSettings,
}

/// Result of a successful build.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    /// The written `index.html`.
    pub output_path: PathBuf,
    /// Number of fragment files read.
    pub fragment_count: usize,
    pub math: ExtractStats,
    pub headings: RestructureStats,
    /// Total elapsed time.
    pub elapsed: Duration,
}

/// The transformed lesson body, before it is placed into the template.
#[derive(Debug, Clone)]
pub struct RenderedLesson {
    pub html: String,
    pub math: ExtractStats,
    pub headings: RestructureStats,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when the pipeline completes.
    fn done(&self, report: &BuildReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn done(&self, _report: &BuildReport) {}
}

/// Transform raw lesson text into the final HTML body.
///
/// Placeholders are resolved last, after headings and tables have been
/// rewritten, so rendered MathML never reaches the restructurer. Escaped
/// dollars come back after that.
///
/// Fails only when the configured highlighting theme does not exist.
pub async fn render_lesson<R: MathRenderer>(
    raw: &str,
    settings: &BuildSettings,
    renderer: R,
    progress: &dyn ProgressReporter,
) -> Result<RenderedLesson> {
    let highlighter = CodeHighlighter::from_settings(&settings.code)?;

    progress.phase("Rendering math");
    let extractor = MathExtractor::new(renderer, settings.math.clone());
    let extraction = extractor.extract(raw).await;

    progress.phase("Converting Markdown");
    let options = ConvertOptions {
        highlighter: highlighter.as_ref(),
        escaped_dollar: Some(&extraction.escaped_dollar),
    };
    let html = lessonbuild_markdown::markdown_to_html(&extraction.text, &options);

    progress.phase("Structuring headings");
    let vocabulary = BoxVocabulary::from(&settings.boxes);
    let restructured = lessonbuild_markdown::restructure(&html, &vocabulary);
    let html = lessonbuild_markdown::wrap_tables(&restructured.html);
    let html = lessonbuild_math::resolve(&html, &extraction.table);
    let html = lessonbuild_math::restore_escaped_dollars(&html, &extraction.escaped_dollar);

    Ok(RenderedLesson {
        html,
        math: extraction.stats,
        headings: restructured.stats,
    })
}

/// Run the full `build` pipeline with the MathML renderer.
pub async fn build_lesson(
    config: &BuildConfig,
    progress: &dyn ProgressReporter,
) -> Result<BuildReport> {
    build_lesson_with(config, MathMlRenderer, progress).await
}

/// Run the full `build` pipeline.
///
/// 1. Read and concatenate the fragments
/// 2. Extract and render math
/// 3. Convert Markdown → HTML
/// 4. Restructure headings, wrap tables, resolve placeholders
/// 5. Rewrite the output folder from the template
#[instrument(skip_all, fields(source = %config.source_dir.display(), title = %config.title))]
pub async fn build_lesson_with<R: MathRenderer>(
    config: &BuildConfig,
    renderer: R,
    progress: &dyn ProgressReporter,
) -> Result<BuildReport> {
    let start = Instant::now();

    if config.title.trim().is_empty() {
        return Err(LessonError::validation("lesson title must not be empty"));
    }
    config.settings.validate()?;
    config.settings.check_folders(&config.source_dir)?;

    info!("starting build");

    // --- Phase 1: Sources ---
    progress.phase("Reading sources");
    let document = source::read_sources(&config.source_dir, &config.settings.source)?;

    // --- Phase 2: Transform ---
    let rendered = render_lesson(&document.text, &config.settings, renderer, progress).await?;

    if rendered.math.render_failures > 0 || rendered.math.malformed > 0 {
        warn!(
            render_failures = rendered.math.render_failures,
            malformed = rendered.math.malformed,
            "some math was left unrendered"
        );
    }
    if rendered.headings.layer_mismatches > 0 {
        warn!(
            mismatches = rendered.headings.layer_mismatches,
            "box layers were unbalanced in the source"
        );
    }

    // --- Phase 3: Output ---
    progress.phase("Writing output");
    let output = &config.settings.output;
    let output_path = emitter::emit(
        &output.template_dir,
        &output.output_dir,
        &config.title,
        &rendered.html,
    )?;

    let report = BuildReport {
        output_path,
        fragment_count: document.fragments.len(),
        math: rendered.math,
        headings: rendered.headings,
        elapsed: start.elapsed(),
    };

    info!(
        fragments = report.fragment_count,
        math_spans = report.math.block_spans + report.math.inline_spans,
        boxes = report.headings.boxes_opened,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "build complete"
    );
    progress.done(&report);

    Ok(report)
}
