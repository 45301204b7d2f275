//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use lessonbuild_core::pipeline::{BuildConfig, BuildReport, ProgressReporter};
use lessonbuild_shared::{BuildSettings, init_config, load_config, load_config_from};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// lessonbuild — build a lesson page from Markdown fragments.
#[derive(Parser)]
#[command(
    name = "lessonbuild",
    version,
    about = "Build a single HTML lesson page from Markdown fragments with TeX math.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Build the lesson in FOLDER into the output folder.
    Build {
        /// Folder holding the lesson fragments.
        folder: PathBuf,

        /// Lesson title shown in the page.
        title: String,

        /// Template folder (must contain index.html).
        #[arg(short, long)]
        template: Option<PathBuf>,

        /// Output folder; emptied before writing.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Config file to use instead of the default lookup.
        #[arg(short, long, env = "LESSONBUILD_CONFIG")]
        config: Option<PathBuf>,

        /// Print the build report as JSON instead of a summary.
        #[arg(long)]
        json: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Write a default config file to ~/.lessonbuild/lessonbuild.toml.
    Init,
    /// Show resolved configuration.
    Show {
        /// Config file to show instead of the default lookup.
        #[arg(short, long, env = "LESSONBUILD_CONFIG")]
        config: Option<PathBuf>,
    },
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "lessonbuild=info",
        1 => "lessonbuild=debug",
        _ => "lessonbuild=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Build {
            folder,
            title,
            template,
            out,
            config,
            json,
        } => cmd_build(&folder, &title, template, out, config.as_deref(), json).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show { config } => cmd_config_show(config.as_deref()).await,
        },
    }
}

/// Load settings from an explicit file or the default lookup.
fn resolve_settings(config: Option<&Path>) -> Result<BuildSettings> {
    let settings = match config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(settings)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_build(
    folder: &Path,
    title: &str,
    template: Option<PathBuf>,
    out: Option<PathBuf>,
    config: Option<&Path>,
    json: bool,
) -> Result<()> {
    let mut settings = resolve_settings(config)?;
    if let Some(template) = template {
        settings.output.template_dir = template;
    }
    if let Some(out) = out {
        settings.output.output_dir = out;
    }

    if !folder.is_dir() {
        return Err(eyre!("lesson folder '{}' does not exist", folder.display()));
    }

    info!(
        folder = %folder.display(),
        title,
        output = %settings.output.output_dir.display(),
        "building lesson"
    );

    let build_config = BuildConfig {
        source_dir: folder.to_path_buf(),
        title: title.to_string(),
        settings,
    };

    let reporter = CliProgress::new();
    let report = lessonbuild_core::pipeline::build_lesson(&build_config, &reporter).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let math = &report.math;
    let headings = &report.headings;

    println!();
    println!("  Lesson built successfully!");
    println!("  Title:      {title}");
    println!("  Fragments:  {}", report.fragment_count);
    println!(
        "  Math:       {} block, {} inline ({} unrendered)",
        math.block_spans,
        math.inline_spans,
        math.render_failures
    );
    println!(
        "  Outline:    {} sections, {} subsections, {} boxes",
        headings.sections, headings.subsections, headings.boxes_opened
    );
    if math.malformed > 0 || headings.layer_mismatches > 0 {
        println!(
            "  Warnings:   {} unmatched delimiters, {} box layer mismatches",
            math.malformed, headings.layer_mismatches
        );
    }
    println!("  Output:     {}", report.output_path.display());
    println!("  Time:       {:.1}s", report.elapsed.as_secs_f64());
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn done(&self, _report: &BuildReport) {
        self.spinner.finish_and_clear();
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        // A failed build never reaches `done`.
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config: Option<&Path>) -> Result<()> {
    let settings = resolve_settings(config)?;
    let toml_str = toml::to_string_pretty(&settings)?;
    println!("{toml_str}");
    Ok(())
}
