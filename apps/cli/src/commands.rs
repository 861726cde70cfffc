//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use noticescore_core::pipeline::{ProgressReporter, RunConfig, RunResult};
use noticescore_scoring::LinearTextModel;
use noticescore_shared::{AppConfig, OutputFormat, ScoringConfig, init_config, load_config};
use noticescore_storage::Storage;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// noticescore: flag procurement attachments for accessibility risk.
#[derive(Parser)]
#[command(
    name = "noticescore",
    version,
    about = "Score nightly procurement notice attachments for Section 508 compliance risk.",
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
    /// Score a nightly feed file whose attachments carry extracted text.
    Score {
        /// Feed JSON file.
        #[arg(long)]
        feed: PathBuf,

        /// Model artifact (defaults to the configured model path).
        #[arg(long, env = "NOTICESCORE_MODEL")]
        model: Option<PathBuf>,

        /// Output root directory (defaults to the configured output dir).
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Score table format: json or jsonl.
        #[arg(short, long)]
        format: Option<String>,

        /// Texts per classifier call (0 = single batch).
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Do not record the run in the database.
        #[arg(long)]
        no_store: bool,
    },

    /// Inspect recorded runs.
    Runs {
        #[command(subcommand)]
        action: RunsAction,
    },

    /// Model artifact utilities.
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Run history subcommands.
#[derive(Subcommand)]
pub(crate) enum RunsAction {
    /// List recorded runs, newest first.
    List {
        /// Maximum number of runs to show.
        #[arg(long, default_value = "20")]
        limit: u32,
    },
    /// Show a run's manifest, from the database or a run directory.
    Show {
        /// Run ID, or path to a run output directory.
        run: String,

        /// Also print the scored records.
        #[arg(long)]
        records: bool,
    },
}

/// Model subcommands.
#[derive(Subcommand)]
pub(crate) enum ModelAction {
    /// Load a model artifact and print its summary.
    Inspect {
        /// Model artifact path.
        path: PathBuf,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "noticescore=info",
        1 => "noticescore=debug",
        _ => "noticescore=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

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
        Command::Score {
            feed,
            model,
            out,
            format,
            chunk_size,
            no_store,
        } => {
            let args = ScoreArgs {
                feed,
                model,
                out,
                format,
                chunk_size,
                no_store,
            };
            cmd_score(args).await
        }
        Command::Runs { action } => match action {
            RunsAction::List { limit } => cmd_runs_list(limit).await,
            RunsAction::Show { run, records } => cmd_runs_show(&run, records).await,
        },
        Command::Model { action } => match action {
            ModelAction::Inspect { path } => cmd_model_inspect(&path),
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

/// Flags of `noticescore score`, before merging with the config file.
struct ScoreArgs {
    feed: PathBuf,
    model: Option<PathBuf>,
    out: Option<PathBuf>,
    format: Option<String>,
    chunk_size: Option<usize>,
    no_store: bool,
}

/// Merge CLI flags over the loaded config.
fn build_run_config(args: ScoreArgs, config: &AppConfig) -> Result<RunConfig> {
    let format = match args.format.as_deref() {
        Some(f) => f.parse::<OutputFormat>()?,
        None => config.defaults.format,
    };

    let mut scoring = ScoringConfig::from(config);
    if let Some(chunk_size) = args.chunk_size {
        scoring.chunk_size = chunk_size;
    }

    let db_path = (config.storage.enabled && !args.no_store)
        .then(|| PathBuf::from(&config.storage.db_path));

    Ok(RunConfig {
        feed_path: args.feed,
        model_path: args
            .model
            .unwrap_or_else(|| PathBuf::from(&config.defaults.model_path)),
        output_root: args
            .out
            .unwrap_or_else(|| PathBuf::from(&config.defaults.output_dir)),
        format,
        scoring,
        db_path,
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn cmd_score(args: ScoreArgs) -> Result<()> {
    let config = load_config()?;

    if !args.feed.exists() {
        return Err(eyre!("feed file '{}' does not exist", args.feed.display()));
    }

    let run_config = build_run_config(args, &config)?;

    info!(
        feed = %run_config.feed_path.display(),
        model = %run_config.model_path.display(),
        "scoring feed"
    );

    let reporter = CliProgress::new();
    let result = noticescore_core::pipeline::run(&run_config, &reporter).await?;

    println!();
    println!("  Run complete!");
    println!("  ID:       {}", result.run_id);
    println!("  Records:  {}", result.record_count);
    for (label, count) in &result.label_counts {
        println!("  Label {label}:  {count}");
    }
    println!("  Dropped:  {} notice(s) without a url", result.stats.notices_missing_url);
    println!("  Output:   {}", result.scores_path.display());
    println!("  Time:     {:.1}s", result.elapsed.as_secs_f64());
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

    fn done(&self, _result: &RunResult) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// Run history
// ---------------------------------------------------------------------------

async fn open_history() -> Result<Storage> {
    let config = load_config()?;
    let path = PathBuf::from(&config.storage.db_path);
    Ok(Storage::open_readonly(&path).await?)
}

async fn cmd_runs_list(limit: u32) -> Result<()> {
    let storage = open_history().await?;
    let runs = storage.list_runs(limit).await?;

    if runs.is_empty() {
        println!("No runs recorded.");
        return Ok(());
    }

    for run in runs {
        println!(
            "{}  {}  {:>6} records  model {}  {}",
            run.run_id,
            run.created_at.format("%Y-%m-%d %H:%M:%S"),
            run.record_count,
            short_digest(&run.model_digest),
            run.feed_path,
        );
    }
    Ok(())
}

/// First 12 characters of a model digest.
fn short_digest(digest: &str) -> String {
    digest.chars().take(12).collect()
}

async fn cmd_runs_show(run: &str, with_records: bool) -> Result<()> {
    let run_dir = Path::new(run);
    if run_dir.is_dir() {
        let manifest = noticescore_core::output::read_manifest(run_dir)?;
        println!("{}", serde_json::to_string_pretty(&manifest)?);
        if with_records {
            let records = noticescore_core::output::read_scores(run_dir)?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        return Ok(());
    }

    let storage = open_history().await?;
    let manifest = storage
        .get_run(run)
        .await?
        .ok_or_else(|| eyre!("no run with id '{run}'"))?;
    println!("{}", serde_json::to_string_pretty(&manifest)?);

    if with_records {
        let records = storage.records_for_run(run).await?;
        println!("{}", serde_json::to_string_pretty(&records)?);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Model / config
// ---------------------------------------------------------------------------

fn cmd_model_inspect(path: &Path) -> Result<()> {
    let model = LinearTextModel::load(path)?;
    println!("{}", serde_json::to_string_pretty(&model.summary())?);
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
