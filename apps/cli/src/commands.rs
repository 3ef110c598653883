//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use conceptscribe_agent::{Builder, ProgressReporter};
use conceptscribe_browser::HttpToolProvider;
use conceptscribe_emit::FileSink;
use conceptscribe_reasoner::{ChatClient, InferencePolicy};
use conceptscribe_session::SessionStore;
use conceptscribe_shared::{
    AppConfig, RunLimits, RunResult, Topic, init_config, load_config, validate_api_key,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// ConceptScribe — research a topic into an llms.txt concept set.
#[derive(Parser)]
#[command(
    name = "conceptscribe",
    version,
    about = "Crawl documentation for a keyword and emit its conceptual model as llms.txt.",
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
    /// Research a keyword and emit its concept set.
    Run {
        /// Topic keyword to research.
        keyword: String,

        /// Output folder for llms.txt and concept files.
        #[arg(short, long)]
        out: Option<String>,

        /// Remove existing output and session state before starting.
        #[arg(short, long)]
        force: bool,

        /// Override the page-visit bound for this run.
        #[arg(long)]
        max_pages: Option<usize>,
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
        0 => "conceptscribe=info",
        1 => "conceptscribe=debug",
        _ => "conceptscribe=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run {
            keyword,
            out,
            force,
            max_pages,
        } => cmd_run(&keyword, out.as_deref(), force, max_pages).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// run command
// ---------------------------------------------------------------------------

async fn cmd_run(
    keyword: &str,
    out: Option<&str>,
    force: bool,
    max_pages: Option<usize>,
) -> Result<()> {
    let config = load_config()?;
    validate_api_key(&config)?;

    let output_folder = PathBuf::from(out.unwrap_or(&config.defaults.output_folder));
    let session_db = PathBuf::from(&config.defaults.session_db);

    // Destructive reset is the Runner's job, never the Builder's.
    if force {
        reset_state(&output_folder, &session_db)?;
    }

    std::fs::create_dir_all(&output_folder)
        .map_err(|e| eyre!("cannot create output folder '{}': {e}", output_folder.display()))?;

    let topic = Topic::new(keyword, &output_folder)?;

    let mut limits = RunLimits::from(&config);
    if let Some(pages) = max_pages {
        limits.max_pages = pages;
    }

    info!(keyword, out = %output_folder.display(), force, "starting research run");

    let api_key = std::env::var(&config.anthropic.api_key_env)
        .map_err(|_| eyre!("{} is not set", config.anthropic.api_key_env))?;

    let provider = HttpToolProvider::acquire(limits)?;
    let policy = InferencePolicy::new(
        ChatClient::new(api_key),
        &config.anthropic.default_model,
        config.anthropic.max_tokens,
        config.defaults.history_window,
    );
    let session = SessionStore::open(&session_db).await?;
    let sink = FileSink::new(&output_folder);

    let builder = Builder::new(
        provider,
        policy,
        session,
        sink,
        limits,
        &config.anthropic.reference_url,
    );

    // Ctrl-C cancels cooperatively between tool calls.
    let cancel = builder.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\ncancelling after the current tool call ...");
            cancel.cancel();
        }
    });

    let reporter = CliProgress::new();
    let result = builder.run(&topic, &reporter).await?;

    println!();
    println!("  Concept set written!");
    println!("  Keyword:  {keyword}");
    println!("  Concepts: {}", result.concept_count);
    println!("  Pages:    {}", result.pages_visited);
    println!("  Steps:    {}", result.steps_taken);
    if result.reference_degraded {
        println!("  Note:     specification reference was unreachable (best-effort structure)");
    }
    println!("  Index:    {}", result.index_path.display());
    println!("  Time:     {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

/// Remove prior output and session state (`--force`).
///
/// After a reset, the output folder contains only artifacts from the new
/// run — no stale file survives.
fn reset_state(output_folder: &Path, session_db: &Path) -> Result<()> {
    if output_folder.exists() {
        std::fs::remove_dir_all(output_folder)
            .map_err(|e| eyre!("cannot clear '{}': {e}", output_folder.display()))?;
        info!(path = %output_folder.display(), "removed prior output");
    }
    if session_db.exists() {
        std::fs::remove_file(session_db)
            .map_err(|e| eyre!("cannot clear '{}': {e}", session_db.display()))?;
        info!(path = %session_db.display(), "removed prior session state");
    }
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
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn page_visited(&self, url: &str, current: usize, budget: usize) {
        self.spinner
            .set_message(format!("Reading [{current}/{budget}] {url}"));
    }

    fn concept_recorded(&self, name: &str, total: usize) {
        self.spinner
            .set_message(format!("Recorded concept #{total}: {name}"));
    }

    fn done(&self, _result: &RunResult) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// config commands
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
