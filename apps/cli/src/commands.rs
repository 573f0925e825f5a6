//! CLI command definitions, routing, and tracing setup.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use chrono::{Datelike, Local};
use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use issuepress_core::{PipelineConfig, PipelineResult, ProgressReporter, run_pipeline};
use issuepress_discovery::LocatorOptions;
use issuepress_shared::{
    AppConfig, PublishOutcome, Stage, expand_path, init_config, load_config, load_config_from,
    validate_config,
};
use issuepress_tools::Toolchain;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// IssuePress: turn this month's newsletter issue into cataloged ebooks.
#[derive(Parser)]
#[command(
    name = "issuepress",
    version,
    about = "Download a newsletter issue, convert it to EPUB and MOBI, add it to the catalog and publish it.",
    long_about = None,
    args_conflicts_with_subcommands = true,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.issuepress/issuepress.toml).
    #[arg(long, global = true, env = "ISSUEPRESS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Run options when no subcommand is given.
    #[command(flatten)]
    pub run: RunArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Options of a pipeline run.
#[derive(Args, Debug, Clone, Default)]
pub(crate) struct RunArgs {
    /// Issue month (1-12). Prompted for when omitted.
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=12))]
    pub month: Option<u32>,

    /// Do not update the site repository.
    #[arg(long)]
    pub skip_publish: bool,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the publishing pipeline (the default).
    Run(RunArgs),

    /// Report the located external tools.
    Tools,

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
        0 => "issuepress=info",
        1 => "issuepress=debug",
        _ => "issuepress=trace",
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
    let config_path = cli.config.as_deref();
    match cli.command {
        None => cmd_run(config_path, &cli.run).await,
        Some(Command::Run(args)) => cmd_run(config_path, &args).await,
        Some(Command::Tools) => cmd_tools(config_path),
        Some(Command::Config { action }) => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    validate_config(&config)?;
    Ok(config)
}

async fn cmd_run(config_path: Option<&Path>, args: &RunArgs) -> Result<()> {
    let config = resolve_config(config_path)?;
    let today = Local::now().date_naive();

    let month = match args.month {
        Some(m) => m,
        None => prompt_month(today.month())?,
    };

    let pipeline_config = PipelineConfig {
        app: config,
        month,
        today,
        skip_publish: args.skip_publish,
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        locator: LocatorOptions::default(),
    };

    info!(month, skip_publish = args.skip_publish, "starting IssuePress run");

    let reporter = CliProgress::new();
    let result = run_pipeline(&pipeline_config, &reporter).await?;

    println!();
    println!("  Issue published successfully!");
    println!("  Issue:    {}", result.issue.url);
    println!("  Title:    {}", result.issue.title);
    println!("  EPUB:     {}", result.epub.path.display());
    println!("  MOBI:     {}", result.mobi.path.display());
    println!(
        "  Catalog:  {}",
        result.catalog_id.as_deref().unwrap_or("(separate entries)")
    );
    match &result.publish {
        PublishOutcome::Published { post_path, .. } => {
            println!("  Post:     {} (remember to publish it)", post_path.display());
        }
        PublishOutcome::Skipped { reason } => println!("  Site:     skipped ({reason})"),
    }
    println!("  Time:     {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

/// Ask for the issue month on stdin.
fn prompt_month(current: u32) -> Result<u32> {
    print!("Month (1-12, default {current}): ");
    std::io::stdout().flush()?;

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    parse_month_input(&line, current)
}

/// Empty input selects `current`.
pub(crate) fn parse_month_input(input: &str, current: u32) -> Result<u32> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(current);
    }
    let month: u32 = trimmed
        .parse()
        .map_err(|_| eyre!("'{trimmed}' is not a month number"))?;
    if !(1..=12).contains(&month) {
        return Err(eyre!("month {month} out of range (1-12)"));
    }
    Ok(month)
}

fn cmd_tools(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let search_path = config
        .paths
        .tool_search_path
        .as_deref()
        .map(std::ffi::OsStr::new);
    let toolchain = Toolchain::locate(search_path)?;

    for program in toolchain.programs() {
        let sub = program.leading_args.join(" ");
        println!(
            "  {:<14} {} {}",
            program.name,
            program.path.display(),
            sub
        );
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());

    let cover = expand_path(&AppConfig::default().cover.template)?;
    if !cover.is_file() {
        println!("Place a cover background image at: {}", cover.display());
    }
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = match config_path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
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
        let style = ProgressStyle::with_template("{spinner:.cyan} [{pos}/{len}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.set_length((Stage::ALL.len() - 1) as u64);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn stage(&self, stage: Stage) {
        let position = Stage::ALL.iter().position(|s| *s == stage).unwrap_or(0);
        self.spinner.set_position(position as u64 + 1);
        self.spinner.set_message(stage.label());
    }

    fn done(&self, _result: &PipelineResult) {
        self.spinner.finish_and_clear();
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        if !self.spinner.is_finished() {
            self.spinner.abandon();
        }
    }
}
