use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::ConfigLoader;

pub mod commands;

use self::commands::{CompileArgs, PresetsArgs, ReplayArgs, SummarizeArgs};

#[derive(Parser, Debug)]
#[command(
    name = "rangepick",
    version,
    about = "Date-range filter: compile, summarize and replay range selections"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Override the config file location (takes precedence over RANGEPICK_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error); RUST_LOG wins when set
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the filter expression for a range
    Compile(CompileArgs),
    /// Print the breadcrumb text for a range
    Summarize(SummarizeArgs),
    /// List configured presets and the ranges they resolve to
    Presets(PresetsArgs),
    /// Feed newline-delimited JSON events through a filter and print each outcome
    Replay(ReplayArgs),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;

    let loader = ConfigLoader::discover(cli.config)?;
    let config = Arc::new(loader.load_or_init()?);

    match cli.command {
        Commands::Compile(args) => commands::compile(&config, args),
        Commands::Summarize(args) => commands::summarize(&config, args),
        Commands::Presets(args) => commands::list_presets(&config, args),
        Commands::Replay(args) => commands::replay(config, loader.paths(), args),
    }
}

/// Logs go to stderr so `replay` output on stdout stays one JSON object per
/// line.
fn init_tracing(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!("installing log subscriber: {err}"))
}
