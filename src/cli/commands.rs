//! CLI command definitions and handlers.
//!
//! Each subcommand is implemented as a function that takes the parsed arguments
//! and returns an `anyhow::Result<()>`.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::runtime::Runtime;
use tracing::{info, warn};

use crate::cache::ResultCache;
use crate::config::{self, Config};
use crate::control::{RunContext, RunControl, StopRequest};
use crate::enrichment::Fpcalc;
use crate::pipeline::{Pipeline, RunOptions};

/// Tag Sleuth CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Resolve and file every release directory below a path
    Resolve {
        /// Input root holding one release per directory
        path: PathBuf,
        /// Root of the sorted tree (default: <path>/sorted)
        #[arg(short, long)]
        sorted: Option<PathBuf>,
        /// Resolve and log only; write no tags and move nothing
        #[arg(long)]
        dry_run: bool,
        /// AcoustID API key (or set ACOUSTID_API_KEY env var)
        #[arg(short, long, env = "ACOUSTID_API_KEY")]
        api_key: Option<String>,
        /// Skip acoustic fingerprinting
        #[arg(long)]
        no_fingerprint: bool,
        /// Keep remote results in memory for this run only
        #[arg(long)]
        no_cache: bool,
    },
    /// Check if fingerprinting tools are installed
    CheckTools,
    /// Inspect or empty the result cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Clone, Copy)]
pub enum CacheAction {
    /// Show the number of cached results
    Stats,
    /// Delete every cached result
    Clear,
}

/// Run the specified CLI command.
pub fn run_command(cli: &Cli) -> anyhow::Result<()> {
    let config = config::load(cli.config.as_deref());
    let rt = Runtime::new()?;

    match &cli.command {
        Commands::Resolve {
            path,
            sorted,
            dry_run,
            api_key,
            no_fingerprint,
            no_cache,
        } => {
            let options = RunOptions {
                sorted: sorted.clone().or_else(|| config.paths.sorted.clone()),
                rejects_dir_name: config.paths.rejects_dir_name.clone(),
                api_key: api_key
                    .clone()
                    .or_else(|| config.credentials.acoustid_api_key.clone()),
                fingerprint: !no_fingerprint,
                use_cache: !no_cache,
            };
            cmd_resolve(&rt, &config, path, &options, *dry_run)
        }
        Commands::CheckTools => cmd_check_tools(&config),
        Commands::Cache { action } => cmd_cache(&rt, &config, *action),
    }
}

// ============================================================================
// Individual command implementations
// ============================================================================

fn cmd_resolve(
    rt: &Runtime,
    config: &Config,
    path: &Path,
    options: &RunOptions,
    dry_run: bool,
) -> anyhow::Result<()> {
    rt.block_on(async {
        let pipeline = Pipeline::from_config(config, options).await?;
        let control = RunControl::new();
        tokio::spawn(stop_on_ctrl_c(control.clone()));

        if dry_run {
            println!("[DRY RUN MODE - No files will be changed]\n");
        }
        let ctx = RunContext::new(control, dry_run);
        let summary = pipeline.run(path, &ctx).await?;

        println!("\n{}", summary);
        Ok(())
    })
}

/// First Ctrl-C finishes the current directory, the second stops at once.
async fn stop_on_ctrl_c(control: RunControl) {
    while tokio::signal::ctrl_c().await.is_ok() {
        match control.escalate() {
            StopRequest::Cleanly => {
                warn!("Stopping after the current directory (Ctrl-C again to stop now)")
            }
            _ => {
                warn!("Stopping now");
                break;
            }
        }
    }
}

fn cmd_check_tools(config: &Config) -> anyhow::Result<()> {
    println!("Checking enrichment tools...\n");

    match Fpcalc::locate() {
        Some(fpcalc) => {
            let version = fpcalc.version().unwrap_or_else(|| "unknown version".into());
            println!("✓ fpcalc: {} ({})", version, fpcalc.program().display());
        }
        None => {
            println!("✗ fpcalc: NOT FOUND");
            print_fpcalc_install_instructions();
        }
    }

    println!();
    println!("API Keys:");
    if std::env::var("ACOUSTID_API_KEY").is_ok() {
        println!("✓ ACOUSTID_API_KEY: set");
    } else if config.credentials.acoustid_api_key.is_some() {
        println!("✓ AcoustID key: set in config file");
    } else {
        println!("✗ ACOUSTID_API_KEY: not set");
        println!("  Get one at: https://acoustid.org/new-application");
    }

    Ok(())
}

/// Print installation instructions for fpcalc
fn print_fpcalc_install_instructions() {
    eprintln!("Install Chromaprint:");
    eprintln!("  Windows: winget install AcoustID.Chromaprint");
    eprintln!("  macOS:   brew install chromaprint");
    eprintln!("  Linux:   apt install libchromaprint-tools");
}

fn cmd_cache(rt: &Runtime, config: &Config, action: CacheAction) -> anyhow::Result<()> {
    let path = config.cache.resolved_path();
    rt.block_on(async {
        let cache = ResultCache::open(&path).await;
        if !cache.is_durable() {
            anyhow::bail!("Cache database at {} is not available", path.display());
        }
        match action {
            CacheAction::Stats => {
                println!("Cache: {}", path.display());
                println!("Entries: {}", cache.len().await?);
            }
            CacheAction::Clear => {
                cache.clear().await?;
                info!("Cleared cache at {}", path.display());
                println!("Cache cleared.");
            }
        }
        Ok(())
    })
}
