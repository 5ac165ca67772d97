//! `cache-tool` - inspect and manage a model cache from the command line

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use model_cache::admin;
use model_cache::config::CacheConfig;

/// Model cache management tool
#[derive(Parser, Debug)]
#[command(name = "cache-tool", version, about = "Inspect and manage the model cache")]
struct Cli {
    /// Directory where models are cached [default: $MODEL_CACHE_DIR or .model_cache]
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List all cached models
    List,
    /// Show entry count and storage used
    Info,
    /// Delete a specific model from the cache
    Delete {
        /// Fingerprint of the model to delete
        model_hash: String,
    },
    /// Remove every cached model
    Clear,
    /// Remove artifact directories no index record points at
    Gc,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("model_cache=info,cache_tool=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let root = cli
        .cache_dir
        .unwrap_or_else(|| CacheConfig::from_env().root().to_path_buf());

    match cli.command {
        Command::List => {
            print!("{}", admin::render_listing(&admin::list_entries(&root)));
        }
        Command::Info => {
            let summary = admin::summary(&root)
                .with_context(|| format!("Cannot measure cache at {}", root.display()))?;
            println!("Cache directory: {}", root.display());
            println!("Total models: {}", summary.entry_count);
            println!("Total storage: {}", admin::format_megabytes(summary.total_bytes));
        }
        Command::Delete { model_hash } => {
            if !admin::delete_entry(&model_hash, &root)? {
                bail!("Model {model_hash} not found in cache");
            }
            tracing::info!(fingerprint = %model_hash, "model deleted from cache");
        }
        Command::Clear => {
            let report = admin::clear(&root)?;
            if !report.persisted {
                bail!("Cache index at {} could not be written", root.display());
            }
            tracing::info!(
                cache_dir = %root.display(),
                entries = report.entries,
                failures = report.failures.len(),
                "cache cleared"
            );
        }
        Command::Gc => {
            let removed = admin::prune_orphans(&root)?;
            println!("Removed {} orphaned directories", removed.len());
        }
    }
    Ok(())
}
