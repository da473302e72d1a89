//! Command-line argument parsing for Catalog Forge
//!
//! Defines the CLI structure using clap derive macros: one-shot builds,
//! the long-running daily refresh loop, catalog inspection, and cache
//! change reporting.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Catalog Forge - build and serve cached content catalogs
#[derive(Parser, Debug)]
#[command(
    name = "catalog_forge",
    version,
    about = "Build, cache, and serve content-metadata catalogs",
    long_about = "Fetches content catalogs from configured providers with bounded parallelism,
enriches them with detail records, and persists them through a diffed, retrying cache store.
Run once with 'build' or keep the cache fresh with the daily 'serve' loop."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Data directory for the cache store
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one full catalog build
    Build(BuildArgs),

    /// Build now, then rebuild daily at the configured hour
    Serve(ServeArgs),

    /// Show a cached catalog page
    Catalog(CatalogArgs),

    /// Show recent cache change activity
    Changes,

    /// Create a default configuration file
    Init(InitArgs),
}

/// Arguments for the build command
#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    /// Rebuild everything, ignoring entry freshness
    #[arg(short, long)]
    pub force: bool,
}

/// Arguments for the serve command
#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// UTC hour of the daily rebuild, overriding the config file
    #[arg(long, value_name = "HOUR")]
    pub hour: Option<u32>,

    /// Skip the immediate build and wait for the first scheduled run
    #[arg(long)]
    pub no_initial_build: bool,
}

/// Arguments for the catalog command
#[derive(Args, Debug, Clone)]
pub struct CatalogArgs {
    /// Composite catalog id (e.g., "action.movies.movie")
    #[arg(value_name = "ID")]
    pub id: String,

    /// Genre name, or an all-digit year token
    #[arg(short, long)]
    pub genre: Option<String>,

    /// Number of leading items to skip
    #[arg(short, long, default_value = "0")]
    pub skip: usize,
}

/// Arguments for the init command
#[derive(Args, Debug, Clone)]
pub struct InitArgs {
    /// Print the default configuration path and exit
    #[arg(long)]
    pub show_path: bool,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Effective log level from the verbosity flags
    pub fn log_level(&self) -> &'static str {
        if self.global.very_verbose {
            "debug"
        } else if self.global.verbose {
            "info"
        } else if self.global.quiet {
            "error"
        } else {
            "warn"
        }
    }
}
