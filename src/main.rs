//! Catalog Forge CLI application
//!
//! Command-line interface for building and serving cached content catalogs.
//! Features bounded-parallelism provider fetches, diffed cache persistence,
//! and a daily background refresh loop.

use std::process;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use catalog_forge::cli::{
    handle_build, handle_catalog, handle_changes, handle_init, handle_serve, Cli, Commands,
};
use catalog_forge::errors::Result;

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(&cli);

    info!("Catalog Forge v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Build(args) => {
            info!("Executing build command");
            handle_build(args, &cli.global).await
        }
        Commands::Serve(args) => {
            info!("Executing serve command");
            handle_serve(args, &cli.global).await
        }
        Commands::Catalog(args) => {
            info!("Executing catalog command");
            handle_catalog(args, &cli.global).await
        }
        Commands::Changes => {
            info!("Executing changes command");
            handle_changes(&cli.global).await
        }
        Commands::Init(args) => handle_init(args).await,
    }
}

/// Initialize logging based on CLI verbosity settings
fn init_logging(cli: &Cli) {
    let log_level = cli.log_level();

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("catalog_forge={}", log_level).parse().unwrap());

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(cli.global.very_verbose)
        .init();

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    } else if cli.global.verbose {
        info!("Verbose logging enabled");
    }
}
