//! Command handlers for the Catalog Forge CLI
//!
//! Coordinates between parsed CLI arguments and the core pipeline: wiring
//! providers and the file-backed store into a [`CatalogService`], then
//! dispatching one-shot builds, the daily serve loop, catalog inspection,
//! and change reporting.

use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::app::manifest;
use crate::app::store::{CacheStore, FileBackend};
use crate::app::{CatalogService, MetaClient, RefreshConfig, RefreshScheduler, SourceRegistry};
use crate::cli::{BuildArgs, CatalogArgs, GlobalArgs, InitArgs, ServeArgs};
use crate::config::AppConfig;
use crate::errors::{AppError, Result};

/// Handle the build command
pub async fn handle_build(args: BuildArgs, global: &GlobalArgs) -> Result<()> {
    let start_time = Instant::now();
    let (service, _) = assemble_service(global, args.force).await?;
    service.start().await?;

    let spinner = spinner(global.quiet, "Building catalogs...");
    let document = service.build().await;
    spinner.finish_and_clear();
    let document = document?;

    println!(
        "Built {} catalog(s) in {:.1?}",
        document.catalogs.len(),
        start_time.elapsed()
    );
    for catalog in &document.catalogs {
        println!(
            "  {:<8} {:<40} {} [{}]",
            manifest::short_id(&catalog.id),
            catalog.id,
            catalog.name,
            catalog.category
        );
    }
    Ok(())
}

/// Handle the serve command
///
/// Runs an initial build (unless suppressed), then sleeps until the daily
/// rebuild hour and repeats forever.
pub async fn handle_serve(args: ServeArgs, global: &GlobalArgs) -> Result<()> {
    let (service, mut refresh_config) = assemble_service(global, false).await?;
    service.start().await?;
    if let Some(hour) = args.hour {
        if hour > 23 {
            return Err(AppError::generic("serve hour must be 0-23"));
        }
        refresh_config.hour = hour;
    }

    let service = Arc::new(service);
    let scheduler = RefreshScheduler::new(Arc::clone(&service) as _, refresh_config);

    if args.no_initial_build {
        info!("initial build skipped, waiting for first scheduled run");
    } else if !scheduler.trigger().await {
        warn!("initial build coalesced with a running cycle");
    }

    println!(
        "Serving; next rebuild in {:?}",
        scheduler.delay_until_next(chrono::Utc::now())
    );
    let handle = scheduler.spawn();
    handle.await.map_err(|e| AppError::generic(e.to_string()))
}

/// Handle the catalog command
pub async fn handle_catalog(args: CatalogArgs, global: &GlobalArgs) -> Result<()> {
    let (service, _) = assemble_service(global, false).await?;
    service.start().await?;

    let page = service
        .catalog_page(&args.id, args.genre.as_deref(), args.skip)
        .await?;
    if page.is_empty() {
        println!("No items for '{}'", args.id);
        return Ok(());
    }

    for meta in &page {
        println!(
            "  {:<12} {:<40} ({})  {}",
            meta.id,
            meta.title,
            meta.release_info,
            meta.genres.join(", ")
        );
    }
    println!("{} item(s), skip={}", page.len(), args.skip);
    Ok(())
}

/// Handle the changes command
pub async fn handle_changes(global: &GlobalArgs) -> Result<()> {
    let (service, _) = assemble_service(global, false).await?;
    let report = service.recent_changes().await?;

    if report.tables.is_empty() {
        println!("No recorded cache changes");
        return Ok(());
    }

    println!("Recent cache activity ({} record(s)):", report.records);
    for activity in &report.tables {
        println!(
            "  {:<24} +{} inserted, ~{} updated, -{} deleted",
            activity.table, activity.inserted, activity.updated, activity.deleted
        );
    }
    Ok(())
}

/// Handle the init command
pub async fn handle_init(args: InitArgs) -> Result<()> {
    if args.show_path {
        println!("{}", AppConfig::default_config_path()?.display());
        return Ok(());
    }

    match AppConfig::initialize_first_run().await? {
        Some(path) => println!("Created default configuration at {}", path.display()),
        None => println!("Configuration file already exists"),
    }
    Ok(())
}

/// Wire configuration into a ready-to-start service
async fn assemble_service(
    global: &GlobalArgs,
    force: bool,
) -> Result<(CatalogService, RefreshConfig)> {
    let config = AppConfig::load(global.config.clone()).await?;

    let data_dir = match &global.data_dir {
        Some(dir) => dir.clone(),
        None => config.data_dir()?,
    };
    let backend = Arc::new(FileBackend::new(&data_dir).await?);
    let store = Arc::new(CacheStore::with_config(
        backend,
        config.store.to_runtime_config(),
    ));

    let client = MetaClient::with_config(config.client.to_runtime_config())
        .map_err(AppError::Provider)?;
    let mut registry = SourceRegistry::new();
    let mut resolutions = Vec::new();
    for provider in &config.providers {
        let source = provider.to_source(client.clone())?;
        resolutions.push(source.resolution_cache());
        registry.register(Arc::new(source));
    }

    let mut catalogs = config.catalogs.clone();
    if force {
        for catalog in &mut catalogs {
            catalog.force_update = true;
        }
    }
    info!(
        providers = registry.len(),
        catalogs = catalogs.len(),
        data_dir = %data_dir.display(),
        "service assembled"
    );

    Ok((
        CatalogService::new(Arc::new(registry), store, catalogs, resolutions),
        config.refresh.to_runtime_config(),
    ))
}

fn spinner(quiet: bool, message: &'static str) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}
