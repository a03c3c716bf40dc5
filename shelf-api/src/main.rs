//! shelf-api - catalog and membership backend-for-frontend
//!
//! Startup order: command line → configuration → tracing → platform client →
//! router → listener.

use anyhow::{Context, Result};
use clap::Parser;
use shelf_common::api::StaticKeyAuthenticator;
use shelf_common::config::{resolve_config, ConfigOverrides};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use shelf_api::services::{
    BulkFetcher, CatalogService, CatalogSettings, MembershipService, PlatformClient,
};
use shelf_api::{build_router, AppState};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "shelf-api")]
#[command(about = "Catalog and membership API over the hosted data platform")]
#[command(version)]
struct Args {
    /// Config file path (otherwise SHELF_CONFIG or the default locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Bind address
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let overrides = ConfigOverrides {
        config_path: args.config,
        port: args.port,
        bind_address: args.bind,
    };
    let config = resolve_config(&overrides).context("Failed to load configuration")?;

    // RUST_LOG wins over the configured level
    let level = &config.logging.level;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "shelf_api={lvl},shelf_common={lvl},tower_http={lvl}",
            lvl = level
        ))
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(
        "Starting shelf-api v{} ({})",
        env!("CARGO_PKG_VERSION"),
        if cfg!(debug_assertions) { "debug" } else { "release" }
    );
    match &config.source {
        Some(path) => info!("Configuration: {}", path.display()),
        None => warn!("No config file found, using defaults and environment"),
    }

    let api_key = config.require_api_key()?;
    if config.platform.api_token.is_none() {
        warn!("No platform API token configured; upstream calls will be unauthenticated");
    }

    let client = Arc::new(
        PlatformClient::new(&config.platform).context("Failed to build platform client")?,
    );
    let fetcher = BulkFetcher::new(client.clone(), config.catalog.page_size);

    let catalog = CatalogService::new(
        fetcher.clone(),
        client.clone(),
        CatalogSettings::from(&config.catalog),
    );
    let membership = MembershipService::new(
        client,
        fetcher,
        config.catalog.member_reference_collection.clone(),
    );
    let authenticator = Arc::new(StaticKeyAuthenticator::new(api_key));

    let state = AppState::new(catalog, membership, authenticator);
    let app = build_router(state);

    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("shelf-api listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
