//! Aurum CLI and server binary
//!
//! Entry point for the Aurum gold price service. Provides commands for
//! initializing and validating configuration and for starting the combined
//! HTTP + WebSocket service.

use anyhow::{Context, Result};
use axum::routing::get;
use axum::Router;
use cli::{Cli, Commands};
use config::{generate_default_config, load_config, save_config, validate_config, AurumConfig};
use common::Country;
use observability::{init_logging, init_metrics, LogFormat};
use server::{
    health_handler, BroadcastHub, HealthState, HttpServer, PriceStreamServer, Server,
    ServerConfig, ShutdownController,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use alerts::{AlertStore, LogNotifier};
use price_feed::{HttpFeedClient, PriceFeedCache};
use price_lock::{InMemoryLockStore, LockEngine, LockStore, RedisLockStore};
use scheduler::PriceScheduler;

#[tokio::main]
async fn main() -> Result<()> {
    let format = std::env::var("AURUM_LOG_FORMAT")
        .ok()
        .and_then(|s| LogFormat::parse(&s))
        .unwrap_or(LogFormat::Pretty);
    init_logging("aurumd", format)?;

    let cli = Cli::parse_args();
    debug!(?cli, "CLI arguments parsed");

    match cli.command {
        Commands::Start { config, http, ws } => {
            info!("Executing 'start' command");
            start_service(config, http, ws).await
        }
        Commands::Validate { config } => {
            info!("Executing 'validate' command");
            validate_command(config)
        }
        Commands::Init { output } => {
            info!("Executing 'init' command");
            init_command(output)
        }
    }
}

/// Parse the configured countries into the domain type, dropping unknown codes
fn tax_rates(config: &AurumConfig) -> HashMap<Country, f64> {
    let mut rates = HashMap::new();
    for entry in &config.countries {
        match Country::parse(&entry.code) {
            Some(country) => {
                rates.insert(country, entry.tax_rate_percent);
            }
            None => {
                warn!(code = %entry.code, "Ignoring unsupported country in config");
            }
        }
    }
    rates
}

async fn start_service<P: AsRef<Path>>(
    config_path: P,
    http_override: Option<u16>,
    ws_override: Option<u16>,
) -> Result<()> {
    let config_path = config_path.as_ref();

    let config = load_config(config_path)?;
    let report = validate_config(&config);

    if !report.warnings.is_empty() {
        warn!("Configuration warnings:");
        for warning in &report.warnings {
            warn!(field = %warning.field, message = %warning.message);
        }
    }

    if !report.is_valid() {
        error!(
            error_count = report.errors.len(),
            "Configuration validation failed"
        );
        for err in &report.errors {
            error!("{}", err);
        }
        anyhow::bail!("Cannot start service due to configuration errors");
    }

    if let Some(port) = config.server.metrics_port {
        init_metrics(port)?;
    }

    let http_port = http_override.unwrap_or(config.server.http_port);
    let ws_port = ws_override.unwrap_or(config.server.ws_port);

    info!(
        service = %config.service.name,
        http_port,
        ws_port,
        "Starting service"
    );

    // Feed client and cache
    let feed_client = HttpFeedClient::new(
        &config.feed.base_url,
        config.feed.api_key.clone(),
        Duration::from_secs(config.feed.timeout_secs),
    )?;
    let cache = Arc::new(PriceFeedCache::new(
        Arc::new(feed_client),
        Duration::from_secs(config.feed.price_freshness_secs),
        Duration::from_secs(config.feed.rates_freshness_secs),
    ));

    let rates = tax_rates(&config);

    // Lock engine over the configured store
    let retention = Duration::from_secs(config.locks.retention_secs);
    let lock_store: Arc<dyn LockStore> = match &config.locks.redis_url {
        Some(url) => {
            info!("Using Redis lock store");
            Arc::new(RedisLockStore::new(url, retention).await?)
        }
        None => {
            info!("Using in-memory lock store");
            Arc::new(InMemoryLockStore::new())
        }
    };
    let engine = Arc::new(LockEngine::new(
        lock_store,
        Arc::clone(&cache),
        rates.clone(),
        Duration::from_secs(config.locks.ttl_secs),
        retention,
        Duration::from_secs(config.pricing.calculation_validity_secs),
    ));

    // Alerts and broadcast
    let alert_store = Arc::new(AlertStore::new());
    let hub = Arc::new(BroadcastHub::new());

    let scheduler = Arc::new(PriceScheduler::new(
        Arc::clone(&cache),
        Arc::clone(&alert_store),
        Arc::new(LogNotifier),
        Arc::clone(&hub),
        scheduler::SchedulerConfig {
            refresh_interval: Duration::from_secs(config.scheduler.refresh_interval_secs),
            alert_scan_interval: Duration::from_secs(config.alerts.scan_interval_secs),
        },
    ));

    // Merged HTTP router
    let price_router = price_feed::api::create_router(Arc::new(price_feed::api::PriceApiState {
        cache: Arc::clone(&cache),
        tax_rates: rates.iter().map(|(c, r)| (*c, *r)).collect(),
        calculation_validity: Duration::from_secs(config.pricing.calculation_validity_secs),
    }));
    let lock_router = price_lock::api::create_router(Arc::new(price_lock::api::LockApiState {
        engine: Arc::clone(&engine),
    }));
    let alert_router = alerts::api::create_router(Arc::new(alerts::api::AlertApiState {
        store: Arc::clone(&alert_store),
    }));
    let health_router = Router::new()
        .route("/health", get(health_handler))
        .with_state(Arc::new(HealthState::new(config.service.name.clone())));

    let router = Router::new()
        .merge(price_router)
        .merge(lock_router)
        .merge(alert_router)
        .merge(health_router)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let server_config = ServerConfig {
        host: config.server.host.clone(),
        http_port: Some(http_port),
        websocket_port: Some(ws_port),
    };

    let http_server = HttpServer::new(server_config.clone(), router);
    let stream_server = PriceStreamServer::new(server_config, Arc::clone(&hub));

    let shutdown = ShutdownController::with_ctrl_c();
    scheduler.start();

    let mut handles: Vec<tokio::task::JoinHandle<server::Result<()>>> = Vec::new();
    {
        let token = shutdown.child_token();
        handles.push(tokio::spawn(async move { http_server.run(token).await }));
    }
    {
        let token = shutdown.child_token();
        handles.push(tokio::spawn(async move { stream_server.run(token).await }));
    }

    info!("Service started");

    // Run until Ctrl+C or until a server exits on its own.
    tokio::select! {
        _ = shutdown.wait_for_shutdown() => {
            info!("Shutdown signal received");
        }
        result = wait_for_first_completion(&mut handles) => {
            match result {
                Some(Ok(Ok(()))) => warn!("A server exited unexpectedly (but successfully)"),
                Some(Ok(Err(e))) => error!(%e, "A server exited with error"),
                Some(Err(e)) => error!(%e, "A server task panicked"),
                None => {}
            }
            shutdown.shutdown();
        }
    }

    scheduler.stop().await;

    // Drain server tasks with a timeout.
    handles.retain(|h| !h.is_finished());
    let drain = tokio::time::timeout(
        Duration::from_secs(30),
        futures::future::join_all(handles),
    );
    match drain.await {
        Ok(results) => {
            for result in results {
                match result {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!(%e, "Server error during shutdown"),
                    Err(e) => warn!(%e, "Server task panicked during shutdown"),
                }
            }
            info!("All servers shut down");
        }
        Err(_) => {
            warn!("Timed out waiting for servers to shut down");
        }
    }

    Ok(())
}

/// Wait for the first handle to complete
async fn wait_for_first_completion(
    handles: &mut [tokio::task::JoinHandle<server::Result<()>>],
) -> Option<std::result::Result<server::Result<()>, tokio::task::JoinError>> {
    if handles.is_empty() {
        return None;
    }

    let (result, _index, _remaining) =
        futures::future::select_all(handles.iter_mut().map(Box::pin)).await;

    Some(result)
}

fn validate_command<P: AsRef<Path>>(config_path: P) -> Result<()> {
    info!(path = ?config_path.as_ref(), "Validating configuration");

    let config = match load_config(&config_path) {
        Ok(c) => c,
        Err(e) => {
            error!(%e, "Failed to load configuration");
            anyhow::bail!(e);
        }
    };

    let report = validate_config(&config);

    println!("\n=== Configuration Validation Report ===\n");

    if !report.defaults_applied.is_empty() {
        println!("Defaults Applied ({}):", report.defaults_applied.len());
        for default in &report.defaults_applied {
            println!("  [info] [{}] {}", default.field, default.message);
        }
        println!();
    }

    if !report.warnings.is_empty() {
        println!("Warnings ({}):", report.warnings.len());
        for warning in &report.warnings {
            println!("  [warn] [{}] {}", warning.field, warning.message);
        }
        println!();
    }

    if !report.errors.is_empty() {
        println!("Errors ({}):", report.errors.len());
        for err in &report.errors {
            println!("  [error] {}", err);
        }
        println!();
        anyhow::bail!("Configuration validation failed");
    }

    println!("[ok] Configuration is valid!");
    println!();
    println!("Service: {}", config.service.name);
    println!("Version: {}", config.service.version);
    println!("Countries: {}", config.countries.len());
    println!("Lock TTL: {}s", config.locks.ttl_secs);
    println!(
        "Lock store: {}",
        if config.locks.redis_url.is_some() {
            "redis"
        } else {
            "in-memory"
        }
    );

    Ok(())
}

fn init_command<P: AsRef<Path>>(output_path: P) -> Result<()> {
    let output_path = output_path.as_ref();
    info!(?output_path, "Initializing new configuration file");

    let config = generate_default_config();

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }
    }

    save_config(&config, output_path)?;

    println!("[ok] Configuration file created successfully!");
    println!();
    println!("Location: {:?}", output_path);
    println!();
    println!("This configuration includes:");
    println!("  - Service metadata (name, version)");
    println!("  - Upstream feed settings and cache freshness windows");
    println!("  - 3 storefront countries (IN, AE, UK) with tax rates");
    println!("  - Price lock TTL and retention");
    println!();
    println!("Next steps:");
    println!("  1. Edit the configuration file to customize settings");
    println!("  2. Set the feed API key (e.g. api_key: ${{METALS_API_KEY}})");
    println!(
        "  3. Run 'aurumd validate --config {:?}' to check configuration",
        output_path
    );
    println!(
        "  4. Run 'aurumd start --config {:?}' to start the service",
        output_path
    );

    Ok(())
}
