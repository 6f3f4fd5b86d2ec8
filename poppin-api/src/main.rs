//! Poppin API Server Entry Point
//!
//! Loads configuration, builds the store, providers and refresh engine,
//! spawns the background workers, and serves the Axum router until ctrl-c.

use std::sync::Arc;
use std::time::Duration;

use poppin_api::{
    create_api_router,
    jobs::periodic_sweep_task,
    telemetry::{init_tracing, LogFormat},
    ApiError, ApiResult, AppState, LookupSettings, ServiceConfig, StoreBackend,
};
use poppin_core::{ContentDiscoveryProvider, GeoResolver};
use poppin_providers::{GeminiDiscoveryProvider, GeoNamesResolver};
use poppin_storage::{
    BackgroundTrigger, CleanSweepReplacer, ContentIngestor, DocumentStore, InMemoryDocumentStore,
    InProcessTrigger, LmdbDocumentStore, RefreshConsumer, RefreshDispatcher,
};
use tokio::sync::watch;

/// How long shutdown waits for in-flight background refreshes.
const CONSUMER_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_tracing(LogFormat::from_env())?;

    let config = ServiceConfig::from_env()?;
    tracing::info!(?config, "Configuration loaded");

    let store: Arc<dyn DocumentStore> = match config.store {
        StoreBackend::Lmdb => Arc::new(LmdbDocumentStore::open(
            &config.data_dir,
            config.store_max_mb,
        )?),
        StoreBackend::Memory => Arc::new(InMemoryDocumentStore::new()),
    };

    let provider: Arc<dyn ContentDiscoveryProvider> = Arc::new(GeminiDiscoveryProvider::new(
        config.gemini_api_key.clone(),
        config.gemini_model.clone(),
        config.gemini_rpm,
    ));
    if config.gemini_api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY not set; lookups will serve stored events only");
    }
    let geo: Arc<dyn GeoResolver> = Arc::new(GeoNamesResolver::new(config.geonames_user.clone()));

    let (trigger, refresh_rx) = InProcessTrigger::channel(config.trigger_topic.clone());
    let trigger: Arc<dyn BackgroundTrigger> = Arc::new(trigger);

    let dispatcher = RefreshDispatcher::new(Arc::clone(&store), Arc::clone(&provider), trigger);

    let consumer = Arc::new(RefreshConsumer::new(
        CleanSweepReplacer::new(ContentIngestor::new(Arc::clone(&store))),
        provider,
    ));
    let consumer_handle = tokio::spawn(Arc::clone(&consumer).run(refresh_rx));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweep_handle = config.sweep.enabled.then(|| {
        tokio::spawn(periodic_sweep_task(
            dispatcher.clone(),
            config.sweep.clone(),
            shutdown_rx,
        ))
    });

    let state = AppState::new(dispatcher, geo, LookupSettings::from(&config));
    let app = create_api_router(state);

    let addr = config.bind_addr;
    tracing::info!(%addr, "Starting Poppin API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    // Stopping the sweep releases the last trigger sender once the router is
    // gone, which lets the consumer drain and exit.
    let _ = shutdown_tx.send(true);
    if let Some(handle) = sweep_handle {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Periodic sweep task panicked");
        }
    }

    match tokio::time::timeout(CONSUMER_DRAIN_TIMEOUT, consumer_handle).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "Refresh consumer panicked"),
        Err(_) => tracing::warn!(stats = ?consumer.stats(), "Refresh consumer still busy at exit"),
    }

    Ok(())
}
