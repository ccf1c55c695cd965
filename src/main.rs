mod addresses;
mod backfill;
mod checkpoint;
mod config;
mod errors;
mod events;
mod finalizer;
mod head_source;
mod health;
mod matcher;
mod metrics;
mod orchestrator;
mod processor;
mod publisher;
mod reorg;
mod rpc;
mod server;
mod telemetry;
mod types;

use std::path::Path;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::checkpoint::CheckpointStore;
use crate::config::{get_global_settings, init_global_settings};
use crate::errors::AppError;
use crate::head_source::HeadSourceConfig;
use crate::matcher::Matcher;
use crate::orchestrator::Orchestrator;
use crate::processor::Processor;
use crate::publisher::LoggingPublisher;
use crate::rpc::geth::GethClient;
use crate::rpc::Client;
use crate::telemetry::TelemetryConfig;

const HEAD_CHANNEL_CAPACITY: usize = 64;

fn exit_code_for(err: &AppError) -> i32 {
    match err {
        AppError::Config(_) => 2,
        AppError::Startup(_) => 3,
        _ => 1,
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = telemetry::init_tracing(TelemetryConfig::default()) {
        eprintln!("failed to initialize logging: {e}");
        std::process::exit(3);
    }

    if let Err(e) = run().await {
        tracing::error!(error = %e, "fatal startup error");
        std::process::exit(exit_code_for(&e));
    }
}

async fn run() -> Result<(), AppError> {
    init_global_settings()?;
    let settings = get_global_settings();

    metrics::init_metrics();

    let addresses = addresses::load_addresses(Path::new(&settings.addresses_file))?;
    tracing::info!(count = addresses.len(), "loaded watched addresses");
    let matcher = Arc::new(Matcher::new(&addresses)?);

    let client = Arc::new(GethClient::new(
        settings.eth_http_url.clone(),
        settings.eth_ws_url.clone(),
    ));
    let chain_id = client.get_chain_id().await?;
    tracing::info!(chain_id, "connected to chain");

    let publisher = Arc::new(LoggingPublisher);
    let processor = Processor::new(
        Arc::clone(&client),
        matcher,
        publisher,
        settings.kafka_topic.clone(),
        chain_id,
    );

    let checkpoint = CheckpointStore::new(settings.checkpoint_file.clone());
    let mut orchestrator = Orchestrator::new(
        Arc::clone(&client),
        processor,
        settings.reorg_depth,
        settings.confirmations,
        settings.bootstrap_blocks,
        checkpoint,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(wait_for_shutdown_signal(shutdown_tx));

    let port = settings.service_port;
    tokio::spawn(async move {
        if let Err(e) = server::serve(port).await {
            tracing::error!(error = %e, "health/metrics server exited");
        }
    });

    orchestrator.bootstrap().await?;

    let (heads_tx, heads_rx) = mpsc::channel(HEAD_CHANNEL_CAPACITY);
    let head_source_config = HeadSourceConfig {
        poll_interval: settings.head_poll_interval,
        backoff_floor: settings.ws_reconnect_floor,
        backoff_ceil: settings.ws_reconnect_ceil,
    };
    let head_source_client = Arc::clone(&client);
    tokio::spawn(async move {
        head_source::run(head_source_client, head_source_config, heads_tx, shutdown_rx).await;
    });

    orchestrator.drive(heads_rx).await?;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
    tokio::select! {
        _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => tracing::info!("received SIGINT, shutting down"),
    }
    let _ = shutdown_tx.send(true);
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("received ctrl-c, shutting down");
    let _ = shutdown_tx.send(true);
}
