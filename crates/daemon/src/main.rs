mod schedule;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tokio::signal;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use modmirror_core::{
    load_config, validate_config, ChannelSubscriber, CrawlContext, CrawlRunner, EventEnvelope,
    EventHub, LogSubscriber, SanitizedConfig,
};

use schedule::Schedule;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Buffer size for the event log channel
const EVENT_BUFFER_SIZE: usize = 1000;

/// Event log file, under the data directory
const EVENT_LOG_FILE: &str = "events.jsonl";

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::var("MODMIRROR_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    let sanitized = SanitizedConfig::from(&config);
    let config_json = serde_json::to_string(&sanitized).context("Failed to serialize config")?;
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        version = VERSION,
        config_hash = &config_hash[..16],
        "modmirror starting"
    );
    info!("Data directory: {:?}", config.paths.data_dir);
    info!("Categories: {:?}", config.catalog.categories);

    tokio::fs::create_dir_all(&config.paths.data_dir)
        .await
        .with_context(|| format!("Failed to create {:?}", config.paths.data_dir))?;

    let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER_SIZE);
    let event_log = config.paths.data_dir.join(EVENT_LOG_FILE);
    let writer_handle = tokio::spawn(write_events(event_rx, event_log));

    let events = EventHub::new()
        .with_subscriber(Arc::new(LogSubscriber))
        .with_subscriber(Arc::new(ChannelSubscriber::new(event_tx)));

    let schedule = Schedule::new(config.schedule.full_sweep_every);
    let interval_secs = config.schedule.interval_secs;
    let ctx = CrawlContext::from_config(config, events).context("Failed to build crawl context")?;
    let runner = CrawlRunner::new(ctx);

    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let mut run_index: u64 = 0;
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
            _ = ticker.tick() => {}
        }

        let mode = schedule.mode_for(run_index);
        // the runner has already logged and emitted the failure
        if let Err(e) = runner.run(mode).await {
            warn!("Run {} failed, waiting for the next one: {}", run_index, e);
        }
        run_index += 1;
    }

    // dropping the runner closes the event channel
    drop(runner);
    if let Err(e) = writer_handle.await {
        warn!("Event log writer did not shut down cleanly: {}", e);
    }
    info!("modmirror stopped");
    Ok(())
}

/// Append every event to `path` as one JSON line.
async fn write_events(mut rx: mpsc::Receiver<EventEnvelope>, path: PathBuf) {
    while let Some(envelope) = rx.recv().await {
        let mut line = match serde_json::to_string(&envelope) {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to encode event: {}", e);
                continue;
            }
        };
        line.push('\n');

        let written = async {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await?;
            file.write_all(line.as_bytes()).await
        }
        .await;
        if let Err(e) = written {
            error!("Failed to append to {:?}: {}", path, e);
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
