//! `run` command implementation.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use ingestion::{FetchTask, IngestionManager, IntakeHandle};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};

use super::default_registry;
use crate::cli::RunArgs;
use crate::source::JsonLinesSource;

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    // Validate config path
    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    // Load and parse configuration
    let mut config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Apply CLI overrides
    if let Some(consumers) = args.consumers {
        if consumers == 0 {
            anyhow::bail!("--consumers must be >= 1");
        }
        info!(consumers, "Overriding consumer count from CLI");
        config.manager.consumers = consumers;
    }

    info!(
        consumers = config.manager.consumers,
        backends = config.backends.len(),
        inputs = args.inputs.len(),
        "Configuration loaded"
    );
    print_config_summary(&config);

    let mut manager = IngestionManager::initialize(config, Arc::new(default_registry())).await;
    for (id, working) in manager.working_backends() {
        if !working {
            warn!(backend = %id, "Backend unavailable at startup, continuing without it");
        }
    }
    manager
        .start()
        .await
        .context("Failed to start ingestion")?;

    let mut producer = if args.inputs.is_empty() {
        None
    } else {
        let task = FetchTask::new(
            Box::new(JsonLinesSource::new()),
            JsonLinesSource::feeds_for(&args.inputs),
        )?;
        Some(tokio::spawn(produce(
            task,
            manager.handle(),
            Duration::from_secs(args.poll_interval),
        )))
    };

    if args.exit_when_drained && args.poll_interval > 0 {
        warn!("--exit-when-drained has no effect while inputs are re-polled");
    }

    let started = Instant::now();
    let shutdown_signal = setup_shutdown_signal();

    info!("Starting ingestion...");

    tokio::select! {
        _ = wait_until_drained(&manager, producer.as_mut(), args.exit_when_drained) => {
            info!("Inputs consumed and queue drained");
        }
        _ = shutdown_signal => {
            warn!("Received shutdown signal, stopping ingestion...");
        }
    }

    if let Some(producer) = producer {
        producer.abort();
    }
    manager.stop().await;
    print_run_summary(&manager, started.elapsed());

    info!("Ingest Dispatch finished");
    Ok(())
}

/// Poll the inputs and hand the items to the manager
async fn produce(mut task: FetchTask, intake: IntakeHandle, poll_interval: Duration) {
    loop {
        task.run().await;
        let handed = task.hand_off(&intake);
        info!(source = %task.source_name(), items = handed, "Items handed to ingestion");

        if poll_interval.is_zero() {
            break;
        }
        tokio::time::sleep(poll_interval).await;
        task.restart();
    }
}

async fn wait_until_drained(
    manager: &IngestionManager,
    producer: Option<&mut JoinHandle<()>>,
    exit_when_drained: bool,
) {
    if !exit_when_drained {
        return std::future::pending().await;
    }

    if let Some(producer) = producer {
        if let Err(e) = producer.await {
            warn!(error = %e, "Producer task ended abnormally");
        }
    }

    while !manager.drain(Duration::from_secs(1)).await {
        info!(queued = manager.queue_len(), "Waiting for queue to drain");
    }
}

/// Setup Ctrl+C and SIGTERM signal handlers
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
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

/// Print configuration summary
fn print_config_summary(config: &contracts::IngestConfig) {
    let manager = &config.manager;
    println!("\n=== Configuration Summary ===\n");
    println!("Manager:");
    println!("  Consumers: {}", manager.consumers);
    println!("  Stats interval: {}s", manager.stats_interval_secs);
    match manager.max_queue_len {
        Some(limit) => println!("  Queue limit: {limit}"),
        None => println!("  Queue limit: unbounded"),
    }
    if let Some(secs) = manager.health_check_interval_secs {
        println!("  Health check: every {secs}s");
    }

    println!("\nBackends ({}):", config.backends.len());
    for backend in &config.backends {
        println!("  - {} ({})", backend.id, backend.selector);
    }
    println!();
}

fn print_run_summary(manager: &IngestionManager, elapsed: Duration) {
    let snapshot = manager.snapshot();
    let secs = elapsed.as_secs_f64();
    let rate = if secs > 0.0 {
        snapshot.delivered as f64 / secs
    } else {
        0.0
    };

    println!("\n=== Ingestion Statistics ===\n");
    println!("  Duration: {secs:.2}s");
    println!("  Accepted: {}", snapshot.accepted);
    println!("  Processed: {}", snapshot.delivered);
    println!("  Dropped: {}", snapshot.dropped);
    if snapshot.abandoned > 0 {
        println!("  Abandoned at shutdown: {}", snapshot.abandoned);
    }
    println!("  Still queued: {}", snapshot.queued);
    println!("  Rate: {rate:.2} items/s");

    let working = manager.working_backends();
    println!("\nBackends:");
    for (id, counts) in manager.dispatcher().delivered() {
        let status = if working.get(&id).copied().unwrap_or(false) {
            "up"
        } else {
            "down"
        };
        println!(
            "  - {id} [{status}] items={} media={} webpages={}",
            counts.items, counts.media_items, counts.web_pages
        );
    }
    println!();
}
