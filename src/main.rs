//! Payment Screening Pipeline - Main Entry Point
//!
//! Consumes payment events from NATS JetStream, checks each one against the
//! payer's last payment, and publishes the verdict to the checked or
//! suspicious subject. Events are screened in parallel.

use anyhow::{Context, Result};
use futures::StreamExt;
use payment_screening_pipeline::{
    cache::{memory::InMemoryCacheStore, store_redis::RedisCacheStore, CacheStore, LastPaymentCache},
    config::{AppConfig, LoggingConfig},
    consumer::{decode_payment, message_key, settle, PaymentConsumer, Settlement},
    ledger::HttpLedgerClient,
    metrics::{MetricsReporter, PipelineMetrics},
    producer::OutcomePublisher,
    screening::ScreeningOrchestrator,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(
        format!("payment_screening_pipeline={}", logging.level).parse()?,
    );

    if logging.format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().pretty().with_env_filter(filter).init();
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first so logging can follow it
    let config = AppConfig::load()?;
    init_tracing(&config.logging)?;

    info!("Starting Payment Screening Pipeline");
    info!(
        freshness_hours = config.cache.freshness_hours,
        stale_fallback = config.cache.stale_fallback,
        min_card_length = config.screening.min_card_length,
        tiers = ?config.screening.tiers,
        "Configuration loaded successfully"
    );

    // Initialize metrics
    let metrics = Arc::new(PipelineMetrics::new());

    // Last-payment cache
    let store: Arc<dyn CacheStore> = match &config.cache.redis_url {
        Some(url) => {
            let store = RedisCacheStore::new(url, &config.cache.hash_key)?;
            info!("Using Redis last-payment cache at {}", url);
            Arc::new(store)
        }
        None => {
            warn!("No Redis URL configured, last-payment cache is process-local");
            Arc::new(InMemoryCacheStore::new())
        }
    };
    let cache = LastPaymentCache::new(store, config.freshness()?);

    // Payment ledger
    let ledger = Arc::new(HttpLedgerClient::new(
        &config.ledger.base_url,
        config.ledger.timeout_ms,
    ));
    info!("Payment ledger at {}", config.ledger.base_url);

    // Connect to NATS
    let client = async_nats::connect(&config.nats.url)
        .await
        .with_context(|| format!("Failed to connect to NATS at {}", config.nats.url))?;
    info!("Connected to NATS at {}", config.nats.url);

    // Initialize consumer and publisher
    let consumer = PaymentConsumer::new(client.clone(), &config.nats);
    let publisher = Arc::new(OutcomePublisher::new(
        client.clone(),
        &config.nats,
        metrics.clone(),
    ));

    let orchestrator = Arc::new(ScreeningOrchestrator::from_config(
        &config,
        cache,
        ledger,
        publisher,
        metrics.clone(),
    ));

    // Parallel processing configuration
    let num_workers = config.pipeline.workers.max(1);
    info!(
        "Starting payment screening loop with {} parallel workers",
        num_workers
    );
    if config.pipeline.serialize_per_payer {
        info!(
            "Payments of the same payer are serialized over {} lock shards",
            config.pipeline.lock_shards
        );
    }
    info!("Listening on subject: {}", consumer.subject());
    info!(
        "Publishing results to: {} / {}",
        config.nats.checked_subject, config.nats.suspicious_subject
    );

    // Semaphore to limit concurrent processing
    let semaphore = Arc::new(Semaphore::new(num_workers));
    let processed_count = Arc::new(AtomicU64::new(0));

    // Start metrics reporter
    let metrics_clone = metrics.clone();
    let report_interval = config.metrics.report_interval_secs;
    tokio::spawn(async move {
        let reporter = MetricsReporter::new(metrics_clone, report_interval);
        reporter.start().await;
    });

    let mut messages = consumer.subscribe().await?;

    // One signal future for the whole loop so a Ctrl+C is never dropped
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        let message = tokio::select! {
            next = messages.next() => match next {
                Some(Ok(message)) => message,
                Some(Err(e)) => {
                    warn!(error = %e, "Failed to receive payment message");
                    continue;
                }
                None => break,
            },
            signal = &mut shutdown => {
                match signal {
                    Ok(()) => info!("Shutdown signal received"),
                    Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
                }
                break;
            }
        };

        // Acquire permit (limits concurrent tasks)
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .context("Worker semaphore closed")?;

        let orchestrator = orchestrator.clone();
        let metrics = metrics.clone();
        let processed_count = processed_count.clone();

        tokio::spawn(async move {
            let key = message_key(&message);

            let settlement = match decode_payment(&message.payload) {
                Ok(event) => {
                    debug!(payment_id = event.id, key = ?key, "Payment received");
                    match orchestrator.process(event).await {
                        Ok(_) => Settlement::Ack,
                        // Logged by the orchestrator; redelivered by the broker
                        Err(_) => Settlement::Retry,
                    }
                }
                Err(e) => {
                    warn!(key = ?key, error = %e, "Failed to deserialize payment");
                    Settlement::Discard
                }
            };

            settle(&message, settlement).await;

            let count = processed_count.fetch_add(1, Ordering::Relaxed) + 1;

            // Log progress every 100 payments
            if count % 100 == 0 {
                let processing_stats = metrics.get_processing_stats();
                info!(
                    processed = count,
                    throughput = format!("{:.1} payments/s", metrics.get_throughput()),
                    avg_latency_us = processing_stats.mean_us,
                    "Processing milestone"
                );
            }

            drop(permit);
        });
    }

    // Wait for in-flight payments before reporting
    if let Err(e) = semaphore.acquire_many(num_workers as u32).await {
        error!(error = %e, "Failed to wait for in-flight payments");
    }

    info!("Pipeline shutting down...");
    metrics.print_summary();

    Ok(())
}
