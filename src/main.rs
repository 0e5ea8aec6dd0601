//! QuAL Scoring Pipeline - Main Entry Point
//!
//! Relays job channel messages between NATS and an in-process scoring
//! worker. Hosts publish `{}`, `{comments: [...]}` or `{cancel: true}` on the
//! job subject and read worker messages from the event subject.

use anyhow::{Context, Result};
use futures::StreamExt;
use qual_scoring::{
    channel::spawn_worker,
    config::AppConfig,
    consumer::{self, JobConsumer},
    logging,
    metrics::{MetricsReporter, PipelineMetrics},
    models::registry::{ModelRegistry, OnnxClassifierFactory},
    producer::EventPublisher,
};
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    logging::init(&config.logging)?;

    info!("Starting QuAL Scoring Pipeline");
    info!(
        models_dir = %config.models.models_dir,
        concurrent_models = config.scoring.concurrent_models,
        continue_on_error = config.scoring.continue_on_error,
        "Configuration loaded successfully"
    );

    let metrics = Arc::new(PipelineMetrics::new());

    // Models load on the first host message, not at startup
    let factory = OnnxClassifierFactory::new(config.models.clone())
        .context("Failed to initialize ONNX Runtime")?;
    let registry = Arc::new(ModelRegistry::new(Arc::new(factory)));
    let worker = spawn_worker(
        registry,
        config.scoring.clone(),
        metrics.clone(),
        config.pipeline.channel_capacity,
    );
    let (commands, mut events, worker_task) = worker.into_parts();

    let client = async_nats::connect(&config.nats.url)
        .await
        .with_context(|| format!("Failed to connect to NATS at {}", config.nats.url))?;
    info!("Connected to NATS at {}", config.nats.url);

    let consumer = JobConsumer::new(client.clone(), &config.nats.job_subject);
    let publisher = EventPublisher::new(client.clone(), &config.nats.event_subject);
    info!("Listening on subject: {}", consumer.subject());
    info!("Publishing worker messages to: {}", publisher.subject());

    let reporter = MetricsReporter::new(metrics.clone(), config.metrics.report_interval_secs);
    tokio::spawn(reporter.start());

    let relay = tokio::spawn(async move {
        while let Some(message) = events.recv().await {
            if let Err(e) = publisher.publish(&message).await {
                error!(status = message.status(), error = %e, "Failed to publish worker message");
            }
        }
    });

    let mut subscription = consumer.subscribe().await?;
    loop {
        tokio::select! {
            next = subscription.next() => {
                let Some(message) = next else {
                    warn!("Job subscription closed");
                    break;
                };
                match consumer::decode(&message) {
                    Ok(host_message) => {
                        if commands.send(host_message).await.is_err() {
                            error!("Scoring worker stopped unexpectedly");
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(subject = %message.subject, error = %e, "Failed to deserialize host message");
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    info!("Pipeline shutting down...");
    drop(commands);
    if let Err(e) = worker_task.await {
        error!(error = %e, "Scoring worker ended abnormally");
    }
    if let Err(e) = relay.await {
        error!(error = %e, "Event relay ended abnormally");
    }
    client.flush().await.context("Failed to flush NATS client")?;
    metrics.print_summary();

    Ok(())
}
