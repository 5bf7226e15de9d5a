//! Churn Guard - Main Entry Point
//!
//! Answers churn scoring, segmentation and drift requests over NATS.
//! Requests are handled concurrently, bounded by the configured worker count.

use anyhow::Result;
use churn_guard::{
    config::{AppConfig, LoggingConfig},
    consumer::RequestConsumer,
    handler::RequestHandler,
    metrics::{MetricsReporter, ServiceMetrics},
    models::{ModelHandle, ModelLoader, ModelProvider, OnnxModelProvider},
    producer::ReplyProducer,
    service::{DecisionService, StoreLimits},
    store::SupabaseStore,
};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins when set; otherwise the configured level applies
fn log_filter(env_directives: Option<&str>, level: &str) -> Result<EnvFilter> {
    match env_directives {
        Some(directives) => Ok(EnvFilter::try_new(directives)?),
        None => Ok(EnvFilter::new(level).add_directive(format!("churn_guard={}", level).parse()?)),
    }
}

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let env_directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = log_filter(env_directives.as_deref(), &logging.level)?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load()?;
    init_logging(&config.logging)?;

    info!("Starting Churn Guard");
    info!(
        subject_prefix = %config.nats.subject_prefix,
        workers = config.pipeline.workers,
        batch_policy = ?config.pipeline.batch_policy,
        "Configuration loaded"
    );

    // Load the classifier; the service still answers health and
    // store-only requests without one
    let loader = ModelLoader::with_threads(config.model.onnx_threads)?;
    let provider = Arc::new(OnnxModelProvider::new(
        loader,
        &config.model.model_path,
        &config.model.metadata_path,
    ));
    let handle = Arc::new(ModelHandle::empty());
    match provider.load() {
        Ok(model) => {
            info!(
                model_version = %model.metadata.model_version,
                trained_at = %model.metadata.trained_at,
                features = model.metadata.features.len(),
                "Churn model loaded"
            );
            handle.swap(model)?;
        }
        Err(e) => warn!(
            model_path = %config.model.model_path,
            error = %e,
            "Churn model not loaded, scoring requests will fail until reload"
        ),
    }

    let mut service = DecisionService::new(handle)
        .with_model_provider(provider)
        .with_batch_policy(config.pipeline.batch_policy)
        .with_limits(StoreLimits::from(&config.store));

    if config.store.is_configured() {
        let store = SupabaseStore::new(&config.store)?;
        info!(table = %config.store.table, "Feature store configured");
        service = service.with_store(Arc::new(store));
    } else {
        warn!("Feature store not configured, store-backed requests will fail");
    }

    let metrics = Arc::new(ServiceMetrics::new());
    let handler = RequestHandler::new(Arc::new(service), metrics.clone());

    // Connect to NATS
    let client = async_nats::connect(&config.nats.url).await?;
    info!("Connected to NATS at {}", config.nats.url);

    let consumer = RequestConsumer::new(
        client.clone(),
        &config.nats.subject_prefix,
        &config.nats.queue_group,
    );
    let producer = ReplyProducer::new(client.clone());

    // Start metrics reporter
    let reporter = MetricsReporter::new(metrics.clone(), config.pipeline.metrics_interval_secs);
    tokio::spawn(reporter.start());

    let semaphore = Arc::new(Semaphore::new(config.pipeline.workers.max(1)));
    let prefix = Arc::new(config.nats.subject_prefix.clone());

    let mut subscription = consumer.subscribe().await?;
    info!("Listening on {}", consumer.subject());

    while let Some(message) = subscription.next().await {
        // Acquire permit (limits concurrent tasks)
        let permit = semaphore.clone().acquire_owned().await?;

        let handler = handler.clone();
        let producer = producer.clone();
        let prefix = prefix.clone();

        tokio::spawn(async move {
            let Some(reply_to) = message.reply.clone() else {
                warn!(subject = %message.subject, "Dropping request without reply subject");
                return;
            };

            let result = handler
                .handle_subject(&prefix, &message.subject, &message.payload)
                .await;

            let sent = match result {
                Ok(body) => producer.reply(reply_to, &body).await,
                Err(body) => producer.reply_error(reply_to, body).await,
            };
            if let Err(e) = sent {
                error!(subject = %message.subject, error = %e, "Failed to publish reply");
            }

            drop(permit);
        });
    }

    info!("Churn Guard shutting down...");
    metrics.print_summary();

    Ok(())
}
