use std::sync::Arc;

use parking_lot::Mutex;

use stock_aggregator::aggregation::PriceLevelAggregator;
use stock_aggregator::buffer::SequenceBuffer;
use stock_aggregator::config::ServiceConfig;
use stock_aggregator::{udp, SERVICE_VERSION};

/// Environment variable naming an optional JSON config file.
const CONFIG_ENV_VAR: &str = "STOCK_AGGREGATOR_CONFIG";

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    tracing::info!(version = SERVICE_VERSION, "Starting stock aggregator service");

    let config = match std::env::var(CONFIG_ENV_VAR) {
        Ok(path) => {
            tracing::info!(path = %path, "Loading configuration file");
            ServiceConfig::from_file(path)?
        }
        Err(_) => ServiceConfig::default(),
    };
    config.validate()?;

    let buffer = Arc::new(Mutex::new(SequenceBuffer::new(config.cache_capacity)));
    let aggregator = PriceLevelAggregator::new(Arc::clone(&buffer), config.bulk_size);

    let socket = udp::bind_multicast(&config).await?;
    tracing::info!(
        host = %config.listen_host,
        port = config.listen_port,
        "Listening for inbound batches"
    );

    let ingestion = tokio::spawn(udp::run_ingestion(socket, buffer));

    tracing::info!(
        address = %config.emission_address,
        port = config.emission_port,
        period_ms = config.emission_period_ms,
        "Starting periodic emission"
    );
    let emitter = udp::run_emitter(&config, aggregator);

    tokio::select! {
        result = ingestion => result??,
        result = emitter => result?,
    }

    Ok(())
}
