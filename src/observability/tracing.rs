use tracing::Span;
use tracing_subscriber::EnvFilter;
use crate::config::LoggingConfig;
use crate::error::{Error, Result};
use crate::types::exchange::ExchangeId;
use crate::types::ids::ShardId;

/// Installs the global subscriber. `RUST_LOG` wins over the configured filter.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .map_err(|e| Error::ConfigError(format!("invalid log filter: {}", e)))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| Error::ConfigError(format!("tracing init failed: {}", e)))
}

pub fn exchange_span(exchange: ExchangeId) -> Span {
    tracing::info_span!(
        "exchange",
        exchange = %exchange,
    )
}

pub fn shard_span(exchange: ExchangeId, shard: ShardId) -> Span {
    tracing::info_span!(
        "shard",
        exchange = %exchange,
        shard = %shard,
    )
}
