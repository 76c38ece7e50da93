use crate::config::exchange::ExchangeConfig;
use crate::config::*;
use crate::decoder::{ExchangeAdapter, ExchangeProtocol};
use crate::error::{Error, Result};
use crate::types::exchange::ExchangeId;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub aggregation: AggregationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub exchanges: Vec<ExchangeConfig>,
}

impl AppConfig {
    pub fn load(profile: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::with_name("config/default"))
            .add_source(File::with_name(&format!("config/{}", profile)).required(false))
            .add_source(Environment::with_prefix("ARB_INGEST").separator("__"))
            .build()
            .map_err(|e| Error::ConfigError(e.to_string()))?;

        let app: AppConfig = config.try_deserialize()
            .map_err(|e| Error::ConfigError(e.to_string()))?;
        app.validate()?;
        Ok(app)
    }

    pub fn from_toml(source: &str) -> Result<Self> {
        let app: AppConfig = Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| Error::ConfigError(e.to_string()))?;
        app.validate()?;
        Ok(app)
    }

    pub fn exchange(&self, id: ExchangeId) -> Result<&ExchangeConfig> {
        self.exchanges
            .iter()
            .find(|e| e.exchange == id)
            .ok_or_else(|| Error::ConfigError(format!("exchange {} is not configured", id)))
    }

    pub fn enabled_exchanges(&self) -> impl Iterator<Item = &ExchangeConfig> {
        self.exchanges.iter().filter(|e| e.enabled)
    }

    /// Startup checks; any failure here is fatal before a single connection opens.
    pub fn validate(&self) -> Result<()> {
        if self.aggregation.bucket_width_ms == 0 {
            return Err(Error::ConfigError("aggregation.bucket_width_ms must be > 0".into()));
        }
        if self.storage.max_open_files == 0 {
            return Err(Error::ConfigError("storage.max_open_files must be > 0".into()));
        }
        if self.enabled_exchanges().next().is_none() {
            return Err(Error::ConfigError("no enabled exchanges".into()));
        }

        for exchange in self.enabled_exchanges() {
            let id = exchange.exchange;
            if self.exchanges.iter().filter(|e| e.exchange == id).count() > 1 {
                return Err(Error::ConfigError(format!("exchange {} configured twice", id)));
            }
            if exchange.market_channels.is_empty() {
                if exchange.symbols.is_empty() {
                    return Err(Error::ConfigError(format!("{}: no symbols resolved", id)));
                }
                if exchange.channels.is_empty() {
                    return Err(Error::ConfigError(format!("{}: no channels configured", id)));
                }
            }
            if exchange.shard_size == 0 {
                return Err(Error::ConfigError(format!("{}: shard_size must be > 0", id)));
            }
            if exchange.ping_interval_secs == 0 || exchange.recv_poll_interval_ms == 0 {
                return Err(Error::ConfigError(format!("{}: intervals must be > 0", id)));
            }

            let adapter = ExchangeAdapter::for_exchange(id);
            if let Some(channel) = exchange
                .channels
                .iter()
                .find(|c| !adapter.supported_channels().contains(c))
            {
                return Err(Error::ConfigError(format!(
                    "{}: channel {} is not supported",
                    id, channel
                )));
            }
            if let Some(channel) = exchange
                .market_channels
                .iter()
                .find(|c| adapter.market_topic(**c).is_none())
            {
                return Err(Error::ConfigError(format!(
                    "{}: channel {} has no market-wide stream",
                    id, channel
                )));
            }
            if exchange.credentials.is_some() && !adapter.supports_login() {
                return Err(Error::LoginUnsupported(id));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WatermarkScope;
    use crate::types::exchange::Channel;

    const SAMPLE: &str = r#"
        [storage]
        root = "out"

        [aggregation]
        watermark_scope = "per_symbol"

        [[exchanges]]
        exchange = "binance"
        url = "wss://fstream.binance.com/ws"
        symbols = ["BTCUSDT", "ETHUSDT"]
        channels = ["bookTicker", "markPriceUpdate"]

        [[exchanges]]
        exchange = "okx"
        enabled = false
        url = "wss://ws.okx.com:8443/ws/v5/public"
        symbols = ["BTCUSDT"]
        channels = ["funding-rate"]
    "#;

    #[test]
    fn test_sample_config_loads_with_defaults() {
        let app = AppConfig::from_toml(SAMPLE).unwrap();

        assert_eq!(app.storage.root, std::path::PathBuf::from("out"));
        assert_eq!(app.storage.max_open_files, 256);
        assert_eq!(app.aggregation.bucket_width_ms, 100);
        assert_eq!(app.aggregation.watermark_scope, WatermarkScope::PerSymbol);
        assert_eq!(app.aggregation.aggregated_channels, vec![Channel::BookTicker]);

        let binance = app.exchange(ExchangeId::Binance).unwrap();
        assert_eq!(binance.shard_size, 50);
        assert_eq!(binance.retry.max_attempts, None);
        assert_eq!(app.enabled_exchanges().count(), 1);
        assert_eq!(binance.topics().len(), 4);
    }

    #[test]
    fn test_rejects_unsupported_channel() {
        let source = r#"
            [[exchanges]]
            exchange = "bitget"
            url = "wss://ws.bitget.com/v2/ws/public"
            symbols = ["BTCUSDT"]
            channels = ["bookTicker"]
        "#;
        assert!(matches!(AppConfig::from_toml(source), Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_rejects_empty_symbols() {
        let source = r#"
            [[exchanges]]
            exchange = "okx"
            url = "wss://ws.okx.com:8443/ws/v5/public"
            symbols = []
            channels = ["tickers"]
        "#;
        assert!(matches!(AppConfig::from_toml(source), Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_market_channels_stand_alone() {
        let source = r#"
            [[exchanges]]
            exchange = "binance"
            url = "wss://fstream.binance.com/ws"
            symbols = ["BTCUSDT"]
            channels = ["bookTicker"]
            market_channels = ["markPriceUpdate"]
        "#;
        let app = AppConfig::from_toml(source).unwrap();
        let topics = app.exchange(ExchangeId::Binance).unwrap().topics();
        let symbols: Vec<&str> = topics.iter().map(|t| t.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["btcusdt", "!markPrice@arr"]);

        let market_only = r#"
            [[exchanges]]
            exchange = "binance"
            url = "wss://fstream.binance.com/ws"
            market_channels = ["markPriceUpdate"]
        "#;
        assert_eq!(
            AppConfig::from_toml(market_only).unwrap().exchanges[0].topics().len(),
            1
        );

        let okx = r#"
            [[exchanges]]
            exchange = "okx"
            url = "wss://ws.okx.com:8443/ws/v5/public"
            market_channels = ["funding-rate"]
        "#;
        assert!(matches!(AppConfig::from_toml(okx), Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_rejects_credentials_without_login_hook() {
        let source = r#"
            [[exchanges]]
            exchange = "binance"
            url = "wss://fstream.binance.com/ws"
            symbols = ["BTCUSDT"]
            channels = ["bookTicker"]

            [exchanges.credentials]
            api_key = "k"
            secret = "s"
            passphrase = "p"
        "#;
        assert!(matches!(
            AppConfig::from_toml(source),
            Err(Error::LoginUnsupported(ExchangeId::Binance))
        ));
    }
}
