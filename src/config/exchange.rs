use std::fmt;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::config::retry::RetryPolicy;
use crate::decoder::{ExchangeAdapter, ExchangeProtocol};
use crate::ingest::connection::ConnectionSettings;
use crate::ingest::Topic;
use crate::types::exchange::{Channel, ExchangeId};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ExchangeConfig {
    pub exchange: ExchangeId,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub url: String,
    #[serde(default = "default_shard_size")]
    pub shard_size: usize,
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
    #[serde(default = "default_recv_poll_interval_ms")]
    pub recv_poll_interval_ms: u64,
    #[serde(default = "default_login_timeout_secs")]
    pub login_timeout_secs: u64,
    /// Canonical `BASEUSDT` symbols; each exchange maps them to its own instrument ids.
    #[serde(default)]
    pub symbols: Vec<String>,
    #[serde(default)]
    pub channels: Vec<Channel>,
    /// Channels subscribed once for every instrument (Binance `!markPrice@arr`, `!bookTicker`).
    #[serde(default)]
    pub market_channels: Vec<Channel>,
    #[serde(default)]
    pub credentials: Option<Credentials>,
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_enabled() -> bool {
    true
}

fn default_shard_size() -> usize {
    50
}

fn default_ping_interval_secs() -> u64 {
    20
}

fn default_recv_poll_interval_ms() -> u64 {
    100
}

fn default_login_timeout_secs() -> u64 {
    10
}

impl ExchangeConfig {
    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            url: self.url.clone(),
            ping_interval: Duration::from_secs(self.ping_interval_secs),
            recv_poll_interval: Duration::from_millis(self.recv_poll_interval_ms),
            login_timeout: Duration::from_secs(self.login_timeout_secs),
            retry: self.retry.clone(),
        }
    }

    /// Every (symbol, channel) pair, symbol-major, in the exchange's own topic form, followed by
    /// the market-wide topics.
    pub fn topics(&self) -> Vec<Topic> {
        let adapter = ExchangeAdapter::for_exchange(self.exchange);
        self.symbols
            .iter()
            .flat_map(|symbol| {
                self.channels
                    .iter()
                    .map(move |channel| adapter.topic(symbol, *channel))
            })
            .chain(
                self.market_channels
                    .iter()
                    .filter_map(|channel| adapter.market_topic(*channel)),
            )
            .collect()
    }
}

#[derive(Clone, PartialEq, Deserialize, Serialize)]
pub struct Credentials {
    pub api_key: String,
    pub secret: String,
    pub passphrase: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("secret", &"<redacted>")
            .field("passphrase", &"<redacted>")
            .finish()
    }
}
