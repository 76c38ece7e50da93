use std::path::PathBuf;
use serde::{Deserialize, Serialize};
use crate::persistence::csv_writer::DEFAULT_MAX_OPEN_FILES;
use crate::types::exchange::Channel;
use crate::types::timestamp::DEFAULT_BUCKET_WIDTH_MS;

pub mod exchange;
pub mod loader;
pub mod retry;

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub root: PathBuf,
    /// Upper bound on simultaneously open output files.
    pub max_open_files: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            root: PathBuf::from("data"),
            max_open_files: DEFAULT_MAX_OPEN_FILES,
        }
    }
}

/// Whether bucket boundaries advance once per stream or independently per symbol.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WatermarkScope {
    #[default]
    Global,
    PerSymbol,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct AggregationConfig {
    pub bucket_width_ms: u64,
    pub watermark_scope: WatermarkScope,
    /// Channels collapsed into buckets; everything else is written per tick.
    pub aggregated_channels: Vec<Channel>,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        AggregationConfig {
            bucket_width_ms: DEFAULT_BUCKET_WIDTH_MS,
            watermark_scope: WatermarkScope::Global,
            aggregated_channels: vec![Channel::BookTicker],
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            filter: "info".to_string(),
            json: false,
        }
    }
}
