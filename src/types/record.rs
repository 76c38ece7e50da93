use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::types::exchange::{Channel, ExchangeId};
use crate::types::tick::{Tick, TickFields};

/// Addresses one output target.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub exchange: ExchangeId,
    pub channel: Channel,
    pub symbol: String,
}

impl RecordKey {
    /// `<root>/<exchange>/<channel>/<symbol>.csv`
    pub fn path_under(&self, root: &Path) -> PathBuf {
        root.join(self.exchange.as_str())
            .join(self.channel.as_str())
            .join(format!("{}.csv", self.symbol))
    }
}

/// A persisted row: either one pass-through tick or one flushed bucket.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub key: RecordKey,
    pub timestamp: u64,
    pub fields: TickFields,
    /// Ticks collapsed into this row; not part of the CSV line.
    pub ticks: usize,
}

impl OutputRecord {
    pub fn header(&self) -> String {
        let mut columns = vec!["timestamp"];
        columns.extend_from_slice(self.fields.columns());
        columns.join(",")
    }

    pub fn line(&self) -> String {
        let mut values = vec![self.timestamp.to_string()];
        values.extend(
            self.fields
                .values()
                .into_iter()
                .map(|v| v.map(|d| d.to_string()).unwrap_or_default()),
        );
        values.join(",")
    }
}

impl From<Tick> for OutputRecord {
    fn from(tick: Tick) -> Self {
        OutputRecord {
            key: RecordKey {
                exchange: tick.exchange,
                channel: tick.channel,
                symbol: tick.symbol,
            },
            timestamp: tick.timestamp,
            fields: tick.fields,
            ticks: 1,
        }
    }
}
