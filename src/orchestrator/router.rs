use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::warn;
use crate::aggregation::AggregationCache;
use crate::config::AggregationConfig;
use crate::interfaces::TickSink;
use crate::observability::metrics::{self, RECORDS_FLUSHED};
use crate::types::exchange::{Channel, ExchangeId};
use crate::types::record::OutputRecord;
use crate::types::tick::Tick;

/// Sends each tick through its channel's cache, or straight to the writer for channels that
/// are not aggregated. Shared by every Connection of one exchange.
pub struct TickRouter {
    exchange: ExchangeId,
    caches: HashMap<Channel, AggregationCache>,
    records: mpsc::UnboundedSender<OutputRecord>,
}

impl TickRouter {
    /// One cache per aggregated channel, each seeded with `start_ms`.
    pub fn new(
        exchange: ExchangeId,
        config: &AggregationConfig,
        start_ms: u64,
        records: mpsc::UnboundedSender<OutputRecord>,
    ) -> Self {
        let caches = config
            .aggregated_channels
            .iter()
            .map(|channel| (*channel, AggregationCache::with_watermark(config, start_ms)))
            .collect();
        TickRouter {
            exchange,
            caches,
            records,
        }
    }

    pub fn is_aggregated(&self, channel: Channel) -> bool {
        self.caches.contains_key(&channel)
    }

    /// Returns the record this tick produces, if any.
    pub fn route(&self, tick: Tick) -> Option<OutputRecord> {
        match self.caches.get(&tick.channel) {
            Some(cache) => cache.ingest(tick),
            None => Some(OutputRecord::from(tick)),
        }
    }

    /// Flushes every open bucket to the writer; returns how many records went out.
    pub fn drain(&self) -> usize {
        let mut count = 0;
        for cache in self.caches.values() {
            for record in cache.drain() {
                self.emit(record);
                count += 1;
            }
        }
        count
    }

    fn emit(&self, record: OutputRecord) {
        metrics::inc(&RECORDS_FLUSHED, self.exchange);
        if self.records.send(record).is_err() {
            warn!(exchange = %self.exchange, "record writer gone, dropping record");
        }
    }
}

impl TickSink for TickRouter {
    fn on_tick(&self, tick: Tick) {
        if let Some(record) = self.route(tick) {
            self.emit(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use crate::types::tick::TickFields;

    fn book(ts: u64) -> Tick {
        Tick {
            exchange: ExchangeId::Binance,
            channel: Channel::BookTicker,
            symbol: "BTCUSDT".to_string(),
            timestamp: ts,
            fields: TickFields::Quote {
                ask_px: Some(dec!(2)),
                ask_sz: Some(dec!(1)),
                bid_px: Some(dec!(1)),
                bid_sz: Some(dec!(1)),
            },
        }
    }

    fn mark(ts: u64) -> Tick {
        Tick {
            exchange: ExchangeId::Binance,
            channel: Channel::MarkPriceUpdate,
            symbol: "BTCUSDT".to_string(),
            timestamp: ts,
            fields: TickFields::Funding {
                funding_rate: dec!(0.0001),
                index_price: dec!(100),
            },
        }
    }

    #[test]
    fn test_pass_through_and_aggregated_channels() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let router = TickRouter::new(ExchangeId::Binance, &AggregationConfig::default(), 0, tx);
        assert!(router.is_aggregated(Channel::BookTicker));
        assert!(!router.is_aggregated(Channel::MarkPriceUpdate));

        router.on_tick(mark(1000));
        router.on_tick(mark(1010));
        router.on_tick(book(1000));
        router.on_tick(book(1010));

        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        assert_eq!((first.timestamp, second.timestamp), (1000, 1010));
        assert!(rx.try_recv().is_err());

        router.on_tick(book(1100));
        assert_eq!(rx.try_recv().unwrap().timestamp, 1010);

        assert_eq!(router.drain(), 1);
        assert_eq!(rx.try_recv().unwrap().timestamp, 1100);
    }
}
