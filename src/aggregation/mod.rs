pub mod merge;

use std::collections::HashMap;
use parking_lot::Mutex;
use crate::config::{AggregationConfig, WatermarkScope};
use crate::types::record::OutputRecord;
use crate::types::tick::Tick;
use crate::types::timestamp::bucket_floor;

pub use merge::merge_bucket;

/// Watermark-driven bucketing for one (exchange, channel) stream.
///
/// A tick whose bucket lies beyond the watermark advances it and flushes the incoming symbol's
/// buffer, if any. Anything else is appended to that symbol's buffer. Under
/// [`WatermarkScope::Global`] every symbol shares one watermark, so a quiet symbol's buffer can
/// outlive its bucket and absorb ticks from later buckets until it next crosses the watermark.
pub struct AggregationCache {
    width_ms: u64,
    scope: WatermarkScope,
    state: Mutex<CacheState>,
}

struct CacheState {
    watermark: u64,
    /// Starting watermark for symbols first seen in per-symbol mode.
    seed: u64,
    buffers: HashMap<String, SymbolBuffer>,
}

struct SymbolBuffer {
    watermark: u64,
    ticks: Vec<Tick>,
}

impl AggregationCache {
    pub fn new(config: &AggregationConfig) -> Self {
        Self::with_watermark(config, 0)
    }

    /// Seeds the watermark with `start_ms`, floor-aligned to the bucket width.
    pub fn with_watermark(config: &AggregationConfig, start_ms: u64) -> Self {
        let width_ms = config.bucket_width_ms.max(1);
        AggregationCache {
            width_ms,
            scope: config.watermark_scope,
            state: Mutex::new(CacheState {
                watermark: bucket_floor(start_ms, width_ms),
                seed: bucket_floor(start_ms, width_ms),
                buffers: HashMap::new(),
            }),
        }
    }

    /// Feeds one tick; returns the record flushed for the tick's symbol, if any.
    pub fn ingest(&self, tick: Tick) -> Option<OutputRecord> {
        let bucket = bucket_floor(tick.timestamp, self.width_ms);
        let mut guard = self.state.lock();
        let CacheState { watermark, seed, buffers } = &mut *guard;

        let seed = *seed;
        let buffer = buffers
            .entry(tick.symbol.clone())
            .or_insert_with(|| SymbolBuffer {
                watermark: seed,
                ticks: Vec::new(),
            });

        let current = match self.scope {
            WatermarkScope::Global => &mut *watermark,
            WatermarkScope::PerSymbol => &mut buffer.watermark,
        };

        if bucket <= *current {
            buffer.ticks.push(tick);
            return None;
        }

        *current = bucket;
        // process-level high-water mark, also reported in per-symbol mode
        if bucket > *watermark {
            *watermark = bucket;
        }

        let flushed = merge_bucket(&buffer.ticks);
        buffer.ticks.clear();
        buffer.ticks.push(tick);
        flushed
    }

    pub fn watermark(&self) -> u64 {
        self.state.lock().watermark
    }

    pub fn buffered(&self, symbol: &str) -> usize {
        self.state
            .lock()
            .buffers
            .get(symbol)
            .map_or(0, |b| b.ticks.len())
    }

    /// Flushes every non-empty buffer, ordered by symbol.
    pub fn drain(&self) -> Vec<OutputRecord> {
        let mut state = self.state.lock();
        let mut symbols: Vec<String> = state.buffers.keys().cloned().collect();
        symbols.sort();

        symbols
            .into_iter()
            .filter_map(|symbol| {
                let buffer = state.buffers.get_mut(&symbol)?;
                let record = merge_bucket(&buffer.ticks);
                buffer.ticks.clear();
                record
            })
            .collect()
    }
}
