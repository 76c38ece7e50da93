/// Width of one aggregation bucket in milliseconds.
pub const DEFAULT_BUCKET_WIDTH_MS: u64 = 100;

/// Floor-aligns `timestamp_ms` to the start of its bucket.
pub fn bucket_floor(timestamp_ms: u64, width_ms: u64) -> u64 {
    timestamp_ms / width_ms * width_ms
}
