use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use crate::error::{Error, Result};
use crate::types::exchange::ExchangeId;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // Ingest metrics
    pub static ref FRAMES_RECEIVED: IntCounterVec = IntCounterVec::new(
        Opts::new("frames_received_total", "Raw websocket frames received"),
        &["exchange"]
    ).unwrap();

    pub static ref DECODE_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("decode_failures_total", "Frames dropped because they could not be decoded"),
        &["exchange"]
    ).unwrap();

    pub static ref TICKS_DECODED: IntCounterVec = IntCounterVec::new(
        Opts::new("ticks_decoded_total", "Ticks produced by the decoders"),
        &["exchange"]
    ).unwrap();

    // Connection metrics
    pub static ref RECONNECTS: IntCounterVec = IntCounterVec::new(
        Opts::new("reconnects_total", "Sessions lost and scheduled for reconnect"),
        &["exchange"]
    ).unwrap();

    pub static ref PINGS_SENT: IntCounterVec = IntCounterVec::new(
        Opts::new("pings_sent_total", "Keepalive pings sent"),
        &["exchange"]
    ).unwrap();

    pub static ref PONGS_SENT: IntCounterVec = IntCounterVec::new(
        Opts::new("pongs_sent_total", "Pongs sent in reply to exchange pings"),
        &["exchange"]
    ).unwrap();

    // Output metrics
    pub static ref RECORDS_FLUSHED: IntCounterVec = IntCounterVec::new(
        Opts::new("records_flushed_total", "Records emitted by aggregation or pass-through"),
        &["exchange"]
    ).unwrap();

    pub static ref RECORDS_WRITTEN: IntCounterVec = IntCounterVec::new(
        Opts::new("records_written_total", "Records appended to storage"),
        &["exchange"]
    ).unwrap();

    pub static ref PERSISTENCE_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("persistence_failures_total", "Records dropped on write failure"),
        &["exchange"]
    ).unwrap();
}

pub fn register_metrics() -> Result<()> {
    let collectors: [&IntCounterVec; 9] = [
        &FRAMES_RECEIVED,
        &DECODE_FAILURES,
        &TICKS_DECODED,
        &RECONNECTS,
        &PINGS_SENT,
        &PONGS_SENT,
        &RECORDS_FLUSHED,
        &RECORDS_WRITTEN,
        &PERSISTENCE_FAILURES,
    ];

    for collector in collectors {
        match REGISTRY.register(Box::new(collector.clone())) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(Error::ConfigError(format!("metrics registration failed: {}", e))),
        }
    }
    Ok(())
}

pub fn inc(counter: &IntCounterVec, exchange: ExchangeId) {
    counter.with_label_values(&[exchange.as_str()]).inc();
}

pub fn inc_by(counter: &IntCounterVec, exchange: ExchangeId, n: u64) {
    counter.with_label_values(&[exchange.as_str()]).inc_by(n);
}

pub fn get(counter: &IntCounterVec, exchange: ExchangeId) -> u64 {
    counter.with_label_values(&[exchange.as_str()]).get()
}

/// Prometheus text exposition of every registered counter.
pub fn gather_text() -> Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&REGISTRY.gather(), &mut buffer)
        .map_err(|e| Error::SerializationError(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| Error::SerializationError(e.to_string()))
}

/// One-line summary for the periodic supervision log.
pub fn summary(exchange: ExchangeId) -> String {
    format!(
        "frames={} ticks={} decode_failures={} flushed={} written={} persistence_failures={} reconnects={} pings={} pongs={}",
        get(&FRAMES_RECEIVED, exchange),
        get(&TICKS_DECODED, exchange),
        get(&DECODE_FAILURES, exchange),
        get(&RECORDS_FLUSHED, exchange),
        get(&RECORDS_WRITTEN, exchange),
        get(&PERSISTENCE_FAILURES, exchange),
        get(&RECONNECTS, exchange),
        get(&PINGS_SENT, exchange),
        get(&PONGS_SENT, exchange),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_is_idempotent_and_renders() {
        register_metrics().unwrap();
        register_metrics().unwrap();

        inc(&TICKS_DECODED, ExchangeId::Bitget);
        let text = gather_text().unwrap();
        assert!(text.contains("ticks_decoded_total"));
        assert!(text.contains("exchange=\"bitget\""));
        assert!(summary(ExchangeId::Bitget).contains("ticks="));
    }
}
