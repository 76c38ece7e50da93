use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};
use crate::interfaces::RecordSink;
use crate::observability::metrics::{self, PERSISTENCE_FAILURES, RECORDS_WRITTEN};
use crate::types::record::OutputRecord;

/// Drains `records` into `sink` until every sender is gone; resolves to the number written.
/// A failed append is logged and the record dropped.
pub fn spawn_record_writer(
    sink: Arc<dyn RecordSink>,
    mut records: mpsc::UnboundedReceiver<OutputRecord>,
) -> JoinHandle<u64> {
    tokio::spawn(async move {
        let mut written = 0u64;

        while let Some(record) = records.recv().await {
            let exchange = record.key.exchange;
            match sink.append(&record).await {
                Ok(()) => {
                    written += 1;
                    metrics::inc(&RECORDS_WRITTEN, exchange);
                }
                Err(e) => {
                    metrics::inc(&PERSISTENCE_FAILURES, exchange);
                    error!(
                        error = %e,
                        channel = %record.key.channel,
                        symbol = %record.key.symbol,
                        "dropping record after write failure"
                    );
                }
            }
        }

        info!(written, "record writer finished");
        written
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;
    use crate::error::{Error, Result};
    use crate::types::exchange::{Channel, ExchangeId};
    use crate::types::record::RecordKey;
    use crate::types::tick::TickFields;

    /// Rejects every record for symbol "BAD".
    #[derive(Default)]
    struct FlakySink {
        accepted: Mutex<Vec<u64>>,
    }

    #[async_trait]
    impl RecordSink for FlakySink {
        async fn append(&self, record: &OutputRecord) -> Result<()> {
            if record.key.symbol == "BAD" {
                return Err(Error::IoError(std::io::Error::other("disk full")));
            }
            self.accepted.lock().push(record.timestamp);
            Ok(())
        }
    }

    fn record(symbol: &str, ts: u64) -> OutputRecord {
        OutputRecord {
            key: RecordKey {
                exchange: ExchangeId::Okx,
                channel: Channel::IndexTickers,
                symbol: symbol.to_string(),
            },
            timestamp: ts,
            fields: TickFields::IndexPrice { index_price: dec!(1) },
            ticks: 1,
        }
    }

    #[tokio::test]
    async fn test_failures_are_dropped_not_fatal() {
        let sink = Arc::new(FlakySink::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = spawn_record_writer(sink.clone(), rx);

        tx.send(record("BTC-USDT", 1)).unwrap();
        tx.send(record("BAD", 2)).unwrap();
        tx.send(record("BTC-USDT", 3)).unwrap();
        drop(tx);

        assert_eq!(handle.await.unwrap(), 2);
        assert_eq!(*sink.accepted.lock(), vec![1, 3]);
    }
}
