use std::sync::Arc;
use proptest::prelude::*;
use rust_decimal::Decimal;
use tempfile::TempDir;
use tokio::sync::mpsc;
use arb_ingest::interfaces::RecordSink;
use arb_ingest::persistence::{spawn_record_writer, CsvRecordWriter};
use arb_ingest::types::exchange::{Channel, ExchangeId};
use arb_ingest::types::record::{OutputRecord, RecordKey};
use arb_ingest::types::tick::TickFields;

fn ticker(symbol: &str, ts: u64) -> OutputRecord {
    OutputRecord {
        key: RecordKey {
            exchange: ExchangeId::Bitget,
            channel: Channel::Ticker,
            symbol: symbol.to_string(),
        },
        timestamp: ts,
        fields: TickFields::Ticker {
            funding_rate: Decimal::new(1, 4),
            index_price: Decimal::from(100),
            ask_px: Some(Decimal::from(101)),
            ask_sz: Some(Decimal::new(15, 1)),
            bid_px: Some(Decimal::from(99)),
            bid_sz: Some(Decimal::new(25, 1)),
        },
        ticks: 1,
    }
}

#[tokio::test]
async fn test_concurrent_appends_across_and_within_targets() {
    let tmp = TempDir::new().unwrap();
    let writer = Arc::new(CsvRecordWriter::new(tmp.path()));

    let mut tasks = Vec::new();
    for worker in 0..8u64 {
        let writer = writer.clone();
        tasks.push(tokio::spawn(async move {
            let symbol = if worker % 2 == 0 { "BTCUSDT" } else { "ETHUSDT" };
            for i in 0..25 {
                writer.append(&ticker(symbol, worker * 1_000 + i)).await.unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
    assert_eq!(writer.open_targets(), 2);

    for symbol in ["BTCUSDT", "ETHUSDT"] {
        let contents =
            std::fs::read_to_string(tmp.path().join(format!("bitget/ticker/{}.csv", symbol))).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "timestamp,fundingRate,indexPrice,askPx,askSz,bidPx,bidSz");
        assert_eq!(lines.len(), 1 + 4 * 25);
        assert!(lines[1..].iter().all(|l| l.split(',').count() == 7));
    }
}

#[tokio::test]
async fn test_writer_task_persists_channel_in_order() {
    let tmp = TempDir::new().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = spawn_record_writer(Arc::new(CsvRecordWriter::new(tmp.path())), rx);

    for ts in [3, 1, 2] {
        tx.send(ticker("BTCUSDT", ts)).unwrap();
    }
    drop(tx);
    assert_eq!(handle.await.unwrap(), 3);

    let contents = std::fs::read_to_string(tmp.path().join("bitget/ticker/BTCUSDT.csv")).unwrap();
    let stamps: Vec<&str> = contents.lines().skip(1).map(|l| &l[..1]).collect();
    assert_eq!(stamps, vec!["3", "1", "2"]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_n_appends_give_one_header_and_n_lines(n in 1usize..40) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let tmp = TempDir::new().unwrap();
        let writer = CsvRecordWriter::new(tmp.path());

        runtime.block_on(async {
            for i in 0..n {
                writer.append(&ticker("SOLUSDT", i as u64)).await.unwrap();
            }
        });

        let contents = std::fs::read_to_string(tmp.path().join("bitget/ticker/SOLUSDT.csv")).unwrap();
        prop_assert_eq!(contents.lines().count(), n + 1);
        prop_assert_eq!(contents.matches("timestamp").count(), 1);
    }
}
