use rust_decimal::Decimal;
use crate::types::record::OutputRecord;
use crate::types::tick::{Tick, TickFields};

/// Collapses one bucket into a single record.
///
/// Size fields are the arithmetic mean over the ticks that carry them; every other field, the
/// timestamp included, comes from the last tick in arrival order. Returns `None` for an empty
/// bucket.
pub fn merge_bucket(ticks: &[Tick]) -> Option<OutputRecord> {
    let last = ticks.last()?;
    let fields = match last.fields {
        TickFields::Quote { ask_px, bid_px, .. } => TickFields::Quote {
            ask_px,
            ask_sz: mean(ticks, TickFields::ask_size),
            bid_px,
            bid_sz: mean(ticks, TickFields::bid_size),
        },
        TickFields::Ticker { funding_rate, index_price, ask_px, bid_px, .. } => TickFields::Ticker {
            funding_rate,
            index_price,
            ask_px,
            ask_sz: mean(ticks, TickFields::ask_size),
            bid_px,
            bid_sz: mean(ticks, TickFields::bid_size),
        },
        // nothing size-like to average
        ref other => other.clone(),
    };

    let mut record = OutputRecord::from(last.clone());
    record.fields = fields;
    record.ticks = ticks.len();
    Some(record)
}

/// Mean over the ticks that carry the field; `None` if none do.
fn mean(ticks: &[Tick], field: fn(&TickFields) -> Option<Decimal>) -> Option<Decimal> {
    let (sum, count) = ticks
        .iter()
        .filter_map(|t| field(&t.fields))
        .fold((Decimal::ZERO, 0u32), |(sum, n), v| (sum + v, n + 1));
    (count > 0).then(|| sum / Decimal::from(count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use crate::types::exchange::{Channel, ExchangeId};

    fn quote(ts: u64, px: Decimal, ask_sz: Decimal, bid_sz: Decimal) -> Tick {
        Tick {
            exchange: ExchangeId::Binance,
            channel: Channel::BookTicker,
            symbol: "BTCUSDT".to_string(),
            timestamp: ts,
            fields: TickFields::Quote {
                ask_px: Some(px + dec!(0.1)),
                ask_sz: Some(ask_sz),
                bid_px: Some(px),
                bid_sz: Some(bid_sz),
            },
        }
    }

    #[test]
    fn test_sizes_mean_prices_last() {
        let ticks = vec![
            quote(1000, dec!(100), dec!(4), dec!(1.0)),
            quote(1050, dec!(101), dec!(2), dec!(3.0)),
        ];
        let record = merge_bucket(&ticks).unwrap();
        assert_eq!(record.timestamp, 1050);
        assert_eq!(record.ticks, 2);
        assert_eq!(
            record.fields,
            TickFields::Quote {
                ask_px: Some(dec!(101.1)),
                ask_sz: Some(dec!(3)),
                bid_px: Some(dec!(101)),
                bid_sz: Some(dec!(2)),
            }
        );
    }

    #[test]
    fn test_missing_sizes_are_skipped() {
        let mut empty_ask = quote(1100, dec!(102), dec!(0), dec!(5));
        empty_ask.fields = TickFields::Quote {
            ask_px: None,
            ask_sz: None,
            bid_px: Some(dec!(102)),
            bid_sz: Some(dec!(5)),
        };
        let ticks = vec![quote(1000, dec!(100), dec!(4), dec!(1)), empty_ask];

        let record = merge_bucket(&ticks).unwrap();
        assert_eq!(record.fields.ask_size(), Some(dec!(4)));
        assert_eq!(record.fields.bid_size(), Some(dec!(3)));
        assert_eq!(record.line(), "1100,,4,102,3");

        let only_empty = &ticks[1..];
        assert_eq!(merge_bucket(only_empty).unwrap().fields.ask_size(), None);
    }

    #[test]
    fn test_single_tick_passes_through() {
        let tick = quote(7, dec!(5), dec!(1), dec!(2));
        assert_eq!(merge_bucket(std::slice::from_ref(&tick)), Some(OutputRecord::from(tick)));
        assert_eq!(merge_bucket(&[]), None);
    }

    #[test]
    fn test_funding_takes_last() {
        let mut a = quote(1, dec!(1), dec!(1), dec!(1));
        a.fields = TickFields::Funding { funding_rate: dec!(0.01), index_price: dec!(10) };
        let mut b = a.clone();
        b.timestamp = 2;
        b.fields = TickFields::Funding { funding_rate: dec!(0.02), index_price: dec!(11) };

        let record = merge_bucket(&[a, b.clone()]).unwrap();
        assert_eq!((record.timestamp, record.ticks), (2, 2));
        assert_eq!(record.fields, b.fields);
    }
}
