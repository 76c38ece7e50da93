use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use crate::types::exchange::{Channel, ExchangeId};

/// One normalized market data update, as decoded from a single exchange frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub exchange: ExchangeId,
    pub channel: Channel,
    pub symbol: String,
    /// Exchange event time, milliseconds since epoch.
    pub timestamp: u64,
    pub fields: TickFields,
}

/// Channel-specific payload. Each variant maps to exactly one output schema.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TickFields {
    /// Top of book: Binance bookTicker, OKX tickers. A side is `None` while that side of the
    /// book is empty.
    Quote {
        ask_px: Option<Decimal>,
        ask_sz: Option<Decimal>,
        bid_px: Option<Decimal>,
        bid_sz: Option<Decimal>,
    },
    /// Binance markPriceUpdate.
    Funding {
        funding_rate: Decimal,
        index_price: Decimal,
    },
    /// OKX funding-rate.
    FundingRate {
        funding_rate: Decimal,
    },
    /// OKX index-tickers.
    IndexPrice {
        index_price: Decimal,
    },
    /// Bitget combined ticker.
    Ticker {
        funding_rate: Decimal,
        index_price: Decimal,
        ask_px: Option<Decimal>,
        ask_sz: Option<Decimal>,
        bid_px: Option<Decimal>,
        bid_sz: Option<Decimal>,
    },
}

impl TickFields {
    /// Column names, excluding the leading `timestamp`.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            TickFields::Quote { .. } => &["askPx", "askSz", "bidPx", "bidSz"],
            TickFields::Funding { .. } => &["fundingRate", "indexPrice"],
            TickFields::FundingRate { .. } => &["fundingRate"],
            TickFields::IndexPrice { .. } => &["indexPrice"],
            TickFields::Ticker { .. } => {
                &["fundingRate", "indexPrice", "askPx", "askSz", "bidPx", "bidSz"]
            }
        }
    }

    /// Values in `columns()` order; `None` is written as an empty cell.
    pub fn values(&self) -> Vec<Option<Decimal>> {
        match *self {
            TickFields::Quote { ask_px, ask_sz, bid_px, bid_sz } => {
                vec![ask_px, ask_sz, bid_px, bid_sz]
            }
            TickFields::Funding { funding_rate, index_price } => {
                vec![Some(funding_rate), Some(index_price)]
            }
            TickFields::FundingRate { funding_rate } => vec![Some(funding_rate)],
            TickFields::IndexPrice { index_price } => vec![Some(index_price)],
            TickFields::Ticker { funding_rate, index_price, ask_px, ask_sz, bid_px, bid_sz } => {
                vec![Some(funding_rate), Some(index_price), ask_px, ask_sz, bid_px, bid_sz]
            }
        }
    }

    pub fn ask_size(&self) -> Option<Decimal> {
        match *self {
            TickFields::Quote { ask_sz, .. } | TickFields::Ticker { ask_sz, .. } => ask_sz,
            _ => None,
        }
    }

    pub fn bid_size(&self) -> Option<Decimal> {
        match *self {
            TickFields::Quote { bid_sz, .. } | TickFields::Ticker { bid_sz, .. } => bid_sz,
            _ => None,
        }
    }
}
