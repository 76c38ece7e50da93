use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use crate::decoder::{
    de_u64_lenient, decode_each, Decoded, ExchangeProtocol, Keepalive, MessageDecoder,
};
use crate::error::{Error, Result};
use crate::ingest::{RequestOp, SubscriptionRequest, Topic};
use crate::types::exchange::{Channel, ExchangeId};
use crate::types::tick::{Tick, TickFields};

/// Binance USD-M futures market streams.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Binance;

impl Binance {
    fn stream_name(topic: &Topic) -> String {
        // market-wide streams such as !markPrice@arr are already complete names
        if topic.symbol.starts_with('!') {
            return topic.symbol.clone();
        }
        let stream = match topic.channel {
            Channel::MarkPriceUpdate => "markPrice",
            other => other.as_str(),
        };
        format!("{}@{}", topic.symbol.to_lowercase(), stream)
    }

    fn decode_event(&self, value: Value) -> Result<Option<Tick>> {
        let Some(event) = value.get("e").and_then(Value::as_str) else {
            return Ok(None);
        };

        match event {
            "bookTicker" => {
                let data: BinanceBookTicker = serde_json::from_value(value)?;
                Ok(Some(Tick {
                    exchange: ExchangeId::Binance,
                    channel: Channel::BookTicker,
                    symbol: data.s,
                    timestamp: data.t,
                    fields: TickFields::Quote {
                        ask_px: Some(data.a),
                        ask_sz: Some(data.a_qty),
                        bid_px: Some(data.b),
                        bid_sz: Some(data.b_qty),
                    },
                }))
            }
            "markPriceUpdate" => {
                let data: BinanceMarkPrice = serde_json::from_value(value)?;
                Ok(Some(Tick {
                    exchange: ExchangeId::Binance,
                    channel: Channel::MarkPriceUpdate,
                    symbol: data.s,
                    timestamp: data.e_time,
                    fields: TickFields::Funding {
                        funding_rate: data.r,
                        index_price: data.i,
                    },
                }))
            }
            other => Err(Error::UnknownChannel(other.to_string())),
        }
    }
}

impl MessageDecoder for Binance {
    fn decode(&self, frame: &str) -> Result<Decoded> {
        let value: Value = serde_json::from_str(frame)?;

        let ticks = match value {
            // !markPrice@arr and friends push every symbol in one frame
            Value::Array(items) => {
                decode_each(ExchangeId::Binance, items, |item| self.decode_event(item))
            }
            value => match self.decode_event(value)? {
                Some(tick) => vec![tick],
                None => return Ok(Decoded::Control),
            },
        };

        Ok(Decoded::Ticks(ticks))
    }
}

impl ExchangeProtocol for Binance {
    fn exchange(&self) -> ExchangeId {
        ExchangeId::Binance
    }

    fn supported_channels(&self) -> &'static [Channel] {
        &[Channel::BookTicker, Channel::MarkPriceUpdate]
    }

    fn topic(&self, symbol: &str, channel: Channel) -> Topic {
        Topic::new(channel, symbol.to_lowercase())
    }

    fn encode(&self, request: &SubscriptionRequest) -> Result<String> {
        match &request.op {
            RequestOp::Subscribe(topics) => {
                let params: Vec<String> = topics.iter().map(Self::stream_name).collect();
                Ok(json!({
                    "method": "SUBSCRIBE",
                    "params": params,
                    "id": request.id.0,
                })
                .to_string())
            }
            RequestOp::Login(_) => Err(Error::LoginUnsupported(ExchangeId::Binance)),
        }
    }

    fn keepalive(&self) -> Keepalive {
        Keepalive::Frame
    }

    fn market_topic(&self, channel: Channel) -> Option<Topic> {
        match channel {
            Channel::MarkPriceUpdate => Some(Topic::new(channel, "!markPrice@arr")),
            Channel::BookTicker => Some(Topic::new(channel, "!bookTicker")),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
struct BinanceBookTicker {
    s: String,
    #[serde(with = "rust_decimal::serde::str")]
    b: Decimal, // Best bid price
    #[serde(rename = "B", with = "rust_decimal::serde::str")]
    b_qty: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    a: Decimal, // Best ask price
    #[serde(rename = "A", with = "rust_decimal::serde::str")]
    a_qty: Decimal,
    #[serde(rename = "T", deserialize_with = "de_u64_lenient")]
    t: u64, // Transaction time
}

#[derive(Deserialize)]
struct BinanceMarkPrice {
    s: String,
    #[serde(with = "rust_decimal::serde::str")]
    r: Decimal, // Funding rate
    #[serde(with = "rust_decimal::serde::str")]
    i: Decimal, // Index price
    #[serde(rename = "E", deserialize_with = "de_u64_lenient")]
    e_time: u64, // Event time
}
