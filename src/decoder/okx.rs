use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use crate::decoder::{
    de_decimal_opt, de_u64_lenient, decode_each, event_error, op_login_ack, Decoded,
    ExchangeProtocol, Keepalive, LoginAck, MessageDecoder,
};
use crate::error::{Error, Result};
use crate::ingest::{RequestOp, SubscriptionRequest, Topic};
use crate::types::exchange::{Channel, ExchangeId};
use crate::types::tick::{Tick, TickFields};
use crate::utils::helper::{current_timestamp_secs, login_signature};

const LOGIN_VERIFY_PATH: &str = "/users/self/verify";

/// OKX v5 public websocket.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Okx;

impl Okx {
    fn tick(channel: Channel, symbol: &str, item: Value) -> Result<Tick> {
        let (timestamp, fields) = match channel {
            Channel::Tickers => {
                let data: OkxTicker = serde_json::from_value(item)?;
                (
                    data.ts,
                    TickFields::Quote {
                        ask_px: data.ask_px,
                        ask_sz: data.ask_sz,
                        bid_px: data.bid_px,
                        bid_sz: data.bid_sz,
                    },
                )
            }
            Channel::FundingRate => {
                let data: OkxFundingRate = serde_json::from_value(item)?;
                (data.ts, TickFields::FundingRate { funding_rate: data.funding_rate })
            }
            Channel::IndexTickers => {
                let data: OkxIndexTicker = serde_json::from_value(item)?;
                (data.ts, TickFields::IndexPrice { index_price: data.idx_px })
            }
            other => return Err(Error::UnknownChannel(other.to_string())),
        };

        Ok(Tick {
            exchange: ExchangeId::Okx,
            channel,
            symbol: symbol.to_string(),
            timestamp,
            fields,
        })
    }
}

impl MessageDecoder for Okx {
    fn decode(&self, frame: &str) -> Result<Decoded> {
        if frame == "pong" {
            return Ok(Decoded::Control);
        }

        let value: Value = serde_json::from_str(frame)?;
        if let Some(event) = value.get("event").and_then(Value::as_str) {
            if event == "error" {
                return Err(event_error(&value));
            }
            return Ok(Decoded::Control);
        }

        let envelope: OkxEnvelope = serde_json::from_value(value)?;
        let channel: Channel = envelope.arg.channel.parse()?;
        if !self.supported_channels().contains(&channel) {
            return Err(Error::UnknownChannel(channel.to_string()));
        }
        let inst_id = envelope.arg.inst_id;
        let ticks = decode_each(ExchangeId::Okx, envelope.data, |item| {
            Self::tick(channel, &inst_id, item).map(Some)
        });

        Ok(Decoded::Ticks(ticks))
    }
}

impl ExchangeProtocol for Okx {
    fn exchange(&self) -> ExchangeId {
        ExchangeId::Okx
    }

    fn supported_channels(&self) -> &'static [Channel] {
        &[Channel::FundingRate, Channel::IndexTickers, Channel::Tickers]
    }

    fn topic(&self, symbol: &str, channel: Channel) -> Topic {
        let base = symbol.strip_suffix("USDT").unwrap_or(symbol);
        let inst_id = match channel {
            Channel::IndexTickers => format!("{}-USDT", base),
            _ => format!("{}-USDT-SWAP", base),
        };
        Topic::new(channel, inst_id)
    }

    fn encode(&self, request: &SubscriptionRequest) -> Result<String> {
        let payload = match &request.op {
            RequestOp::Subscribe(topics) => {
                let args: Vec<Value> = topics
                    .iter()
                    .map(|t| json!({"channel": t.channel.as_str(), "instId": t.symbol}))
                    .collect();
                json!({"op": "subscribe", "args": args})
            }
            RequestOp::Login(credentials) => {
                let timestamp = current_timestamp_secs().to_string();
                let sign = login_signature(&credentials.secret, &timestamp, LOGIN_VERIFY_PATH)?;
                json!({
                    "op": "login",
                    "args": [{
                        "apiKey": credentials.api_key,
                        "passphrase": credentials.passphrase,
                        "timestamp": timestamp,
                        "sign": sign,
                    }]
                })
            }
        };
        Ok(payload.to_string())
    }

    fn keepalive(&self) -> Keepalive {
        Keepalive::Text
    }

    fn supports_login(&self) -> bool {
        true
    }

    fn login_ack(&self, frame: &str) -> Option<LoginAck> {
        op_login_ack(frame)
    }
}

#[derive(Deserialize)]
struct OkxEnvelope {
    arg: OkxArg,
    data: Vec<Value>,
}

#[derive(Deserialize)]
struct OkxArg {
    channel: String,
    #[serde(rename = "instId")]
    inst_id: String,
}

#[derive(Deserialize)]
struct OkxTicker {
    #[serde(rename = "askPx", deserialize_with = "de_decimal_opt")]
    ask_px: Option<Decimal>,
    #[serde(rename = "askSz", deserialize_with = "de_decimal_opt")]
    ask_sz: Option<Decimal>,
    #[serde(rename = "bidPx", deserialize_with = "de_decimal_opt")]
    bid_px: Option<Decimal>,
    #[serde(rename = "bidSz", deserialize_with = "de_decimal_opt")]
    bid_sz: Option<Decimal>,
    #[serde(deserialize_with = "de_u64_lenient")]
    ts: u64,
}

#[derive(Deserialize)]
struct OkxFundingRate {
    #[serde(rename = "fundingRate", with = "rust_decimal::serde::str")]
    funding_rate: Decimal,
    #[serde(deserialize_with = "de_u64_lenient")]
    ts: u64,
}

#[derive(Deserialize)]
struct OkxIndexTicker {
    #[serde(rename = "idxPx", with = "rust_decimal::serde::str")]
    idx_px: Decimal,
    #[serde(deserialize_with = "de_u64_lenient")]
    ts: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::exchange::Credentials;
    use crate::types::ids::CorrelationId;
    use rust_decimal_macros::dec;

    #[test]
    fn test_decode_tickers() {
        let frame = r#"{"arg":{"channel":"tickers","instId":"BTC-USDT-SWAP"},"data":[{"instType":"SWAP","instId":"BTC-USDT-SWAP","last":"9999.99","lastSz":"1","askPx":"9999.99","askSz":"11","bidPx":"8888.88","bidSz":"5","ts":"1597026383085"}]}"#;
        let Decoded::Ticks(ticks) = Okx.decode(frame).unwrap() else {
            panic!("expected data");
        };
        assert_eq!(ticks.len(), 1);
        assert_eq!(ticks[0].symbol, "BTC-USDT-SWAP");
        assert_eq!(ticks[0].timestamp, 1597026383085);
        assert_eq!(ticks[0].fields.ask_size(), Some(dec!(11)));
        assert_eq!(ticks[0].fields.bid_size(), Some(dec!(5)));
    }

    #[test]
    fn test_decode_funding_rate_and_index() {
        let funding = r#"{"arg":{"channel":"funding-rate","instId":"BTC-USD-SWAP"},"data":[{"fundingRate":"0.0001875391284828","fundingTime":"1700726400000","instId":"BTC-USD-SWAP","instType":"SWAP","nextFundingRate":"","ts":"1700723403000"}]}"#;
        let index = r#"{"arg":{"channel":"index-tickers","instId":"BTC-USDT"},"data":[{"instId":"BTC-USDT","idxPx":"0.1","high24h":"0.5","low24h":"0.1","open24h":"0.1","sodUtc0":"0.1","sodUtc8":"0.1","ts":"1597026383085"}]}"#;

        let Decoded::Ticks(ticks) = Okx.decode(funding).unwrap() else {
            panic!("expected data");
        };
        assert_eq!(
            ticks[0].fields,
            TickFields::FundingRate { funding_rate: dec!(0.0001875391284828) }
        );

        let Decoded::Ticks(ticks) = Okx.decode(index).unwrap() else {
            panic!("expected data");
        };
        assert_eq!(ticks[0].channel, Channel::IndexTickers);
        assert_eq!(ticks[0].fields, TickFields::IndexPrice { index_price: dec!(0.1) });
    }

    #[test]
    fn test_events_and_pong_are_control() {
        let ack = r#"{"event":"subscribe","arg":{"channel":"tickers","instId":"BTC-USDT-SWAP"},"connId":"a4d3ae55"}"#;
        assert_eq!(Okx.decode(ack).unwrap(), Decoded::Control);
        assert_eq!(Okx.decode("pong").unwrap(), Decoded::Control);
    }

    #[test]
    fn test_error_event_and_missing_keys_fail() {
        let error = r#"{"event":"error","code":"60012","msg":"Invalid request"}"#;
        assert!(matches!(Okx.decode(error), Err(Error::ExchangeError { .. })));

        let no_data = r#"{"arg":{"channel":"tickers","instId":"BTC-USDT-SWAP"}}"#;
        assert!(Okx.decode(no_data).is_err());

        let unknown = r#"{"arg":{"channel":"trades","instId":"BTC-USDT-SWAP"},"data":[]}"#;
        assert!(matches!(Okx.decode(unknown), Err(Error::UnknownChannel(_))));
    }

    #[test]
    fn test_empty_book_side_keeps_tick() {
        let frame = r#"{"arg":{"channel":"tickers","instId":"NEW-USDT-SWAP"},"data":[{"instType":"SWAP","instId":"NEW-USDT-SWAP","last":"1.2","askPx":"","askSz":"","bidPx":"1.1","bidSz":"40","ts":"1597026383085"}]}"#;
        let Decoded::Ticks(ticks) = Okx.decode(frame).unwrap() else {
            panic!("expected data");
        };
        assert_eq!(
            ticks[0].fields,
            TickFields::Quote {
                ask_px: None,
                ask_sz: None,
                bid_px: Some(dec!(1.1)),
                bid_sz: Some(dec!(40)),
            }
        );
    }

    #[test]
    fn test_bad_data_element_drops_only_itself() {
        let frame = r#"{"arg":{"channel":"funding-rate","instId":"BTC-USDT-SWAP"},"data":[{"fundingRate":"0.0001","ts":"1700723403000"},{"fundingRate":"oops","ts":"1700723403001"},{"fundingRate":"0.0002","ts":"1700723403002"}]}"#;
        let Decoded::Ticks(ticks) = Okx.decode(frame).unwrap() else {
            panic!("expected data");
        };
        let stamps: Vec<u64> = ticks.iter().map(|t| t.timestamp).collect();
        assert_eq!(stamps, vec![1700723403000, 1700723403002]);
    }

    #[test]
    fn test_topic_mapping() {
        assert_eq!(Okx.topic("BTCUSDT", Channel::Tickers).symbol, "BTC-USDT-SWAP");
        assert_eq!(Okx.topic("BTCUSDT", Channel::FundingRate).symbol, "BTC-USDT-SWAP");
        assert_eq!(Okx.topic("BTCUSDT", Channel::IndexTickers).symbol, "BTC-USDT");
    }

    #[test]
    fn test_encode_subscribe_and_login() {
        let request = SubscriptionRequest::subscribe(
            CorrelationId(1),
            vec![Okx.topic("ETHUSDT", Channel::FundingRate)],
        );
        let value: Value = serde_json::from_str(&Okx.encode(&request).unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"op":"subscribe","args":[{"channel":"funding-rate","instId":"ETH-USDT-SWAP"}]})
        );

        let login = SubscriptionRequest::login(
            CorrelationId(2),
            Credentials {
                api_key: "key".into(),
                secret: "secret".into(),
                passphrase: "pass".into(),
            },
        );
        let value: Value = serde_json::from_str(&Okx.encode(&login).unwrap()).unwrap();
        assert_eq!(value["op"], "login");
        assert_eq!(value["args"][0]["apiKey"], "key");
        assert!(value["args"][0]["sign"].as_str().is_some_and(|s| !s.is_empty()));
    }
}
