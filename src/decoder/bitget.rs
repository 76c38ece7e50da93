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

const LOGIN_VERIFY_PATH: &str = "/user/verify";
const INST_TYPE: &str = "USDT-FUTURES";

/// Bitget v2 public websocket, USDT-margined futures.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Bitget;

impl MessageDecoder for Bitget {
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

        let envelope: BitgetEnvelope = serde_json::from_value(value)?;
        let channel: Channel = envelope.arg.channel.parse()?;
        if channel != Channel::Ticker {
            return Err(Error::UnknownChannel(channel.to_string()));
        }

        let inst_id = envelope.arg.inst_id;
        let ticks = decode_each(ExchangeId::Bitget, envelope.data, |item| {
            let data: BitgetTicker = serde_json::from_value(item)?;
            Ok(Some(Tick {
                exchange: ExchangeId::Bitget,
                channel,
                symbol: inst_id.clone(),
                timestamp: data.ts,
                fields: TickFields::Ticker {
                    funding_rate: data.funding_rate,
                    index_price: data.index_price,
                    ask_px: data.ask_pr,
                    ask_sz: data.ask_sz,
                    bid_px: data.bid_pr,
                    bid_sz: data.bid_sz,
                },
            }))
        });

        Ok(Decoded::Ticks(ticks))
    }
}

impl ExchangeProtocol for Bitget {
    fn exchange(&self) -> ExchangeId {
        ExchangeId::Bitget
    }

    fn supported_channels(&self) -> &'static [Channel] {
        &[Channel::Ticker]
    }

    fn topic(&self, symbol: &str, channel: Channel) -> Topic {
        Topic::new(channel, symbol.to_uppercase())
    }

    fn encode(&self, request: &SubscriptionRequest) -> Result<String> {
        let payload = match &request.op {
            RequestOp::Subscribe(topics) => {
                let args: Vec<Value> = topics
                    .iter()
                    .map(|t| {
                        json!({
                            "instType": INST_TYPE,
                            "channel": t.channel.as_str(),
                            "instId": t.symbol,
                        })
                    })
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
struct BitgetEnvelope {
    arg: BitgetArg,
    data: Vec<Value>,
}

#[derive(Deserialize)]
struct BitgetArg {
    channel: String,
    #[serde(rename = "instId")]
    inst_id: String,
}

#[derive(Deserialize)]
struct BitgetTicker {
    #[serde(rename = "fundingRate", with = "rust_decimal::serde::str")]
    funding_rate: Decimal,
    #[serde(rename = "indexPrice", with = "rust_decimal::serde::str")]
    index_price: Decimal,
    #[serde(rename = "askPr", deserialize_with = "de_decimal_opt")]
    ask_pr: Option<Decimal>,
    #[serde(rename = "askSz", deserialize_with = "de_decimal_opt")]
    ask_sz: Option<Decimal>,
    #[serde(rename = "bidPr", deserialize_with = "de_decimal_opt")]
    bid_pr: Option<Decimal>,
    #[serde(rename = "bidSz", deserialize_with = "de_decimal_opt")]
    bid_sz: Option<Decimal>,
    #[serde(deserialize_with = "de_u64_lenient")]
    ts: u64,
}
