pub mod binance;
pub mod bitget;
pub mod okx;

use std::str::FromStr;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;
use crate::error::{Error, Result};
use crate::ingest::{SubscriptionRequest, Topic};
use crate::observability::metrics::{self, DECODE_FAILURES};
use crate::types::exchange::{Channel, ExchangeId};
use crate::types::tick::Tick;

pub use binance::Binance;
pub use bitget::Bitget;
pub use okx::Okx;

/// Outcome of decoding one raw text frame.
#[derive(Clone, Debug, PartialEq)]
pub enum Decoded {
    Ticks(Vec<Tick>),
    /// Subscription acks, event notices, application-level pongs.
    Control,
}

/// How an exchange expects the client to keep the socket alive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Keepalive {
    /// Protocol ping frames; a text "ping" is answered with a protocol pong.
    Frame,
    /// Literal text "ping" / "pong" payloads.
    Text,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoginAck {
    Accepted,
    Rejected(String),
}

pub trait MessageDecoder {
    fn decode(&self, frame: &str) -> Result<Decoded>;
}

/// Everything a Connection needs to speak one exchange's public websocket dialect.
pub trait ExchangeProtocol: MessageDecoder {
    fn exchange(&self) -> ExchangeId;
    fn supported_channels(&self) -> &'static [Channel];
    /// Maps a canonical `BASEUSDT` symbol to this exchange's topic.
    fn topic(&self, symbol: &str, channel: Channel) -> Topic;
    fn encode(&self, request: &SubscriptionRequest) -> Result<String>;
    fn keepalive(&self) -> Keepalive;

    /// One topic covering `channel` for every instrument, where the exchange offers one.
    fn market_topic(&self, _channel: Channel) -> Option<Topic> {
        None
    }

    fn supports_login(&self) -> bool {
        false
    }

    /// Classifies a frame received while waiting for a login response.
    fn login_ack(&self, _frame: &str) -> Option<LoginAck> {
        None
    }
}

/// Closed set of supported exchanges, chosen once at orchestrator construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExchangeAdapter {
    Binance(Binance),
    Okx(Okx),
    Bitget(Bitget),
}

impl ExchangeAdapter {
    pub fn for_exchange(id: ExchangeId) -> Self {
        match id {
            ExchangeId::Binance => ExchangeAdapter::Binance(Binance),
            ExchangeId::Okx => ExchangeAdapter::Okx(Okx),
            ExchangeId::Bitget => ExchangeAdapter::Bitget(Bitget),
        }
    }
}

macro_rules! dispatch {
    ($self:ident, $inner:ident => $call:expr) => {
        match $self {
            ExchangeAdapter::Binance($inner) => $call,
            ExchangeAdapter::Okx($inner) => $call,
            ExchangeAdapter::Bitget($inner) => $call,
        }
    };
}

impl MessageDecoder for ExchangeAdapter {
    fn decode(&self, frame: &str) -> Result<Decoded> {
        dispatch!(self, inner => inner.decode(frame))
    }
}

impl ExchangeProtocol for ExchangeAdapter {
    fn exchange(&self) -> ExchangeId {
        dispatch!(self, inner => inner.exchange())
    }

    fn supported_channels(&self) -> &'static [Channel] {
        dispatch!(self, inner => inner.supported_channels())
    }

    fn topic(&self, symbol: &str, channel: Channel) -> Topic {
        dispatch!(self, inner => inner.topic(symbol, channel))
    }

    fn encode(&self, request: &SubscriptionRequest) -> Result<String> {
        dispatch!(self, inner => inner.encode(request))
    }

    fn keepalive(&self) -> Keepalive {
        dispatch!(self, inner => inner.keepalive())
    }

    fn market_topic(&self, channel: Channel) -> Option<Topic> {
        dispatch!(self, inner => inner.market_topic(channel))
    }

    fn supports_login(&self) -> bool {
        dispatch!(self, inner => inner.supports_login())
    }

    fn login_ack(&self, frame: &str) -> Option<LoginAck> {
        dispatch!(self, inner => inner.login_ack(frame))
    }
}

/// Millisecond timestamps arrive as JSON numbers (Binance) or strings (OKX, Bitget).
pub(crate) fn de_u64_lenient<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u64),
        Str(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(n),
        Raw::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

/// Book fields arrive as `""` while that side of the book is empty.
pub(crate) fn de_decimal_opt<'de, D>(deserializer: D) -> std::result::Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)?.as_deref() {
        None | Some("") => Ok(None),
        Some(s) => Decimal::from_str(s).map(Some).map_err(serde::de::Error::custom),
    }
}

/// Decodes the elements of one frame independently. A bad element is counted and logged, the
/// rest of the frame still goes through.
pub(crate) fn decode_each<T>(
    exchange: ExchangeId,
    items: Vec<Value>,
    mut decode: impl FnMut(Value) -> Result<Option<T>>,
) -> Vec<T> {
    let mut decoded = Vec::with_capacity(items.len());
    for item in items {
        match decode(item) {
            Ok(Some(value)) => decoded.push(value),
            Ok(None) => {}
            Err(e) => {
                metrics::inc(&DECODE_FAILURES, exchange);
                warn!(exchange = %exchange, error = %e, "dropping undecodable element");
            }
        }
    }
    decoded
}

/// Shared login acknowledgement shape for the `op: login` dialect (OKX, Bitget).
pub(crate) fn op_login_ack(frame: &str) -> Option<LoginAck> {
    let value: Value = serde_json::from_str(frame).ok()?;
    let code = match value.get("code")? {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    match value.get("event").and_then(Value::as_str)? {
        "login" if code == "0" => Some(LoginAck::Accepted),
        "login" | "error" => {
            let msg = value.get("msg").and_then(Value::as_str).unwrap_or_default();
            Some(LoginAck::Rejected(format!("code={} msg={}", code, msg)))
        }
        _ => None,
    }
}

/// `{"event":"error",...}` frames, reported as decode failures.
pub(crate) fn event_error(value: &Value) -> Error {
    let field = |name: &str| match value.get(name) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    };
    Error::ExchangeError {
        code: field("code"),
        msg: field("msg"),
    }
}
