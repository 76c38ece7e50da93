use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use crate::error::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeId {
    Binance,
    Okx,
    Bitget,
}

impl ExchangeId {
    pub const ALL: [ExchangeId; 3] = [ExchangeId::Binance, ExchangeId::Okx, ExchangeId::Bitget];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeId::Binance => "binance",
            ExchangeId::Okx => "okx",
            ExchangeId::Bitget => "bitget",
        }
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExchangeId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExchangeId::ALL
            .into_iter()
            .find(|id| id.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::ConfigError(format!("unknown exchange: {}", s)))
    }
}

/// Wire-level channel names. The string form doubles as the output directory name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    #[serde(rename = "bookTicker")]
    BookTicker,
    #[serde(rename = "markPriceUpdate")]
    MarkPriceUpdate,
    #[serde(rename = "funding-rate")]
    FundingRate,
    #[serde(rename = "index-tickers")]
    IndexTickers,
    #[serde(rename = "tickers")]
    Tickers,
    #[serde(rename = "ticker")]
    Ticker,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::BookTicker => "bookTicker",
            Channel::MarkPriceUpdate => "markPriceUpdate",
            Channel::FundingRate => "funding-rate",
            Channel::IndexTickers => "index-tickers",
            Channel::Tickers => "tickers",
            Channel::Ticker => "ticker",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bookTicker" => Ok(Channel::BookTicker),
            "markPriceUpdate" => Ok(Channel::MarkPriceUpdate),
            "funding-rate" => Ok(Channel::FundingRate),
            "index-tickers" => Ok(Channel::IndexTickers),
            "tickers" => Ok(Channel::Tickers),
            "ticker" => Ok(Channel::Ticker),
            other => Err(Error::UnknownChannel(other.to_string())),
        }
    }
}
