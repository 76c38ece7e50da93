pub mod backoff;
pub mod connection;
pub mod sharder;
pub mod state;

use serde::{Deserialize, Serialize};
use crate::config::exchange::Credentials;
use crate::types::exchange::Channel;
use crate::types::ids::CorrelationId;

/// One logical subscription: a channel on one instrument, in the exchange's own symbol form.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Topic {
    pub channel: Channel,
    pub symbol: String,
}

impl Topic {
    pub fn new(channel: Channel, symbol: impl Into<String>) -> Self {
        Topic {
            channel,
            symbol: symbol.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum RequestOp {
    Subscribe(Vec<Topic>),
    Login(Credentials),
}

#[derive(Clone, Debug, PartialEq)]
pub struct SubscriptionRequest {
    pub id: CorrelationId,
    pub op: RequestOp,
}

impl SubscriptionRequest {
    pub fn subscribe(id: CorrelationId, topics: Vec<Topic>) -> Self {
        SubscriptionRequest {
            id,
            op: RequestOp::Subscribe(topics),
        }
    }

    pub fn login(id: CorrelationId, credentials: Credentials) -> Self {
        SubscriptionRequest {
            id,
            op: RequestOp::Login(credentials),
        }
    }
}
