use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id_type {
    ($name:ident, $inner:ty, $prefix:literal) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub $inner);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

// Index of a shard within one exchange's subscription set
define_id_type!(ShardId, usize, "shard_");
// Per-connection request id, echoed back by exchanges that support it
define_id_type!(CorrelationId, u64, "");

impl ShardId {
    pub fn index(&self) -> usize {
        self.0
    }
}
