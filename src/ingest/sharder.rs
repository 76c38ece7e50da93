use crate::error::{Error, Result};
use crate::ingest::Topic;
use crate::types::ids::ShardId;

/// A batch of topics bound to exactly one Connection.
#[derive(Clone, Debug, PartialEq)]
pub struct Shard {
    pub id: ShardId,
    pub topics: Vec<Topic>,
}

/// Splits a subscription set into consecutive batches no larger than the exchange's
/// per-connection limit.
pub struct SubscriptionSharder {
    limit: usize,
}

impl SubscriptionSharder {
    pub fn new(limit: usize) -> Result<Self> {
        if limit == 0 {
            return Err(Error::ConfigError("shard limit must be > 0".into()));
        }
        Ok(SubscriptionSharder { limit })
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn shard_count(&self, topic_count: usize) -> usize {
        topic_count.div_ceil(self.limit)
    }

    pub fn shard(&self, topics: &[Topic]) -> Vec<Shard> {
        topics
            .chunks(self.limit)
            .enumerate()
            .map(|(i, batch)| Shard {
                id: ShardId(i),
                topics: batch.to_vec(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::exchange::Channel;
    use proptest::prelude::*;

    fn topics(n: usize) -> Vec<Topic> {
        (0..n)
            .map(|i| Topic::new(Channel::BookTicker, format!("sym{}usdt", i)))
            .collect()
    }

    #[test]
    fn test_120_topics_limit_50() {
        let sharder = SubscriptionSharder::new(50).unwrap();
        let shards = sharder.shard(&topics(120));

        let sizes: Vec<usize> = shards.iter().map(|s| s.topics.len()).collect();
        assert_eq!(sizes, vec![50, 50, 20]);
        assert_eq!(shards[2].id, ShardId(2));
        assert_eq!(shards[1].topics[0].symbol, "sym50usdt");
    }

    #[test]
    fn test_exact_multiple_has_no_empty_trailing_shard() {
        let sharder = SubscriptionSharder::new(50).unwrap();
        assert_eq!(sharder.shard(&topics(100)).len(), 2);
        assert!(sharder.shard(&[]).is_empty());
    }

    #[test]
    fn test_zero_limit_rejected() {
        assert!(SubscriptionSharder::new(0).is_err());
    }

    proptest! {
        #[test]
        fn prop_shards_partition_topics_in_order(n in 0usize..400, limit in 1usize..80) {
            let input = topics(n);
            let sharder = SubscriptionSharder::new(limit).unwrap();
            let shards = sharder.shard(&input);

            prop_assert_eq!(shards.len(), sharder.shard_count(n));
            prop_assert!(shards.iter().all(|s| !s.topics.is_empty() && s.topics.len() <= limit));

            let flattened: Vec<Topic> = shards.into_iter().flat_map(|s| s.topics).collect();
            prop_assert_eq!(flattened, input);
        }
    }
}
