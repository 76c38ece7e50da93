use async_trait::async_trait;
use crate::error::Result;
use crate::types::record::OutputRecord;

#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn append(&self, record: &OutputRecord) -> Result<()>;
}
