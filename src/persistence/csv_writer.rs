use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use async_trait::async_trait;
use dashmap::DashMap;
use lru::LruCache;
use tokio::fs::{self as async_fs, File};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use crate::error::Result;
use crate::interfaces::RecordSink;
use crate::types::record::{OutputRecord, RecordKey};

pub const DEFAULT_MAX_OPEN_FILES: usize = 256;

/// Append-only CSV files, one per (exchange, channel, symbol) under `root`.
///
/// A target gets its header on first write; a file that already holds data keeps growing
/// without a second header. Appends to the same target are serialized by a per-target lock,
/// different targets proceed concurrently. At most `max_open` handles stay open; the least
/// recently written target is closed first and reopened in append mode on its next record.
pub struct CsvRecordWriter {
    root: PathBuf,
    targets: DashMap<RecordKey, Arc<Mutex<Option<File>>>>,
    open: parking_lot::Mutex<LruCache<RecordKey, ()>>,
}

impl CsvRecordWriter {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self::with_max_open(root, DEFAULT_MAX_OPEN_FILES)
    }

    pub fn with_max_open(root: impl AsRef<Path>, max_open: usize) -> Self {
        let capacity = NonZeroUsize::new(max_open).unwrap_or(NonZeroUsize::MIN);
        CsvRecordWriter {
            root: root.as_ref().to_path_buf(),
            targets: DashMap::new(),
            open: parking_lot::Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Targets currently holding an open file handle; a target mid-append counts as open.
    pub fn open_targets(&self) -> usize {
        self.targets
            .iter()
            .filter(|entry| entry.value().try_lock().map_or(true, |slot| slot.is_some()))
            .count()
    }

    fn target(&self, key: &RecordKey) -> Arc<Mutex<Option<File>>> {
        self.targets.entry(key.clone()).or_default().clone()
    }

    async fn open_file(&self, record: &OutputRecord) -> Result<File> {
        let path = record.key.path_under(&self.root);
        if let Some(dir) = path.parent() {
            async_fs::create_dir_all(dir).await?;
        }

        let mut file = async_fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        if file.metadata().await?.len() == 0 {
            file.write_all(format!("{}\n", record.header()).as_bytes()).await?;
        }
        tracing::debug!(path = %path.display(), "output target opened");
        Ok(file)
    }

    /// Closes `key`'s handle unless it was written again since it fell out of the LRU.
    async fn close_evicted(&self, key: &RecordKey) {
        let target = self.target(key);
        let mut slot = target.lock().await;
        if !self.open.lock().contains(key) && slot.take().is_some() {
            tracing::debug!(symbol = %key.symbol, channel = %key.channel, "output target closed");
        }
    }
}

#[async_trait]
impl RecordSink for CsvRecordWriter {
    async fn append(&self, record: &OutputRecord) -> Result<()> {
        let evicted = {
            let target = self.target(&record.key);
            let mut slot = target.lock().await;

            let file = match slot.take() {
                Some(file) => file,
                None => self.open_file(record).await?,
            };
            let file = slot.insert(file);

            file.write_all(format!("{}\n", record.line()).as_bytes()).await?;
            file.flush().await?;

            self.open
                .lock()
                .push(record.key.clone(), ())
                .map(|(key, _)| key)
                .filter(|key| *key != record.key)
        };

        // never hold two target locks at once
        if let Some(key) = evicted {
            self.close_evicted(&key).await;
        }
        Ok(())
    }
}
