use std::collections::BTreeMap;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{error, info, warn};
use crate::error::{Error, Result};
use crate::types::ids::ShardId;

/// How one shard's Connection ended.
#[derive(Debug)]
pub struct ShardReport {
    pub shard: ShardId,
    pub result: Result<()>,
}

impl ShardReport {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Shard Supervisor - tracks one task per shard and reports how each ended
///
/// A Connection only returns on shutdown or after exhausting its retry policy, so a task that
/// finishes while the exchange is still running is reported as unhealthy.
pub struct ShardSupervisor {
    tasks: BTreeMap<ShardId, JoinHandle<Result<()>>>,
    finished: Vec<ShardReport>,
}

impl ShardSupervisor {
    pub fn new() -> Self {
        ShardSupervisor {
            tasks: BTreeMap::new(),
            finished: Vec::new(),
        }
    }

    /// Spawn a shard's task and register it for monitoring
    pub fn spawn<F>(&mut self, shard: ShardId, future: F) -> &mut Self
    where
        F: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        let handle = tokio::spawn(future);
        info!(shard = %shard, "spawned shard task");
        self.tasks.insert(shard, handle);
        self
    }

    /// Collects shards that have stopped since the last check.
    /// Returns an error naming them if any stopped.
    pub async fn check_health(&mut self) -> Result<()> {
        let stopped: Vec<ShardId> = self
            .tasks
            .iter()
            .filter(|(_, handle)| handle.is_finished())
            .map(|(shard, _)| *shard)
            .collect();

        if stopped.is_empty() {
            return Ok(());
        }

        let mut reasons = Vec::with_capacity(stopped.len());
        for shard in &stopped {
            if let Some(handle) = self.tasks.remove(shard) {
                let report = Self::collect(*shard, handle).await;
                let reason = match &report.result {
                    Ok(()) => "stopped".to_string(),
                    Err(e) => e.to_string(),
                };
                error!(shard = %shard, reason = %reason, "shard task terminated");
                reasons.push(format!("{}: {}", shard, reason));
                self.finished.push(report);
            }
        }

        Err(Error::TaskFailed {
            name: "shards".to_string(),
            reason: reasons.join("; "),
        })
    }

    /// Get count of active tasks
    pub fn active_task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Waits up to `grace` for every task to finish on its own.
    pub async fn wait_finished(&self, grace: Duration) -> bool {
        let deadline = Instant::now() + grace;
        loop {
            if self.tasks.values().all(JoinHandle::is_finished) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(Duration::from_millis(20)).await;
        }
    }

    /// Aborts whatever is still running.
    pub fn shutdown_all(&mut self) {
        if self.tasks.is_empty() {
            return;
        }
        warn!(count = self.tasks.len(), "aborting shard tasks");
        for (shard, handle) in std::mem::take(&mut self.tasks) {
            handle.abort();
            self.finished.push(ShardReport {
                shard,
                result: Err(Error::TaskFailed {
                    name: shard.to_string(),
                    reason: "aborted".to_string(),
                }),
            });
        }
    }

    /// Waits for every remaining task and returns one report per shard, ordered by shard.
    pub async fn join_all(&mut self) -> Vec<ShardReport> {
        for (shard, handle) in std::mem::take(&mut self.tasks) {
            let report = Self::collect(shard, handle).await;
            self.finished.push(report);
        }

        let mut reports = std::mem::take(&mut self.finished);
        reports.sort_by_key(|r| r.shard);
        reports
    }

    async fn collect(shard: ShardId, handle: JoinHandle<Result<()>>) -> ShardReport {
        let result = match handle.await {
            Ok(result) => result,
            Err(e) => Err(Error::TaskFailed {
                name: shard.to_string(),
                reason: e.to_string(),
            }),
        };
        ShardReport { shard, result }
    }
}

impl Default for ShardSupervisor {
    fn default() -> Self {
        Self::new()
    }
}
