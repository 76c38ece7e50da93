pub mod router;
pub mod supervisor;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, warn, Instrument};
use crate::config::exchange::ExchangeConfig;
use crate::config::loader::AppConfig;
use crate::config::{AggregationConfig, StorageConfig};
use crate::decoder::ExchangeAdapter;
use crate::error::{Error, Result};
use crate::ingest::connection::Connection;
use crate::ingest::sharder::{Shard, SubscriptionSharder};
use crate::interfaces::RecordSink;
use crate::observability::metrics;
use crate::observability::tracing::exchange_span;
use crate::persistence::{spawn_record_writer, CsvRecordWriter};
use crate::types::exchange::ExchangeId;
use crate::utils::helper::{current_timestamp_ms, shutdown_requested};

pub use router::TickRouter;
pub use supervisor::{ShardReport, ShardSupervisor};

const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_secs(30);
const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Runs every shard of one exchange and the output pipeline behind them.
///
/// Topics are sharded once at construction. `run` spawns one Connection per shard, all feeding a
/// shared [`TickRouter`]; records flow to a single writer task. On shutdown the Connections are
/// stopped first, then open buckets are drained, then the writer is allowed to finish.
pub struct Orchestrator {
    exchange: ExchangeConfig,
    storage: StorageConfig,
    aggregation: AggregationConfig,
    adapter: ExchangeAdapter,
    shards: Vec<Shard>,
    health_interval: Duration,
    shutdown_grace: Duration,
}

impl Orchestrator {
    pub fn new(config: &AppConfig, exchange: ExchangeId) -> Result<Self> {
        let exchange_config = config.exchange(exchange)?.clone();

        let topics = exchange_config.topics();
        if topics.is_empty() {
            return Err(Error::ConfigError(format!("{}: no topics to subscribe", exchange)));
        }

        let sharder = SubscriptionSharder::new(exchange_config.shard_size)?;
        let shards = sharder.shard(&topics);
        info!(
            exchange = %exchange,
            topics = topics.len(),
            shards = shards.len(),
            limit = sharder.limit(),
            "subscriptions sharded"
        );

        Ok(Orchestrator {
            exchange: exchange_config,
            storage: config.storage.clone(),
            aggregation: config.aggregation.clone(),
            adapter: ExchangeAdapter::for_exchange(exchange),
            shards,
            health_interval: DEFAULT_HEALTH_INTERVAL,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        })
    }

    pub fn with_health_interval(mut self, interval: Duration) -> Self {
        self.health_interval = interval;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn exchange(&self) -> ExchangeId {
        self.exchange.exchange
    }

    pub fn shards(&self) -> &[Shard] {
        &self.shards
    }

    /// Writes to CSV files under the configured storage root.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> Result<Vec<ShardReport>> {
        let sink = Arc::new(CsvRecordWriter::with_max_open(
            &self.storage.root,
            self.storage.max_open_files,
        ));
        self.run_with_sink(sink, shutdown).await
    }

    pub async fn run_with_sink(
        &self,
        sink: Arc<dyn RecordSink>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<Vec<ShardReport>> {
        let exchange = self.exchange();

        async move {
            let (records_tx, records_rx) = mpsc::unbounded_channel();
            let writer = spawn_record_writer(sink, records_rx);
            let router = Arc::new(TickRouter::new(
                exchange,
                &self.aggregation,
                current_timestamp_ms(),
                records_tx,
            ));

            let mut supervisor = ShardSupervisor::new();
            for shard in &self.shards {
                let connection = Connection::for_shard(
                    self.exchange.connection_settings(),
                    shard.clone(),
                    self.adapter,
                    self.exchange.credentials.clone(),
                    router.clone(),
                );
                supervisor.spawn(shard.id, connection.run(shutdown.clone()));
            }
            info!(shards = self.shards.len(), "exchange started");

            let mut health = interval_at(Instant::now() + self.health_interval, self.health_interval);
            health.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown_requested(&mut shutdown) => {
                        info!("shutdown requested");
                        break;
                    }
                    _ = health.tick() => {
                        if let Err(e) = supervisor.check_health().await {
                            error!(error = %e, "shard health check failed");
                        }
                        info!(
                            active = supervisor.active_task_count(),
                            metrics = %metrics::summary(exchange),
                            "health"
                        );
                        if supervisor.active_task_count() == 0 {
                            warn!("every shard has stopped");
                            break;
                        }
                    }
                }
            }

            if !supervisor.wait_finished(self.shutdown_grace).await {
                warn!(grace_ms = self.shutdown_grace.as_millis() as u64, "shards did not stop in time");
                supervisor.shutdown_all();
            }
            let reports = supervisor.join_all().await;

            let drained = router.drain();
            drop(router);

            let written = writer.await.map_err(|e| Error::TaskFailed {
                name: "record_writer".to_string(),
                reason: e.to_string(),
            })?;

            for report in &reports {
                match &report.result {
                    Ok(()) => info!(shard = %report.shard, "shard stopped cleanly"),
                    Err(e) => error!(shard = %report.shard, error = %e, "shard failed"),
                }
            }
            info!(drained, written, "exchange stopped");
            Ok(reports)
        }
        .instrument(exchange_span(exchange))
        .await
    }
}
