use std::process::ExitCode;
use anyhow::{bail, Context};
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{error, info, warn};
use arb_ingest::config::loader::AppConfig;
use arb_ingest::observability::metrics::register_metrics;
use arb_ingest::observability::tracing::init_tracing;
use arb_ingest::orchestrator::Orchestrator;
use arb_ingest::types::exchange::ExchangeId;
use arb_ingest::{DEFAULT_PROFILE, PROFILE_ENV};

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("arb-ingest: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> anyhow::Result<ExitCode> {
    let profile = std::env::var(PROFILE_ENV).unwrap_or_else(|_| DEFAULT_PROFILE.to_string());
    let config = AppConfig::load(&profile).context("loading configuration")?;
    init_tracing(&config.logging)?;

    match parse_exchange_arg(std::env::args().skip(1))? {
        Some(exchange) => run_exchange(&config, exchange),
        None => spawn_exchange_processes(&config),
    }
}

fn parse_exchange_arg(mut args: impl Iterator<Item = String>) -> anyhow::Result<Option<ExchangeId>> {
    match (args.next().as_deref(), args.next()) {
        (None, _) => Ok(None),
        (Some("--exchange"), Some(id)) => Ok(Some(id.parse()?)),
        (Some(other), _) => bail!("usage: arb-ingest [--exchange <binance|okx|bitget>], got {:?}", other),
    }
}

/// Parent mode: one child process per enabled exchange, so a crash stays inside its exchange.
fn spawn_exchange_processes(config: &AppConfig) -> anyhow::Result<ExitCode> {
    let program = std::env::current_exe().context("locating own executable")?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building runtime")?;

    runtime.block_on(async {
        let mut children = Vec::new();
        for exchange in config.enabled_exchanges() {
            let child = Command::new(&program)
                .arg("--exchange")
                .arg(exchange.exchange.as_str())
                .spawn()
                .with_context(|| format!("spawning {} process", exchange.exchange))?;
            info!(exchange = %exchange.exchange, pid = ?child.id(), "exchange process started");
            children.push((exchange.exchange, child));
        }

        // Ctrl-C reaches the children directly. Once installed, the handler keeps later
        // signals from killing the parent while it collects exit codes.
        tokio::spawn(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("ctrl-c received, waiting for exchange processes");
            }
        });

        let mut all_ok = true;
        for (exchange, mut child) in children {
            let status = child
                .wait()
                .await
                .with_context(|| format!("waiting for {} process", exchange))?;
            if status.success() {
                info!(exchange = %exchange, %status, "exchange process exited");
            } else {
                all_ok = false;
                error!(exchange = %exchange, %status, "exchange process failed");
            }
        }

        Ok::<_, anyhow::Error>(if all_ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
    })
}

/// Child mode: one exchange on a single-threaded runtime until Ctrl-C.
fn run_exchange(config: &AppConfig, exchange: ExchangeId) -> anyhow::Result<ExitCode> {
    register_metrics()?;
    let orchestrator = Orchestrator::new(config, exchange)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building runtime")?;

    let reports = runtime.block_on(async {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("ctrl-c received"),
                Err(e) => warn!(error = %e, "ctrl-c handler failed, shutting down"),
            }
            let _ = shutdown_tx.send(true);
        });
        orchestrator.run(shutdown_rx).await
    })?;

    let failed = reports.iter().filter(|r| !r.is_success()).count();
    info!(exchange = %exchange, shards = reports.len(), failed, "exchange finished");
    Ok(if failed == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
