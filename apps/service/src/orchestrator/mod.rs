/// Orchestrator module - coordinates all components
///
/// The orchestrator is the process-level coordinator that:
/// - Prepares the registry database
/// - Builds the checker registry, executor and scheduler from config
/// - Consumes check results into the log
/// - Stops the scheduler on shutdown and waits for it to drain
#[cfg(test)]
mod tests;

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::database::{DatabaseImpl, initialize_database};
use crate::monitoring::error::ProbeError;
use crate::monitoring::scheduler::SchedulerSettings;
use crate::monitoring::source::{DatabaseSource, TargetSource};
use crate::monitoring::{CheckResult, CheckerRegistry, MonitoringExecutor, MonitoringScheduler};
use crate::pool::LibsqlPool;

/// Room for results the sink has not logged yet. A full channel makes
/// finished checks wait before their timers go idle again.
const RESULT_BUFFER: usize = 256;

/// Counters reported when the orchestrator stops
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SinkSummary {
    pub succeeded: u64,
    pub failed: u64,
}

impl SinkSummary {
    fn record(&mut self, result: &CheckResult) {
        if result.is_success() {
            self.succeeded += 1;
            info!(
                probe_id = result.probe_id,
                owner = %result.owner,
                protocol = %result.protocol,
                target = %result.target,
                latency_ms = result.latency_ms,
                status_code = ?result.status_code,
                "Probe succeeded"
            );
            return;
        }

        self.failed += 1;
        let error = result.error.as_ref();
        warn!(
            probe_id = result.probe_id,
            owner = %result.owner,
            protocol = %result.protocol,
            target = %result.target,
            latency_ms = result.latency_ms,
            permanent = error.is_some_and(ProbeError::is_permanent),
            error = %error.map(ToString::to_string).unwrap_or_default(),
            "Probe failed"
        );
    }
}

/// Main orchestrator for the BootUp service
pub struct Orchestrator {
    scheduler: Arc<MonitoringScheduler>,
    result_rx: mpsc::Receiver<CheckResult>,
}

impl Orchestrator {
    /// Create and start a new orchestrator, running until Ctrl-C
    pub async fn start(config: Config, pool: LibsqlPool) -> Result<()> {
        let orchestrator = Self::new(&config, pool).await?;
        let summary = orchestrator.run(shutdown_signal()).await?;
        info!(succeeded = summary.succeeded, failed = summary.failed, "BootUp service stopped");
        Ok(())
    }

    /// Create a new orchestrator instance
    pub async fn new(config: &Config, pool: LibsqlPool) -> Result<Self> {
        // Get database connection for initialization
        let conn = pool.get().await.context("Failed to get database connection")?;

        info!("Initializing database schema...");
        initialize_database(&conn).await?;
        drop(conn);

        let database = Arc::new(DatabaseImpl::new_from_pool(pool));
        let source = Arc::new(DatabaseSource::new(database, config.interval_policy()));

        let registry = CheckerRegistry::with_builtins(&config.protocols.enabled, config.check_timeout())?;
        info!(protocols = ?registry.protocols(), "Checkers registered");

        let executor = Arc::new(MonitoringExecutor::new(Arc::new(registry), config.check_timeout()));
        Ok(Self::from_parts(executor, source, config.scheduler_settings()))
    }

    /// Assemble an orchestrator around an existing executor and source
    pub fn from_parts(
        executor: Arc<MonitoringExecutor>,
        source: Arc<dyn TargetSource>,
        settings: SchedulerSettings,
    ) -> Self {
        let (result_tx, result_rx) = mpsc::channel(RESULT_BUFFER);
        let scheduler = Arc::new(MonitoringScheduler::new(executor, source, result_tx, settings));
        Self { scheduler, result_rx }
    }

    /// Run the scheduler and the result sink until `shutdown` resolves
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) -> Result<SinkSummary> {
        info!("Starting BootUp orchestrator...");

        let (stop_tx, stop_rx) = watch::channel(false);
        let mut scheduler = tokio::spawn(self.scheduler.clone().run(stop_rx));
        let mut summary = SinkSummary::default();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                Some(result) = self.result_rx.recv() => summary.record(&result),
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping scheduler");
                    break;
                }
                joined = &mut scheduler => {
                    joined.context("Scheduler task failed")?;
                    warn!("Scheduler stopped on its own");
                    return Ok(summary);
                }
            }
        }

        // Receiver stays open; results of checks finishing inside the grace
        // period still reach the log.
        let _ = stop_tx.send(true);
        loop {
            tokio::select! {
                Some(result) = self.result_rx.recv() => summary.record(&result),
                joined = &mut scheduler => {
                    if let Err(e) = joined {
                        error!(error = %e, "Scheduler task failed during shutdown");
                    }
                    break;
                }
            }
        }

        while let Ok(result) = self.result_rx.try_recv() {
            summary.record(&result);
        }
        Ok(summary)
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C, running until killed");
        std::future::pending::<()>().await;
    }
}
