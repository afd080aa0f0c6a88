//! Probe scheduler.
//!
//! One dispatch loop walks a map of per-probe timers on a short tick and
//! spawns every due check as its own task. A separate reconciliation task
//! periodically re-reads the target source and diffs the timer map against
//! it. Both sides touch the map only under its mutex, and never across
//! network I/O.
//!
//! A timer is `Idle` until due, `Firing` while its check runs, and becomes
//! `Cancelled` when its probe leaves the registry mid-check. Cancelled
//! timers stay in the map as tombstones until the running check finishes,
//! so a probe id can never have two checks in flight, even if the id comes
//! back before the old check returns.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore, mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior, interval, interval_at, timeout};
use tracing::{debug, error, info, warn};

use super::error::ProbeError;
use super::executor::MonitoringExecutor;
use super::probe::Probe;
use super::source::TargetSource;
use super::types::CheckResult;

/// Static scheduler tuning, taken from the `[scheduler]` config section.
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub tick_interval: Duration,
    pub reconcile_interval: Duration,
    pub max_concurrent_checks: usize,
    pub shutdown_grace: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(250),
            reconcile_interval: Duration::from_secs(10),
            max_concurrent_checks: 64,
            shutdown_grace: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    Firing,
    Cancelled,
}

#[derive(Debug)]
struct Timer {
    probe: Arc<Probe>,
    /// Bumped whenever the probe definition is replaced.
    generation: u64,
    next_fire_at: Instant,
    in_flight: bool,
    cancelled: bool,
}

impl Timer {
    fn new(probe: Probe, now: Instant) -> Self {
        Self { probe: Arc::new(probe), generation: 0, next_fire_at: now, in_flight: false, cancelled: false }
    }

    /// Swap in a new definition. A check still running for the old one
    /// keeps `in_flight` set and holds the new definition back until it
    /// returns.
    fn replace(&mut self, probe: Probe, now: Instant) {
        self.probe = Arc::new(probe);
        self.generation += 1;
        self.next_fire_at = now;
        self.cancelled = false;
    }

    fn state(&self) -> TimerState {
        if self.cancelled {
            TimerState::Cancelled
        } else if self.in_flight {
            TimerState::Firing
        } else {
            TimerState::Idle
        }
    }

    fn is_due(&self, now: Instant) -> bool {
        self.state() == TimerState::Idle && self.next_fire_at <= now
    }
}

/// What one reconciliation pass changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub added: Vec<i64>,
    pub removed: Vec<i64>,
    pub changed: Vec<i64>,
}

impl ReconcileReport {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

/// A check handed from the dispatch loop to its own task.
struct Dispatch {
    probe: Arc<Probe>,
    generation: u64,
    permit: OwnedSemaphorePermit,
}

/// Monitoring scheduler - owns the timer map and drives every probe
pub struct MonitoringScheduler {
    executor: Arc<MonitoringExecutor>,
    source: Arc<dyn TargetSource>,
    result_tx: mpsc::Sender<CheckResult>,
    timers: Mutex<HashMap<i64, Timer>>,
    permits: Arc<Semaphore>,
    settings: SchedulerSettings,
}

impl MonitoringScheduler {
    pub fn new(
        executor: Arc<MonitoringExecutor>,
        source: Arc<dyn TargetSource>,
        result_tx: mpsc::Sender<CheckResult>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            executor,
            source,
            result_tx,
            timers: Mutex::new(HashMap::new()),
            permits: Arc::new(Semaphore::new(settings.max_concurrent_checks.max(1))),
            settings,
        }
    }

    /// Run until `shutdown` flips to true (or its sender goes away), then
    /// give in-flight checks the grace period and abort the rest.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        if *shutdown.borrow() {
            return;
        }

        self.reconcile_logged().await;
        let reconciler = tokio::spawn(self.clone().reconcile_loop());

        let mut ticker = interval(self.settings.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut checks = JoinSet::new();

        info!(
            tick_ms = self.settings.tick_interval.as_millis() as u64,
            reconcile_secs = self.settings.reconcile_interval.as_secs(),
            max_concurrent = self.settings.max_concurrent_checks,
            "Probe scheduler started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    for dispatch in self.collect_due(Instant::now()).await {
                        checks.spawn(self.clone().run_check(dispatch));
                    }
                }
                Some(joined) = checks.join_next(), if !checks.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Check task failed to join");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        reconciler.abort();
        self.drain(checks).await;
        info!("Probe scheduler stopped");
    }

    /// Pull a snapshot from the source and apply it.
    pub async fn reconcile(&self) -> Result<ReconcileReport, ProbeError> {
        let snapshot = timeout(self.settings.reconcile_interval, self.source.list_active())
            .await
            .map_err(|_| ProbeError::SourceUnavailable("read timed out".into()))??;

        Ok(self.apply_snapshot(snapshot, Instant::now()).await)
    }

    /// Current state of every tracked timer, ordered by probe id.
    #[cfg(test)]
    pub async fn timer_states(&self) -> Vec<(i64, TimerState)> {
        let timers = self.timers.lock().await;
        let mut states: Vec<_> = timers.iter().map(|(id, timer)| (*id, timer.state())).collect();
        states.sort_unstable_by_key(|(id, _)| *id);
        states
    }

    async fn reconcile_loop(self: Arc<Self>) {
        let period = self.settings.reconcile_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.reconcile_logged().await;
        }
    }

    async fn reconcile_logged(&self) {
        match self.reconcile().await {
            Ok(report) if report.is_empty() => debug!("Reconciliation found no changes"),
            Ok(report) => info!(
                added = ?report.added,
                removed = ?report.removed,
                changed = ?report.changed,
                "Reconciled probe set"
            ),
            Err(e) => warn!(error = %e, "Keeping current probes, target source read failed"),
        }
    }

    async fn apply_snapshot(&self, snapshot: Vec<Probe>, now: Instant) -> ReconcileReport {
        let mut timers = self.timers.lock().await;
        let mut report = ReconcileReport::default();
        let mut seen = HashSet::with_capacity(snapshot.len());

        for probe in snapshot {
            let id = probe.id;
            if !seen.insert(id) {
                warn!(id, "Duplicate probe id in snapshot, keeping the first");
                continue;
            }

            match timers.get_mut(&id) {
                None => {
                    timers.insert(id, Timer::new(probe, now));
                    report.added.push(id);
                }
                Some(timer) if timer.cancelled => {
                    timer.replace(probe, now);
                    report.added.push(id);
                }
                Some(timer) if *timer.probe != probe => {
                    timer.replace(probe, now);
                    report.changed.push(id);
                }
                Some(_) => {}
            }
        }

        timers.retain(|id, timer| {
            if seen.contains(id) || timer.cancelled {
                return true;
            }
            report.removed.push(*id);
            if timer.in_flight {
                timer.cancelled = true;
                true
            } else {
                false
            }
        });
        report.removed.sort_unstable();

        report
    }

    /// Mark due timers as firing, oldest first, as far as permits allow.
    /// Timers left without a permit stay due for the next tick.
    async fn collect_due(&self, now: Instant) -> Vec<Dispatch> {
        let mut timers = self.timers.lock().await;
        let mut due: Vec<&mut Timer> = timers.values_mut().filter(|timer| timer.is_due(now)).collect();
        due.sort_unstable_by_key(|timer| (timer.next_fire_at, timer.probe.id));

        let waiting = due.len();
        let mut batch = Vec::with_capacity(waiting);
        for timer in due {
            let Ok(permit) = self.permits.clone().try_acquire_owned() else {
                break;
            };
            timer.in_flight = true;
            batch.push(Dispatch { probe: timer.probe.clone(), generation: timer.generation, permit });
        }

        if batch.len() < waiting {
            debug!(waiting = waiting - batch.len(), "Concurrency limit reached, deferring due probes");
        }
        batch
    }

    async fn run_check(self: Arc<Self>, dispatch: Dispatch) {
        let Dispatch { probe, generation, permit } = dispatch;

        let result = self.executor.execute_check(&probe).await;
        drop(permit);

        self.complete(probe.id, generation, result).await;
    }

    /// Hand the result to the sink if the timer still wants it, then put
    /// the timer back to idle. The result goes out before the in-flight
    /// flag is cleared, so results of one probe never overtake each other.
    async fn complete(&self, probe_id: i64, generation: u64, result: CheckResult) {
        let slot = self.result_tx.reserve().await.ok();

        let mut timers = self.timers.lock().await;
        let Some(timer) = timers.get_mut(&probe_id) else {
            debug!(probe_id, "Result for untracked probe discarded");
            return;
        };
        timer.in_flight = false;

        if timer.cancelled {
            timers.remove(&probe_id);
            debug!(probe_id, "Probe was removed while checking, result discarded");
            return;
        }
        if timer.generation != generation {
            debug!(probe_id, "Probe changed while checking, result discarded");
            return;
        }

        timer.next_fire_at = Instant::now() + timer.probe.interval();
        match slot {
            Some(slot) => slot.send(result),
            None => debug!(probe_id, "Result channel closed, dropping result"),
        }
    }

    async fn drain(&self, mut checks: JoinSet<()>) {
        if checks.is_empty() {
            return;
        }

        let grace = self.settings.shutdown_grace;
        info!(in_flight = checks.len(), grace_secs = grace.as_secs_f64(), "Waiting for in-flight checks");

        let finished = timeout(grace, async {
            while checks.join_next().await.is_some() {}
        })
        .await;

        if finished.is_err() {
            warn!(remaining = checks.len(), "Aborting checks still running after grace period");
            checks.abort_all();
        }
    }
}
