use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use futures::FutureExt;
use tokio::time::{Instant, timeout};

use super::error::ProbeError;
use super::probe::Probe;
use super::registry::CheckerRegistry;
use super::types::CheckResult;

/// Monitoring executor - runs one probe firing to completion
///
/// Whatever the checker does (error, hang past the deadline, panic), the
/// caller gets a `CheckResult` back.
pub struct MonitoringExecutor {
    registry: Arc<CheckerRegistry>,
    check_timeout: Duration,
}

impl MonitoringExecutor {
    pub fn new(registry: Arc<CheckerRegistry>, check_timeout: Duration) -> Self {
        Self { registry, check_timeout }
    }

    /// Execute a monitoring check
    pub async fn execute_check(&self, probe: &Probe) -> CheckResult {
        let started_at = SystemTime::now();
        let started = Instant::now();

        let outcome = match self.registry.resolve(&probe.protocol) {
            Ok(checker) => {
                let deadline = probe.check_deadline(self.check_timeout);
                let guarded = AssertUnwindSafe(checker.check(&probe.endpoint, deadline)).catch_unwind();

                match timeout(deadline, guarded).await {
                    Ok(Ok(outcome)) => outcome,
                    Ok(Err(panic)) => Err(ProbeError::CheckerPanicked(panic_message(panic.as_ref()))),
                    Err(_) => Err(ProbeError::CheckTimeout(deadline)),
                }
            }
            Err(e) => Err(e),
        };

        let latency_ms = started.elapsed().as_millis() as u64;
        match outcome {
            Ok(outcome) => CheckResult::success(probe, started_at, latency_ms, outcome),
            Err(e) => CheckResult::failure(probe, started_at, latency_ms, e),
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::checker::Checker;
    use crate::monitoring::probe::ProtocolTag;
    use crate::monitoring::types::CheckOutcome;

    struct Sleepy(Duration);

    #[async_trait::async_trait]
    impl Checker for Sleepy {
        async fn check(&self, _: &str, _: Duration) -> Result<CheckOutcome, ProbeError> {
            tokio::time::sleep(self.0).await;
            Ok(CheckOutcome::reachable())
        }
    }

    struct Exploding;

    #[async_trait::async_trait]
    impl Checker for Exploding {
        async fn check(&self, _: &str, _: Duration) -> Result<CheckOutcome, ProbeError> {
            panic!("driver bug")
        }
    }

    fn executor_with(tag: &str, checker: Arc<dyn Checker>) -> MonitoringExecutor {
        let mut registry = CheckerRegistry::new();
        registry.register(ProtocolTag::normalize(tag), checker);
        MonitoringExecutor::new(Arc::new(registry), Duration::from_secs(10))
    }

    fn probe(tag: &str, interval: Duration) -> Probe {
        Probe::new(1, "target", "alice", ProtocolTag::normalize(tag), interval).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_result() {
        let executor = executor_with("http", Arc::new(Sleepy(Duration::from_millis(20))));

        let result = executor.execute_check(&probe("http", Duration::from_secs(5))).await;
        assert!(result.is_success());
        assert_eq!(result.probe_id, 1);
        assert!(result.latency_ms >= 20);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_checker_cut_below_interval() {
        let executor = executor_with("http", Arc::new(Sleepy(Duration::from_secs(3600))));

        let result = executor.execute_check(&probe("http", Duration::from_secs(1))).await;
        assert_eq!(result.error, Some(ProbeError::CheckTimeout(Duration::from_millis(900))));
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let executor = executor_with("http", Arc::new(Exploding));

        let result = executor.execute_check(&probe("http", Duration::from_secs(5))).await;
        assert_eq!(result.error, Some(ProbeError::CheckerPanicked("driver bug".into())));
    }

    #[tokio::test]
    async fn test_unsupported_protocol_fails_without_check() {
        let executor = executor_with("http", Arc::new(Exploding));

        let result = executor.execute_check(&probe("mysql", Duration::from_secs(5))).await;
        assert_eq!(result.error, Some(ProbeError::UnsupportedProtocol("mysql".into())));
    }
}
