use serde::Serialize;
use std::time::SystemTime;

use super::error::ProbeError;
use super::probe::{Probe, ProtocolTag};

/// What a checker reports when the target answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CheckOutcome {
    /// HTTP status code (if applicable)
    pub status_code: Option<u16>,
}

impl CheckOutcome {
    pub fn reachable() -> Self {
        Self::default()
    }

    pub fn with_status(status_code: u16) -> Self {
        Self { status_code: Some(status_code) }
    }
}

/// Result of one probe firing
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    /// Registry id of the probe that was checked
    pub probe_id: i64,

    /// Account the probe belongs to
    pub owner: String,

    /// URL or connection string that was checked
    pub target: String,

    pub protocol: ProtocolTag,

    /// Timestamp when the check started
    pub timestamp: SystemTime,

    /// Wall time spent in the check, failures included
    pub latency_ms: u64,

    /// HTTP status code (if applicable)
    pub status_code: Option<u16>,

    /// Present iff the check failed
    pub error: Option<ProbeError>,
}

impl CheckResult {
    /// Create a successful result
    pub fn success(probe: &Probe, started: SystemTime, latency_ms: u64, outcome: CheckOutcome) -> Self {
        Self {
            status_code: outcome.status_code,
            ..Self::base(probe, started, latency_ms)
        }
    }

    /// Create a failed result
    pub fn failure(probe: &Probe, started: SystemTime, latency_ms: u64, error: ProbeError) -> Self {
        Self { error: Some(error), ..Self::base(probe, started, latency_ms) }
    }

    fn base(probe: &Probe, timestamp: SystemTime, latency_ms: u64) -> Self {
        Self {
            probe_id: probe.id,
            owner: probe.owner.clone(),
            target: probe.endpoint.clone(),
            protocol: probe.protocol.clone(),
            timestamp,
            latency_ms,
            status_code: None,
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn probe() -> Probe {
        Probe::new(7, "https://api.example.com", "alice", ProtocolTag::http(), Duration::from_secs(30))
            .unwrap()
    }

    #[test]
    fn test_success_has_no_error() {
        let result = CheckResult::success(&probe(), SystemTime::now(), 12, CheckOutcome::with_status(503));
        assert!(result.is_success());
        assert_eq!(result.status_code, Some(503));
        assert_eq!(result.probe_id, 7);
        assert_eq!(result.owner, "alice");
    }

    #[test]
    fn test_failure_carries_error() {
        let result = CheckResult::failure(
            &probe(),
            SystemTime::now(),
            900,
            ProbeError::CheckTimeout(Duration::from_millis(900)),
        );
        assert!(!result.is_success());
        assert!(matches!(result.error, Some(ProbeError::CheckTimeout(_))));
        assert_eq!(result.status_code, None);
    }
}
