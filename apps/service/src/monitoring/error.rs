use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Everything that can go wrong while probing a target.
///
/// Checkers return these instead of panicking; the runner folds them into a
/// failed [`CheckResult`](super::CheckResult).
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ProbeError {
    #[error("target source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("no checker registered for protocol '{0}'")]
    UnsupportedProtocol(String),

    #[error("malformed endpoint: {0}")]
    MalformedEndpoint(String),

    #[error("check timed out after {}ms", .0.as_millis())]
    CheckTimeout(Duration),

    #[error("connection failed: {0}")]
    CheckConnectionFailed(String),

    #[error("checker panicked: {0}")]
    CheckerPanicked(String),
}

impl ProbeError {
    /// Errors caused by stored data or deployment config. Retrying them
    /// without a registry change gives the same answer.
    pub fn is_permanent(&self) -> bool {
        matches!(self, ProbeError::UnsupportedProtocol(_) | ProbeError::MalformedEndpoint(_))
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        ProbeError::MalformedEndpoint(reason.into())
    }

    pub fn connection(reason: impl std::fmt::Display) -> Self {
        ProbeError::CheckConnectionFailed(reason.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permanent_classification() {
        assert!(ProbeError::UnsupportedProtocol("mysql".into()).is_permanent());
        assert!(ProbeError::malformed("no host").is_permanent());
        assert!(!ProbeError::CheckTimeout(Duration::from_secs(1)).is_permanent());
        assert!(!ProbeError::connection("refused").is_permanent());
        assert!(!ProbeError::SourceUnavailable("db locked".into()).is_permanent());
    }

    #[test]
    fn test_timeout_message() {
        let err = ProbeError::CheckTimeout(Duration::from_millis(1500));
        assert_eq!(err.to_string(), "check timed out after 1500ms");
    }
}
