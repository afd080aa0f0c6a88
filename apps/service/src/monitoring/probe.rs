use std::fmt;
use std::time::Duration;

use anyhow::{Result, anyhow};
use serde::Serialize;

/// Protocol tag selecting a [`Checker`](super::checker::Checker).
///
/// Kept as an open string so that an unknown tag stored in the registry
/// still becomes a probe and fails at dispatch time with
/// `UnsupportedProtocol` instead of disappearing silently.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ProtocolTag(String);

impl ProtocolTag {
    pub const HTTP: &'static str = "http";
    pub const KV_STORE: &'static str = "kv-store";
    pub const RELATIONAL_STORE: &'static str = "relational-store";

    /// Tags with a built-in checker.
    pub const KNOWN: [&'static str; 3] = [Self::HTTP, Self::KV_STORE, Self::RELATIONAL_STORE];

    pub fn http() -> Self {
        Self(Self::HTTP.to_string())
    }

    pub fn kv_store() -> Self {
        Self(Self::KV_STORE.to_string())
    }

    pub fn relational_store() -> Self {
        Self(Self::RELATIONAL_STORE.to_string())
    }

    /// Normalize a stored `serviceType`, folding the legacy UI values
    /// (`API`, `REDIS`, `PGSQL`) onto canonical tags. Unknown values are
    /// lowercased and kept.
    pub fn normalize(raw: &str) -> Self {
        let lowered = raw.trim().to_ascii_lowercase();
        match lowered.as_str() {
            "api" | "http" | "https" => Self::http(),
            "redis" | "kv" | "kv-store" => Self::kv_store(),
            "pgsql" | "postgres" | "postgresql" | "relational-store" => Self::relational_store(),
            _ => Self(lowered),
        }
    }

    /// Like [`normalize`](Self::normalize) but rejects anything outside the
    /// built-in set.
    pub fn parse_known(raw: &str) -> Result<Self> {
        let tag = Self::normalize(raw);
        if tag.is_known() {
            Ok(tag)
        } else {
            Err(anyhow!(
                "Unsupported service type '{}'. Expected one of: {}",
                raw.trim(),
                Self::KNOWN.join(", ")
            ))
        }
    }

    pub fn is_known(&self) -> bool {
        Self::KNOWN.contains(&self.0.as_str())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProtocolTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One scheduled target. Never mutated; a changed registry row produces a
/// new `Probe` that replaces the old one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    pub id: i64,
    pub endpoint: String,
    pub owner: String,
    pub protocol: ProtocolTag,
    interval: Duration,
}

impl Probe {
    pub fn new(
        id: i64,
        endpoint: impl Into<String>,
        owner: impl Into<String>,
        protocol: ProtocolTag,
        interval: Duration,
    ) -> Result<Self> {
        if interval.is_zero() {
            return Err(anyhow!("Probe {id} has a zero interval"));
        }

        Ok(Self { id, endpoint: endpoint.into(), owner: owner.into(), protocol, interval })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Hard ceiling for one check: the configured timeout, but always
    /// strictly below the probe interval.
    pub fn check_deadline(&self, check_timeout: Duration) -> Duration {
        let ceiling = self.interval - self.interval / 10;
        check_timeout.min(ceiling).max(Duration::from_millis(1))
    }
}

/// Turns the stored interval string into a usable duration.
#[derive(Debug, Clone, Copy)]
pub struct IntervalPolicy {
    pub default: Duration,
    pub floor: Duration,
}

impl Default for IntervalPolicy {
    fn default() -> Self {
        Self { default: Duration::from_secs(30), floor: Duration::from_secs(10) }
    }
}

impl IntervalPolicy {
    /// Empty, unparsable and non-positive values fall back to the default;
    /// values under the floor are raised to it.
    pub fn normalize(&self, raw: &str) -> Duration {
        let seconds = match raw.trim().parse::<i64>() {
            Ok(seconds) if seconds > 0 => seconds as u64,
            _ => {
                if !raw.trim().is_empty() {
                    tracing::warn!(interval = raw, "Invalid probe interval, using default");
                }
                return self.default.max(self.floor);
            }
        };

        Duration::from_secs(seconds).max(self.floor)
    }
}
