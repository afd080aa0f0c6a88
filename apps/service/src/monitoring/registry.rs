use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};

use super::checker::{Checker, HttpChecker, PostgresChecker, RedisChecker};
use super::error::ProbeError;
use super::probe::ProtocolTag;

/// Maps protocol tags to checkers. Filled at startup, read-only afterwards.
#[derive(Default, Clone)]
pub struct CheckerRegistry {
    checkers: HashMap<ProtocolTag, Arc<dyn Checker>>,
}

impl CheckerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry holding the built-in checkers named in `enabled`.
    pub fn with_builtins(enabled: &[String], connect_timeout: Duration) -> Result<Self> {
        let mut registry = Self::new();

        for raw in enabled {
            let tag = ProtocolTag::normalize(raw);
            let checker: Arc<dyn Checker> = match tag.as_str() {
                ProtocolTag::HTTP => Arc::new(HttpChecker::new(connect_timeout)?),
                ProtocolTag::KV_STORE => Arc::new(RedisChecker),
                ProtocolTag::RELATIONAL_STORE => Arc::new(PostgresChecker),
                _ => bail!("No built-in checker for protocol '{raw}'"),
            };
            registry.register(tag, checker);
        }

        Ok(registry)
    }

    /// Register (or replace) the checker for `tag`.
    pub fn register(&mut self, tag: ProtocolTag, checker: Arc<dyn Checker>) -> &mut Self {
        if self.checkers.insert(tag.clone(), checker).is_some() {
            tracing::warn!(protocol = %tag, "Replacing previously registered checker");
        }
        self
    }

    pub fn resolve(&self, tag: &ProtocolTag) -> Result<Arc<dyn Checker>, ProbeError> {
        self.checkers
            .get(tag)
            .cloned()
            .ok_or_else(|| ProbeError::UnsupportedProtocol(tag.to_string()))
    }

    pub fn protocols(&self) -> Vec<&ProtocolTag> {
        let mut tags: Vec<_> = self.checkers.keys().collect();
        tags.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        tags
    }
}
