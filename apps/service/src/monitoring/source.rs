use std::sync::Arc;

use async_trait::async_trait;

use super::error::ProbeError;
use super::probe::{IntervalPolicy, Probe, ProtocolTag};
use crate::database::Database;
use crate::database::models::CollectionRecord;

/// Read side of the target registry, as seen by the scheduler.
#[async_trait]
pub trait TargetSource: Send + Sync {
    /// Current probe set, ordered by id.
    async fn list_active(&self) -> Result<Vec<Probe>, ProbeError>;
}

/// Target source backed by the `collection` table.
pub struct DatabaseSource {
    database: Arc<dyn Database>,
    intervals: IntervalPolicy,
}

impl DatabaseSource {
    pub fn new(database: Arc<dyn Database>, intervals: IntervalPolicy) -> Self {
        Self { database, intervals }
    }

    fn to_probe(&self, record: CollectionRecord) -> Option<Probe> {
        let interval = self.intervals.normalize(&record.interval);
        let protocol = ProtocolTag::normalize(&record.service_type);

        match Probe::new(record.id, record.url, record.username, protocol, interval) {
            Ok(probe) => Some(probe),
            Err(e) => {
                tracing::warn!(id = record.id, error = %e, "Skipping unusable registry row");
                None
            }
        }
    }
}

#[async_trait]
impl TargetSource for DatabaseSource {
    async fn list_active(&self) -> Result<Vec<Probe>, ProbeError> {
        let records = self
            .database
            .list_collections()
            .await
            .map_err(|e| ProbeError::SourceUnavailable(format!("{e:#}")))?;

        Ok(records.into_iter().filter_map(|record| self.to_probe(record)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::NewCollection;
    use crate::database::test_support::temp_database;
    use std::time::Duration;

    fn row(url: &str, service_type: &str, interval: &str) -> NewCollection {
        NewCollection {
            url: url.to_string(),
            username: "alice".to_string(),
            service_type: service_type.to_string(),
            interval: interval.to_string(),
        }
    }

    #[tokio::test]
    async fn test_rows_become_normalized_probes() -> anyhow::Result<()> {
        let (_dir, db) = temp_database().await?;
        let api = db.insert_collection(&row("https://api.example", "API", "60")).await?;
        let cache = db.insert_collection(&row("cache:6379", "REDIS", "")).await?;
        let legacy = db.insert_collection(&row("mysql://db/app", "MYSQL", "-1")).await?;

        let source = DatabaseSource::new(db, IntervalPolicy::default());
        let probes = source.list_active().await?;

        assert_eq!(probes.iter().map(|p| p.id).collect::<Vec<_>>(), vec![api, cache, legacy]);
        assert_eq!(probes[0].protocol, ProtocolTag::http());
        assert_eq!(probes[0].interval(), Duration::from_secs(60));
        assert_eq!(probes[0].owner, "alice");
        assert_eq!(probes[1].protocol, ProtocolTag::kv_store());
        assert_eq!(probes[1].interval(), Duration::from_secs(30));
        assert_eq!(probes[2].protocol.as_str(), "mysql");
        assert_eq!(probes[2].interval(), Duration::from_secs(30));
        Ok(())
    }

    struct BrokenDatabase;

    #[async_trait]
    impl Database for BrokenDatabase {
        async fn list_collections(&self) -> anyhow::Result<Vec<CollectionRecord>> {
            Err(anyhow::anyhow!("database is locked"))
        }
        async fn list_collections_by_username(&self, _: &str) -> anyhow::Result<Vec<CollectionRecord>> {
            unreachable!()
        }
        async fn get_collection(&self, _: i64) -> anyhow::Result<Option<CollectionRecord>> {
            unreachable!()
        }
        async fn insert_collection(&self, _: &NewCollection) -> anyhow::Result<i64> {
            unreachable!()
        }
        async fn update_collection_url(&self, _: i64, _: &str) -> anyhow::Result<bool> {
            unreachable!()
        }
        async fn delete_collection(&self, _: i64) -> anyhow::Result<bool> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn test_read_failure_is_source_unavailable() {
        let source = DatabaseSource::new(Arc::new(BrokenDatabase), IntervalPolicy::default());
        let err = source.list_active().await.unwrap_err();
        assert_eq!(err, ProbeError::SourceUnavailable("database is locked".into()));
    }
}
