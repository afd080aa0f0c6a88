//! Registry write side: the create/list/update/delete operations behind the
//! `add`, `list`, `update` and `delete` commands.
//!
//! Everything that reaches the `collection` table through here is
//! validated, so the scheduler only has to cope with legacy rows.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::database::Database;
use crate::database::models::{CollectionRecord, DEFAULT_INTERVAL, NewCollection};
use crate::monitoring::probe::ProtocolTag;
use crate::validation::{email_username, validate_endpoint, validate_interval};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid input: {0}")]
    Invalid(String),

    #[error("no registered endpoint with id {0}")]
    NotFound(i64),

    #[error("registry storage failed: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl RegistryError {
    fn invalid(reason: impl std::fmt::Display) -> Self {
        RegistryError::Invalid(reason.to_string())
    }
}

pub struct TargetRegistry {
    database: Arc<dyn Database>,
}

impl TargetRegistry {
    pub fn new(database: Arc<dyn Database>) -> Self {
        Self { database }
    }

    /// Register one record per URL for the owner of `email`.
    ///
    /// All URLs are validated before anything is written, so a bad URL in
    /// the list leaves the registry untouched.
    pub async fn collect(
        &self,
        email: &str,
        service_type: &str,
        interval: Option<u64>,
        urls: &[String],
    ) -> Result<Vec<CollectionRecord>, RegistryError> {
        let username = email_username(email).map_err(RegistryError::invalid)?;
        let protocol = ProtocolTag::parse_known(service_type).map_err(RegistryError::invalid)?;

        let interval = match interval {
            Some(seconds) => {
                validate_interval(seconds).to_result().map_err(RegistryError::invalid)?;
                seconds.to_string()
            }
            None => DEFAULT_INTERVAL.to_string(),
        };

        if urls.is_empty() {
            return Err(RegistryError::invalid("at least one URL is required"));
        }

        let mut rows = Vec::with_capacity(urls.len());
        for url in urls {
            let url = url.trim();
            validate_endpoint(url, &protocol)
                .to_result()
                .map_err(|e| RegistryError::invalid(format!("{url}: {e}")))?;

            rows.push(NewCollection {
                url: url.to_string(),
                username: username.to_string(),
                service_type: protocol.to_string(),
                interval: interval.clone(),
            });
        }

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let id = self.database.insert_collection(row).await?;
            records.push(self.get(id).await?);
        }

        info!(owner = username, protocol = %protocol, count = records.len(), "Registered endpoints");
        Ok(records)
    }

    pub async fn fetch(&self, username: &str) -> Result<Vec<CollectionRecord>, RegistryError> {
        Ok(self.database.list_collections_by_username(username.trim()).await?)
    }

    pub async fn list(&self) -> Result<Vec<CollectionRecord>, RegistryError> {
        Ok(self.database.list_collections().await?)
    }

    /// Replace the URL of a record, validated against its stored protocol.
    pub async fn update(&self, id: i64, url: &str) -> Result<CollectionRecord, RegistryError> {
        let record = self.get(id).await?;
        let url = url.trim();

        let protocol = ProtocolTag::normalize(&record.service_type);
        validate_endpoint(url, &protocol).to_result().map_err(RegistryError::invalid)?;

        if !self.database.update_collection_url(id, url).await? {
            return Err(RegistryError::NotFound(id));
        }

        info!(id, "Updated endpoint URL");
        self.get(id).await
    }

    pub async fn delete(&self, id: i64) -> Result<(), RegistryError> {
        if !self.database.delete_collection(id).await? {
            return Err(RegistryError::NotFound(id));
        }

        info!(id, "Deleted endpoint");
        Ok(())
    }

    async fn get(&self, id: i64) -> Result<CollectionRecord, RegistryError> {
        self.database.get_collection(id).await?.ok_or(RegistryError::NotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::temp_database;

    fn urls(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|url| url.to_string()).collect()
    }

    #[tokio::test]
    async fn test_collect_normalizes_and_stores() -> anyhow::Result<()> {
        let (_dir, db) = temp_database().await?;
        let registry = TargetRegistry::new(db);

        let records = registry
            .collect("alice@example.com", "API", None, &urls(&[" https://a.example ", "http://b.example/health"]))
            .await?;

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].url, "https://a.example");
        assert_eq!(records[0].username, "alice");
        assert_eq!(records[0].service_type, "http");
        assert_eq!(records[0].interval, "30");

        let cache = registry.collect("alice@example.com", "redis", Some(60), &urls(&["cache:6379"])).await?;
        assert_eq!(cache[0].service_type, "kv-store");
        assert_eq!(cache[0].interval, "60");

        assert_eq!(registry.fetch("alice").await?.len(), 3);
        assert!(registry.fetch("bob").await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_collect_rejects_bad_input_without_writing() -> anyhow::Result<()> {
        let (_dir, db) = temp_database().await?;
        let registry = TargetRegistry::new(db);

        let cases = [
            ("not-an-email", "http", None, urls(&["https://a.example"])),
            ("alice@example.com", "mysql", None, urls(&["mysql://db/app"])),
            ("alice@example.com", "http", Some(5), urls(&["https://a.example"])),
            ("alice@example.com", "http", None, urls(&[])),
            ("alice@example.com", "http", None, urls(&["https://a.example", "a.example"])),
            ("alice@example.com", "pgsql", None, urls(&["postgres://db.internal"])),
        ];

        for (email, service_type, interval, urls) in cases {
            let err = registry.collect(email, service_type, interval, &urls).await.unwrap_err();
            assert!(matches!(err, RegistryError::Invalid(_)), "{email} {service_type}: {err}");
        }

        assert!(registry.list().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_update_validates_against_stored_protocol() -> anyhow::Result<()> {
        let (_dir, db) = temp_database().await?;
        let registry = TargetRegistry::new(db);
        let id = registry.collect("bob@example.com", "pgsql", None, &urls(&["postgres://db/app"])).await?[0].id;

        let updated = registry.update(id, "postgresql://db.internal:6543/app").await?;
        assert_eq!(updated.url, "postgresql://db.internal:6543/app");

        let err = registry.update(id, "https://not-a-database.example").await.unwrap_err();
        assert!(matches!(err, RegistryError::Invalid(_)));

        let err = registry.update(id + 1, "postgres://db/app").await.unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(missing) if missing == id + 1));
        Ok(())
    }

    #[tokio::test]
    async fn test_delete() -> anyhow::Result<()> {
        let (_dir, db) = temp_database().await?;
        let registry = TargetRegistry::new(db);
        let id = registry.collect("carol@example.com", "http", None, &urls(&["https://c.example"])).await?[0].id;

        registry.delete(id).await?;
        assert!(registry.list().await?.is_empty());
        assert!(matches!(registry.delete(id).await, Err(RegistryError::NotFound(_))));
        Ok(())
    }
}
