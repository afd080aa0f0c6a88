use anyhow::Result;
use async_trait::async_trait;
use libsql::{Row, params};

use super::models::{CollectionRecord, NewCollection, from_unix};
use crate::pool::{LibsqlManager, LibsqlPool};

const SELECT_COLUMNS: &str =
    "SELECT id, url, username, service_type, interval, created_at, updated_at FROM collection";

/// Database trait for abstracting registry storage
#[async_trait]
pub trait Database: Send + Sync {
    /// All registered endpoints, ordered by id
    async fn list_collections(&self) -> Result<Vec<CollectionRecord>>;

    /// Endpoints belonging to one owner, ordered by id
    async fn list_collections_by_username(&self, username: &str) -> Result<Vec<CollectionRecord>>;

    async fn get_collection(&self, id: i64) -> Result<Option<CollectionRecord>>;

    /// Insert a row and return its id
    async fn insert_collection(&self, new: &NewCollection) -> Result<i64>;

    /// Replace the URL of a row. Returns false if the id does not exist.
    async fn update_collection_url(&self, id: i64, url: &str) -> Result<bool>;

    /// Delete a row. Returns false if the id does not exist.
    async fn delete_collection(&self, id: i64) -> Result<bool>;
}

/// LibSQL database implementation
pub struct DatabaseImpl {
    pool: LibsqlPool,
}

impl DatabaseImpl {
    /// Create a new database instance from a pool
    pub fn new_from_pool(pool: LibsqlPool) -> Self {
        Self { pool }
    }

    /// Get a connection from the pool
    async fn get_conn(&self) -> Result<deadpool::managed::Object<LibsqlManager>> {
        Ok(self.pool.get().await?)
    }

    async fn query_collections(
        &self,
        sql: &str,
        args: impl libsql::params::IntoParams + Send,
    ) -> Result<Vec<CollectionRecord>> {
        let conn = self.get_conn().await?;
        let mut rows = conn.query(sql, args).await?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            records.push(row_to_record(&row)?);
        }
        Ok(records)
    }
}

fn row_to_record(row: &Row) -> Result<CollectionRecord> {
    Ok(CollectionRecord {
        id: row.get(0)?,
        url: row.get(1)?,
        username: row.get(2)?,
        service_type: row.get(3)?,
        interval: row.get(4)?,
        created_at: from_unix(row.get(5)?),
        updated_at: from_unix(row.get(6)?),
    })
}

#[async_trait]
impl Database for DatabaseImpl {
    async fn list_collections(&self) -> Result<Vec<CollectionRecord>> {
        self.query_collections(&format!("{SELECT_COLUMNS} ORDER BY id"), ()).await
    }

    async fn list_collections_by_username(&self, username: &str) -> Result<Vec<CollectionRecord>> {
        self.query_collections(
            &format!("{SELECT_COLUMNS} WHERE username = ? ORDER BY id"),
            params![username],
        )
        .await
    }

    async fn get_collection(&self, id: i64) -> Result<Option<CollectionRecord>> {
        let mut records =
            self.query_collections(&format!("{SELECT_COLUMNS} WHERE id = ?"), params![id]).await?;
        Ok(records.pop())
    }

    async fn insert_collection(&self, new: &NewCollection) -> Result<i64> {
        let conn = self.get_conn().await?;
        let now = chrono::Utc::now().timestamp();

        conn.execute(
            "INSERT INTO collection (url, username, service_type, interval, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                new.url.as_str(),
                new.username.as_str(),
                new.service_type.as_str(),
                new.interval.as_str(),
                now,
                now
            ],
        )
        .await?;

        Ok(conn.last_insert_rowid())
    }

    async fn update_collection_url(&self, id: i64, url: &str) -> Result<bool> {
        let conn = self.get_conn().await?;
        let now = chrono::Utc::now().timestamp();

        let changed = conn
            .execute("UPDATE collection SET url = ?, updated_at = ? WHERE id = ?", params![url, now, id])
            .await?;
        Ok(changed > 0)
    }

    async fn delete_collection(&self, id: i64) -> Result<bool> {
        let conn = self.get_conn().await?;
        let changed = conn.execute("DELETE FROM collection WHERE id = ?", params![id]).await?;
        Ok(changed > 0)
    }
}
