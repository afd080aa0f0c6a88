/// Database abstraction layer
///
/// The `collection` registry lives in a local LibSQL file. Everything else
/// in the service talks to it through the [`Database`] trait.
pub mod migrations;
pub mod models;
pub mod repository;

pub use repository::{Database, DatabaseImpl};

use anyhow::Result;

/// Initialize database with schema
pub async fn initialize_database(conn: &libsql::Connection) -> Result<()> {
    migrations::run_migrations(conn).await
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use anyhow::Result;
    use tempfile::TempDir;

    use super::{DatabaseImpl, initialize_database};
    use crate::pool::open_pool;

    /// Fresh migrated database in a temp dir. Keep the `TempDir` alive for
    /// as long as the database is used.
    pub async fn temp_database() -> Result<(TempDir, Arc<DatabaseImpl>)> {
        let dir = tempfile::tempdir()?;
        let pool = open_pool(&dir.path().join("registry.db"), 4).await?;

        let conn = pool.get().await?;
        initialize_database(&conn).await?;
        drop(conn);

        Ok((dir, Arc::new(DatabaseImpl::new_from_pool(pool))))
    }
}
