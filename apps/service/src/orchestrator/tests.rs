/// End-to-end tests for the orchestrator
///
/// These run the real database source, checker registry and scheduler
/// against local listeners:
/// - registered endpoints are probed and logged
/// - unusable rows fail without stopping anything
/// - shutdown returns with the counters
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use super::{Orchestrator, SinkSummary};
use crate::config::Config;
use crate::database::Database;
use crate::database::models::NewCollection;
use crate::database::test_support::temp_database;
use crate::monitoring::probe::IntervalPolicy;
use crate::monitoring::scheduler::SchedulerSettings;
use crate::monitoring::source::DatabaseSource;
use crate::monitoring::{CheckerRegistry, MonitoringExecutor};
use crate::pool::open_pool;
use crate::targets::TargetRegistry;

async fn serve_ok() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut buf = [0u8; 2048];
            let _ = socket.read(&mut buf).await;
            let _ = socket
                .write_all(b"HTTP/1.1 204 No Content\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
                .await;
        }
    });

    format!("http://{addr}/ping")
}

fn fast_settings() -> SchedulerSettings {
    SchedulerSettings {
        tick_interval: Duration::from_millis(20),
        reconcile_interval: Duration::from_millis(200),
        max_concurrent_checks: 4,
        shutdown_grace: Duration::from_secs(1),
    }
}

fn builtin_executor() -> Arc<MonitoringExecutor> {
    let enabled: Vec<String> = ["http", "kv-store", "relational-store"].map(String::from).to_vec();
    let registry = CheckerRegistry::with_builtins(&enabled, Duration::from_secs(2)).unwrap();
    Arc::new(MonitoringExecutor::new(Arc::new(registry), Duration::from_secs(2)))
}

#[tokio::test]
async fn test_registered_endpoints_are_probed() -> Result<()> {
    let (_dir, db) = temp_database().await?;
    let endpoint = serve_ok().await;

    TargetRegistry::new(db.clone()).collect("alice@example.com", "API", Some(10), &[endpoint]).await?;
    db.insert_collection(&NewCollection {
        url: "mysql://db.internal/app".into(),
        username: "legacy".into(),
        service_type: "MYSQL".into(),
        interval: "10".into(),
    })
    .await?;

    let source = Arc::new(DatabaseSource::new(db, IntervalPolicy::default()));
    let orchestrator = Orchestrator::from_parts(builtin_executor(), source, fast_settings());

    let summary = orchestrator.run(tokio::time::sleep(Duration::from_millis(500))).await?;
    assert_eq!(summary, SinkSummary { succeeded: 1, failed: 1 });
    Ok(())
}

#[tokio::test]
async fn test_rows_added_while_running_are_picked_up() -> Result<()> {
    let (_dir, db) = temp_database().await?;
    let endpoint = serve_ok().await;

    let source = Arc::new(DatabaseSource::new(db.clone(), IntervalPolicy::default()));
    let orchestrator = Orchestrator::from_parts(builtin_executor(), source, fast_settings());

    let registry = TargetRegistry::new(db);
    let shutdown = async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        registry.collect("bob@example.com", "http", None, &[endpoint]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;
    };

    let summary = orchestrator.run(shutdown).await?;
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 0);
    Ok(())
}

#[tokio::test]
async fn test_new_prepares_database_from_config() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut config = Config::default();
    config.database.path = dir.path().join("data/registry.db");
    config.scheduler.tick_interval_ms = 20;

    let pool = open_pool(&config.database.path, config.database.max_connections).await?;
    let orchestrator = Orchestrator::new(&config, pool.clone()).await?;

    let conn = pool.get().await?;
    let mut rows = conn.query("SELECT COUNT(*) FROM collection", ()).await?;
    let count: i64 = rows.next().await?.unwrap().get(0)?;
    assert_eq!(count, 0);
    drop(rows);
    drop(conn);

    let summary = orchestrator.run(std::future::ready(())).await?;
    assert_eq!(summary, SinkSummary::default());
    Ok(())
}
