use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;

pub mod challenges;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// How long a writer waits for another connection's write lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open the pool and bring the schema up to date
pub async fn connect(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?.busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    MIGRATOR.run(&pool).await?;
    log::info!("Database migrations completed");

    Ok(pool)
}

/// Single-connection in-memory database with migrations applied
#[cfg(test)]
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();

    MIGRATOR.run(&pool).await.unwrap();
    pool
}

/// Fresh database file shared by several connections, for concurrency tests
#[cfg(test)]
pub async fn file_test_pool() -> (SqlitePool, std::path::PathBuf) {
    let path = std::env::temp_dir().join(format!("quit-test-{}.db", uuid::Uuid::new_v4()));
    let pool = connect(&format!("sqlite:{}?mode=rwc", path.display()))
        .await
        .unwrap();
    (pool, path)
}
