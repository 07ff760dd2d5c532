// src/db/connection.rs
//
// Database connection management
//
// PRINCIPLES:
// - Explicit connection pooling
// - No hidden connection creation
// - Clear error propagation
// - Thread-safe access

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::path::Path;

use crate::config::ReconcileConfig;
use crate::error::{AppError, AppResult};

/// Type alias for connection pool
pub type ConnectionPool = Pool<SqliteConnectionManager>;

/// Type alias for a pooled connection
pub type PooledConn = PooledConnection<SqliteConnectionManager>;

const CONNECTION_PRAGMAS: &str = "PRAGMA foreign_keys = ON;
     PRAGMA journal_mode = WAL;
     PRAGMA synchronous = NORMAL;
     PRAGMA busy_timeout = 5000;";

/// Create the pool described by the configuration.
pub fn create_connection_pool(config: &ReconcileConfig) -> AppResult<ConnectionPool> {
    config.validate()?;
    let path = config.database_path()?;
    create_connection_pool_at(&path, config.pool_size)
}

/// Create a pool over an explicit SQLite file.
///
/// - WAL mode so readers never block the single writer
/// - Foreign keys enabled
/// - Busy timeout so concurrent writers queue instead of failing
pub fn create_connection_pool_at(path: &Path, max_size: u32) -> AppResult<ConnectionPool> {
    let manager = SqliteConnectionManager::file(path).with_init(|conn| {
        conn.execute_batch(CONNECTION_PRAGMAS)?;
        Ok(())
    });

    log::debug!(
        "Opening connection pool at {} (max {} connections)",
        path.display(),
        max_size
    );

    Pool::builder()
        .max_size(max_size)
        .build(manager)
        .map_err(|e| AppError::Pool(format!("Failed to create connection pool: {}", e)))
}

/// Get a connection from the pool
pub fn get_connection(pool: &ConnectionPool) -> AppResult<PooledConn> {
    pool.get()
        .map_err(|e| AppError::Pool(format!("Failed to get database connection: {}", e)))
}

/// Standalone in-memory connection for schema tests.
pub fn create_test_connection() -> AppResult<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    Ok(conn)
}

/// File-backed, migrated pool in a temporary directory.
/// The directory lives as long as the returned guard.
#[cfg(test)]
pub fn create_test_pool() -> (tempfile::TempDir, std::sync::Arc<ConnectionPool>) {
    let dir = tempfile::tempdir().expect("temp dir");
    let pool = create_connection_pool_at(&dir.path().join("ticketsync-test.db"), 8)
        .expect("test pool");
    {
        let conn = get_connection(&pool).expect("test connection");
        crate::db::initialize_database(&conn).expect("schema");
    }
    (dir, std::sync::Arc::new(pool))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_applies_pragmas() {
        let (_dir, pool) = create_test_pool();
        let conn = get_connection(&pool).unwrap();

        let fk_enabled: i32 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk_enabled, 1);

        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }

    #[test]
    fn test_test_connection() {
        let conn = create_test_connection().unwrap();
        let result: i32 = conn
            .query_row("SELECT 1 + 1", [], |row| row.get(0))
            .unwrap();
        assert_eq!(result, 2);
    }

    #[test]
    fn test_pool_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = ReconcileConfig::default().with_db_path(dir.path().join("cfg.db"));
        let pool = create_connection_pool(&config).unwrap();
        assert_eq!(pool.max_size(), config.pool_size);
    }
}
