// src/config.rs
//
// Engine configuration
//
// Every value can be overridden from the environment:
//
// | Variable                         | Default                              |
// |----------------------------------|--------------------------------------|
// | TICKETSYNC_DB_PATH               | {data_dir}/ticketsync/ticketsync.db  |
// | TICKETSYNC_POOL_SIZE             | 8                                    |
// | TICKETSYNC_TIME_BUFFER_MINUTES   | 30                                   |
// | TICKETSYNC_DEDUP_CAPACITY        | 1000                                 |
// | TICKETSYNC_IMPORT_BATCH_SIZE     | 50                                   |
// | TICKETSYNC_FETCH_TIMEOUT_SECS    | 30                                   |
//
// Unparseable values fall back to the default.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AppError, AppResult};

pub const DEFAULT_POOL_SIZE: u32 = 8;
pub const DEFAULT_TIME_BUFFER_MINUTES: i64 = 30;
pub const DEFAULT_DEDUP_CAPACITY: usize = 1000;
pub const DEFAULT_IMPORT_BATCH_SIZE: usize = 50;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// SQLite file. None resolves to the platform data directory.
    pub db_path: Option<PathBuf>,
    pub pool_size: u32,
    /// Symmetric window for matching a sale time against a scoped mapping
    pub time_buffer_minutes: i64,
    /// Live dedup ledger entries kept before the oldest are evicted
    pub dedup_capacity: usize,
    /// Page size requested from source feeds during historical import
    pub import_batch_size: usize,
    pub fetch_timeout_secs: u64,
}

impl ReconcileConfig {
    pub fn from_env() -> Self {
        Self {
            db_path: std::env::var("TICKETSYNC_DB_PATH")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            pool_size: env_or("TICKETSYNC_POOL_SIZE", DEFAULT_POOL_SIZE),
            time_buffer_minutes: env_or(
                "TICKETSYNC_TIME_BUFFER_MINUTES",
                DEFAULT_TIME_BUFFER_MINUTES,
            ),
            dedup_capacity: env_or("TICKETSYNC_DEDUP_CAPACITY", DEFAULT_DEDUP_CAPACITY),
            import_batch_size: env_or("TICKETSYNC_IMPORT_BATCH_SIZE", DEFAULT_IMPORT_BATCH_SIZE),
            fetch_timeout_secs: env_or("TICKETSYNC_FETCH_TIMEOUT_SECS", DEFAULT_FETCH_TIMEOUT_SECS),
        }
    }

    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = Some(path.into());
        self
    }

    pub fn with_time_buffer(mut self, minutes: i64) -> Self {
        self.time_buffer_minutes = minutes;
        self
    }

    pub fn with_dedup_capacity(mut self, capacity: usize) -> Self {
        self.dedup_capacity = capacity;
        self
    }

    pub fn with_import_batch_size(mut self, size: usize) -> Self {
        self.import_batch_size = size;
        self
    }

    pub fn with_fetch_timeout(mut self, secs: u64) -> Self {
        self.fetch_timeout_secs = secs;
        self
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Resolved database path. Creates the data directory when defaulted.
    pub fn database_path(&self) -> AppResult<PathBuf> {
        if let Some(path) = &self.db_path {
            return Ok(path.clone());
        }

        let data_dir = dirs::data_dir()
            .ok_or_else(|| AppError::Other("Could not determine app data directory".to_string()))?;
        let dir = data_dir.join("ticketsync");
        std::fs::create_dir_all(&dir)?;
        Ok(dir.join("ticketsync.db"))
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.pool_size == 0 {
            return Err(AppError::validation("pool size must be at least 1"));
        }
        if self.dedup_capacity == 0 {
            return Err(AppError::validation("dedup capacity must be at least 1"));
        }
        if self.import_batch_size == 0 {
            return Err(AppError::validation("import batch size must be at least 1"));
        }
        if self.time_buffer_minutes < 0 {
            return Err(AppError::validation("time buffer cannot be negative"));
        }
        Ok(())
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            pool_size: DEFAULT_POOL_SIZE,
            time_buffer_minutes: DEFAULT_TIME_BUFFER_MINUTES,
            dedup_capacity: DEFAULT_DEDUP_CAPACITY,
            import_batch_size: DEFAULT_IMPORT_BATCH_SIZE,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
