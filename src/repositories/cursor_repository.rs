// src/repositories/cursor_repository.rs
//
// Import Cursor Store
//
// One persisted cursor per source, stored as JSON. The importer never reads
// this table itself; hosts use it to resume a backfill across restarts.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use std::sync::Arc;

use crate::db::ConnectionPool;
use crate::domain::{ImportCursor, SaleSource};
use crate::error::AppResult;

pub trait ImportCursorRepository: Send + Sync {
    fn load(&self, source: SaleSource) -> AppResult<Option<ImportCursor>>;

    fn save(&self, source: SaleSource, cursor: &ImportCursor) -> AppResult<()>;

    fn clear(&self, source: SaleSource) -> AppResult<()>;
}

pub struct SqliteImportCursorRepository {
    pool: Arc<ConnectionPool>,
}

impl SqliteImportCursorRepository {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }
}

impl ImportCursorRepository for SqliteImportCursorRepository {
    fn load(&self, source: SaleSource) -> AppResult<Option<ImportCursor>> {
        let conn = self.pool.get()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT cursor_json FROM import_cursors WHERE source = ?1",
                params![source.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn save(&self, source: SaleSource, cursor: &ImportCursor) -> AppResult<()> {
        let conn = self.pool.get()?;
        let json = serde_json::to_string(cursor)?;
        conn.execute(
            "INSERT INTO import_cursors (source, cursor_json, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(source) DO UPDATE SET
                 cursor_json = excluded.cursor_json,
                 updated_at = excluded.updated_at",
            params![source.as_str(), json, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn clear(&self, source: SaleSource) -> AppResult<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "DELETE FROM import_cursors WHERE source = ?1",
            params![source.as_str()],
        )?;
        Ok(())
    }
}
