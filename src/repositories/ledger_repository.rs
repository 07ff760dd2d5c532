// src/repositories/ledger_repository.rs
//
// Dedup Ledger
//
// CRITICAL RULES:
// - A key is claimed with INSERT OR IGNORE on its fingerprint; the insert
//   that changes a row wins, every concurrent duplicate sees 0 rows changed
// - Only `live` rows are evicted, oldest first, once over capacity
// - `historical` rows are permanent
//
// The free functions take a plain `&Connection` so the aggregation
// repository can run them inside its own transaction.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Arc;

use crate::db::ConnectionPool;
use crate::domain::{DedupKey, LedgerStats, Provenance};
use crate::error::AppResult;

pub fn contains_key(conn: &Connection, key: &DedupKey) -> rusqlite::Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM sale_ledger WHERE fingerprint = ?1",
            params![key.fingerprint()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Returns true when this call inserted the key.
pub fn claim_key(
    conn: &Connection,
    key: &DedupKey,
    provenance: Provenance,
    at: DateTime<Utc>,
) -> rusqlite::Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO sale_ledger (fingerprint, dedup_key, provenance, recorded_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            key.fingerprint(),
            key.as_str(),
            provenance.as_str(),
            at.to_rfc3339_opts(SecondsFormat::Micros, true),
        ],
    )?;
    Ok(inserted == 1)
}

/// Drops the oldest live entries beyond `capacity`. Returns rows removed.
pub fn evict_overflow(conn: &Connection, capacity: usize) -> rusqlite::Result<usize> {
    let live: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sale_ledger WHERE provenance = 'live'",
        [],
        |row| row.get(0),
    )?;

    let overflow = live - capacity as i64;
    if overflow <= 0 {
        return Ok(0);
    }

    conn.execute(
        "DELETE FROM sale_ledger WHERE rowid IN (
             SELECT rowid FROM sale_ledger
             WHERE provenance = 'live'
             ORDER BY recorded_at ASC, rowid ASC
             LIMIT ?1
         )",
        params![overflow],
    )
}

// ---------------------------------------------------------------------
// Repository contract
// ---------------------------------------------------------------------
pub trait LedgerRepository: Send + Sync {
    fn contains(&self, key: &DedupKey) -> AppResult<bool>;

    /// Claims a key outside of any aggregation write (order keys, imported
    /// references), stamped with `at`. Returns false when it was already
    /// present.
    fn claim(&self, key: &DedupKey, provenance: Provenance, at: DateTime<Utc>)
        -> AppResult<bool>;

    fn stats(&self) -> AppResult<LedgerStats>;
}

// ---------------------------------------------------------------------
// SQLite Implementation
// ---------------------------------------------------------------------
pub struct SqliteLedgerRepository {
    pool: Arc<ConnectionPool>,
    capacity: usize,
}

impl SqliteLedgerRepository {
    pub fn new(pool: Arc<ConnectionPool>, capacity: usize) -> Self {
        Self { pool, capacity }
    }
}

impl LedgerRepository for SqliteLedgerRepository {
    fn contains(&self, key: &DedupKey) -> AppResult<bool> {
        let conn = self.pool.get()?;
        Ok(contains_key(&conn, key)?)
    }

    fn claim(
        &self,
        key: &DedupKey,
        provenance: Provenance,
        at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let conn = self.pool.get()?;
        let claimed = claim_key(&conn, key, provenance, at)?;
        if claimed && provenance == Provenance::Live {
            let evicted = evict_overflow(&conn, self.capacity)?;
            if evicted > 0 {
                log::debug!("Evicted {} live ledger entries over capacity", evicted);
            }
        }
        Ok(claimed)
    }

    fn stats(&self) -> AppResult<LedgerStats> {
        let conn = self.pool.get()?;
        let (live, historical): (i64, i64) = conn.query_row(
            "SELECT
                 COALESCE(SUM(CASE WHEN provenance = 'live' THEN 1 ELSE 0 END), 0),
                 COALESCE(SUM(CASE WHEN provenance = 'historical' THEN 1 ELSE 0 END), 0)
             FROM sale_ledger",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(LedgerStats {
            live_entries: live as usize,
            historical_entries: historical as usize,
            capacity: self.capacity,
        })
    }
}
