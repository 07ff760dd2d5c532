// src/repositories/mapping_repository.rs
//
// Mapping Store
//
// Default entries live in `mapping_defaults`, scoped entries in
// `mapping_scoped` keyed by (product, date, time-or-''). A scoped set is
// only ever written whole: `replace_scoped` deletes and reinserts inside a
// single IMMEDIATE transaction, so readers see the old set or the new one.

use chrono::NaiveDate;
use rusqlite::{params, Row, TransactionBehavior};
use std::collections::HashSet;
use std::sync::Arc;

use super::{format_date, invalid_column, parse_date_column, parse_timestamp_column};
use crate::db::ConnectionPool;
use crate::domain::{parse_scope_time, MappingEntry, MappingScope, ProductId, SourceIdentifiers};
use crate::error::AppResult;

// ---------------------------------------------------------------------
// Repository contract
// ---------------------------------------------------------------------
pub trait MappingRepository: Send + Sync {
    fn get_default(&self, product_id: &ProductId) -> AppResult<Option<MappingEntry>>;

    fn upsert_default(&self, entry: &MappingEntry) -> AppResult<()>;

    /// Returns true when a default existed.
    fn delete_default(&self, product_id: &ProductId) -> AppResult<bool>;

    /// Scoped entries of one product ordered by date, then time.
    fn list_scoped(&self, product_id: &ProductId) -> AppResult<Vec<MappingEntry>>;

    /// Replaces the whole scoped set of `product_id` with `entries`.
    /// Returns how many previously stored keys are gone afterwards.
    fn replace_scoped(&self, product_id: &ProductId, entries: &[MappingEntry]) -> AppResult<usize>;

    /// Scoped entries on `date` whose ticket class or POS item is `identifier`.
    fn find_scoped_by_identifier(
        &self,
        identifier: &str,
        date: NaiveDate,
    ) -> AppResult<Vec<MappingEntry>>;

    fn find_defaults_by_identifier(&self, identifier: &str) -> AppResult<Vec<MappingEntry>>;

    /// Scoped entries (any date) carrying `event_id`.
    fn find_scoped_by_event(&self, event_id: &str) -> AppResult<Vec<MappingEntry>>;

    fn find_defaults_by_event(&self, event_id: &str) -> AppResult<Vec<MappingEntry>>;
}

// ---------------------------------------------------------------------
// SQLite Implementation
// ---------------------------------------------------------------------
pub struct SqliteMappingRepository {
    pool: Arc<ConnectionPool>,
}

const SCOPED_COLUMNS: &str =
    "product_id, scope_date, scope_time, ticket_class_id, event_id, pos_item_id, updated_at";
const DEFAULT_COLUMNS: &str = "product_id, ticket_class_id, event_id, pos_item_id, updated_at";

impl SqliteMappingRepository {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    fn row_to_scoped(row: &Row) -> rusqlite::Result<MappingEntry> {
        let product_id: String = row.get(0)?;
        let date_str: String = row.get(1)?;
        let time_str: String = row.get(2)?;
        let updated_str: String = row.get(6)?;

        let date = parse_date_column(1, &date_str)?;
        let time = if time_str.is_empty() {
            None
        } else {
            Some(parse_scope_time(&time_str).map_err(|e| invalid_column(2, e.to_string()))?)
        };

        Ok(MappingEntry {
            product_id: ProductId::new(product_id),
            scope: MappingScope::Dated { date, time },
            identifiers: SourceIdentifiers::new(row.get(3)?, row.get(4)?, row.get(5)?),
            updated_at: parse_timestamp_column(6, &updated_str)?,
        })
    }

    fn row_to_default(row: &Row) -> rusqlite::Result<MappingEntry> {
        let product_id: String = row.get(0)?;
        let updated_str: String = row.get(4)?;

        Ok(MappingEntry {
            product_id: ProductId::new(product_id),
            scope: MappingScope::Default,
            identifiers: SourceIdentifiers::new(row.get(1)?, row.get(2)?, row.get(3)?),
            updated_at: parse_timestamp_column(4, &updated_str)?,
        })
    }

    fn query_scoped(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> AppResult<Vec<MappingEntry>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(args, Self::row_to_scoped)?;

        let mut entries = Vec::new();
        for entry in rows {
            entries.push(entry?);
        }
        Ok(entries)
    }

    fn query_defaults(
        &self,
        sql: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> AppResult<Vec<MappingEntry>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(args, Self::row_to_default)?;

        let mut entries = Vec::new();
        for entry in rows {
            entries.push(entry?);
        }
        Ok(entries)
    }
}

impl MappingRepository for SqliteMappingRepository {
    fn get_default(&self, product_id: &ProductId) -> AppResult<Option<MappingEntry>> {
        let sql = format!(
            "SELECT {} FROM mapping_defaults WHERE product_id = ?1",
            DEFAULT_COLUMNS
        );
        Ok(self
            .query_defaults(&sql, &[&product_id.as_str()])?
            .into_iter()
            .next())
    }

    fn upsert_default(&self, entry: &MappingEntry) -> AppResult<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO mapping_defaults (product_id, ticket_class_id, event_id, pos_item_id, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(product_id) DO UPDATE SET
                 ticket_class_id = excluded.ticket_class_id,
                 event_id = excluded.event_id,
                 pos_item_id = excluded.pos_item_id,
                 updated_at = excluded.updated_at",
            params![
                entry.product_id.as_str(),
                entry.identifiers.ticket_class_id,
                entry.identifiers.event_id,
                entry.identifiers.pos_item_id,
                entry.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn delete_default(&self, product_id: &ProductId) -> AppResult<bool> {
        let conn = self.pool.get()?;
        let removed = conn.execute(
            "DELETE FROM mapping_defaults WHERE product_id = ?1",
            params![product_id.as_str()],
        )?;
        Ok(removed > 0)
    }

    fn list_scoped(&self, product_id: &ProductId) -> AppResult<Vec<MappingEntry>> {
        let sql = format!(
            "SELECT {} FROM mapping_scoped WHERE product_id = ?1 ORDER BY scope_date, scope_time",
            SCOPED_COLUMNS
        );
        self.query_scoped(&sql, &[&product_id.as_str()])
    }

    fn replace_scoped(&self, product_id: &ProductId, entries: &[MappingEntry]) -> AppResult<usize> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let previous: HashSet<(String, String)> = {
            let mut stmt = tx.prepare(
                "SELECT scope_date, scope_time FROM mapping_scoped WHERE product_id = ?1",
            )?;
            let rows = stmt.query_map(params![product_id.as_str()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            rows.collect::<rusqlite::Result<_>>()?
        };

        tx.execute(
            "DELETE FROM mapping_scoped WHERE product_id = ?1",
            params![product_id.as_str()],
        )?;

        let mut kept = HashSet::new();
        {
            let mut insert = tx.prepare(
                "INSERT OR REPLACE INTO mapping_scoped
                     (product_id, scope_date, scope_time, ticket_class_id, event_id, pos_item_id, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;

            for entry in entries {
                let Some(date) = entry.scope.date() else {
                    continue;
                };
                let key = (format_date(date), entry.scope.time_key());
                insert.execute(params![
                    product_id.as_str(),
                    key.0,
                    key.1,
                    entry.identifiers.ticket_class_id,
                    entry.identifiers.event_id,
                    entry.identifiers.pos_item_id,
                    entry.updated_at.to_rfc3339(),
                ])?;
                kept.insert(key);
            }
        }

        tx.commit()?;

        Ok(previous.difference(&kept).count())
    }

    fn find_scoped_by_identifier(
        &self,
        identifier: &str,
        date: NaiveDate,
    ) -> AppResult<Vec<MappingEntry>> {
        let sql = format!(
            "SELECT {} FROM mapping_scoped
             WHERE scope_date = ?1 AND (ticket_class_id = ?2 OR pos_item_id = ?2)
             ORDER BY scope_time, product_id",
            SCOPED_COLUMNS
        );
        self.query_scoped(&sql, &[&format_date(date), &identifier])
    }

    fn find_defaults_by_identifier(&self, identifier: &str) -> AppResult<Vec<MappingEntry>> {
        let sql = format!(
            "SELECT {} FROM mapping_defaults
             WHERE ticket_class_id = ?1 OR pos_item_id = ?1
             ORDER BY product_id",
            DEFAULT_COLUMNS
        );
        self.query_defaults(&sql, &[&identifier])
    }

    fn find_scoped_by_event(&self, event_id: &str) -> AppResult<Vec<MappingEntry>> {
        let sql = format!(
            "SELECT {} FROM mapping_scoped WHERE event_id = ?1
             ORDER BY scope_date, scope_time, product_id",
            SCOPED_COLUMNS
        );
        self.query_scoped(&sql, &[&event_id])
    }

    fn find_defaults_by_event(&self, event_id: &str) -> AppResult<Vec<MappingEntry>> {
        let sql = format!(
            "SELECT {} FROM mapping_defaults WHERE event_id = ?1 ORDER BY product_id",
            DEFAULT_COLUMNS
        );
        self.query_defaults(&sql, &[&event_id])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connection::create_test_pool;
    use chrono::{NaiveTime, TimeZone, Utc};

    fn scoped(product: &str, date: &str, time: Option<&str>, ticket: &str) -> MappingEntry {
        MappingEntry::scoped(
            ProductId::from(product),
            NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            time.map(|t| NaiveTime::parse_from_str(t, "%H:%M").unwrap()),
            SourceIdentifiers::new(Some(ticket.to_string()), Some("EV-1".to_string()), None),
        )
    }

    #[test]
    fn test_replace_scoped_removes_stale_keys() {
        let (_dir, pool) = create_test_pool();
        let repo = SqliteMappingRepository::new(pool);
        let product = ProductId::from("101");

        let a = scoped("101", "2025-06-01", Some("20:00"), "A");
        let b = scoped("101", "2025-06-02", None, "B");
        let c = scoped("101", "2025-06-03", Some("18:30"), "C");

        assert_eq!(repo.replace_scoped(&product, &[a.clone(), b.clone(), c]).unwrap(), 0);
        assert_eq!(repo.list_scoped(&product).unwrap().len(), 3);

        assert_eq!(repo.replace_scoped(&product, &[a, b]).unwrap(), 1);
        let stored = repo.list_scoped(&product).unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored
            .iter()
            .all(|e| e.identifiers.ticket_class_id.as_deref() != Some("C")));
    }

    #[test]
    fn test_replace_scoped_keeps_entry_timestamp() {
        let (_dir, pool) = create_test_pool();
        let repo = SqliteMappingRepository::new(pool);
        let product = ProductId::from("101");

        let mut entry = scoped("101", "2025-06-01", Some("20:00"), "A");
        entry.updated_at = Utc.with_ymd_and_hms(2025, 5, 30, 8, 0, 0).unwrap();

        repo.replace_scoped(&product, &[entry.clone()]).unwrap();
        let stored = repo.list_scoped(&product).unwrap();
        assert_eq!(stored[0].updated_at, entry.updated_at);
    }

    #[test]
    fn test_replace_scoped_leaves_other_products() {
        let (_dir, pool) = create_test_pool();
        let repo = SqliteMappingRepository::new(pool);

        repo.replace_scoped(
            &ProductId::from("1"),
            &[scoped("1", "2025-06-01", None, "X")],
        )
        .unwrap();
        repo.replace_scoped(
            &ProductId::from("2"),
            &[scoped("2", "2025-06-01", None, "Y")],
        )
        .unwrap();
        repo.replace_scoped(&ProductId::from("1"), &[]).unwrap();

        assert!(repo.list_scoped(&ProductId::from("1")).unwrap().is_empty());
        assert_eq!(repo.list_scoped(&ProductId::from("2")).unwrap().len(), 1);
    }

    #[test]
    fn test_scoped_time_roundtrips_as_absent() {
        let (_dir, pool) = create_test_pool();
        let repo = SqliteMappingRepository::new(pool);
        let product = ProductId::from("5");

        repo.replace_scoped(&product, &[scoped("5", "2025-07-04", None, "T")])
            .unwrap();
        let stored = repo.list_scoped(&product).unwrap();
        assert_eq!(stored[0].scope.time(), None);
        assert_eq!(stored[0].scope.time_key(), "");
    }

    #[test]
    fn test_default_upsert_and_lookup() {
        let (_dir, pool) = create_test_pool();
        let repo = SqliteMappingRepository::new(pool);
        let product = ProductId::from("9");

        let entry = MappingEntry::default_for(
            product.clone(),
            SourceIdentifiers::new(None, Some("EV-9".to_string()), Some("POS-9".to_string())),
        );
        repo.upsert_default(&entry).unwrap();

        assert_eq!(repo.find_defaults_by_identifier("POS-9").unwrap().len(), 1);
        assert_eq!(repo.find_defaults_by_event("EV-9").unwrap().len(), 1);
        assert!(repo.find_defaults_by_identifier("EV-9").unwrap().is_empty());

        assert!(repo.delete_default(&product).unwrap());
        assert!(repo.get_default(&product).unwrap().is_none());
    }

    #[test]
    fn test_find_scoped_by_identifier_filters_date() {
        let (_dir, pool) = create_test_pool();
        let repo = SqliteMappingRepository::new(pool);

        repo.replace_scoped(
            &ProductId::from("101"),
            &[
                scoped("101", "2025-06-01", Some("20:00"), "TIX-1"),
                scoped("101", "2025-06-02", Some("20:00"), "TIX-1"),
            ],
        )
        .unwrap();

        let day = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let found = repo.find_scoped_by_identifier("TIX-1", day).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].scope.date(), Some(day));
        assert_eq!(repo.find_scoped_by_event("EV-1").unwrap().len(), 2);
    }
}
