// src/repositories/mod.rs
//
// Repository layer
//
// CRITICAL RULES:
// - Repositories are DUMB data mappers
// - NO business logic
// - NO event emission
// - NO cross-repository calls
// - Explicit SQL only
//
// One repository per named store: mappings, dedup ledger, aggregation,
// import cursors. The aggregation repository calls the ledger's free
// functions on its own transaction so claim + increment commit together.

pub mod cursor_repository;
pub mod ledger_repository;
pub mod mapping_repository;
pub mod sales_repository;

pub use cursor_repository::{ImportCursorRepository, SqliteImportCursorRepository};
pub use ledger_repository::{LedgerRepository, SqliteLedgerRepository};
pub use mapping_repository::{MappingRepository, SqliteMappingRepository};
pub use sales_repository::{AggregationWrite, SalesRepository, SqliteSalesRepository};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Conversion failure for a column that holds text we could not interpret.
pub(crate) fn invalid_column(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            message,
        )),
    )
}

pub(crate) fn parse_date_column(idx: usize, raw: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| invalid_column(idx, format!("Invalid date '{}': {}", raw, e)))
}

pub(crate) fn parse_timestamp_column(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| invalid_column(idx, format!("Invalid timestamp '{}': {}", raw, e)))
}

pub(crate) fn parse_decimal_column(idx: usize, raw: &str) -> rusqlite::Result<Decimal> {
    Decimal::from_str(raw)
        .map_err(|e| invalid_column(idx, format!("Invalid amount '{}': {}", raw, e)))
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
