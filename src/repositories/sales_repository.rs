// src/repositories/sales_repository.rs
//
// Aggregation Store
//
// CRITICAL RULES:
// - `apply_sale` is the only writer of daily_sales, daily_sale_orders and
//   product_summaries
// - The ledger claim and the increments share one IMMEDIATE transaction:
//   either the key is claimed and every table moved, or nothing changed
// - Daily rows are upserted, never replaced (REPLACE would cascade-delete
//   the audit list)

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

use super::ledger_repository::{claim_key, evict_overflow};
use super::{
    format_date, invalid_column, parse_date_column, parse_decimal_column, parse_timestamp_column,
};
use crate::db::ConnectionPool;
use crate::domain::{
    CatalogProduct, DailySaleRecord, DateRange, DedupKey, OrderAuditEntry, PeriodSummary,
    ProductId, ProductSummaryRecord, Provenance, SaleEvent, SaleSource,
};
use crate::error::AppResult;

/// Everything needed to apply one sale to the aggregation.
#[derive(Debug, Clone)]
pub struct AggregationWrite<'a> {
    pub dedup_key: DedupKey,
    pub provenance: Provenance,
    /// Day the sale is recorded under
    pub sale_date: NaiveDate,
    pub sale: &'a SaleEvent,
    pub product: &'a CatalogProduct,
    /// Resolved line amount
    pub amount: Decimal,
    pub recorded_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------
// Repository contract
// ---------------------------------------------------------------------
pub trait SalesRepository: Send + Sync {
    /// Claims `write.dedup_key` and applies the sale atomically.
    /// Returns false, with nothing written, when the key was already claimed.
    fn apply_sale(&self, write: &AggregationWrite<'_>) -> AppResult<bool>;

    fn get_daily_record(
        &self,
        sale_date: NaiveDate,
        product_key: &str,
    ) -> AppResult<Option<DailySaleRecord>>;

    /// Records in range ordered by sale date, then product key, each with
    /// its audit list.
    fn list_daily(
        &self,
        range: &DateRange,
        product_id: Option<&ProductId>,
        event_date: Option<NaiveDate>,
    ) -> AppResult<Vec<DailySaleRecord>>;

    fn list_summaries(&self, range: &DateRange) -> AppResult<Vec<ProductSummaryRecord>>;

    fn period_summary(&self, range: &DateRange) -> AppResult<PeriodSummary>;
}

// ---------------------------------------------------------------------
// SQLite Implementation
// ---------------------------------------------------------------------
pub struct SqliteSalesRepository {
    pool: Arc<ConnectionPool>,
    ledger_capacity: usize,
}

const DAILY_COLUMNS: &str = "sale_date, product_key, product_id, product_name, sku, event_date,
     quantity, revenue, web_qty, ticketing_qty, pos_qty, updated_at";

impl SqliteSalesRepository {
    pub fn new(pool: Arc<ConnectionPool>, ledger_capacity: usize) -> Self {
        Self {
            pool,
            ledger_capacity,
        }
    }

    fn row_to_daily(row: &Row) -> rusqlite::Result<DailySaleRecord> {
        let sale_date_str: String = row.get(0)?;
        let event_date_str: Option<String> = row.get(5)?;
        let revenue_str: String = row.get(7)?;
        let updated_str: String = row.get(11)?;

        let event_date = match event_date_str {
            Some(raw) => Some(parse_date_column(5, &raw)?),
            None => None,
        };

        Ok(DailySaleRecord {
            sale_date: parse_date_column(0, &sale_date_str)?,
            product_key: row.get(1)?,
            product_id: ProductId::new(row.get::<_, String>(2)?),
            product_name: row.get(3)?,
            sku: row.get(4)?,
            event_date,
            quantity: row.get::<_, i64>(6)? as u64,
            revenue: parse_decimal_column(7, &revenue_str)?,
            web_qty: row.get::<_, i64>(8)? as u64,
            ticketing_qty: row.get::<_, i64>(9)? as u64,
            pos_qty: row.get::<_, i64>(10)? as u64,
            updated_at: parse_timestamp_column(11, &updated_str)?,
            orders: Vec::new(),
        })
    }

    fn row_to_audit(row: &Row) -> rusqlite::Result<OrderAuditEntry> {
        let id_str: String = row.get(0)?;
        let source_str: String = row.get(1)?;
        let amount_str: String = row.get(4)?;
        let provenance_str: String = row.get(7)?;
        let recorded_str: String = row.get(8)?;

        let id = Uuid::parse_str(&id_str)
            .map_err(|e| invalid_column(0, format!("Invalid audit UUID '{}': {}", id_str, e)))?;
        let source = source_str
            .parse::<SaleSource>()
            .map_err(|e| invalid_column(1, e.to_string()))?;
        let provenance = Provenance::parse(&provenance_str).ok_or_else(|| {
            invalid_column(7, format!("Invalid provenance '{}'", provenance_str))
        })?;

        Ok(OrderAuditEntry {
            id,
            source,
            external_ref: row.get(2)?,
            quantity: row.get::<_, i64>(3)? as u32,
            amount: parse_decimal_column(4, &amount_str)?,
            currency: row.get(5)?,
            customer: row.get(6)?,
            provenance,
            recorded_at: parse_timestamp_column(8, &recorded_str)?,
        })
    }

    fn row_to_summary(row: &Row) -> rusqlite::Result<ProductSummaryRecord> {
        let date_str: String = row.get(0)?;
        let breakdown_str: String = row.get(3)?;

        let event_dates: BTreeMap<String, u64> = serde_json::from_str(&breakdown_str)
            .map_err(|e| invalid_column(3, format!("Invalid event date breakdown: {}", e)))?;

        Ok(ProductSummaryRecord {
            summary_date: parse_date_column(0, &date_str)?,
            product_id: ProductId::new(row.get::<_, String>(1)?),
            total_quantity: row.get::<_, i64>(2)? as u64,
            event_dates,
        })
    }

    fn load_daily(
        conn: &Connection,
        sale_date: NaiveDate,
        product_key: &str,
    ) -> rusqlite::Result<Option<DailySaleRecord>> {
        let sql = format!(
            "SELECT {} FROM daily_sales WHERE sale_date = ?1 AND product_key = ?2",
            DAILY_COLUMNS
        );
        conn.query_row(
            &sql,
            params![format_date(sale_date), product_key],
            Self::row_to_daily,
        )
        .optional()
    }

    fn load_orders(
        conn: &Connection,
        sale_date: NaiveDate,
        product_key: &str,
    ) -> rusqlite::Result<Vec<OrderAuditEntry>> {
        let mut stmt = conn.prepare(
            "SELECT id, source, external_ref, quantity, amount, currency, customer, provenance, recorded_at
             FROM daily_sale_orders
             WHERE sale_date = ?1 AND product_key = ?2
             ORDER BY seq",
        )?;
        let rows = stmt.query_map(
            params![format_date(sale_date), product_key],
            Self::row_to_audit,
        )?;
        rows.collect()
    }

    fn load_summary(
        conn: &Connection,
        summary_date: NaiveDate,
        product_id: &ProductId,
    ) -> rusqlite::Result<Option<ProductSummaryRecord>> {
        conn.query_row(
            "SELECT summary_date, product_id, total_quantity, event_dates
             FROM product_summaries WHERE summary_date = ?1 AND product_id = ?2",
            params![format_date(summary_date), product_id.as_str()],
            Self::row_to_summary,
        )
        .optional()
    }

    fn upsert_daily(conn: &Connection, record: &DailySaleRecord) -> rusqlite::Result<()> {
        conn.execute(
            "INSERT INTO daily_sales
                 (sale_date, product_key, product_id, product_name, sku, event_date,
                  quantity, revenue, web_qty, ticketing_qty, pos_qty, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(sale_date, product_key) DO UPDATE SET
                 quantity = excluded.quantity,
                 revenue = excluded.revenue,
                 web_qty = excluded.web_qty,
                 ticketing_qty = excluded.ticketing_qty,
                 pos_qty = excluded.pos_qty,
                 updated_at = excluded.updated_at",
            params![
                format_date(record.sale_date),
                record.product_key,
                record.product_id.as_str(),
                record.product_name,
                record.sku,
                record.event_date.map(format_date),
                record.quantity as i64,
                record.revenue.to_string(),
                record.web_qty as i64,
                record.ticketing_qty as i64,
                record.pos_qty as i64,
                record.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn insert_audit(
        conn: &Connection,
        record: &DailySaleRecord,
        entry: &OrderAuditEntry,
    ) -> rusqlite::Result<()> {
        conn.execute(
            "INSERT INTO daily_sale_orders
                 (id, sale_date, product_key, source, external_ref, quantity, amount,
                  currency, customer, provenance, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                entry.id.to_string(),
                format_date(record.sale_date),
                record.product_key,
                entry.source.as_str(),
                entry.external_ref,
                entry.quantity as i64,
                entry.amount.to_string(),
                entry.currency,
                entry.customer,
                entry.provenance.as_str(),
                entry.recorded_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn upsert_summary(conn: &Connection, summary: &ProductSummaryRecord) -> AppResult<()> {
        let breakdown = serde_json::to_string(&summary.event_dates)?;
        conn.execute(
            "INSERT INTO product_summaries (summary_date, product_id, total_quantity, event_dates)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(summary_date, product_id) DO UPDATE SET
                 total_quantity = excluded.total_quantity,
                 event_dates = excluded.event_dates",
            params![
                format_date(summary.summary_date),
                summary.product_id.as_str(),
                summary.total_quantity as i64,
                breakdown,
            ],
        )?;
        Ok(())
    }
}

impl SalesRepository for SqliteSalesRepository {
    fn apply_sale(&self, write: &AggregationWrite<'_>) -> AppResult<bool> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if !claim_key(&tx, &write.dedup_key, write.provenance, write.recorded_at)? {
            return Ok(false);
        }

        let product_key = write.sale.product_key();
        let mut record = match Self::load_daily(&tx, write.sale_date, &product_key)? {
            Some(existing) => existing,
            None => DailySaleRecord::open(
                write.sale_date,
                write.sale,
                write.product,
                write.recorded_at,
            ),
        };

        let entry = OrderAuditEntry::from_sale(
            write.sale,
            write.amount,
            write.provenance,
            write.recorded_at,
        );
        record.apply(write.sale, entry.clone());
        Self::upsert_daily(&tx, &record)?;
        Self::insert_audit(&tx, &record, &entry)?;

        let mut summary = match Self::load_summary(&tx, write.sale_date, &write.sale.product_id)? {
            Some(existing) => existing,
            None => ProductSummaryRecord::open(write.sale_date, write.sale.product_id.clone()),
        };
        summary.apply(write.sale.quantity, write.sale.event_date);
        Self::upsert_summary(&tx, &summary)?;

        if write.provenance == Provenance::Live {
            evict_overflow(&tx, self.ledger_capacity)?;
        }

        tx.commit()?;
        Ok(true)
    }

    fn get_daily_record(
        &self,
        sale_date: NaiveDate,
        product_key: &str,
    ) -> AppResult<Option<DailySaleRecord>> {
        let conn = self.pool.get()?;
        let Some(mut record) = Self::load_daily(&conn, sale_date, product_key)? else {
            return Ok(None);
        };
        record.orders = Self::load_orders(&conn, sale_date, product_key)?;
        Ok(Some(record))
    }

    fn list_daily(
        &self,
        range: &DateRange,
        product_id: Option<&ProductId>,
        event_date: Option<NaiveDate>,
    ) -> AppResult<Vec<DailySaleRecord>> {
        let conn = self.pool.get()?;
        let sql = format!(
            "SELECT {} FROM daily_sales
             WHERE sale_date BETWEEN ?1 AND ?2
               AND (?3 IS NULL OR product_id = ?3)
               AND (?4 IS NULL OR event_date = ?4)
             ORDER BY sale_date, product_key",
            DAILY_COLUMNS
        );

        let mut records = {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(
                params![
                    format_date(range.start),
                    format_date(range.end),
                    product_id.map(|p| p.as_str()),
                    event_date.map(format_date),
                ],
                Self::row_to_daily,
            )?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };

        for record in &mut records {
            record.orders = Self::load_orders(&conn, record.sale_date, &record.product_key)?;
        }
        Ok(records)
    }

    fn list_summaries(&self, range: &DateRange) -> AppResult<Vec<ProductSummaryRecord>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT summary_date, product_id, total_quantity, event_dates
             FROM product_summaries
             WHERE summary_date BETWEEN ?1 AND ?2
             ORDER BY summary_date, product_id",
        )?;
        let rows = stmt.query_map(
            params![format_date(range.start), format_date(range.end)],
            Self::row_to_summary,
        )?;

        let mut summaries = Vec::new();
        for summary in rows {
            summaries.push(summary?);
        }
        Ok(summaries)
    }

    fn period_summary(&self, range: &DateRange) -> AppResult<PeriodSummary> {
        let conn = self.pool.get()?;
        let start = format_date(range.start);
        let end = format_date(range.end);

        let mut totals = PeriodSummary {
            range: *range,
            total_quantity: 0,
            total_revenue: Decimal::ZERO,
            web_qty: 0,
            ticketing_qty: 0,
            pos_qty: 0,
            product_count: 0,
            day_count: 0,
            order_entries: 0,
        };
        let mut products = HashSet::new();
        let mut days = HashSet::new();

        {
            let mut stmt = conn.prepare(
                "SELECT sale_date, product_id, quantity, revenue, web_qty, ticketing_qty, pos_qty
                 FROM daily_sales WHERE sale_date BETWEEN ?1 AND ?2",
            )?;
            let mut rows = stmt.query(params![start, end])?;
            while let Some(row) = rows.next()? {
                let revenue_str: String = row.get(3)?;
                days.insert(row.get::<_, String>(0)?);
                products.insert(row.get::<_, String>(1)?);
                totals.total_quantity += row.get::<_, i64>(2)? as u64;
                totals.total_revenue += parse_decimal_column(3, &revenue_str)?;
                totals.web_qty += row.get::<_, i64>(4)? as u64;
                totals.ticketing_qty += row.get::<_, i64>(5)? as u64;
                totals.pos_qty += row.get::<_, i64>(6)? as u64;
            }
        }

        let entries: i64 = conn.query_row(
            "SELECT COUNT(*) FROM daily_sale_orders WHERE sale_date BETWEEN ?1 AND ?2",
            params![start, end],
            |row| row.get(0),
        )?;

        totals.product_count = products.len();
        totals.day_count = days.len();
        totals.order_entries = entries as usize;
        Ok(totals)
    }
}
