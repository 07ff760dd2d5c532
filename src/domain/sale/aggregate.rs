// Aggregation records.
//
// CRITICAL RULES:
// - Quantities and revenue are only ever incremented
// - A new record starts with every source counter at zero
// - The summary view moves in lockstep with the daily record

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::entity::{SaleEvent, SaleSource};
use super::ledger::Provenance;
use crate::domain::{CatalogProduct, DateRange, ProductId};

/// One line of the append-only audit list kept on a daily record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAuditEntry {
    pub id: Uuid,
    pub source: SaleSource,
    pub external_ref: String,
    pub quantity: u32,
    pub amount: Decimal,
    pub currency: Option<String>,
    pub customer: Option<String>,
    pub provenance: Provenance,
    pub recorded_at: DateTime<Utc>,
}

impl OrderAuditEntry {
    pub fn from_sale(
        sale: &SaleEvent,
        amount: Decimal,
        provenance: Provenance,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: sale.source,
            external_ref: sale.external_ref.clone(),
            quantity: sale.quantity,
            amount,
            currency: sale.currency.clone(),
            customer: sale.customer.clone(),
            provenance,
            recorded_at,
        }
    }
}

/// Sales of one product key on one recording day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySaleRecord {
    pub sale_date: NaiveDate,
    pub product_key: String,
    pub product_id: ProductId,

    /// Snapshot of the catalog at first sale of the day
    pub product_name: String,
    pub sku: Option<String>,

    pub event_date: Option<NaiveDate>,
    pub quantity: u64,
    pub revenue: Decimal,
    pub web_qty: u64,
    pub ticketing_qty: u64,
    pub pos_qty: u64,
    pub updated_at: DateTime<Utc>,
    pub orders: Vec<OrderAuditEntry>,
}

impl DailySaleRecord {
    /// Empty record for a (day, product key) pair seen for the first time.
    pub fn open(
        sale_date: NaiveDate,
        sale: &SaleEvent,
        product: &CatalogProduct,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            sale_date,
            product_key: sale.product_key(),
            product_id: sale.product_id.clone(),
            product_name: product.name.clone(),
            sku: product.sku.clone(),
            event_date: sale.event_date,
            quantity: 0,
            revenue: Decimal::ZERO,
            web_qty: 0,
            ticketing_qty: 0,
            pos_qty: 0,
            updated_at: now,
            orders: Vec::new(),
        }
    }

    /// Adds a sale on top of whatever is already recorded.
    pub fn apply(&mut self, sale: &SaleEvent, entry: OrderAuditEntry) {
        let qty = u64::from(sale.quantity);
        self.quantity += qty;
        self.revenue += entry.amount;
        match sale.source {
            SaleSource::Storefront => self.web_qty += qty,
            SaleSource::Ticketing => self.ticketing_qty += qty,
            SaleSource::Pos => self.pos_qty += qty,
        }
        self.updated_at = entry.recorded_at;
        self.orders.push(entry);
    }
}

/// Per-day, per-product totals with the occurrence-date breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSummaryRecord {
    pub summary_date: NaiveDate,
    pub product_id: ProductId,
    pub total_quantity: u64,
    /// `YYYY-MM-DD` occurrence date -> quantity
    pub event_dates: BTreeMap<String, u64>,
}

impl ProductSummaryRecord {
    pub fn open(summary_date: NaiveDate, product_id: ProductId) -> Self {
        Self {
            summary_date,
            product_id,
            total_quantity: 0,
            event_dates: BTreeMap::new(),
        }
    }

    pub fn apply(&mut self, quantity: u32, event_date: Option<NaiveDate>) {
        let qty = u64::from(quantity);
        self.total_quantity += qty;
        if let Some(date) = event_date {
            *self
                .event_dates
                .entry(date.format("%Y-%m-%d").to_string())
                .or_insert(0) += qty;
        }
    }
}

/// Totals over a reporting period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub range: DateRange,
    pub total_quantity: u64,
    pub total_revenue: Decimal,
    pub web_qty: u64,
    pub ticketing_qty: u64,
    pub pos_qty: u64,
    pub product_count: usize,
    pub day_count: usize,
    pub order_entries: usize,
}

/// Result of a single record call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordOutcome {
    Recorded {
        sale_date: NaiveDate,
        product_key: String,
        quantity: u32,
    },
    SkippedDuplicate {
        dedup_key: String,
    },
}

impl RecordOutcome {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, RecordOutcome::SkippedDuplicate { .. })
    }
}
