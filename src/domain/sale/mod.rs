// src/domain/sale/mod.rs
//
// Sale Domain
//
// Normalized sale events, dedup keys and the aggregation records they feed.

pub mod aggregate;
pub mod entity;
pub mod ledger;

pub use aggregate::{
    DailySaleRecord, OrderAuditEntry, PeriodSummary, ProductSummaryRecord, RecordOutcome,
};
pub use entity::{product_key, validate_sale_event, SaleEvent, SaleSource, SourceSale};
pub use ledger::{DedupKey, LedgerStats, Provenance};
