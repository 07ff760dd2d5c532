// src/domain/import.rs
//
// Historical Import Domain
//
// Externalized cursor state, the page shape returned by source feeds and the
// structured result of one batch. The importer holds no state between calls:
// everything needed to resume lives in `ImportCursor`.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::{DateRange, DomainError, DomainResult, ProductId, SaleSource};

/// Native pagination of a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CursorPosition {
    /// Offset-based (storefront)
    Offset { offset: u64 },
    /// Page/continuation based (ticketing platform)
    Page {
        page: u32,
        continuation: Option<String>,
    },
}

impl CursorPosition {
    pub fn first_offset() -> Self {
        CursorPosition::Offset { offset: 0 }
    }

    pub fn first_page() -> Self {
        CursorPosition::Page {
            page: 1,
            continuation: None,
        }
    }
}

/// Resumable import state, owned by the caller between batches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportCursor {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub position: CursorPosition,
    /// Index into the registered feed list for multi-source walks
    #[serde(default)]
    pub source_index: usize,
}

impl ImportCursor {
    pub fn start(range: DateRange, position: CursorPosition) -> Self {
        Self {
            start_date: range.start,
            end_date: range.end,
            position,
            source_index: 0,
        }
    }

    pub fn range(&self) -> DomainResult<DateRange> {
        DateRange::new(self.start_date, self.end_date)
    }

    /// A cursor must describe the same range the caller asks for.
    pub fn validate_for(&self, range: &DateRange) -> DomainResult<()> {
        let own = self.range()?;
        if own != *range {
            return Err(DomainError::InvariantViolation(format!(
                "Cursor range {}..{} does not match requested {}..{}",
                own.start, own.end, range.start, range.end
            )));
        }
        Ok(())
    }
}

/// How a fetched line identifies what was sold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SaleIdentifier {
    /// Storefront lines already carry the canonical product
    Product { product_id: ProductId },
    /// Ticket class and/or event on the ticketing platform
    Ticket {
        ticket_class_id: Option<String>,
        event_id: Option<String>,
    },
    /// Point-of-sale catalog item
    PosItem { item_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalSaleLine {
    pub identifier: SaleIdentifier,
    pub name: Option<String>,
    pub quantity: u32,
    pub total: Option<Decimal>,
    pub occurrence_date: Option<NaiveDate>,
    pub occurrence_time: Option<NaiveTime>,
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
}

impl ExternalSaleLine {
    pub fn product(product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self::with_identifier(
            SaleIdentifier::Product {
                product_id: product_id.into(),
            },
            quantity,
        )
    }

    pub fn ticket(ticket_class_id: &str, event_id: Option<&str>, quantity: u32) -> Self {
        Self::with_identifier(
            SaleIdentifier::Ticket {
                ticket_class_id: Some(ticket_class_id.to_string()),
                event_id: event_id.map(str::to_string),
            },
            quantity,
        )
    }

    fn with_identifier(identifier: SaleIdentifier, quantity: u32) -> Self {
        Self {
            identifier,
            name: None,
            quantity,
            total: None,
            occurrence_date: None,
            occurrence_time: None,
            meta: BTreeMap::new(),
        }
    }

    pub fn at(mut self, date: NaiveDate, time: Option<NaiveTime>) -> Self {
        self.occurrence_date = Some(date);
        self.occurrence_time = time;
        self
    }

    pub fn with_total(mut self, total: Decimal) -> Self {
        self.total = Some(total);
        self
    }
}

/// One external order / purchase as returned by a source feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalSaleRecord {
    pub external_ref: String,
    pub occurred_at: DateTime<Utc>,
    pub currency: Option<String>,
    pub customer: Option<String>,
    pub lines: Vec<ExternalSaleLine>,
}

impl ExternalSaleRecord {
    pub fn new(external_ref: impl Into<String>, occurred_at: DateTime<Utc>) -> Self {
        Self {
            external_ref: external_ref.into(),
            occurred_at,
            currency: None,
            customer: None,
            lines: Vec::new(),
        }
    }

    pub fn with_line(mut self, line: ExternalSaleLine) -> Self {
        self.lines.push(line);
        self
    }
}

/// One page fetched from a feed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedPage {
    pub records: Vec<ExternalSaleRecord>,
    /// Opaque continuation handed back by page-based sources
    pub continuation: Option<String>,
}

/// Phases of a single batch, reported in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportPhase {
    Pending,
    Fetching,
    Recording,
    Advancing,
    Continuing,
    Complete,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportLogEntry {
    pub phase: ImportPhase,
    pub external_ref: Option<String>,
    pub message: String,
}

impl ImportLogEntry {
    pub fn phase(phase: ImportPhase, message: impl Into<String>) -> Self {
        Self {
            phase,
            external_ref: None,
            message: message.into(),
        }
    }

    pub fn record(phase: ImportPhase, external_ref: &str, message: impl Into<String>) -> Self {
        Self {
            phase,
            external_ref: Some(external_ref.to_string()),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportBatchResult {
    pub source: SaleSource,
    /// Records fetched and examined in this batch
    pub processed_count: usize,
    /// Records that changed the aggregation
    pub imported_count: usize,
    /// Records skipped as already imported
    pub skipped_count: usize,
    /// Records with at least one failed line
    pub failed_count: usize,
    pub next_cursor: Option<ImportCursor>,
    pub complete: bool,
    pub logs: Vec<ImportLogEntry>,
}
