// src/domain/mod.rs
//
// Domain Root - The Single Source of Truth for Domain API
//
// This file MUST declare all domain modules and re-export their public API.
// All other modules import from `crate::domain::*`

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod catalog;
pub mod common;
pub mod import;
pub mod mapping;
pub mod order;
pub mod sale;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

// Shared value objects
pub use common::{parse_scope_date, parse_scope_time, DateRange, ProductId};

// Catalog (external collaborator view)
pub use catalog::CatalogProduct;

// Mapping Domain
pub use mapping::{
    normalize_mapping_input, validate_mapping_entry, EntryIssue, IdentifierResolution,
    MappingEntry, MappingInput, MappingScope, MatchPrecedence, ProductMappings, ProductMatch,
    SaveMappingResult,
    SourceIdentifiers,
};

// Sale Domain
pub use sale::{
    validate_sale_event, DailySaleRecord, DedupKey, LedgerStats, OrderAuditEntry, PeriodSummary,
    ProductSummaryRecord, Provenance, RecordOutcome, SaleEvent, SaleSource, SourceSale,
};

// Order Domain
pub use order::{LineFailure, OrderIngestResult, OrderLineItem, RecordedGroup, StorefrontOrder};

// Import Domain
pub use import::{
    CursorPosition, ExternalSaleLine, ExternalSaleRecord, FeedPage, ImportBatchResult,
    ImportCursor, ImportLogEntry, ImportPhase, SaleIdentifier,
};

// ============================================================================
// DOMAIN ERROR TYPES
// ============================================================================

use thiserror::Error;

/// Domain-level errors
/// These represent violations of business rules and invariants
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Invalid date '{0}' (expected YYYY-MM-DD)")]
    InvalidDate(String),

    #[error("Invalid time '{0}' (expected HH:MM)")]
    InvalidTime(String),

    #[error("Missing identifier: {0}")]
    MissingIdentifier(String),
}

/// Domain result type
pub type DomainResult<T> = Result<T, DomainError>;
