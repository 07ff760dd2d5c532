// src/lib.rs
// TicketSync - mapping resolution and idempotent sales aggregation
//
// Architecture:
// - Domain-centric: value objects and invariants live in domain
// - Event-driven: services announce outcomes through the event bus
// - Explicit: every dedup key is written in the same transaction as its counts
// - Host-agnostic: hosts talk to ReconcileEngine, never to repositories

// ============================================================================
// FOUNDATION
// ============================================================================

pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod events;
pub mod infrastructure;
pub mod repositories;
pub mod services;

// ============================================================================
// APPLICATION LAYER
// ============================================================================

pub mod application;
pub mod integrations;

// ============================================================================
// PUBLIC API - Domain
// ============================================================================

pub use domain::{
    // Shared
    DateRange,
    DomainError,
    ProductId,
    // Catalog
    CatalogProduct,
    // Mapping
    IdentifierResolution,
    MappingEntry,
    MappingInput,
    MappingScope,
    MatchPrecedence,
    ProductMappings,
    ProductMatch,
    SaveMappingResult,
    SourceIdentifiers,
    // Sales
    DailySaleRecord,
    LedgerStats,
    PeriodSummary,
    ProductSummaryRecord,
    Provenance,
    RecordOutcome,
    SaleEvent,
    SaleSource,
    SourceSale,
    // Orders
    OrderIngestResult,
    OrderLineItem,
    StorefrontOrder,
    // Historical import
    CursorPosition,
    ExternalSaleLine,
    ExternalSaleRecord,
    FeedPage,
    ImportBatchResult,
    ImportCursor,
    ImportLogEntry,
    SaleIdentifier,
};

// ============================================================================
// PUBLIC API - Errors & Config
// ============================================================================

pub use config::ReconcileConfig;
pub use error::{AppError, AppResult};

// ============================================================================
// PUBLIC API - Events
// ============================================================================

pub use events::{
    create_event_bus, register_live_sale_hook, DomainEvent, DuplicateSaleSkipped, EventBus,
    EventLogEntry, HistoricalSaleImported, ImportBatchCompleted, LiveSaleHook, MappingSaved,
    OrderProcessed, SaleRecorded,
};

// ============================================================================
// PUBLIC API - Database
// ============================================================================

pub use db::{create_connection_pool, create_connection_pool_at, initialize_database, ConnectionPool};

// ============================================================================
// PUBLIC API - Infrastructure & Integrations
// ============================================================================

pub use infrastructure::{Clock, FixedClock, SystemClock};
pub use integrations::{CatalogLookup, FeedRequest, InMemoryCatalog, SaleFeed, StaticFeed};

// ============================================================================
// PUBLIC API - Services
// ============================================================================

pub use services::{EventDateChain, EventDateStrategy};

// ============================================================================
// PUBLIC API - Application Layer
// ============================================================================

pub use application::{ErrorResponse, ErrorType, OperationStatus, ReconcileEngine};
