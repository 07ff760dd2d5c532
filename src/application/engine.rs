// src/application/engine.rs
//
// ReconcileEngine - the host-facing boundary
//
// ARCHITECTURE:
// - Wires infrastructure -> repositories -> services once
// - Every ingestion, mapping, reporting and import entry point lives here
// - Hosts hold one engine per process and share it behind an Arc
// - The engine never installs a logger and never spawns tasks

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};

use crate::config::ReconcileConfig;
use crate::db::{
    create_connection_pool, get_connection, get_database_stats, initialize_database,
    verify_database_integrity, ConnectionPool, DatabaseStats,
};
use crate::domain::{
    DailySaleRecord, DateRange, IdentifierResolution, ImportBatchResult, ImportCursor,
    LedgerStats, MappingEntry, MappingInput, OrderIngestResult, PeriodSummary, ProductId,
    ProductMappings, ProductMatch, ProductSummaryRecord, RecordOutcome, SaleEvent, SaleSource,
    SaveMappingResult, SourceSale, StorefrontOrder,
};
use crate::error::{AppError, AppResult};
use crate::events::EventBus;
use crate::infrastructure::{Clock, SystemClock};
use crate::integrations::{CatalogLookup, SaleFeed};
use crate::repositories::{
    ImportCursorRepository, LedgerRepository, MappingRepository, SalesRepository,
    SqliteImportCursorRepository, SqliteLedgerRepository, SqliteMappingRepository,
    SqliteSalesRepository,
};
use crate::services::{
    EventDateChain, ImportService, MappingService, ReportingService, SalesService,
};

pub struct ReconcileEngine {
    config: ReconcileConfig,
    pool: Arc<ConnectionPool>,
    event_bus: Arc<EventBus>,
    mapping: Arc<MappingService>,
    sales: Arc<SalesService>,
    reporting: ReportingService,
    imports: ImportService,
}

impl ReconcileEngine {
    /// Opens (and migrates) the database named by `config` and wires the
    /// engine with the system clock and the default event-date chain.
    pub fn open(config: ReconcileConfig, catalog: Arc<dyn CatalogLookup>) -> AppResult<Self> {
        config.validate()?;
        let pool = Arc::new(create_connection_pool(&config)?);
        Self::with_pool(
            config,
            pool,
            catalog,
            Arc::new(SystemClock),
            EventDateChain::default(),
        )
    }

    /// Wires the engine over an existing pool. The schema is initialized
    /// if needed.
    pub fn with_pool(
        config: ReconcileConfig,
        pool: Arc<ConnectionPool>,
        catalog: Arc<dyn CatalogLookup>,
        clock: Arc<dyn Clock>,
        event_dates: EventDateChain,
    ) -> AppResult<Self> {
        config.validate()?;

        // 1. INFRASTRUCTURE
        {
            let conn = get_connection(&pool)?;
            initialize_database(&conn)?;
        }
        let event_bus = Arc::new(EventBus::new());

        // 2. REPOSITORIES
        let mapping_repo: Arc<dyn MappingRepository> =
            Arc::new(SqliteMappingRepository::new(pool.clone()));
        let ledger_repo: Arc<dyn LedgerRepository> = Arc::new(SqliteLedgerRepository::new(
            pool.clone(),
            config.dedup_capacity,
        ));
        let sales_repo: Arc<dyn SalesRepository> = Arc::new(SqliteSalesRepository::new(
            pool.clone(),
            config.dedup_capacity,
        ));
        let cursor_repo: Arc<dyn ImportCursorRepository> =
            Arc::new(SqliteImportCursorRepository::new(pool.clone()));

        // 3. SERVICES
        let mapping = Arc::new(MappingService::new(
            mapping_repo,
            event_bus.clone(),
            config.time_buffer_minutes,
        ));
        let sales = Arc::new(SalesService::new(
            sales_repo.clone(),
            ledger_repo.clone(),
            catalog,
            mapping.clone(),
            Arc::new(event_dates),
            clock,
            event_bus.clone(),
        ));
        let reporting = ReportingService::new(sales_repo);
        let imports = ImportService::new(
            sales.clone(),
            mapping.clone(),
            ledger_repo,
            cursor_repo,
            event_bus.clone(),
            &config,
        );

        log::info!(
            "Reconcile engine ready (time buffer {}m, dedup capacity {}, batch size {})",
            config.time_buffer_minutes,
            config.dedup_capacity,
            config.import_batch_size
        );

        Ok(Self {
            config,
            pool,
            event_bus,
            mapping,
            sales,
            reporting,
            imports,
        })
    }

    /// Registers the feed used by the historical importer for its source.
    pub fn register_feed(&mut self, feed: Arc<dyn SaleFeed>) {
        self.imports.register_feed(feed);
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Bus for live side-effect subscribers (see `register_live_sale_hook`).
    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    // ========================================================================
    // SALE INGESTION
    // ========================================================================

    #[allow(clippy::too_many_arguments)]
    pub fn record_sale(
        &self,
        product_id: impl Into<ProductId>,
        quantity: u32,
        source: SaleSource,
        external_ref: impl Into<String>,
        event_date: Option<NaiveDate>,
        revenue: Option<rust_decimal::Decimal>,
        customer: Option<String>,
    ) -> AppResult<RecordOutcome> {
        let mut sale =
            SaleEvent::new(product_id, quantity, source, external_ref).with_event_date(event_date);
        sale.revenue = revenue;
        sale.customer = customer;
        self.sales.record_sale(sale)
    }

    /// Same as `record_sale` for callers that already hold a `SaleEvent`.
    pub fn record_sale_event(&self, sale: SaleEvent) -> AppResult<RecordOutcome> {
        self.sales.record_sale(sale)
    }

    pub fn record_source_sale(&self, sale: SourceSale) -> AppResult<RecordOutcome> {
        self.sales.record_source_sale(sale)
    }

    pub fn record_order(&self, order: &StorefrontOrder) -> AppResult<OrderIngestResult> {
        self.sales.record_order(order)
    }

    // ========================================================================
    // MAPPINGS
    // ========================================================================

    pub fn resolve_product(
        &self,
        identifier: Option<&str>,
        date: Option<NaiveDate>,
        time: Option<NaiveTime>,
        event_id: Option<&str>,
    ) -> AppResult<Option<ProductMatch>> {
        self.mapping.find_product_for(identifier, date, time, event_id)
    }

    pub fn resolve_identifiers(
        &self,
        product_id: &ProductId,
        date: Option<NaiveDate>,
        time: Option<NaiveTime>,
    ) -> AppResult<IdentifierResolution> {
        self.mapping.identifiers_for(product_id, date, time)
    }

    pub fn save_mapping(
        &self,
        product_id: &ProductId,
        entries: &[MappingInput],
    ) -> AppResult<SaveMappingResult> {
        self.mapping.save(product_id, entries)
    }

    pub fn save_default_mapping(
        &self,
        product_id: &ProductId,
        input: &MappingInput,
    ) -> AppResult<Option<MappingEntry>> {
        self.mapping.save_default(product_id, input)
    }

    pub fn list_mappings(&self, product_id: &ProductId) -> AppResult<ProductMappings> {
        self.mapping.list(product_id)
    }

    // ========================================================================
    // REPORTING
    // ========================================================================

    pub fn get_daily_sales(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        product_id: Option<&ProductId>,
        event_date: Option<NaiveDate>,
    ) -> AppResult<Vec<DailySaleRecord>> {
        self.reporting
            .get_daily_sales(start, end, product_id, event_date)
    }

    pub fn get_product_summary(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<Vec<ProductSummaryRecord>> {
        self.reporting.get_product_summary(start, end)
    }

    pub fn get_period_summary(&self, start: NaiveDate, end: NaiveDate) -> AppResult<PeriodSummary> {
        self.reporting.get_period_summary(start, end)
    }

    // ========================================================================
    // HISTORICAL IMPORT
    // ========================================================================

    pub async fn import_batch(
        &self,
        source: SaleSource,
        start: NaiveDate,
        end: NaiveDate,
        cursor: Option<ImportCursor>,
    ) -> AppResult<ImportBatchResult> {
        let range = import_range(start, end)?;
        self.imports.import_batch(source, range, cursor).await
    }

    pub async fn import_all_sources_batch(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        cursor: Option<ImportCursor>,
    ) -> AppResult<ImportBatchResult> {
        let range = import_range(start, end)?;
        self.imports.import_all_sources_batch(range, cursor).await
    }

    pub async fn resume_import(
        &self,
        source: SaleSource,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<ImportBatchResult> {
        let range = import_range(start, end)?;
        self.imports.resume_import(source, range).await
    }

    // ========================================================================
    // MAINTENANCE
    // ========================================================================

    pub fn ledger_stats(&self) -> AppResult<LedgerStats> {
        self.sales.ledger_stats()
    }

    pub fn database_stats(&self) -> AppResult<DatabaseStats> {
        let conn = get_connection(&self.pool)?;
        get_database_stats(&conn)
    }

    /// Runs SQLite's integrity check.
    pub fn verify_integrity(&self) -> AppResult<()> {
        let conn = get_connection(&self.pool)?;
        verify_database_integrity(&conn)
    }
}

fn import_range(start: NaiveDate, end: NaiveDate) -> AppResult<DateRange> {
    DateRange::new(start, end).map_err(|e| AppError::validation(e.to_string()))
}
