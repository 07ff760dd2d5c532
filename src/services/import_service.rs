// src/services/import_service.rs
//
// Historical Batch Importer
//
// Backfills the aggregation from source feeds, one page per call.
//
// PHASES (per call):
// pending -> fetching -> recording -> advancing -> continuing | complete
//                 \-> error (fetch failed, cursor unchanged)
//
// CRITICAL RULES:
// - Exactly one page per call; the caller schedules the next one
// - The importer holds no state between calls; the cursor travels with
//   the caller (or through the cursor store for `resume_import`)
// - A record is marked imported only when every line was recorded or was
//   already recorded; otherwise it is retried on the next pass
// - A failing record never aborts the page
// - A failing fetch aborts the page and leaves the cursor where it was
// - Backfilled sales never reach live side-effect subscribers

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;

use crate::config::ReconcileConfig;
use crate::domain::{
    CursorPosition, DateRange, DedupKey, ExternalSaleLine, ExternalSaleRecord, ImportBatchResult,
    ImportCursor, ImportLogEntry, ImportPhase, OrderLineItem, ProductId, Provenance,
    RecordOutcome, SaleEvent, SaleIdentifier, SaleSource,
};
use crate::error::{AppError, AppResult};
use crate::events::{EventBus, ImportBatchCompleted};
use crate::integrations::{FeedRequest, SaleFeed};
use crate::repositories::{ImportCursorRepository, LedgerRepository};

use super::mapping_service::MappingService;
use super::sales_service::{group_lines, is_line_skip, SalesService};

/// Meta key carrying a line's explicit occurrence date into the event-date chain.
const OCCURRENCE_META_KEY: &str = "event_date";

/// How one fetched record ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RecordStatus {
    /// At least one line changed the aggregation. Carries the lines that
    /// were ignored (zero quantity, no product id).
    Imported(Vec<String>),
    /// Already marked, or every line was recorded before
    AlreadyImported(Vec<String>),
    /// Some lines could not be mapped to a product; retried later
    Unresolved(Vec<String>),
    /// A storage or catalog failure; retried later
    Failed(String),
}

// ============================================================================
// IMPORT SERVICE
// ============================================================================

pub struct ImportService {
    feeds: Vec<Arc<dyn SaleFeed>>,
    sales: Arc<SalesService>,
    mapping: Arc<MappingService>,
    ledger_repo: Arc<dyn LedgerRepository>,
    cursor_repo: Arc<dyn ImportCursorRepository>,
    event_bus: Arc<EventBus>,
    batch_size: usize,
    fetch_timeout: Duration,
}

impl ImportService {
    pub fn new(
        sales: Arc<SalesService>,
        mapping: Arc<MappingService>,
        ledger_repo: Arc<dyn LedgerRepository>,
        cursor_repo: Arc<dyn ImportCursorRepository>,
        event_bus: Arc<EventBus>,
        config: &ReconcileConfig,
    ) -> Self {
        Self {
            feeds: Vec::new(),
            sales,
            mapping,
            ledger_repo,
            cursor_repo,
            event_bus,
            batch_size: config.import_batch_size,
            fetch_timeout: config.fetch_timeout(),
        }
    }

    /// Adds a feed. Multi-source walks visit feeds in registration order.
    pub fn register_feed(&mut self, feed: Arc<dyn SaleFeed>) {
        log::debug!("Registered {} sale feed", feed.source());
        self.feeds.push(feed);
    }

    pub fn with_feed(mut self, feed: Arc<dyn SaleFeed>) -> Self {
        self.register_feed(feed);
        self
    }

    // ========================================================================
    // ENTRY POINTS
    // ========================================================================

    /// Processes one page of `source` starting at `cursor` (or the
    /// beginning of `range` when None).
    pub async fn import_batch(
        &self,
        source: SaleSource,
        range: DateRange,
        cursor: Option<ImportCursor>,
    ) -> AppResult<ImportBatchResult> {
        let feed = self
            .feeds
            .iter()
            .find(|f| f.source() == source)
            .ok_or_else(|| AppError::validation(format!("no sale feed registered for {}", source)))?;

        self.run_batch(feed.as_ref(), range, cursor).await
    }

    /// Processes one page of the feed at `cursor.source_index`, moving on to
    /// the next feed when that one completes.
    pub async fn import_all_sources_batch(
        &self,
        range: DateRange,
        cursor: Option<ImportCursor>,
    ) -> AppResult<ImportBatchResult> {
        let index = cursor.as_ref().map(|c| c.source_index).unwrap_or(0);
        let feed = self.feeds.get(index).ok_or_else(|| {
            AppError::validation(format!(
                "cursor source index {} is out of range ({} feeds)",
                index,
                self.feeds.len()
            ))
        })?;

        let mut result = self.run_batch(feed.as_ref(), range, cursor).await?;

        if result.complete {
            if let Some(next_feed) = self.feeds.get(index + 1) {
                let mut next = ImportCursor::start(range, next_feed.first_position());
                next.source_index = index + 1;

                result.logs.push(ImportLogEntry::phase(
                    ImportPhase::Continuing,
                    format!(
                        "{} complete, continuing with {}",
                        feed.source(),
                        next_feed.source()
                    ),
                ));
                result.complete = false;
                result.next_cursor = Some(next);
            }
        }

        Ok(result)
    }

    /// Runs one batch from the stored cursor of `source` and stores the
    /// next one. A stored cursor for a different range is discarded.
    pub async fn resume_import(
        &self,
        source: SaleSource,
        range: DateRange,
    ) -> AppResult<ImportBatchResult> {
        let cursor = match self.cursor_repo.load(source)? {
            Some(stored) if stored.validate_for(&range).is_ok() => Some(stored),
            Some(_) => {
                log::info!(
                    "Discarding stored {} cursor for a different range, restarting at {}",
                    source,
                    range.start
                );
                None
            }
            None => None,
        };

        let result = self.import_batch(source, range, cursor).await?;

        match &result.next_cursor {
            Some(next) => self.cursor_repo.save(source, next)?,
            None => self.cursor_repo.clear(source)?,
        }

        Ok(result)
    }

    // ========================================================================
    // BATCH
    // ========================================================================

    async fn run_batch(
        &self,
        feed: &dyn SaleFeed,
        range: DateRange,
        cursor: Option<ImportCursor>,
    ) -> AppResult<ImportBatchResult> {
        let source = feed.source();
        let cursor = match cursor {
            Some(cursor) => {
                cursor.validate_for(&range)?;
                if !same_scheme(&cursor.position, &feed.first_position()) {
                    return Err(AppError::validation(format!(
                        "cursor position {:?} does not fit the {} feed",
                        cursor.position, source
                    )));
                }
                cursor
            }
            None => ImportCursor::start(range, feed.first_position()),
        };

        let mut result = ImportBatchResult {
            source,
            processed_count: 0,
            imported_count: 0,
            skipped_count: 0,
            failed_count: 0,
            next_cursor: None,
            complete: false,
            logs: vec![ImportLogEntry::phase(
                ImportPhase::Pending,
                format!("{} {}..{} at {:?}", source, range.start, range.end, cursor.position),
            )],
        };

        // ---- fetching
        result.logs.push(ImportLogEntry::phase(
            ImportPhase::Fetching,
            format!("requesting up to {} records", self.batch_size),
        ));
        let request = FeedRequest {
            range,
            position: cursor.position.clone(),
            limit: self.batch_size,
        };

        let page = match tokio::time::timeout(self.fetch_timeout, feed.fetch_page(&request)).await {
            Ok(Ok(page)) => page,
            Ok(Err(e)) => {
                log::error!("{} page fetch failed at {:?}: {}", source, cursor.position, e);
                return Err(match e {
                    AppError::UpstreamFetch { .. } => e,
                    other => AppError::upstream(source.as_str(), other.to_string()),
                });
            }
            Err(_) => {
                log::error!(
                    "{} page fetch timed out after {:?} at {:?}",
                    source,
                    self.fetch_timeout,
                    cursor.position
                );
                return Err(AppError::upstream(
                    source.as_str(),
                    format!("fetch timed out after {}s", self.fetch_timeout.as_secs()),
                ));
            }
        };

        // ---- recording
        let fetched = page.records.len();
        result.processed_count = fetched;

        for record in &page.records {
            let status = self
                .import_record(source, record)
                .unwrap_or_else(|e| RecordStatus::Failed(e.to_string()));

            let entry = match status {
                RecordStatus::Imported(ignored) => {
                    result.imported_count += 1;
                    ImportLogEntry::record(
                        ImportPhase::Recording,
                        &record.external_ref,
                        with_ignored("imported", &ignored),
                    )
                }
                RecordStatus::AlreadyImported(ignored) => {
                    result.skipped_count += 1;
                    ImportLogEntry::record(
                        ImportPhase::Recording,
                        &record.external_ref,
                        with_ignored("already imported", &ignored),
                    )
                }
                RecordStatus::Unresolved(lines) => {
                    result.failed_count += 1;
                    log::warn!(
                        "{} record {} left for retry, unresolved: {}",
                        source,
                        record.external_ref,
                        lines.join("; ")
                    );
                    ImportLogEntry::record(
                        ImportPhase::Error,
                        &record.external_ref,
                        format!("unresolved lines: {}", lines.join("; ")),
                    )
                }
                RecordStatus::Failed(message) => {
                    result.failed_count += 1;
                    log::error!("{} record {} failed: {}", source, record.external_ref, message);
                    ImportLogEntry::record(ImportPhase::Error, &record.external_ref, message)
                }
            };
            result.logs.push(entry);
        }

        // ---- advancing
        let next_position = match &cursor.position {
            CursorPosition::Offset { offset } => CursorPosition::Offset {
                offset: offset + fetched as u64,
            },
            CursorPosition::Page { page: number, .. } => CursorPosition::Page {
                page: number + 1,
                continuation: page.continuation.clone(),
            },
        };
        let exhausted = fetched < self.batch_size
            || (matches!(cursor.position, CursorPosition::Page { .. })
                && page.continuation.is_none());

        result.logs.push(ImportLogEntry::phase(
            ImportPhase::Advancing,
            format!("next position {:?}", next_position),
        ));

        if exhausted {
            result.complete = true;
            result.logs.push(ImportLogEntry::phase(
                ImportPhase::Complete,
                format!("{} has no further records in range", source),
            ));
        } else {
            result.next_cursor = Some(ImportCursor {
                position: next_position,
                ..cursor
            });
            result.logs.push(ImportLogEntry::phase(
                ImportPhase::Continuing,
                "more records available",
            ));
        }

        log::info!(
            "{} batch: {} fetched, {} imported, {} skipped, {} failed, complete={}",
            source,
            result.processed_count,
            result.imported_count,
            result.skipped_count,
            result.failed_count,
            result.complete
        );

        self.event_bus.emit(ImportBatchCompleted::new(
            source,
            result.processed_count,
            result.imported_count,
            result.failed_count,
            result.complete,
        ));

        Ok(result)
    }

    // ========================================================================
    // RECORDS
    // ========================================================================

    fn import_record(
        &self,
        source: SaleSource,
        record: &ExternalSaleRecord,
    ) -> AppResult<RecordStatus> {
        let import_key = DedupKey::for_import(source, &record.external_ref);
        if self.ledger_repo.contains(&import_key)? {
            return Ok(RecordStatus::AlreadyImported(Vec::new()));
        }

        let mut unresolved = Vec::new();
        let mut ignored = Vec::new();
        let mut items = Vec::with_capacity(record.lines.len());

        for line in &record.lines {
            match self.resolve_line(line)? {
                Some(product_id) => items.push(to_line_item(product_id, line)),
                None => unresolved.push(describe(&line.identifier)),
            }
        }

        let groups = group_lines(
            &items,
            |item| self.sales.resolve_event_date(item),
            &mut ignored,
        );

        let mut recorded = 0;
        let mut failures = Vec::new();

        for ((product_id, event_date), group) in groups {
            let mut sale = SaleEvent::new(
                product_id.clone(),
                group.quantity,
                source,
                record.external_ref.clone(),
            )
            .with_event_date(event_date);
            sale.revenue = group.total();
            sale.currency = record.currency.clone();
            sale.customer = record.customer.clone();

            match self.sales.record_historical(sale, record.occurred_at.date_naive()) {
                Ok(RecordOutcome::Recorded { .. }) => recorded += 1,
                Ok(RecordOutcome::SkippedDuplicate { .. }) => {}
                Err(e) if is_line_skip(&e) => {
                    unresolved.push(format!("product {}: {}", product_id, e))
                }
                Err(e) => failures.push(format!("product {}: {}", product_id, e)),
            }
        }

        if !failures.is_empty() {
            return Ok(RecordStatus::Failed(failures.join("; ")));
        }
        if !unresolved.is_empty() {
            return Ok(RecordStatus::Unresolved(unresolved));
        }

        self.ledger_repo
            .claim(&import_key, Provenance::Historical, self.sales.now())?;

        if !ignored.is_empty() {
            log::debug!(
                "{} record {} ignored lines: {}",
                source,
                record.external_ref,
                ignored.join("; ")
            );
        }

        Ok(if recorded > 0 {
            RecordStatus::Imported(ignored)
        } else {
            RecordStatus::AlreadyImported(ignored)
        })
    }

    fn resolve_line(&self, line: &ExternalSaleLine) -> AppResult<Option<ProductId>> {
        let found = match &line.identifier {
            SaleIdentifier::Product { product_id } => return Ok(Some(product_id.clone())),
            SaleIdentifier::Ticket {
                ticket_class_id,
                event_id,
            } => self.mapping.find_product_for(
                ticket_class_id.as_deref(),
                line.occurrence_date,
                line.occurrence_time,
                event_id.as_deref(),
            )?,
            SaleIdentifier::PosItem { item_id } => self.mapping.find_product_for(
                Some(item_id),
                line.occurrence_date,
                line.occurrence_time,
                None,
            )?,
        };
        Ok(found.map(|m| m.product_id))
    }
}

fn with_ignored(message: &str, ignored: &[String]) -> String {
    if ignored.is_empty() {
        message.to_string()
    } else {
        format!("{} (ignored: {})", message, ignored.join("; "))
    }
}

fn same_scheme(a: &CursorPosition, b: &CursorPosition) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b)
}

/// Line view used for grouping and event-date extraction. An explicit
/// occurrence date is carried as ticketing metadata so it outranks any
/// other strategy.
fn to_line_item(product_id: ProductId, line: &ExternalSaleLine) -> OrderLineItem {
    let mut item = OrderLineItem::new(
        product_id,
        line.name.clone().unwrap_or_default(),
        line.quantity,
    );
    item.total = line.total;
    item.meta = line.meta.clone();
    if let Some(date) = line.occurrence_date {
        item.meta
            .insert(OCCURRENCE_META_KEY.to_string(), format_date(date));
    }
    item
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn describe(identifier: &SaleIdentifier) -> String {
    match identifier {
        SaleIdentifier::Product { product_id } => format!("product {}", product_id),
        SaleIdentifier::Ticket {
            ticket_class_id,
            event_id,
        } => format!(
            "ticket class {} event {}",
            ticket_class_id.as_deref().unwrap_or("-"),
            event_id.as_deref().unwrap_or("-")
        ),
        SaleIdentifier::PosItem { item_id } => format!("pos item {}", item_id),
    }
}
