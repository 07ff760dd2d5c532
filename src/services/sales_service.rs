// src/services/sales_service.rs
//
// Sales Recorder
//
// Applies normalized sales to the aggregation exactly once per dedup key.
//
// CRITICAL RULES:
// - The ledger claim and every aggregation write commit together or not at all
// - A duplicate is an outcome, not an error
// - A live sale is dated the day it is recorded, taken from the injected
//   clock; a backfilled sale keeps the day it originally happened
// - Live and historical recording have the same aggregation effect; only
//   live recording emits `SaleRecorded`
// - Orders are grouped by (product, event date) before recording
// - The order key is claimed only when no group hit a storage failure

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::domain::{
    validate_sale_event, DedupKey, LedgerStats, LineFailure, OrderIngestResult, OrderLineItem,
    ProductId, Provenance, RecordOutcome, RecordedGroup, SaleEvent, SourceSale, StorefrontOrder,
};
use crate::error::{AppError, AppResult};
use crate::events::{
    DuplicateSaleSkipped, EventBus, HistoricalSaleImported, OrderProcessed, SaleRecorded,
};
use crate::infrastructure::Clock;
use crate::integrations::CatalogLookup;
use crate::repositories::{AggregationWrite, LedgerRepository, SalesRepository};

use super::event_date::EventDateChain;
use super::mapping_service::MappingService;

// ============================================================================
// SALES SERVICE
// ============================================================================

pub struct SalesService {
    sales_repo: Arc<dyn SalesRepository>,
    ledger_repo: Arc<dyn LedgerRepository>,
    catalog: Arc<dyn CatalogLookup>,
    mapping: Arc<MappingService>,
    event_dates: Arc<EventDateChain>,
    clock: Arc<dyn Clock>,
    event_bus: Arc<EventBus>,
}

impl SalesService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sales_repo: Arc<dyn SalesRepository>,
        ledger_repo: Arc<dyn LedgerRepository>,
        catalog: Arc<dyn CatalogLookup>,
        mapping: Arc<MappingService>,
        event_dates: Arc<EventDateChain>,
        clock: Arc<dyn Clock>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            sales_repo,
            ledger_repo,
            catalog,
            mapping,
            event_dates,
            clock,
            event_bus,
        }
    }

    // ========================================================================
    // SINGLE SALES
    // ========================================================================

    /// Records a live sale under today's date.
    pub fn record_sale(&self, sale: SaleEvent) -> AppResult<RecordOutcome> {
        self.record(sale, Provenance::Live, None)
    }

    /// Records a backfilled sale under the day it originally happened.
    /// Same aggregation effect as a live sale, no live events.
    pub fn record_historical(
        &self,
        sale: SaleEvent,
        sold_on: NaiveDate,
    ) -> AppResult<RecordOutcome> {
        self.record(sale, Provenance::Historical, Some(sold_on))
    }

    /// Records a sale known only by its source identifier.
    pub fn record_source_sale(&self, sale: SourceSale) -> AppResult<RecordOutcome> {
        let found = self
            .mapping
            .find_product_for(
                sale.identifier.as_deref(),
                sale.occurrence_date,
                sale.occurrence_time,
                sale.event_id.as_deref(),
            )?
            .ok_or_else(|| {
                AppError::not_found(format!(
                    "product mapping for {} identifier {:?} event {:?} at {:?} {:?}",
                    sale.source,
                    sale.identifier,
                    sale.event_id,
                    sale.occurrence_date,
                    sale.occurrence_time
                ))
            })?;

        log::debug!(
            "{} sale {} resolved to product {} via {}",
            sale.source,
            sale.external_ref,
            found.product_id,
            found.precedence
        );

        self.record_sale(sale.into_sale_event(found.product_id))
    }

    fn record(
        &self,
        sale: SaleEvent,
        provenance: Provenance,
        sold_on: Option<NaiveDate>,
    ) -> AppResult<RecordOutcome> {
        validate_sale_event(&sale)?;

        let dedup_key = sale.dedup_key();
        if self.ledger_repo.contains(&dedup_key)? {
            return Ok(self.skipped(dedup_key));
        }

        let product = self
            .catalog
            .get_product(&sale.product_id)?
            .ok_or_else(|| AppError::not_found(format!("catalog product {}", sale.product_id)))?;

        let amount = sale
            .revenue
            .unwrap_or_else(|| product.price * Decimal::from(sale.quantity));
        let now = self.clock.now();
        let sale_date = sold_on.unwrap_or_else(|| now.date_naive());

        let write = AggregationWrite {
            dedup_key: dedup_key.clone(),
            provenance,
            sale_date,
            sale: &sale,
            product: &product,
            amount,
            recorded_at: now,
        };

        // Another writer may have claimed the key since the check above.
        if !self.sales_repo.apply_sale(&write)? {
            return Ok(self.skipped(dedup_key));
        }

        let product_key = sale.product_key();
        log::info!(
            "Recorded {} x{} from {} ref {} on {} ({})",
            product_key,
            sale.quantity,
            sale.source,
            sale.external_ref,
            sale_date,
            provenance.as_str()
        );

        match provenance {
            Provenance::Live => self.event_bus.emit(
                SaleRecorded::new(
                    sale.product_id.clone(),
                    product_key.clone(),
                    sale.quantity,
                    sale.source,
                    sale.external_ref.clone(),
                )
                .with_event_date(sale.event_date),
            ),
            Provenance::Historical => self.event_bus.emit(HistoricalSaleImported::new(
                sale.product_id.clone(),
                product_key.clone(),
                sale.quantity,
                sale.source,
                sale.external_ref.clone(),
            )),
        }

        Ok(RecordOutcome::Recorded {
            sale_date,
            product_key,
            quantity: sale.quantity,
        })
    }

    fn skipped(&self, dedup_key: DedupKey) -> RecordOutcome {
        log::debug!("Skipping already recorded sale {}", dedup_key.as_str());
        self.event_bus
            .emit(DuplicateSaleSkipped::new(dedup_key.as_str().to_string()));
        RecordOutcome::SkippedDuplicate {
            dedup_key: dedup_key.as_str().to_string(),
        }
    }

    // ========================================================================
    // ORDERS
    // ========================================================================

    /// Event date for a line, via the strategy chain.
    pub fn resolve_event_date(&self, item: &OrderLineItem) -> Option<NaiveDate> {
        self.event_dates.resolve(item).map(|(date, strategy)| {
            log::debug!(
                "Event date {} for product {} from {}",
                date,
                item.product_id,
                strategy
            );
            date
        })
    }

    /// Records a multi-line storefront order.
    pub fn record_order(&self, order: &StorefrontOrder) -> AppResult<OrderIngestResult> {
        if order.order_id.trim().is_empty() {
            return Err(AppError::validation("order id cannot be empty"));
        }

        let mut result = OrderIngestResult {
            order_id: order.order_id.clone(),
            ..OrderIngestResult::default()
        };

        let order_key = DedupKey::for_order(order.source, &order.order_id);
        if self.ledger_repo.contains(&order_key)? {
            log::info!("Order {} already processed", order.order_id);
            self.event_bus
                .emit(DuplicateSaleSkipped::new(order_key.as_str().to_string()));
            result.duplicate_order = true;
            return Ok(result);
        }

        let groups = group_lines(
            &order.line_items,
            |item| self.resolve_event_date(item),
            &mut result.warnings,
        );

        for ((product_id, event_date), group) in groups {
            let mut sale = SaleEvent::new(
                product_id.clone(),
                group.quantity,
                order.source,
                order.order_id.clone(),
            )
            .with_event_date(event_date);
            sale.revenue = group.total();
            sale.currency = order.currency.clone();
            sale.customer = order.customer.clone();

            match self.record_sale(sale) {
                Ok(RecordOutcome::Recorded {
                    product_key,
                    quantity,
                    ..
                }) => result.recorded.push(RecordedGroup {
                    product_id,
                    event_date,
                    quantity,
                    product_key,
                }),
                Ok(RecordOutcome::SkippedDuplicate { dedup_key }) => {
                    result.skipped_duplicates.push(dedup_key)
                }
                Err(e) if is_line_skip(&e) => {
                    log::warn!(
                        "Skipping product {} in order {}: {}",
                        product_id,
                        order.order_id,
                        e
                    );
                    result
                        .warnings
                        .push(format!("product {}: {}", product_id, e));
                }
                Err(e) => {
                    log::error!(
                        "Failed to record product {} in order {}: {}",
                        product_id,
                        order.order_id,
                        e
                    );
                    result.errors.push(LineFailure {
                        product_id,
                        message: e.to_string(),
                    });
                }
            }
        }

        if result.errors.is_empty() {
            result.marked_processed = self.ledger_repo
                .claim(&order_key, Provenance::Live, self.clock.now())?;
        } else {
            log::warn!(
                "Order {} left unprocessed after {} failed groups",
                order.order_id,
                result.errors.len()
            );
        }

        self.event_bus.emit(OrderProcessed::new(
            order.order_id.clone(),
            order.source,
            result.recorded.len(),
            result.errors.len(),
            result.marked_processed,
        ));

        Ok(result)
    }

    pub fn ledger_stats(&self) -> AppResult<LedgerStats> {
        self.ledger_repo.stats()
    }

    /// Current instant on the recorder's clock. Ledger claims made outside
    /// the aggregation write use it so eviction order stays consistent.
    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

// ============================================================================
// LINE GROUPING
// ============================================================================

/// Quantities and totals of the lines sharing one (product, event date).
#[derive(Debug, Default)]
pub(crate) struct LineGroup {
    pub quantity: u32,
    total: Decimal,
    all_priced: bool,
    lines: usize,
}

impl LineGroup {
    fn add(&mut self, quantity: u32, total: Option<Decimal>) {
        self.all_priced = (self.lines == 0 || self.all_priced) && total.is_some();
        self.quantity = self.quantity.saturating_add(quantity);
        self.total += total.unwrap_or_default();
        self.lines += 1;
    }

    /// Sum of line totals, or None when any line lacked one.
    pub fn total(&self) -> Option<Decimal> {
        self.all_priced.then_some(self.total)
    }
}

/// Groups lines by (product, event date). Lines without a product or with a
/// zero quantity are reported in `warnings` and left out.
pub(crate) fn group_lines<F>(
    items: &[OrderLineItem],
    event_date: F,
    warnings: &mut Vec<String>,
) -> BTreeMap<(ProductId, Option<NaiveDate>), LineGroup>
where
    F: Fn(&OrderLineItem) -> Option<NaiveDate>,
{
    let mut groups: BTreeMap<(ProductId, Option<NaiveDate>), LineGroup> = BTreeMap::new();

    for (index, item) in items.iter().enumerate() {
        if item.product_id.is_empty() {
            warnings.push(format!("line {} has no product id", index));
            continue;
        }
        if item.quantity == 0 {
            warnings.push(format!("line {} ({}) has zero quantity", index, item.product_id));
            continue;
        }

        groups
            .entry((item.product_id.clone(), event_date(item)))
            .or_default()
            .add(item.quantity, item.total);
    }

    groups
}

/// Errors that skip one line instead of leaving the order for retry.
pub(crate) fn is_line_skip(error: &AppError) -> bool {
    matches!(
        error,
        AppError::NotFound(_) | AppError::Validation(_) | AppError::Domain(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_lines_merges_same_occurrence() {
        let day = NaiveDate::from_ymd_opt(2025, 6, 1);
        let items = vec![
            OrderLineItem::new("101", "Tour", 2).with_total(Decimal::new(50, 0)),
            OrderLineItem::new("101", "Tour", 1).with_total(Decimal::new(25, 0)),
            OrderLineItem::new("102", "Mug", 1),
            OrderLineItem::new("103", "Free", 0),
            OrderLineItem::new("", "Ghost", 1),
        ];

        let mut warnings = Vec::new();
        let groups = group_lines(
            &items,
            |item| (item.product_id.as_str() == "101").then_some(day).flatten(),
            &mut warnings,
        );

        assert_eq!(groups.len(), 2);
        let tour = &groups[&(ProductId::from("101"), day)];
        assert_eq!(tour.quantity, 3);
        assert_eq!(tour.total(), Some(Decimal::new(75, 0)));

        let mug = &groups[&(ProductId::from("102"), None)];
        assert_eq!(mug.total(), None);
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn test_partially_priced_group_has_no_total() {
        let mut group = LineGroup::default();
        group.add(1, Some(Decimal::new(10, 0)));
        group.add(1, None);
        assert_eq!(group.total(), None);
    }

    #[test]
    fn test_line_skip_classification() {
        assert!(is_line_skip(&AppError::not_found("catalog product 9")));
        assert!(!is_line_skip(&AppError::Pool("exhausted".to_string())));
    }
}
