// src/services/sales_service_tests.rs
//
// Sales recording against a real SQLite store
//
// COVERED:
// - Recording twice with the same key changes nothing the second time
// - Per-source counters add up into one daily record
// - Source-keyed sales resolve through the mapping store
// - Order ingestion groups lines, skips unknown products and retries only
//   what failed
// - Concurrent deliveries of one sale record it once

#[cfg(test)]
mod recording_tests {
    use std::sync::{Arc, Mutex};
    use std::thread;

    use chrono::{NaiveDate, NaiveTime};
    use rust_decimal::Decimal;

    use crate::db::connection::create_test_pool;
    use crate::db::ConnectionPool;
    use crate::domain::{
        CatalogProduct, DateRange, MappingInput, OrderLineItem, ProductId, RecordOutcome,
        SaleEvent, SaleSource, SourceSale, StorefrontOrder,
    };
    use crate::error::AppError;
    use crate::events::{register_live_sale_hook, EventBus, LiveSaleHook};
    use crate::infrastructure::FixedClock;
    use crate::integrations::{CatalogLookup, InMemoryCatalog, MockCatalogLookup};
    use crate::repositories::{
        SalesRepository, SqliteLedgerRepository, SqliteMappingRepository, SqliteSalesRepository,
    };
    use crate::services::{EventDateChain, MappingService, SalesService};

    struct Fixture {
        _dir: tempfile::TempDir,
        pool: Arc<ConnectionPool>,
        bus: Arc<EventBus>,
        mapping: Arc<MappingService>,
        sales: SalesService,
        repo: SqliteSalesRepository,
    }

    fn day(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
    }

    fn catalog() -> Arc<InMemoryCatalog> {
        Arc::new(
            InMemoryCatalog::new()
                .with_product(CatalogProduct::new("101", "Evening Tour", Decimal::new(2500, 2)))
                .with_product(CatalogProduct::new("102", "Harbour Cruise", Decimal::new(4000, 2)))
                .with_product(CatalogProduct::new("200", "Souvenir Mug", Decimal::new(1200, 2))),
        )
    }

    fn sales_over(
        pool: Arc<ConnectionPool>,
        bus: Arc<EventBus>,
        mapping: Arc<MappingService>,
        catalog: Arc<dyn CatalogLookup>,
        capacity: usize,
    ) -> SalesService {
        SalesService::new(
            Arc::new(SqliteSalesRepository::new(pool.clone(), capacity)),
            Arc::new(SqliteLedgerRepository::new(pool, capacity)),
            catalog,
            mapping,
            Arc::new(EventDateChain::default()),
            Arc::new(FixedClock::at_day(day("2025-06-01"))),
            bus,
        )
    }

    fn fixture_with(catalog: Arc<dyn CatalogLookup>, capacity: usize) -> Fixture {
        let (dir, pool) = create_test_pool();
        let bus = Arc::new(EventBus::new());
        let mapping = Arc::new(MappingService::new(
            Arc::new(SqliteMappingRepository::new(pool.clone())),
            bus.clone(),
            30,
        ));
        let sales = sales_over(pool.clone(), bus.clone(), mapping.clone(), catalog, capacity);
        Fixture {
            _dir: dir,
            repo: SqliteSalesRepository::new(pool.clone(), capacity),
            pool,
            bus,
            mapping,
            sales,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(catalog(), 1000)
    }

    #[test]
    fn test_record_sale_is_idempotent() {
        let f = fixture();
        let sale = SaleEvent::new("101", 1, SaleSource::Storefront, "W-1");

        let first = f.sales.record_sale(sale.clone()).unwrap();
        assert!(matches!(first, RecordOutcome::Recorded { quantity: 1, .. }));

        let second = f.sales.record_sale(sale).unwrap();
        assert!(second.is_duplicate());

        let record = f
            .repo
            .get_daily_record(day("2025-06-01"), "101")
            .unwrap()
            .unwrap();
        assert_eq!(record.quantity, 1);
        assert_eq!(record.orders.len(), 1);
        assert_eq!(record.revenue, Decimal::new(2500, 2));
    }

    #[test]
    fn test_sources_accumulate_into_one_record() {
        let f = fixture();
        f.sales
            .record_sale(SaleEvent::new("101", 2, SaleSource::Storefront, "W-1"))
            .unwrap();
        f.sales
            .record_sale(
                SaleEvent::new("101", 3, SaleSource::Pos, "SQ-1").with_revenue(Decimal::new(60, 0)),
            )
            .unwrap();

        let record = f
            .repo
            .get_daily_record(day("2025-06-01"), "101")
            .unwrap()
            .unwrap();
        assert_eq!(record.quantity, 5);
        assert_eq!(record.web_qty, 2);
        assert_eq!(record.pos_qty, 3);
        assert_eq!(record.ticketing_qty, 0);
        assert_eq!(record.revenue, Decimal::new(11000, 2));
        assert_eq!(record.orders.len(), 2);
    }

    #[test]
    fn test_sale_date_is_recording_day_not_event_day() {
        let f = fixture();
        let outcome = f
            .sales
            .record_sale(
                SaleEvent::new("101", 1, SaleSource::Ticketing, "EB-1")
                    .with_event_date(Some(day("2025-06-10"))),
            )
            .unwrap();

        assert_eq!(
            outcome,
            RecordOutcome::Recorded {
                sale_date: day("2025-06-01"),
                product_key: "101_2025-06-10".to_string(),
                quantity: 1,
            }
        );

        let summaries = f
            .repo
            .list_summaries(&DateRange::single_day(day("2025-06-01")))
            .unwrap();
        assert_eq!(summaries[0].event_dates.get("2025-06-10"), Some(&1));
    }

    #[test]
    fn test_unknown_catalog_product_is_not_found() {
        let f = fixture();
        let result = f
            .sales
            .record_sale(SaleEvent::new("999", 1, SaleSource::Storefront, "W-9"));
        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert_eq!(f.sales.ledger_stats().unwrap().live_entries, 0);
    }

    #[test]
    fn test_invalid_sale_rejected_before_claim() {
        let f = fixture();
        let result = f
            .sales
            .record_sale(SaleEvent::new("101", 0, SaleSource::Storefront, "W-1"));
        assert!(matches!(result, Err(AppError::Domain(_))));
    }

    #[test]
    fn test_source_sale_resolves_then_replay_is_skipped() {
        let f = fixture();
        f.mapping
            .save(
                &ProductId::from("101"),
                &[MappingInput::dated("2025-06-01", Some("20:00")).with_ticket("TIX-1", "EV-1")],
            )
            .unwrap();

        let sale = SourceSale::new(SaleSource::Ticketing, "TIX-1", 1, "EB-ORDER-1").at(
            day("2025-06-01"),
            NaiveTime::from_hms_opt(20, 10, 0),
        );

        let first = f.sales.record_source_sale(sale.clone()).unwrap();
        assert!(!first.is_duplicate());
        let replay = f.sales.record_source_sale(sale).unwrap();
        assert!(replay.is_duplicate());

        let records = f
            .repo
            .list_daily(&DateRange::single_day(day("2025-06-01")), None, None)
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].product_id, ProductId::from("101"));
        assert_eq!(records[0].quantity, 1);
        assert_eq!(records[0].ticketing_qty, 1);
    }

    #[test]
    fn test_unmapped_source_sale_is_not_found() {
        let f = fixture();
        let sale = SourceSale::new(SaleSource::Pos, "SQ-UNKNOWN", 1, "SQ-R-1");
        assert!(matches!(
            f.sales.record_source_sale(sale),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_order_groups_lines_and_skips_unknown_products() {
        let f = fixture();
        let order = StorefrontOrder::new("5001")
            .with_line(
                OrderLineItem::new("101", "Evening Tour", 2)
                    .with_meta("_event_date", "2025-06-07")
                    .with_total(Decimal::new(50, 0)),
            )
            .with_line(
                OrderLineItem::new("101", "Evening Tour", 1)
                    .with_meta("Event Date", "07/06/2025")
                    .with_total(Decimal::new(25, 0)),
            )
            .with_line(OrderLineItem::new("200", "Souvenir Mug", 1))
            .with_line(OrderLineItem::new("999", "Discontinued", 1));

        let result = f.sales.record_order(&order).unwrap();

        assert_eq!(result.recorded.len(), 2);
        assert!(result.errors.is_empty());
        assert_eq!(result.warnings.len(), 1);
        assert!(result.marked_processed);

        let tour = result
            .recorded
            .iter()
            .find(|g| g.product_id == ProductId::from("101"))
            .unwrap();
        assert_eq!(tour.quantity, 3);
        assert_eq!(tour.product_key, "101_2025-06-07");

        let record = f
            .repo
            .get_daily_record(day("2025-06-01"), "101_2025-06-07")
            .unwrap()
            .unwrap();
        assert_eq!(record.revenue, Decimal::new(75, 0));
        assert_eq!(record.orders.len(), 1);

        let replay = f.sales.record_order(&order).unwrap();
        assert!(replay.duplicate_order);
        assert!(replay.recorded.is_empty());
    }

    #[test]
    fn test_order_with_failed_group_is_retried_partially() {
        let (dir, pool) = create_test_pool();
        let bus = Arc::new(EventBus::new());
        let mapping = Arc::new(MappingService::new(
            Arc::new(SqliteMappingRepository::new(pool.clone())),
            bus.clone(),
            30,
        ));

        let mut flaky = MockCatalogLookup::new();
        flaky.expect_get_product().returning(|id| {
            if id.as_str() == "102" {
                Err(AppError::Pool("catalog connection reset".to_string()))
            } else {
                Ok(Some(CatalogProduct::new(
                    id.as_str(),
                    "Evening Tour",
                    Decimal::new(2500, 2),
                )))
            }
        });

        let order = StorefrontOrder::new("5002")
            .with_line(OrderLineItem::new("101", "Evening Tour", 1))
            .with_line(OrderLineItem::new("102", "Harbour Cruise", 1));

        let first_try = sales_over(pool.clone(), bus.clone(), mapping.clone(), Arc::new(flaky), 1000);
        let first = first_try.record_order(&order).unwrap();
        assert_eq!(first.recorded.len(), 1);
        assert_eq!(first.errors.len(), 1);
        assert!(first.is_partial());
        assert!(!first.marked_processed);

        let retry = sales_over(pool.clone(), bus, mapping, catalog(), 1000);
        let second = retry.record_order(&order).unwrap();
        assert!(!second.duplicate_order);
        assert_eq!(second.skipped_duplicates.len(), 1);
        assert_eq!(second.recorded.len(), 1);
        assert_eq!(second.recorded[0].product_id, ProductId::from("102"));
        assert!(second.marked_processed);

        let repo = SqliteSalesRepository::new(pool, 1000);
        let totals = repo
            .period_summary(&DateRange::single_day(day("2025-06-01")))
            .unwrap();
        assert_eq!(totals.total_quantity, 2);
        drop(dir);
    }

    #[derive(Default)]
    struct StockSpy {
        calls: Mutex<u32>,
    }

    impl LiveSaleHook for StockSpy {
        fn on_live_sale(&self, _product_id: &ProductId, quantity: u32) -> Result<(), String> {
            *self.calls.lock().unwrap() += quantity;
            Ok(())
        }
    }

    #[test]
    fn test_historical_sales_skip_live_hooks() {
        let f = fixture();
        let spy = Arc::new(StockSpy::default());
        register_live_sale_hook(&f.bus, spy.clone());

        f.sales
            .record_historical(
                SaleEvent::new("101", 4, SaleSource::Storefront, "W-OLD"),
                day("2025-06-01"),
            )
            .unwrap();
        f.sales
            .record_sale(SaleEvent::new("101", 1, SaleSource::Storefront, "W-NEW"))
            .unwrap();

        assert_eq!(*spy.calls.lock().unwrap(), 1);

        let record = f
            .repo
            .get_daily_record(day("2025-06-01"), "101")
            .unwrap()
            .unwrap();
        assert_eq!(record.quantity, 5);

        let stats = f.sales.ledger_stats().unwrap();
        assert_eq!(stats.live_entries, 1);
        assert_eq!(stats.historical_entries, 1);
    }

    #[test]
    fn test_live_ledger_stays_within_capacity() {
        let f = fixture_with(catalog(), 2);
        for n in 0..3 {
            f.sales
                .record_sale(SaleEvent::new("200", 1, SaleSource::Pos, format!("SQ-{}", n)))
                .unwrap();
        }

        let stats = f.sales.ledger_stats().unwrap();
        assert_eq!(stats.live_entries, 2);
        assert_eq!(stats.capacity, 2);
    }

    #[test]
    fn test_concurrent_deliveries_record_once() {
        let f = fixture();
        let sales = Arc::new(sales_over(
            f.pool.clone(),
            f.bus.clone(),
            f.mapping.clone(),
            catalog(),
            1000,
        ));

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let sales = sales.clone();
                thread::spawn(move || {
                    sales
                        .record_sale(SaleEvent::new("102", 2, SaleSource::Ticketing, "EB-77"))
                        .unwrap()
                })
            })
            .collect();

        let recorded = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|outcome| !outcome.is_duplicate())
            .count();
        assert_eq!(recorded, 1);

        let record = f
            .repo
            .get_daily_record(day("2025-06-01"), "102")
            .unwrap()
            .unwrap();
        assert_eq!(record.quantity, 2);
        assert_eq!(record.orders.len(), 1);
    }
}
