// src/services/mapping_service_tests.rs
//
// Mapping resolution against a real SQLite store
//
// COVERED:
// - Scoped entries beat the product default
// - Time buffer is inclusive at its edge and closed beyond it
// - Full replace makes removed identifiers unresolvable
// - Event-id fallback runs after every identifier rung
// - Product -> identifier lookup follows the same chain

#[cfg(test)]
mod mapping_resolution_tests {
    use std::sync::Arc;

    use chrono::{NaiveDate, NaiveTime};

    use crate::db::connection::create_test_pool;
    use crate::domain::{MappingInput, MatchPrecedence, ProductId};
    use crate::events::EventBus;
    use crate::repositories::SqliteMappingRepository;
    use crate::services::MappingService;

    fn service() -> (tempfile::TempDir, MappingService, Arc<EventBus>) {
        let (dir, pool) = create_test_pool();
        let bus = Arc::new(EventBus::new());
        let service = MappingService::new(
            Arc::new(SqliteMappingRepository::new(pool)),
            bus.clone(),
            30,
        );
        (dir, service, bus)
    }

    fn date(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
    }

    fn time(raw: &str) -> NaiveTime {
        NaiveTime::parse_from_str(raw, "%H:%M").unwrap()
    }

    fn ticket_default(ticket: &str, event: &str) -> MappingInput {
        MappingInput {
            ticket_class_id: Some(ticket.to_string()),
            event_id: Some(event.to_string()),
            ..MappingInput::default()
        }
    }

    #[test]
    fn test_scoped_beats_default() {
        let (_dir, service, _bus) = service();
        service
            .save_default(&ProductId::from("200"), &ticket_default("TIX-1", "EV-1"))
            .unwrap();
        service
            .save(
                &ProductId::from("101"),
                &[MappingInput::dated("2025-06-01", Some("20:00")).with_ticket("TIX-1", "EV-1")],
            )
            .unwrap();

        let scoped = service
            .find_product_for(Some("TIX-1"), Some(date("2025-06-01")), Some(time("20:10")), None)
            .unwrap()
            .unwrap();
        assert_eq!(scoped.product_id, ProductId::from("101"));
        assert_eq!(scoped.precedence, MatchPrecedence::TimeBuffer);

        let fallback = service
            .find_product_for(Some("TIX-1"), None, None, None)
            .unwrap()
            .unwrap();
        assert_eq!(fallback.product_id, ProductId::from("200"));
        assert_eq!(fallback.precedence, MatchPrecedence::Default);
    }

    #[test]
    fn test_time_buffer_edges() {
        let (_dir, service, _bus) = service();
        service
            .save(
                &ProductId::from("101"),
                &[MappingInput::dated("2025-06-01", Some("14:00")).with_pos_item("SQ-9")],
            )
            .unwrap();

        let day = Some(date("2025-06-01"));
        let exact = service
            .find_product_for(Some("SQ-9"), day, Some(time("14:00")), None)
            .unwrap()
            .unwrap();
        assert_eq!(exact.precedence, MatchPrecedence::ExactDateTime);

        let near = service
            .find_product_for(Some("SQ-9"), day, Some(time("14:25")), None)
            .unwrap();
        assert_eq!(near.map(|m| m.precedence), Some(MatchPrecedence::TimeBuffer));

        let edge = service
            .find_product_for(Some("SQ-9"), day, Some(time("13:30")), None)
            .unwrap();
        assert!(edge.is_some());

        let far = service
            .find_product_for(Some("SQ-9"), day, Some(time("14:35")), None)
            .unwrap();
        assert!(far.is_none());
    }

    #[test]
    fn test_time_buffer_counts_seconds_past_the_edge() {
        let (_dir, service, _bus) = service();
        service
            .save(
                &ProductId::from("101"),
                &[MappingInput::dated("2025-06-01", Some("14:00")).with_pos_item("SQ-9")],
            )
            .unwrap();

        let day = Some(date("2025-06-01"));
        let on_edge = NaiveTime::from_hms_opt(14, 30, 0);
        let just_past = NaiveTime::from_hms_opt(14, 30, 59);

        assert!(service
            .find_product_for(Some("SQ-9"), day, on_edge, None)
            .unwrap()
            .is_some());
        assert!(service
            .find_product_for(Some("SQ-9"), day, just_past, None)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_closest_time_wins_inside_buffer() {
        let (_dir, service, _bus) = service();
        service
            .save(
                &ProductId::from("101"),
                &[MappingInput::dated("2025-06-01", Some("19:00")).with_ticket("TIX-1", "EV-1")],
            )
            .unwrap();
        service
            .save(
                &ProductId::from("102"),
                &[MappingInput::dated("2025-06-01", Some("19:40")).with_ticket("TIX-1", "EV-1")],
            )
            .unwrap();

        let found = service
            .find_product_for(Some("TIX-1"), Some(date("2025-06-01")), Some(time("19:25")), None)
            .unwrap()
            .unwrap();
        assert_eq!(found.product_id, ProductId::from("102"));
    }

    #[test]
    fn test_untimed_entry_matches_any_time_on_date() {
        let (_dir, service, _bus) = service();
        service
            .save(
                &ProductId::from("300"),
                &[MappingInput::dated("2025-06-02", None).with_pos_item("SQ-1")],
            )
            .unwrap();

        let found = service
            .find_product_for(Some("SQ-1"), Some(date("2025-06-02")), Some(time("09:00")), None)
            .unwrap()
            .unwrap();
        assert_eq!(found.precedence, MatchPrecedence::DateOnly);

        let other_day = service
            .find_product_for(Some("SQ-1"), Some(date("2025-06-03")), None, None)
            .unwrap();
        assert!(other_day.is_none());
    }

    #[test]
    fn test_full_replace_removes_dropped_key() {
        let (_dir, service, bus) = service();
        let product = ProductId::from("101");
        let a = MappingInput::dated("2025-06-01", Some("20:00")).with_ticket("TIX-A", "EV-1");
        let b = MappingInput::dated("2025-06-02", None).with_ticket("TIX-B", "EV-1");
        let c = MappingInput::dated("2025-06-03", Some("18:00")).with_ticket("TIX-C", "EV-1");

        let first = service.save(&product, &[a.clone(), b.clone(), c]).unwrap();
        assert_eq!(first.saved, 3);
        assert_eq!(first.removed, 0);

        let second = service.save(&product, &[a, b]).unwrap();
        assert_eq!(second.saved, 2);
        assert_eq!(second.removed, 1);

        let gone = service
            .find_product_for(Some("TIX-C"), Some(date("2025-06-03")), Some(time("18:00")), None)
            .unwrap();
        assert!(gone.is_none());

        assert_eq!(service.list(&product).unwrap().scoped.len(), 2);
        assert_eq!(
            bus.get_event_log()
                .iter()
                .filter(|e| e.event_type == "MappingSaved")
                .count(),
            2
        );
    }

    #[test]
    fn test_save_reports_dropped_and_skipped_rows() {
        let (_dir, service, _bus) = service();
        let product = ProductId::from("101");

        let result = service
            .save(
                &product,
                &[
                    MappingInput::dated("2025-06-01", Some("20:00")).with_pos_item("SQ-1"),
                    MappingInput::dated("2025-06-02", None),
                    MappingInput::dated("06/03/2025", None).with_pos_item("SQ-2"),
                    MappingInput::dated("2025-06-01", Some("20:00")).with_pos_item("SQ-3"),
                ],
            )
            .unwrap();

        assert_eq!(result.saved, 1);
        assert_eq!(result.dropped, 1);
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(result.skipped[0].index, 2);

        let stored = service.list(&product).unwrap().scoped;
        assert_eq!(
            stored[0].identifiers.pos_item_id.as_deref(),
            Some("SQ-3"),
            "later row with the same key wins"
        );
    }

    #[test]
    fn test_event_id_fallback_after_identifier() {
        let (_dir, service, _bus) = service();
        service
            .save(
                &ProductId::from("101"),
                &[
                    MappingInput::dated("2025-06-01", Some("20:00")).with_ticket("TIX-1", "EV-7"),
                    MappingInput::dated("2025-06-08", Some("20:00")).with_ticket("TIX-2", "EV-7"),
                ],
            )
            .unwrap();
        service
            .save_default(&ProductId::from("900"), &ticket_default("TIX-9", "EV-9"))
            .unwrap();

        let by_event = service
            .find_product_for(Some("UNKNOWN"), Some(date("2025-06-08")), None, Some("EV-7"))
            .unwrap()
            .unwrap();
        assert_eq!(by_event.product_id, ProductId::from("101"));
        assert_eq!(by_event.precedence, MatchPrecedence::ScopedEvent);
        assert_eq!(by_event.scope.date(), Some(date("2025-06-08")));

        let default_event = service
            .find_product_for(None, None, None, Some("EV-9"))
            .unwrap()
            .unwrap();
        assert_eq!(default_event.precedence, MatchPrecedence::DefaultEvent);

        assert!(service
            .find_product_for(None, None, None, Some("EV-404"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_identifiers_for_follows_chain() {
        let (_dir, service, _bus) = service();
        let product = ProductId::from("101");
        service
            .save_default(&product, &ticket_default("TIX-DEFAULT", "EV-1"))
            .unwrap();
        service
            .save(
                &product,
                &[MappingInput::dated("2025-06-01", Some("20:00")).with_ticket("TIX-1", "EV-1")],
            )
            .unwrap();

        let scoped = service
            .identifiers_for(&product, Some(date("2025-06-01")), Some(time("20:15")))
            .unwrap();
        assert_eq!(scoped.identifiers.ticket_class_id.as_deref(), Some("TIX-1"));
        assert_eq!(scoped.precedence, Some(MatchPrecedence::TimeBuffer));

        let other_day = service
            .identifiers_for(&product, Some(date("2025-06-05")), None)
            .unwrap();
        assert_eq!(
            other_day.identifiers.ticket_class_id.as_deref(),
            Some("TIX-DEFAULT")
        );

        assert!(service
            .identifiers_for(&ProductId::from("404"), None, None)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_save_default_without_identifier_clears() {
        let (_dir, service, _bus) = service();
        let product = ProductId::from("101");
        service
            .save_default(&product, &ticket_default("TIX-1", "EV-1"))
            .unwrap();
        assert!(service.list(&product).unwrap().default.is_some());

        let event_only = MappingInput {
            event_id: Some("EV-1".to_string()),
            ..MappingInput::default()
        };
        assert!(service.save_default(&product, &event_only).unwrap().is_none());
        assert!(service.list(&product).unwrap().default.is_none());
    }

    #[test]
    fn test_empty_product_id_rejected() {
        let (_dir, service, _bus) = service();
        assert!(service.save(&ProductId::from(""), &[]).is_err());
    }
}
