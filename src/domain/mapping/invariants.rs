use super::entity::{MappingEntry, MappingInput, SourceIdentifiers};
use crate::domain::{parse_scope_date, parse_scope_time, DomainError, DomainResult, ProductId};

/// First non-empty value in precedence order.
fn pick(candidates: [&Option<String>; 4]) -> Option<String> {
    candidates
        .into_iter()
        .filter_map(|c| c.as_deref())
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

/// Reduces the spellings carried by a raw input to canonical identifiers.
/// A manually entered value always wins; otherwise the first populated
/// spelling is used as-is.
pub fn normalize_identifiers(input: &MappingInput) -> SourceIdentifiers {
    SourceIdentifiers::new(
        pick([
            &input.manual_ticket_class_id,
            &input.ticket_class_id,
            &input.suggested_ticket_class_id,
            &input.legacy_ticket_id,
        ]),
        pick([
            &input.manual_event_id,
            &input.event_id,
            &input.suggested_event_id,
            &input.legacy_event_id,
        ]),
        pick([
            &input.manual_pos_item_id,
            &input.pos_item_id,
            &input.suggested_pos_item_id,
            &input.legacy_pos_item_id,
        ]),
    )
}

/// Turns a raw scoped input into a `MappingEntry`.
///
/// - `Err` for a missing or malformed date, or a malformed time
/// - `Ok(None)` when neither a ticket class nor a POS item is present
pub fn normalize_mapping_input(
    product_id: &ProductId,
    input: &MappingInput,
) -> DomainResult<Option<MappingEntry>> {
    let raw_date = input
        .date
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .ok_or_else(|| DomainError::InvalidDate(String::new()))?;
    let date = parse_scope_date(raw_date)?;

    let time = match input.time.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => Some(parse_scope_time(raw)?),
        _ => None,
    };

    let identifiers = normalize_identifiers(input);
    if !identifiers.has_sellable_identifier() {
        return Ok(None);
    }

    Ok(Some(MappingEntry::scoped(
        product_id.clone(),
        date,
        time,
        identifiers,
    )))
}

/// Validates MappingEntry invariants before persistence
pub fn validate_mapping_entry(entry: &MappingEntry) -> DomainResult<()> {
    if entry.product_id.is_empty() {
        return Err(DomainError::InvariantViolation(
            "Mapping product id cannot be empty".to_string(),
        ));
    }

    if !entry.identifiers.has_sellable_identifier() {
        return Err(DomainError::MissingIdentifier(format!(
            "mapping for product {} needs a ticket class or POS item",
            entry.product_id
        )));
    }

    Ok(())
}

/// Invariants that must hold true for the Mapping domain:
///
/// 1. A scoped key is unique per (product, date, time-or-absence)
/// 2. Saving a scoped set replaces the whole set for that product
/// 3. Entries without a ticket class and without a POS item are never stored
/// 4. Stored entries carry one canonical field per identifier concept

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    #[test]
    fn test_manual_override_wins() {
        let input = MappingInput {
            date: Some("2025-06-01".to_string()),
            manual_ticket_class_id: Some("TIX-MANUAL".to_string()),
            ticket_class_id: Some("TIX-BASE".to_string()),
            suggested_ticket_class_id: Some("TIX-SUGGESTED".to_string()),
            ..MappingInput::default()
        };
        let ids = normalize_identifiers(&input);
        assert_eq!(ids.ticket_class_id.as_deref(), Some("TIX-MANUAL"));
    }

    #[test]
    fn test_single_spelling_used_as_is() {
        let input = MappingInput {
            suggested_event_id: Some(" EV-9 ".to_string()),
            legacy_pos_item_id: Some("SQ-1".to_string()),
            ..MappingInput::default()
        };
        let ids = normalize_identifiers(&input);
        assert_eq!(ids.event_id.as_deref(), Some("EV-9"));
        assert_eq!(ids.pos_item_id.as_deref(), Some("SQ-1"));
        assert_eq!(ids.ticket_class_id, None);
    }

    #[test]
    fn test_blank_manual_does_not_shadow_base() {
        let input = MappingInput {
            manual_pos_item_id: Some("   ".to_string()),
            pos_item_id: Some("POS-1".to_string()),
            ..MappingInput::default()
        };
        assert_eq!(
            normalize_identifiers(&input).pos_item_id.as_deref(),
            Some("POS-1")
        );
    }

    #[test]
    fn test_legacy_aliases_deserialize() {
        let input: MappingInput = serde_json::from_str(
            r#"{"date":"2025-06-01","eventbrite_ticket_id":"T1","square_item_id":"S1"}"#,
        )
        .unwrap();
        let entry = normalize_mapping_input(&ProductId::from("7"), &input)
            .unwrap()
            .unwrap();
        assert_eq!(entry.identifiers.ticket_class_id.as_deref(), Some("T1"));
        assert_eq!(entry.identifiers.pos_item_id.as_deref(), Some("S1"));
    }

    #[test]
    fn test_date_only_entry_is_dropped() {
        let input = MappingInput::dated("2025-06-01", Some("20:00"));
        assert!(normalize_mapping_input(&ProductId::from("1"), &input)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_malformed_date_and_time_are_errors() {
        let product = ProductId::from("1");
        let bad_date = MappingInput::dated("2025-13-01", None).with_pos_item("P");
        assert!(matches!(
            normalize_mapping_input(&product, &bad_date),
            Err(DomainError::InvalidDate(_))
        ));

        let bad_time = MappingInput::dated("2025-06-01", Some("8pm")).with_pos_item("P");
        assert!(matches!(
            normalize_mapping_input(&product, &bad_time),
            Err(DomainError::InvalidTime(_))
        ));
    }

    #[test]
    fn test_scoped_entry_fields() {
        let input = MappingInput::dated("2025-06-01", Some("20:00")).with_ticket("TIX-1", "EV-1");
        let entry = normalize_mapping_input(&ProductId::from("101"), &input)
            .unwrap()
            .unwrap();
        assert_eq!(entry.scope.date(), NaiveDate::from_ymd_opt(2025, 6, 1));
        assert_eq!(entry.scope.time(), NaiveTime::from_hms_opt(20, 0, 0));
        assert_eq!(entry.scope.time_key(), "20:00");
        assert!(validate_mapping_entry(&entry).is_ok());
    }
}
