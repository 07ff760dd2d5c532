// src/services/event_date.rs
//
// Event-date extraction for order lines
//
// A storefront order line may belong to a dated occurrence, but where that
// date lives depends on which plugin sold it. Strategies are tried in order;
// the first one producing a date wins.
//
// DEFAULT CHAIN:
// 1. TicketingMetadata - explicit occurrence keys written by ticketing plugins
// 2. DateLikeField     - any custom field whose key mentions "date"
// 3. VariantAttribute  - variation attribute values ("Date: 2025-06-01")
// 4. TitleText         - date embedded in the product title

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;

use crate::domain::OrderLineItem;

pub trait EventDateStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn extract(&self, item: &OrderLineItem) -> Option<NaiveDate>;
}

/// Ordered list of strategies.
pub struct EventDateChain {
    strategies: Vec<Box<dyn EventDateStrategy>>,
}

impl EventDateChain {
    pub fn new(strategies: Vec<Box<dyn EventDateStrategy>>) -> Self {
        Self { strategies }
    }

    /// Returns the date and the name of the strategy that found it.
    pub fn resolve(&self, item: &OrderLineItem) -> Option<(NaiveDate, &'static str)> {
        self.strategies
            .iter()
            .find_map(|s| s.extract(item).map(|date| (date, s.name())))
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

impl Default for EventDateChain {
    fn default() -> Self {
        Self::new(vec![
            Box::new(TicketingMetadata::default()),
            Box::new(DateLikeField),
            Box::new(VariantAttribute::default()),
            Box::new(TitleText::default()),
        ])
    }
}

// ============================================================================
// STRATEGIES
// ============================================================================

pub struct TicketingMetadata {
    keys: Vec<&'static str>,
}

impl Default for TicketingMetadata {
    fn default() -> Self {
        Self {
            keys: vec![
                "event_date",
                "_event_date",
                "occurrence_date",
                "_occurrence_date",
                "ticket_date",
                "_ticket_date",
                "session_date",
                "_booking_start",
                "booking_date",
            ],
        }
    }
}

impl EventDateStrategy for TicketingMetadata {
    fn name(&self) -> &'static str {
        "ticketing_metadata"
    }

    fn extract(&self, item: &OrderLineItem) -> Option<NaiveDate> {
        self.keys.iter().find_map(|wanted| {
            item.meta
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(wanted))
                .and_then(|(_, value)| parse_flexible_date(value))
        })
    }
}

pub struct DateLikeField;

impl EventDateStrategy for DateLikeField {
    fn name(&self) -> &'static str {
        "date_like_field"
    }

    fn extract(&self, item: &OrderLineItem) -> Option<NaiveDate> {
        item.meta
            .iter()
            .filter(|(key, _)| key.to_ascii_lowercase().contains("date"))
            .find_map(|(_, value)| parse_flexible_date(value))
    }
}

/// Attribute values are tried as a bare date first, then searched with the
/// same patterns as the title.
#[derive(Default)]
pub struct VariantAttribute {
    text: TitleText,
}

impl EventDateStrategy for VariantAttribute {
    fn name(&self) -> &'static str {
        "variant_attribute"
    }

    fn extract(&self, item: &OrderLineItem) -> Option<NaiveDate> {
        item.attributes
            .values()
            .find_map(|value| parse_flexible_date(value).or_else(|| self.text.find(value)))
    }
}

pub struct TitleText {
    patterns: Vec<Regex>,
}

const MONTH: &str = r"(?:jan|feb|mar|apr|may|jun|jul|aug|sep|sept|oct|nov|dec)[a-z]*\.?";

impl Default for TitleText {
    fn default() -> Self {
        let sources = [
            // 2025-06-01
            r"\b(\d{4}-\d{2}-\d{2})\b".to_string(),
            // 01/06/2025, 01.06.2025
            r"\b(\d{1,2}[/.]\d{1,2}[/.]\d{4})\b".to_string(),
            // June 1, 2025 / Jun 1st 2025
            format!(r"(?i)\b({}\s+\d{{1,2}}(?:st|nd|rd|th)?,?\s+\d{{4}})\b", MONTH),
            // 1 June 2025 / 1st Jun, 2025
            format!(r"(?i)\b(\d{{1,2}}(?:st|nd|rd|th)?\s+{},?\s+\d{{4}})\b", MONTH),
            // 20250601
            r"\b(\d{8})\b".to_string(),
        ];

        Self {
            patterns: sources
                .iter()
                .filter_map(|source| Regex::new(source).ok())
                .collect(),
        }
    }
}

impl TitleText {
    fn find(&self, text: &str) -> Option<NaiveDate> {
        self.patterns.iter().find_map(|pattern| {
            pattern
                .captures_iter(text)
                .filter_map(|caps| caps.get(1))
                .find_map(|m| parse_flexible_date(m.as_str()))
        })
    }
}

impl EventDateStrategy for TitleText {
    fn name(&self) -> &'static str {
        "title_text"
    }

    fn extract(&self, item: &OrderLineItem) -> Option<NaiveDate> {
        self.find(&item.name)
    }
}

// ============================================================================
// PARSING
// ============================================================================

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%d.%m.%Y",
    "%B %d, %Y",
    "%B %d %Y",
    "%b %d, %Y",
    "%b %d %Y",
    "%d %B %Y",
    "%d %B, %Y",
    "%d %b %Y",
    "%d %b, %Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Parses the date formats seen in order metadata.
/// Day-first is assumed for numeric slash/dot dates.
pub fn parse_flexible_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if trimmed.len() == 8 && trimmed.chars().all(|c| c.is_ascii_digit()) {
        return NaiveDate::parse_from_str(trimmed, "%Y%m%d").ok();
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.date_naive());
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(dt.date());
        }
    }

    let cleaned = strip_ordinals(&trimmed.replace('.', " ").replace("  ", " "));
    let candidates = [trimmed.to_string(), strip_ordinals(trimmed), cleaned];

    candidates.iter().find_map(|candidate| {
        DATE_FORMATS
            .iter()
            .find_map(|format| NaiveDate::parse_from_str(candidate, format).ok())
    })
}

/// "1st" -> "1", "22nd" -> "22"
fn strip_ordinals(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let (body, tail) = match word.strip_suffix(',') {
                Some(body) => (body, ","),
                None => (word, ""),
            };
            let lower = body.to_ascii_lowercase();
            let digits = ["st", "nd", "rd", "th"]
                .iter()
                .find_map(|suffix| lower.strip_suffix(suffix))
                .filter(|d| !d.is_empty() && d.chars().all(|c| c.is_ascii_digit()));
            match digits {
                Some(d) => format!("{}{}", d, tail),
                None => word.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
