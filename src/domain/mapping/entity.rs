use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ProductId;

/// The per-source identifiers a canonical product is known by.
/// Each field may be absent; a mapping is only useful when at least a
/// ticket class or a POS item is present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceIdentifiers {
    /// Ticketing-platform ticket type
    pub ticket_class_id: Option<String>,

    /// Ticketing-platform event the ticket class belongs to
    pub event_id: Option<String>,

    /// Point-of-sale item
    pub pos_item_id: Option<String>,
}

impl SourceIdentifiers {
    pub fn new(
        ticket_class_id: Option<String>,
        event_id: Option<String>,
        pos_item_id: Option<String>,
    ) -> Self {
        Self {
            ticket_class_id: clean(ticket_class_id),
            event_id: clean(event_id),
            pos_item_id: clean(pos_item_id),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ticket_class_id.is_none() && self.event_id.is_none() && self.pos_item_id.is_none()
    }

    /// Date alone is not enough to sell anything: a ticket class or a POS
    /// item must be present.
    pub fn has_sellable_identifier(&self) -> bool {
        self.ticket_class_id.is_some() || self.pos_item_id.is_some()
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Where a mapping applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MappingScope {
    /// Unscoped fallback for the product
    Default,

    /// Restricted to one calendar date, optionally one time of day
    Dated {
        date: NaiveDate,
        time: Option<NaiveTime>,
    },
}

impl MappingScope {
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            MappingScope::Default => None,
            MappingScope::Dated { date, .. } => Some(*date),
        }
    }

    pub fn time(&self) -> Option<NaiveTime> {
        match self {
            MappingScope::Default => None,
            MappingScope::Dated { time, .. } => *time,
        }
    }

    /// Stored form of the time component: `HH:MM`, or empty for "no time".
    pub fn time_key(&self) -> String {
        self.time()
            .map(|t| format!("{:02}:{:02}", t.hour(), t.minute()))
            .unwrap_or_default()
    }
}

/// A single mapping record: product + scope + identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub product_id: ProductId,
    pub scope: MappingScope,
    pub identifiers: SourceIdentifiers,
    pub updated_at: DateTime<Utc>,
}

impl MappingEntry {
    pub fn default_for(product_id: ProductId, identifiers: SourceIdentifiers) -> Self {
        Self {
            product_id,
            scope: MappingScope::Default,
            identifiers,
            updated_at: Utc::now(),
        }
    }

    pub fn scoped(
        product_id: ProductId,
        date: NaiveDate,
        time: Option<NaiveTime>,
        identifiers: SourceIdentifiers,
    ) -> Self {
        Self {
            product_id,
            scope: MappingScope::Dated { date, time },
            identifiers,
            updated_at: Utc::now(),
        }
    }

    /// Absolute distance in seconds between this entry's time and `time`.
    /// None for entries without a time component.
    pub fn seconds_from(&self, time: NaiveTime) -> Option<i64> {
        self.scope
            .time()
            .map(|stored| (stored - time).num_seconds().abs())
    }
}

/// Raw mapping row as submitted by an admin form or an older export.
///
/// Several spellings of the same identifier may be present. Normalization
/// (see `normalize_mapping_input`) reduces them to one canonical field each:
/// manual override, then base field, then suggested value, then legacy key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingInput {
    pub date: Option<String>,
    pub time: Option<String>,

    pub manual_ticket_class_id: Option<String>,
    pub ticket_class_id: Option<String>,
    pub suggested_ticket_class_id: Option<String>,
    #[serde(alias = "ticket_id", alias = "eventbrite_ticket_id")]
    pub legacy_ticket_id: Option<String>,

    pub manual_event_id: Option<String>,
    pub event_id: Option<String>,
    pub suggested_event_id: Option<String>,
    #[serde(alias = "eventbrite_event_id")]
    pub legacy_event_id: Option<String>,

    pub manual_pos_item_id: Option<String>,
    pub pos_item_id: Option<String>,
    pub suggested_pos_item_id: Option<String>,
    #[serde(alias = "square_item_id", alias = "square_id")]
    pub legacy_pos_item_id: Option<String>,
}

impl MappingInput {
    pub fn dated(date: &str, time: Option<&str>) -> Self {
        Self {
            date: Some(date.to_string()),
            time: time.map(str::to_string),
            ..Self::default()
        }
    }

    pub fn with_ticket(mut self, ticket_class_id: &str, event_id: &str) -> Self {
        self.ticket_class_id = Some(ticket_class_id.to_string());
        self.event_id = Some(event_id.to_string());
        self
    }

    pub fn with_pos_item(mut self, pos_item_id: &str) -> Self {
        self.pos_item_id = Some(pos_item_id.to_string());
        self
    }
}
