// events/types.rs
//
// All domain events in the system.
// Each event represents an immutable fact that has already occurred.
//
// CRITICAL RULES:
// - Events are facts, not commands
// - Events are immutable
// - Events carry only the data needed to react
// - No business logic in event types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{ProductId, SaleSource};

/// Trait that all domain events must implement
pub trait DomainEvent: std::fmt::Debug + Clone {
    fn event_id(&self) -> Uuid;

    fn occurred_at(&self) -> DateTime<Utc>;

    fn event_type(&self) -> &'static str;
}

macro_rules! domain_event {
    ($name:ident) => {
        impl DomainEvent for $name {
            fn event_id(&self) -> Uuid {
                self.event_id
            }
            fn occurred_at(&self) -> DateTime<Utc> {
                self.occurred_at
            }
            fn event_type(&self) -> &'static str {
                stringify!($name)
            }
        }
    };
}

// ============================================================================
// SALE EVENTS
// ============================================================================

/// A live sale changed the aggregation.
/// Stock-decrement and other live side effects subscribe to this event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleRecorded {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub product_id: ProductId,
    pub product_key: String,
    pub event_date: Option<NaiveDate>,
    pub quantity: u32,
    pub source: SaleSource,
    pub external_ref: String,
    /// Always true; backfills are `HistoricalSaleImported`
    pub live: bool,
}

impl SaleRecorded {
    pub fn new(
        product_id: ProductId,
        product_key: String,
        quantity: u32,
        source: SaleSource,
        external_ref: String,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            product_id,
            product_key,
            event_date: None,
            quantity,
            source,
            external_ref,
            live: true,
        }
    }

    pub fn with_event_date(mut self, event_date: Option<NaiveDate>) -> Self {
        self.event_date = event_date;
        self
    }
}

domain_event!(SaleRecorded);

/// A backfilled sale changed the aggregation. Never triggers live effects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalSaleImported {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub product_id: ProductId,
    pub product_key: String,
    pub quantity: u32,
    pub source: SaleSource,
    pub external_ref: String,
}

impl HistoricalSaleImported {
    pub fn new(
        product_id: ProductId,
        product_key: String,
        quantity: u32,
        source: SaleSource,
        external_ref: String,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            product_id,
            product_key,
            quantity,
            source,
            external_ref,
        }
    }
}

domain_event!(HistoricalSaleImported);

/// A delivery carried a dedup key that was already claimed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateSaleSkipped {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub dedup_key: String,
}

impl DuplicateSaleSkipped {
    pub fn new(dedup_key: String) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            dedup_key,
        }
    }
}

domain_event!(DuplicateSaleSkipped);

/// An order finished processing. `marked_processed` is false when some
/// group failed and a redelivery should retry it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderProcessed {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub order_id: String,
    pub source: SaleSource,
    pub groups_recorded: usize,
    pub failures: usize,
    pub marked_processed: bool,
}

impl OrderProcessed {
    pub fn new(
        order_id: String,
        source: SaleSource,
        groups_recorded: usize,
        failures: usize,
        marked_processed: bool,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            order_id,
            source,
            groups_recorded,
            failures,
            marked_processed,
        }
    }
}

domain_event!(OrderProcessed);

// ============================================================================
// MAPPING EVENTS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingSaved {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub product_id: ProductId,
    pub saved: usize,
    pub removed: usize,
}

impl MappingSaved {
    pub fn new(product_id: ProductId, saved: usize, removed: usize) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            product_id,
            saved,
            removed,
        }
    }
}

domain_event!(MappingSaved);

// ============================================================================
// IMPORT EVENTS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportBatchCompleted {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub source: SaleSource,
    pub processed: usize,
    pub imported: usize,
    pub failed: usize,
    pub complete: bool,
}

impl ImportBatchCompleted {
    pub fn new(
        source: SaleSource,
        processed: usize,
        imported: usize,
        failed: usize,
        complete: bool,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            source,
            processed,
            imported,
            failed,
            complete,
        }
    }
}

domain_event!(ImportBatchCompleted);
