// src/events/mod.rs
//
// Internal Event System - Public API
//
// CRITICAL: EventHandler is INTERNAL and must NOT be exported

pub mod bus;
pub mod handlers;
pub mod types;

pub use types::DomainEvent;

pub use types::{
    // Sales
    DuplicateSaleSkipped,
    HistoricalSaleImported,
    // Import
    ImportBatchCompleted,
    // Mapping
    MappingSaved,
    OrderProcessed,
    SaleRecorded,
};

pub use bus::{EventBus, EventLogEntry};

pub use handlers::{register_live_sale_hook, LiveSaleHook};

/// Initialize a new event bus
pub fn create_event_bus() -> EventBus {
    EventBus::new()
}
