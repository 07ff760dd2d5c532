// src/services/mod.rs
//
// Services Module - Orchestration Layer

pub mod event_date;
pub mod import_service;
pub mod mapping_service;
pub mod reporting_service;
pub mod sales_service;

#[cfg(test)]
mod mapping_service_tests;
#[cfg(test)]
mod sales_service_tests;

// Re-export all services and their types
pub use event_date::{
    parse_flexible_date, DateLikeField, EventDateChain, EventDateStrategy, TicketingMetadata,
    TitleText, VariantAttribute,
};

pub use import_service::ImportService;

pub use mapping_service::MappingService;

pub use reporting_service::ReportingService;

pub use sales_service::SalesService;
