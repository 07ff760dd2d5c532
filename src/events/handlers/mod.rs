// src/events/handlers/mod.rs
//
// Event Handlers
//
// Handlers use closure-based subscription via EventBus::subscribe.
// Only registration functions and hook traits are exported.

pub mod live_sale_handler;

pub use live_sale_handler::{register_live_sale_hook, LiveSaleHook};
