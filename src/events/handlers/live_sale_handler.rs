// src/events/handlers/live_sale_handler.rs
//
// Live side-effect hooks
//
// CRITICAL RULES:
// - Only live sales reach these hooks; backfills emit a different event
// - Hooks receive plain data and never call back into the engine
// - A failing hook is logged and does not affect the recorded sale

use std::sync::Arc;

use crate::domain::ProductId;
use crate::events::types::SaleRecorded;
use crate::events::EventBus;

/// Consumer of live sales, e.g. a storefront stock decrement.
pub trait LiveSaleHook: Send + Sync {
    fn on_live_sale(&self, product_id: &ProductId, quantity: u32) -> Result<(), String>;
}

/// Subscribes `hook` to live sales on `bus`.
pub fn register_live_sale_hook(bus: &EventBus, hook: Arc<dyn LiveSaleHook>) {
    bus.subscribe::<SaleRecorded, _>(move |event| {
        if let Err(message) = hook.on_live_sale(&event.product_id, event.quantity) {
            log::warn!(
                "Live sale hook failed for product {} ({} from {} ref {}): {}",
                event.product_id,
                event.quantity,
                event.source,
                event.external_ref,
                message
            );
        }
    });

    log::debug!("Live sale hook registered");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SaleSource;
    use crate::events::types::HistoricalSaleImported;
    use std::sync::Mutex;

    #[derive(Default)]
    struct StockSpy {
        decrements: Mutex<Vec<(String, u32)>>,
    }

    impl LiveSaleHook for StockSpy {
        fn on_live_sale(&self, product_id: &ProductId, quantity: u32) -> Result<(), String> {
            self.decrements
                .lock()
                .unwrap()
                .push((product_id.to_string(), quantity));
            Ok(())
        }
    }

    #[test]
    fn test_only_live_sales_reach_hook() {
        let bus = EventBus::new();
        let spy = Arc::new(StockSpy::default());
        register_live_sale_hook(&bus, spy.clone());

        bus.emit(SaleRecorded::new(
            ProductId::from("101"),
            "101".to_string(),
            2,
            SaleSource::Storefront,
            "W-1".to_string(),
        ));
        bus.emit(HistoricalSaleImported::new(
            ProductId::from("101"),
            "101".to_string(),
            5,
            SaleSource::Storefront,
            "W-0".to_string(),
        ));

        assert_eq!(
            *spy.decrements.lock().unwrap(),
            vec![("101".to_string(), 2)]
        );
    }
}
