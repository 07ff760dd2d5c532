// src/integrations/catalog.rs
//
// Catalog lookup capability
//
// CRITICAL RULES:
// - The storefront owns the catalog; this core only reads it
// - A missing product is `Ok(None)`, not an error
// - Lookup failures (network, auth) are errors and abort the current unit

use std::collections::HashMap;
use std::sync::RwLock;

use crate::domain::{CatalogProduct, ProductId};
use crate::error::AppResult;

#[cfg_attr(test, mockall::automock)]
pub trait CatalogLookup: Send + Sync {
    fn get_product(&self, id: &ProductId) -> AppResult<Option<CatalogProduct>>;
}

/// Catalog held in memory. Used by hosts that push catalog snapshots and by
/// tests.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    products: RwLock<HashMap<ProductId, CatalogProduct>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_product(self, product: CatalogProduct) -> Self {
        self.insert(product);
        self
    }

    pub fn insert(&self, product: CatalogProduct) {
        let mut products = match self.products.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        products.insert(product.id.clone(), product);
    }
}

impl CatalogLookup for InMemoryCatalog {
    fn get_product(&self, id: &ProductId) -> AppResult<Option<CatalogProduct>> {
        let products = match self.products.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Ok(products.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_in_memory_lookup() {
        let catalog = InMemoryCatalog::new()
            .with_product(CatalogProduct::new("101", "Evening Tour", Decimal::new(2500, 2)));

        assert!(catalog.get_product(&ProductId::from("101")).unwrap().is_some());
        assert!(catalog.get_product(&ProductId::from("999")).unwrap().is_none());
    }
}
