// src/domain/catalog.rs
//
// Catalog Product
//
// Read-only view of a storefront catalog item. The catalog is owned by the
// storefront; this core never creates or deletes products.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::ProductId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub id: ProductId,
    pub name: String,
    pub sku: Option<String>,
    /// Unit price, used when a sale arrives without a revenue amount
    pub price: Decimal,
}

impl CatalogProduct {
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>, price: Decimal) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            sku: None,
            price,
        }
    }

    pub fn with_sku(mut self, sku: impl Into<String>) -> Self {
        self.sku = Some(sku.into());
        self
    }
}
