// src/domain/order.rs
//
// Storefront Order
//
// A multi-line sale as delivered by the storefront webhook. Line items carry
// loosely-typed metadata from which an occurrence date may be recovered.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::{ProductId, SaleSource};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorefrontOrder {
    pub order_id: String,
    #[serde(default = "default_order_source")]
    pub source: SaleSource,
    pub currency: Option<String>,
    pub customer: Option<String>,
    pub line_items: Vec<OrderLineItem>,
}

fn default_order_source() -> SaleSource {
    SaleSource::Storefront
}

impl StorefrontOrder {
    pub fn new(order_id: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
            source: SaleSource::Storefront,
            currency: None,
            customer: None,
            line_items: Vec::new(),
        }
    }

    pub fn with_line(mut self, item: OrderLineItem) -> Self {
        self.line_items.push(item);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineItem {
    pub product_id: ProductId,
    /// Product title as shown on the order
    pub name: String,
    pub quantity: u32,
    /// Line total; catalog price x quantity when absent
    pub total: Option<Decimal>,
    /// Custom fields attached to the line (ticketing plugins, booking forms)
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
    /// Variation attributes (e.g. a "date" attribute on a variable product)
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl OrderLineItem {
    pub fn new(product_id: impl Into<ProductId>, name: impl Into<String>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            name: name.into(),
            quantity,
            total: None,
            meta: BTreeMap::new(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_total(mut self, total: Decimal) -> Self {
        self.total = Some(total);
        self
    }

    pub fn with_meta(mut self, key: &str, value: &str) -> Self {
        self.meta.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_attribute(mut self, key: &str, value: &str) -> Self {
        self.attributes.insert(key.to_string(), value.to_string());
        self
    }
}

/// One (product, occurrence) group recorded from an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedGroup {
    pub product_id: ProductId,
    pub event_date: Option<NaiveDate>,
    pub quantity: u32,
    pub product_key: String,
}

/// A line (or group) that could not be recorded because of a hard error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineFailure {
    pub product_id: ProductId,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderIngestResult {
    pub order_id: String,
    /// The whole order had already been processed
    pub duplicate_order: bool,
    pub recorded: Vec<RecordedGroup>,
    /// Groups whose dedup key was already present (retry re-entry)
    pub skipped_duplicates: Vec<String>,
    pub errors: Vec<LineFailure>,
    pub warnings: Vec<String>,
    /// The order key was claimed; a redelivery will be skipped whole
    pub marked_processed: bool,
}

impl OrderIngestResult {
    pub fn is_partial(&self) -> bool {
        !self.errors.is_empty() || !self.warnings.is_empty()
    }
}
