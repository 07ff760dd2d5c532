use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::{DomainError, DomainResult, ProductId};

use super::ledger::DedupKey;

/// The three systems that sell the same occurrences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleSource {
    Storefront,
    Ticketing,
    Pos,
}

impl SaleSource {
    pub const ALL: [SaleSource; 3] = [SaleSource::Storefront, SaleSource::Ticketing, SaleSource::Pos];

    pub fn as_str(&self) -> &'static str {
        match self {
            SaleSource::Storefront => "storefront",
            SaleSource::Ticketing => "ticketing",
            SaleSource::Pos => "pos",
        }
    }

    /// Short prefix used in webhook-style order keys.
    pub fn order_prefix(&self) -> &'static str {
        match self {
            SaleSource::Storefront => "web",
            SaleSource::Ticketing => "tix",
            SaleSource::Pos => "pos",
        }
    }
}

impl std::fmt::Display for SaleSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SaleSource {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "storefront" | "web" => Ok(SaleSource::Storefront),
            "ticketing" | "tix" => Ok(SaleSource::Ticketing),
            "pos" => Ok(SaleSource::Pos),
            other => Err(DomainError::InvariantViolation(format!(
                "Unknown sale source: {}",
                other
            ))),
        }
    }
}

/// A normalized sale from any source, keyed by canonical product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleEvent {
    pub product_id: ProductId,
    pub quantity: u32,
    pub source: SaleSource,

    /// Order / transaction reference in the originating system
    pub external_ref: String,

    /// Day the ticketed occurrence happens (not the day it was sold)
    pub event_date: Option<NaiveDate>,

    /// Line revenue. Catalog price x quantity when absent.
    pub revenue: Option<Decimal>,
    pub currency: Option<String>,
    pub customer: Option<String>,
}

impl SaleEvent {
    pub fn new(
        product_id: impl Into<ProductId>,
        quantity: u32,
        source: SaleSource,
        external_ref: impl Into<String>,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            source,
            external_ref: external_ref.into(),
            event_date: None,
            revenue: None,
            currency: None,
            customer: None,
        }
    }

    pub fn with_event_date(mut self, event_date: Option<NaiveDate>) -> Self {
        self.event_date = event_date;
        self
    }

    pub fn with_revenue(mut self, revenue: Decimal) -> Self {
        self.revenue = Some(revenue);
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    pub fn with_customer(mut self, customer: impl Into<String>) -> Self {
        self.customer = Some(customer.into());
        self
    }

    /// Aggregation key: the product, suffixed with the occurrence date when
    /// the sale belongs to a dated occurrence.
    pub fn product_key(&self) -> String {
        product_key(&self.product_id, self.event_date)
    }

    pub fn dedup_key(&self) -> DedupKey {
        DedupKey::for_sale(self.source, &self.external_ref, &self.product_key())
    }
}

pub fn product_key(product_id: &ProductId, event_date: Option<NaiveDate>) -> String {
    match event_date {
        Some(date) => format!("{}_{}", product_id, date.format("%Y-%m-%d")),
        None => product_id.to_string(),
    }
}

/// Validates SaleEvent invariants
pub fn validate_sale_event(sale: &SaleEvent) -> DomainResult<()> {
    if sale.product_id.is_empty() {
        return Err(DomainError::MissingIdentifier("sale product id".to_string()));
    }

    if sale.quantity == 0 {
        return Err(DomainError::InvariantViolation(
            "Sale quantity must be positive".to_string(),
        ));
    }

    if sale.external_ref.trim().is_empty() {
        return Err(DomainError::MissingIdentifier(
            "sale external reference".to_string(),
        ));
    }

    if let Some(revenue) = sale.revenue {
        if revenue.is_sign_negative() {
            return Err(DomainError::InvariantViolation(format!(
                "Sale revenue cannot be negative: {}",
                revenue
            )));
        }
    }

    Ok(())
}

/// A sale known only by a source-specific identifier.
/// The canonical product is found through the mapping resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSale {
    pub source: SaleSource,

    /// Ticket class or POS item id
    pub identifier: Option<String>,

    /// Ticketing event id, used when the identifier alone does not resolve
    pub event_id: Option<String>,

    pub occurrence_date: Option<NaiveDate>,
    pub occurrence_time: Option<NaiveTime>,

    pub quantity: u32,
    pub external_ref: String,
    pub revenue: Option<Decimal>,
    pub currency: Option<String>,
    pub customer: Option<String>,
}

impl SourceSale {
    pub fn new(
        source: SaleSource,
        identifier: impl Into<String>,
        quantity: u32,
        external_ref: impl Into<String>,
    ) -> Self {
        Self {
            source,
            identifier: Some(identifier.into()),
            event_id: None,
            occurrence_date: None,
            occurrence_time: None,
            quantity,
            external_ref: external_ref.into(),
            revenue: None,
            currency: None,
            customer: None,
        }
    }

    pub fn at(mut self, date: NaiveDate, time: Option<NaiveTime>) -> Self {
        self.occurrence_date = Some(date);
        self.occurrence_time = time;
        self
    }

    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = Some(event_id.into());
        self
    }

    pub fn into_sale_event(self, product_id: ProductId) -> SaleEvent {
        SaleEvent {
            product_id,
            quantity: self.quantity,
            source: self.source,
            external_ref: self.external_ref,
            event_date: self.occurrence_date,
            revenue: self.revenue,
            currency: self.currency,
            customer: self.customer,
        }
    }
}
