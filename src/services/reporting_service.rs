// src/services/reporting_service.rs
//
// Reporting Service
//
// Read-only queries over the aggregation.
//
// CRITICAL RULES:
// - Never writes
// - Ranges are inclusive on both ends; start after end is a validation error

use std::sync::Arc;

use chrono::NaiveDate;

use crate::domain::{DailySaleRecord, DateRange, PeriodSummary, ProductId, ProductSummaryRecord};
use crate::error::{AppError, AppResult};
use crate::repositories::SalesRepository;

pub struct ReportingService {
    sales_repo: Arc<dyn SalesRepository>,
}

impl ReportingService {
    pub fn new(sales_repo: Arc<dyn SalesRepository>) -> Self {
        Self { sales_repo }
    }

    /// Daily records ordered by sale date then product key, each with its
    /// order audit list.
    pub fn get_daily_sales(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        product_id: Option<&ProductId>,
        event_date: Option<NaiveDate>,
    ) -> AppResult<Vec<DailySaleRecord>> {
        let range = checked_range(start, end)?;
        self.sales_repo.list_daily(&range, product_id, event_date)
    }

    pub fn get_product_summary(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<Vec<ProductSummaryRecord>> {
        let range = checked_range(start, end)?;
        self.sales_repo.list_summaries(&range)
    }

    pub fn get_period_summary(&self, start: NaiveDate, end: NaiveDate) -> AppResult<PeriodSummary> {
        let range = checked_range(start, end)?;
        self.sales_repo.period_summary(&range)
    }
}

fn checked_range(start: NaiveDate, end: NaiveDate) -> AppResult<DateRange> {
    DateRange::new(start, end).map_err(|e| AppError::validation(e.to_string()))
}
