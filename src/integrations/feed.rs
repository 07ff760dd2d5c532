// src/integrations/feed.rs
//
// Sale feed capability
//
// ARCHITECTURE:
// - One feed per source, consumed by the historical importer
// - Pagination is native to the source: offset for the storefront,
//   page + continuation for the ticketing platform
// - The HTTP clients behind real feeds live in the host
//
// CRITICAL RULES:
// - A feed never touches the aggregation; it only returns records
// - A fetch failure is an `AppError::UpstreamFetch`

use async_trait::async_trait;

use crate::domain::{CursorPosition, DateRange, ExternalSaleRecord, FeedPage, SaleSource};
use crate::error::{AppError, AppResult};

/// One page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedRequest {
    pub range: DateRange,
    pub position: CursorPosition,
    pub limit: usize,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SaleFeed: Send + Sync {
    fn source(&self) -> SaleSource;

    /// Position of the first page in this source's pagination scheme.
    fn first_position(&self) -> CursorPosition;

    async fn fetch_page(&self, request: &FeedRequest) -> AppResult<FeedPage>;
}

/// Feed over a fixed record list, filtered by the requested range.
/// Supports both pagination schemes.
pub struct StaticFeed {
    source: SaleSource,
    paged: bool,
    records: Vec<ExternalSaleRecord>,
}

impl StaticFeed {
    /// Offset-paginated feed.
    pub fn offset(source: SaleSource, records: Vec<ExternalSaleRecord>) -> Self {
        Self {
            source,
            paged: false,
            records,
        }
    }

    /// Page-paginated feed; continuation tokens are `page-N`.
    pub fn paged(source: SaleSource, records: Vec<ExternalSaleRecord>) -> Self {
        Self {
            source,
            paged: true,
            records,
        }
    }

    fn in_range(&self, range: &DateRange) -> Vec<&ExternalSaleRecord> {
        self.records
            .iter()
            .filter(|r| range.contains(r.occurred_at.date_naive()))
            .collect()
    }
}

#[async_trait]
impl SaleFeed for StaticFeed {
    fn source(&self) -> SaleSource {
        self.source
    }

    fn first_position(&self) -> CursorPosition {
        if self.paged {
            CursorPosition::first_page()
        } else {
            CursorPosition::first_offset()
        }
    }

    async fn fetch_page(&self, request: &FeedRequest) -> AppResult<FeedPage> {
        let start = match (&request.position, self.paged) {
            (CursorPosition::Offset { offset }, false) => *offset as usize,
            (CursorPosition::Page { page, .. }, true) => {
                (page.saturating_sub(1) as usize) * request.limit
            }
            (position, _) => {
                return Err(AppError::upstream(
                    self.source.as_str(),
                    format!("unsupported cursor position {:?}", position),
                ))
            }
        };

        let matching = self.in_range(&request.range);
        let records: Vec<ExternalSaleRecord> = matching
            .iter()
            .skip(start)
            .take(request.limit)
            .map(|r| (*r).clone())
            .collect();

        let continuation = match &request.position {
            CursorPosition::Page { page, .. } if start + records.len() < matching.len() => {
                Some(format!("page-{}", page + 1))
            }
            _ => None,
        };

        Ok(FeedPage {
            records,
            continuation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn records(n: u32) -> Vec<ExternalSaleRecord> {
        (1..=n)
            .map(|i| {
                ExternalSaleRecord::new(
                    format!("ORD-{}", i),
                    Utc.with_ymd_and_hms(2025, 6, i, 10, 0, 0).unwrap(),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_offset_pages() {
        let feed = StaticFeed::offset(SaleSource::Storefront, records(3));
        let range = DateRange::parse("2025-06-01", "2025-06-30").unwrap();

        let page = feed
            .fetch_page(&FeedRequest {
                range,
                position: CursorPosition::Offset { offset: 2 },
                limit: 2,
            })
            .await
            .unwrap();
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].external_ref, "ORD-3");
    }

    #[tokio::test]
    async fn test_paged_continuation() {
        let feed = StaticFeed::paged(SaleSource::Ticketing, records(3));
        let range = DateRange::parse("2025-06-01", "2025-06-30").unwrap();

        let first = feed
            .fetch_page(&FeedRequest {
                range,
                position: CursorPosition::first_page(),
                limit: 2,
            })
            .await
            .unwrap();
        assert_eq!(first.records.len(), 2);
        assert_eq!(first.continuation.as_deref(), Some("page-2"));
    }

    #[tokio::test]
    async fn test_mismatched_position_is_upstream_error() {
        let feed = StaticFeed::offset(SaleSource::Storefront, records(1));
        let range = DateRange::parse("2025-06-01", "2025-06-30").unwrap();
        let err = feed
            .fetch_page(&FeedRequest {
                range,
                position: CursorPosition::first_page(),
                limit: 2,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UpstreamFetch { .. }));
    }
}
