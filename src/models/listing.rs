// file: src/models/listing.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{MeetingStatus, MeetingView, SyncMeta};

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;
/// Highest page whose offset still fits in an `i64` at the largest page size.
pub const MAX_PAGE: i64 = i64::MAX / MAX_PAGE_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }
}

/// A validated page request: `page` is within 1..=MAX_PAGE, `limit` within 1..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).clamp(1, MAX_PAGE),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Query-string parameters accepted by the listing endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl ListingParams {
    pub fn is_paginated(&self) -> bool {
        self.page.is_some() || self.limit.is_some()
    }

    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page, self.limit)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: i64,
    pub total_pages: i64,
    pub total_count: i64,
    pub limit: i64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl Pagination {
    pub fn new(request: PageRequest, total_count: i64) -> Self {
        Self {
            current_page: request.page,
            total_pages: (total_count + request.limit - 1) / request.limit,
            total_count,
            limit: request.limit,
            has_next_page: request.page.saturating_mul(request.limit) < total_count,
            has_prev_page: request.page > 1,
        }
    }
}

/// Response body of every listing endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct MeetingListing {
    pub success: bool,
    pub meetings: Vec<MeetingView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<SyncMeta>,
}

/// Selection of meetings for the store's `find`/`count` operations.
#[derive(Debug, Clone)]
pub struct MeetingFilter {
    /// Host or participant.
    pub member_id: Option<String>,
    pub statuses: Vec<MeetingStatus>,
    pub scheduled_from: Option<DateTime<Utc>>,
    pub scheduled_until: Option<DateTime<Utc>>,
    pub order: SortOrder,
    pub page: Option<PageRequest>,
}

impl MeetingFilter {
    pub fn for_member(member_id: &str) -> Self {
        Self {
            member_id: Some(member_id.to_string()),
            statuses: Vec::new(),
            scheduled_from: None,
            scheduled_until: None,
            order: SortOrder::Ascending,
            page: None,
        }
    }

    pub fn with_statuses(mut self, statuses: &[MeetingStatus]) -> Self {
        self.statuses = statuses.to_vec();
        self
    }

    pub fn scheduled_from(mut self, from: DateTime<Utc>) -> Self {
        self.scheduled_from = Some(from);
        self
    }

    pub fn scheduled_until(mut self, until: DateTime<Utc>) -> Self {
        self.scheduled_until = Some(until);
        self
    }

    pub fn ordered(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    pub fn paged(mut self, page: Option<PageRequest>) -> Self {
        self.page = page;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_defaults_and_caps() {
        let page = PageRequest::new(None, None);
        assert_eq!(page.page, 1);
        assert_eq!(page.limit, 20);
        assert_eq!(page.offset(), 0);

        let page = PageRequest::new(Some(3), Some(500));
        assert_eq!(page.limit, 100);
        assert_eq!(page.offset(), 200);

        let page = PageRequest::new(Some(0), Some(0));
        assert_eq!(page.page, 1);
        assert_eq!(page.limit, 1);
    }

    #[test]
    fn test_pagination_math() {
        let p = Pagination::new(PageRequest::new(Some(1), Some(20)), 45);
        assert_eq!(p.total_pages, 3);
        assert!(p.has_next_page);
        assert!(!p.has_prev_page);

        let p = Pagination::new(PageRequest::new(Some(3), Some(20)), 45);
        assert!(!p.has_next_page);
        assert!(p.has_prev_page);

        let p = Pagination::new(PageRequest::default(), 0);
        assert_eq!(p.total_pages, 0);
        assert!(!p.has_next_page);
    }

    #[test]
    fn test_huge_page_is_clamped() {
        let page = PageRequest::new(Some(i64::MAX), Some(MAX_PAGE_SIZE));
        assert_eq!(page.page, MAX_PAGE);
        assert!(page.offset() > 0);

        let p = Pagination::new(page, 3);
        assert_eq!(p.current_page, MAX_PAGE);
        assert!(!p.has_next_page);
        assert!(p.has_prev_page);
    }

    #[test]
    fn test_listing_params_pagination_flag() {
        assert!(!ListingParams::default().is_paginated());
        let params = ListingParams {
            limit: Some(5),
            ..Default::default()
        };
        assert!(params.is_paginated());
        assert_eq!(params.page_request().limit, 5);
    }
}
