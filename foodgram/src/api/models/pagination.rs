//! Shared pagination types for API query parameters.
//!
//! List endpoints are page based: `?page=N&limit=M`, with the default and maximum page size
//! taken from [`PaginationConfig`]. Responses carry the total count and absolute links to the
//! neighbouring pages, built from the public URL and the request's own query string so that
//! filters survive paging.

use axum::http::Uri;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use url::Url;
use utoipa::{IntoParams, ToSchema};

use crate::config::PaginationConfig;
use crate::errors::{Error, Result};

/// Page-based pagination parameters for list endpoints.
///
/// - `page`: 1-based page number (default: 1)
/// - `limit`: Page size (default and maximum come from configuration)
#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct Pagination {
    /// Page number, starting at 1
    #[param(default = 1, minimum = 1)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub page: Option<i64>,

    /// Maximum number of items per page
    #[param(default = 6, minimum = 1, maximum = 100)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub limit: Option<i64>,
}

/// A resolved page: number and size, both at least 1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl Pagination {
    /// Resolve against the configured defaults. The limit is clamped to `1..=max_limit`.
    pub fn resolve(&self, config: &PaginationConfig) -> PageRequest {
        PageRequest {
            page: self.page.unwrap_or(1).max(1),
            limit: self.limit.unwrap_or(config.default_limit).clamp(1, config.max_limit),
        }
    }
}

impl PageRequest {
    /// Number of rows to skip
    #[inline]
    pub fn skip(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// Pages past the end are an error, except the first page of an empty list
    pub fn ensure_exists(&self, count: i64) -> Result<()> {
        if self.page > 1 && self.skip() >= count {
            return Err(Error::not_found("Page", self.page));
        }
        Ok(())
    }
}

/// Paginated response wrapper for list endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaginatedResponse<T> {
    /// Total number of items matching the query (before pagination)
    pub count: i64,
    /// Absolute URL of the next page
    pub next: Option<String>,
    /// Absolute URL of the previous page
    pub previous: Option<String>,
    /// The items for the current page
    pub results: Vec<T>,
}

impl<T> PaginatedResponse<T> {
    pub fn new(results: Vec<T>, count: i64, page: PageRequest, request_url: &Url) -> Self {
        let has_next = page.page.saturating_mul(page.limit) < count;
        Self {
            count,
            next: has_next.then(|| page_link(request_url, page.page + 1)),
            previous: (page.page > 1).then(|| page_link(request_url, page.page - 1)),
            results,
        }
    }
}

/// Absolute URL of the current request, as seen from outside
pub fn request_url(public_url: &Url, uri: &Uri) -> Url {
    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    public_url.join(path_and_query).unwrap_or_else(|_| public_url.clone())
}

/// The request URL with its `page` parameter replaced. Page 1 drops the parameter entirely.
fn page_link(request_url: &Url, page: i64) -> String {
    let mut url = request_url.clone();
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "page")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    url.set_query(None);
    if !kept.is_empty() || page > 1 {
        let mut query = url.query_pairs_mut();
        for (key, value) in &kept {
            query.append_pair(key, value);
        }
        if page > 1 {
            query.append_pair("page", &page.to_string());
        }
    }

    url.to_string()
}
