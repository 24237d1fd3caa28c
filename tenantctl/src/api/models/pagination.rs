//! Offset pagination shared by every admin list endpoint.
//!
//! Query parameters are `skip` and `limit`; responses wrap the page in
//! [`PaginatedResponse`] together with the pre-pagination total so clients
//! can render page controls without a second count request.

use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

/// Page size used when the client sends no `limit`.
pub const DEFAULT_LIMIT: i64 = 10;

/// Largest page size a client may request; larger values are clamped, not
/// rejected.
pub const MAX_LIMIT: i64 = 100;

/// `skip`/`limit` query parameters.
///
/// Values arrive as strings in the query, hence `DisplayFromStr`. Accessors
/// apply the defaults and clamps; handlers never read the raw fields.
#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct Pagination {
    /// Number of items to skip (default: 0)
    #[param(default = 0, minimum = 0)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub skip: Option<i64>,

    /// Maximum number of items to return (default: 10, max: 100)
    #[param(default = 10, minimum = 1, maximum = 100)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub limit: Option<i64>,
}

impl Pagination {
    /// Offset into the result set; negative values count as 0.
    #[inline]
    pub fn skip(&self) -> i64 {
        self.skip.unwrap_or(0).max(0)
    }

    /// Page size, clamped to `1..=MAX_LIMIT`.
    #[inline]
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    /// `(skip, limit)` after defaulting and clamping.
    #[inline]
    pub fn params(&self) -> (i64, i64) {
        (self.skip(), self.limit())
    }
}

/// One page of results plus the metadata needed to ask for the next one.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaginatedResponse<T: ToSchema> {
    /// The items for the current page
    pub data: Vec<T>,
    /// Total number of items matching the query (before pagination)
    pub total_count: i64,
    /// Number of items skipped
    pub skip: i64,
    /// Maximum items returned per page
    pub limit: i64,
}

impl<T: ToSchema> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, total_count: i64, skip: i64, limit: i64) -> Self {
        Self {
            data,
            total_count,
            skip,
            limit,
        }
    }
}
