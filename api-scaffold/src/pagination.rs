//! Pagination metadata and query parameters
//!
//! [`PaginationInfo`] is derived from exactly three inputs: the requested
//! page, the page size and the total item count. [`Pagination`] is the axum
//! extractor reading `page`/`per_page` from the query string.

use axum::{
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::PaginationConfig;
use crate::pipeline::ApiError;
use crate::validation::{self, LocItem, ValidationErrorRecord, ValidationFailure};

/// Default page when `page` is absent
pub const DEFAULT_PAGE: u32 = 1;

/// Default page size when `per_page` is absent and no configuration says otherwise
pub const DEFAULT_PER_PAGE: u32 = 10;

/// Pagination metadata for a list response
///
/// Fields are private: the only way to obtain a value is
/// [`PaginationInfo::compute`] (or deserializing one received over the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationInfo {
    total_items: u64,
    page: u32,
    per_page: u32,
    next_page: Option<u32>,
    prev_page: Option<u32>,
    total_pages: u64,
}

impl PaginationInfo {
    /// Compute pagination metadata
    ///
    /// `per_page` must be at least 1. Pages past the end are accepted and
    /// report no next page.
    ///
    /// ```rust
    /// use api_scaffold::pagination::PaginationInfo;
    ///
    /// let info = PaginationInfo::compute(2, 10, 25);
    /// assert_eq!(info.total_pages(), 3);
    /// assert_eq!(info.next_page(), Some(3));
    /// assert_eq!(info.prev_page(), Some(1));
    /// ```
    pub fn compute(page: u32, per_page: u32, total_items: u64) -> Self {
        debug_assert!(per_page >= 1, "per_page must be at least 1");
        let divisor = u64::from(per_page.max(1));

        let total_pages = total_items.div_ceil(divisor);
        let is_last_page = u64::from(page) * u64::from(per_page) >= total_items;

        Self {
            total_items,
            page,
            per_page,
            next_page: if is_last_page {
                None
            } else {
                page.checked_add(1)
            },
            prev_page: if page > 1 { Some(page - 1) } else { None },
            total_pages,
        }
    }

    pub fn total_items(&self) -> u64 {
        self.total_items
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    pub fn next_page(&self) -> Option<u32> {
        self.next_page
    }

    pub fn prev_page(&self) -> Option<u32> {
        self.prev_page
    }

    pub fn total_pages(&self) -> u64 {
        self.total_pages
    }

    /// Whether the current page is the last one (or past it)
    pub fn is_last_page(&self) -> bool {
        self.next_page.is_none()
    }
}

/// Requested page and page size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationParams {
    pub page: u32,
    pub per_page: u32,
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl PaginationParams {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self { page, per_page }
    }

    /// Number of rows to skip for SQL `OFFSET`
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.per_page)
    }

    /// Number of rows to return for SQL `LIMIT`
    pub fn limit(&self) -> u64 {
        u64::from(self.per_page)
    }
}

/// Defaults applied by the [`Pagination`] extractor
///
/// Installed as a request extension by [`crate::Scaffold::install`]; the
/// extractor uses [`PaginationDefaults::default`] when none is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationDefaults {
    pub per_page: u32,
    pub max_per_page: Option<u32>,
}

impl Default for PaginationDefaults {
    fn default() -> Self {
        Self {
            per_page: DEFAULT_PER_PAGE,
            max_per_page: None,
        }
    }
}

impl From<&PaginationConfig> for PaginationDefaults {
    fn from(config: &PaginationConfig) -> Self {
        Self {
            per_page: config.default_per_page.max(1),
            max_per_page: config.max_per_page,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawPaginationQuery {
    page: Option<String>,
    per_page: Option<String>,
}

/// Extractor for `?page=&per_page=`
///
/// Both values must be integers greater than or equal to 1. Invalid values are
/// rejected with a validation failure listing every offending parameter.
///
/// ```rust,no_run
/// use api_scaffold::envelope::ListEnvelope;
/// use api_scaffold::pagination::Pagination;
///
/// async fn list_numbers(Pagination(params): Pagination) -> ListEnvelope<u64> {
///     let items = (params.offset()..params.offset() + params.limit()).collect();
///     ListEnvelope::from_list(items, 1_000, params, None)
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination(pub PaginationParams);

impl Pagination {
    pub fn into_inner(self) -> PaginationParams {
        self.0
    }
}

impl std::ops::Deref for Pagination {
    type Target = PaginationParams;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S> FromRequestParts<S> for Pagination
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let defaults = parts
            .extensions
            .get::<PaginationDefaults>()
            .copied()
            .unwrap_or_default();

        let raw = Query::<RawPaginationQuery>::try_from_uri(&parts.uri)
            .map(|Query(raw)| raw)
            .map_err(validation::query_rejection)?;

        let mut errors = Vec::new();
        let page = parse_bound(
            "page",
            raw.page.as_deref(),
            DEFAULT_PAGE,
            None,
            &mut errors,
        );
        let per_page = parse_bound(
            "per_page",
            raw.per_page.as_deref(),
            defaults.per_page,
            defaults.max_per_page,
            &mut errors,
        );

        if !errors.is_empty() {
            return Err(ValidationFailure::new(errors)?.into());
        }

        Ok(Pagination(PaginationParams::new(page, per_page)))
    }
}

fn parse_bound(
    name: &str,
    raw: Option<&str>,
    default: u32,
    max: Option<u32>,
    errors: &mut Vec<ValidationErrorRecord>,
) -> u32 {
    let Some(raw) = raw else {
        return default;
    };
    let loc = vec![LocItem::from("query"), LocItem::from(name)];
    let input = Value::String(raw.to_string());

    let value = match raw.trim().parse::<i64>() {
        Ok(value) => value,
        Err(_) => {
            errors.push(ValidationErrorRecord::new(
                "int_parsing",
                loc,
                "Input should be a valid integer, unable to parse string as an integer",
                input,
            ));
            return default;
        }
    };

    if value < 1 {
        errors.push(
            ValidationErrorRecord::new(
                "greater_than_equal",
                loc,
                "Input should be greater than or equal to {ge}",
                input,
            )
            .with_ctx("ge", json!(1)),
        );
        return default;
    }

    let max = max.unwrap_or(u32::MAX);
    if value > i64::from(max) {
        errors.push(
            ValidationErrorRecord::new(
                "less_than_equal",
                loc,
                "Input should be less than or equal to {le}",
                input,
            )
            .with_ctx("le", json!(max)),
        );
        return default;
    }

    u32::try_from(value).unwrap_or(default)
}
