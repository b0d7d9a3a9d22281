use serde::Serialize;

use crate::config::PageLimits;
use crate::validation::Params;

/// Resolved window over an ordered result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
}

impl Pagination {
    pub fn new(limit: i64, offset: i64) -> Self {
        Self { limit, offset }
    }

    /// `limit`/`offset` win whenever either is present; otherwise
    /// `page`/`per_page` translate to `offset = (page - 1) * per_page`.
    pub fn from_params(params: &Params, limits: PageLimits) -> Self {
        let clamp = |size: Option<i64>| match size {
            Some(size) if size > 0 => size.min(limits.max_per_page),
            _ => limits.default_per_page,
        };

        if params.contains("limit") || params.contains("offset") {
            return Self {
                limit: clamp(params.int("limit")),
                offset: params.int("offset").unwrap_or(0),
            };
        }

        let per_page = clamp(params.int("per_page"));
        let page = params.int("page").unwrap_or(1).max(1);
        Self {
            limit: per_page,
            offset: (page - 1).saturating_mul(per_page),
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(PageLimits::default().default_per_page, 0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, window: Pagination) -> Self {
        Self {
            items,
            total,
            limit: window.limit,
            offset: window.offset,
        }
    }
}
