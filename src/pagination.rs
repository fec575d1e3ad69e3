//! Page-count arithmetic for list responses.
//!
//! Pages are 1-based: page 1 with limit 10 covers rows 0..10. The offset
//! convention is `(page - 1) * limit` throughout the service.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaginationError {
    #[error("page size must be positive, got {0}")]
    InvalidLimit(i32),
    #[error("page number must be positive, got {0}")]
    InvalidPage(i32),
}

/// Derived paging metadata for a query result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    pub total_pages: i64,
    /// The page after the current one, absent on the last page.
    pub next_page: Option<i32>,
}

impl Pagination {
    /// Compute total pages and the next-page pointer.
    ///
    /// `limit` must be positive; a zero page size is rejected at the HTTP
    /// boundary, so seeing one here is a caller bug and is surfaced as an
    /// error rather than a division panic.
    pub fn compute(page: i32, count_all: i64, limit: i32) -> Result<Self, PaginationError> {
        if limit <= 0 {
            return Err(PaginationError::InvalidLimit(limit));
        }
        if page <= 0 {
            return Err(PaginationError::InvalidPage(page));
        }
        let limit = i64::from(limit);
        let total_pages = (count_all + limit - 1) / limit;
        let next_page = if i64::from(page) < total_pages {
            Some(page + 1)
        } else {
            None
        };
        Ok(Self {
            total_pages,
            next_page,
        })
    }
}

/// Row offset for a 1-based page.
pub fn page_offset(page: i32, limit: i32) -> i32 {
    (page - 1).max(0) * limit
}
