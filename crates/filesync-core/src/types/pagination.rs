//! Paging for file listings.

use serde::Serialize;

/// Page size used when a caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: u64 = 25;
/// Largest page a caller may request.
pub const MAX_PAGE_SIZE: u64 = 100;

/// A validated slice of a file listing.
///
/// Only [`PageRequest::new`] builds one, so `page >= 1` and
/// `1 <= page_size <= MAX_PAGE_SIZE` always hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u64,
    page_size: u64,
}

impl PageRequest {
    /// Clamp raw query values into a usable request.
    pub fn new(page: u64, page_size: u64) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// 1-based page number.
    pub fn page(&self) -> u64 {
        self.page
    }

    /// Files per page.
    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Number of files to skip. Saturates for absurd page numbers, which
    /// then simply land past the end of the listing.
    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    pub fn limit(&self) -> u64 {
        self.page_size
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE)
    }
}

/// One page of a listing, as returned by `GET /api/files`.
#[derive(Debug, Clone, Serialize)]
pub struct PageResponse<T: Serialize> {
    pub items: Vec<T>,
    pub page: u64,
    pub page_size: u64,
    /// Matching files across all pages.
    pub total_items: u64,
    /// At least 1, even for an empty listing.
    pub total_pages: u64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl<T: Serialize> PageResponse<T> {
    /// Wrap the items fetched for `request` out of `total_items` matches.
    pub fn new(items: Vec<T>, request: &PageRequest, total_items: u64) -> Self {
        let total_pages = total_items.div_ceil(request.page_size).max(1);
        Self {
            items,
            page: request.page,
            page_size: request.page_size,
            total_items,
            total_pages,
            has_next: request.page < total_pages,
            has_previous: request.page > 1,
        }
    }
}
