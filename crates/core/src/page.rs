//! Generic page-result value for paginated queries.

use serde::Serialize;

/// One page of results plus global totals.
///
/// `total_elements` counts every row matching the query, not just the
/// returned slice; near the last page `items.len()` may be shorter than the
/// requested size.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageResult<T> {
    pub items: Vec<T>,
    /// 0-based index of the page this slice came from.
    pub page: u32,
    /// Requested page size (not necessarily `items.len()`).
    pub size: u32,
    pub total_elements: u64,
    pub total_pages: u32,
}

impl<T> PageResult<T> {
    /// Build a page, deriving `total_pages` from the global match count.
    pub fn new(items: Vec<T>, page: u32, size: u32, total_elements: u64) -> Self {
        let total_pages = if size == 0 {
            0
        } else {
            total_elements.div_ceil(size as u64) as u32
        };
        Self {
            items,
            page,
            size,
            total_elements,
            total_pages,
        }
    }
}
