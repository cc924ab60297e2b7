//! # Pagination
//!
//! Page requests and the page envelope every list operation returns.
//!
//! ```text
//! count = 41, page_size = 20
//!
//!   page 1: offset  0  ████████████████████
//!   page 2: offset 20  ████████████████████
//!   page 3: offset 40  █
//!
//!   total_pages = ceil(41 / 20) = 3
//! ```
//!
//! Pages are 1-based. A `count` of 0 yields `total_pages = 0`.

use serde::{Deserialize, Serialize};

use crate::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// A requested page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    /// Creates a request, clamping `page` to ≥ 1 and `page_size` to 1..=100.
    pub fn new(page: u32, page_size: u32) -> Self {
        PageRequest {
            page: page.max(1),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Same request with the bounds applied, for values that arrived by serde.
    pub fn normalized(self) -> Self {
        PageRequest::new(self.page, self.page_size)
    }

    /// Rows to skip: `(page - 1) * page_size`.
    #[inline]
    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.page_size as i64
    }

    #[inline]
    pub fn limit(&self) -> i64 {
        self.page_size as i64
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        PageRequest::new(1, DEFAULT_PAGE_SIZE)
    }
}

/// `ceil(count / page_size)`, or 0 when there are no rows.
pub fn total_pages(count: i64, page_size: u32) -> u32 {
    if count <= 0 || page_size == 0 {
        return 0;
    }
    let size = page_size as i64;
    ((count + size - 1) / size) as u32
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    /// Total rows matching the filter, across all pages.
    pub count: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, count: i64, request: PageRequest) -> Self {
        Page {
            data,
            count,
            page: request.page,
            page_size: request.page_size,
            total_pages: total_pages(count, request.page_size),
        }
    }

    /// The page a read returns when it swallowed an error.
    pub fn empty(request: PageRequest) -> Self {
        Page::new(Vec::new(), 0, request)
    }

    /// Transforms the rows, keeping the envelope.
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            count: self.count,
            page: self.page,
            page_size: self.page_size,
            total_pages: self.total_pages,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 20), 0);
        assert_eq!(total_pages(1, 20), 1);
        assert_eq!(total_pages(20, 20), 1);
        assert_eq!(total_pages(41, 20), 3);
    }

    #[test]
    fn test_offset() {
        assert_eq!(PageRequest::new(1, 20).offset(), 0);
        assert_eq!(PageRequest::new(3, 20).offset(), 40);
    }

    #[test]
    fn test_request_is_clamped() {
        let req = PageRequest::new(0, 500);
        assert_eq!(req.page, 1);
        assert_eq!(req.page_size, MAX_PAGE_SIZE);
        assert_eq!(PageRequest::new(2, 0).page_size, 1);
    }

    #[test]
    fn test_page_envelope() {
        let page = Page::new(vec![1, 2, 3], 41, PageRequest::new(2, 20));
        assert_eq!(page.total_pages, 3);
        assert!(page.has_next());

        let doubled = page.map(|n| n * 2);
        assert_eq!(doubled.data, vec![2, 4, 6]);
        assert_eq!(doubled.count, 41);

        let empty: Page<i32> = Page::empty(PageRequest::default());
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next());
    }
}
