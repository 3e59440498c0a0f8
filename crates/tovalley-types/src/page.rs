//! Slice-style paging.
//!
//! Requests carry a zero-based page number and a page size; responses carry
//! the page content plus a `has_next` flag. No total count is computed.

use serde::{Deserialize, Serialize};

/// Default page size when the client does not specify one.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Upper bound on page size accepted from clients.
pub const MAX_PAGE_SIZE: u32 = 100;

/// A page request (zero-based page number).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
}

impl PageRequest {
    /// Build a page request, clamping the size into `1..=MAX_PAGE_SIZE`.
    pub fn new(page: u32, size: u32) -> Self {
        Self {
            page,
            size: size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Row offset of the first element of this page.
    pub fn offset(&self) -> i64 {
        i64::from(self.page) * i64::from(self.size)
    }

    /// Number of rows to fetch so that `has_next` can be derived
    /// without a count query.
    pub fn fetch_limit(&self) -> i64 {
        i64::from(self.size) + 1
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(0, DEFAULT_PAGE_SIZE)
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slice<T> {
    pub content: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub has_next: bool,
}

impl<T> Slice<T> {
    /// Build a slice from rows fetched with `PageRequest::fetch_limit`.
    ///
    /// The extra row, if present, is dropped and turns into `has_next`.
    pub fn from_overfetch(mut rows: Vec<T>, request: PageRequest) -> Self {
        let has_next = rows.len() > request.size as usize;
        rows.truncate(request.size as usize);
        Self {
            content: rows,
            page: request.page,
            size: request.size,
            has_next,
        }
    }

    /// Replace the content, keeping paging metadata (including `has_next`).
    pub fn with_content<U>(self, content: Vec<U>) -> Slice<U> {
        Slice {
            content,
            page: self.page,
            size: self.size,
            has_next: self.has_next,
        }
    }

    /// Map every element, keeping paging metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Slice<U> {
        Slice {
            content: self.content.into_iter().map(f).collect(),
            page: self.page,
            size: self.size,
            has_next: self.has_next,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_clamps_size() {
        assert_eq!(PageRequest::new(0, 0).size, 1);
        assert_eq!(PageRequest::new(0, 10_000).size, MAX_PAGE_SIZE);
    }

    #[test]
    fn test_offset_and_fetch_limit() {
        let req = PageRequest::new(3, 10);
        assert_eq!(req.offset(), 30);
        assert_eq!(req.fetch_limit(), 11);
    }

    #[test]
    fn test_from_overfetch_detects_next_page() {
        let req = PageRequest::new(0, 2);
        let slice = Slice::from_overfetch(vec![1, 2, 3], req);
        assert_eq!(slice.content, vec![1, 2]);
        assert!(slice.has_next);

        let last = Slice::from_overfetch(vec![1, 2], req);
        assert!(!last.has_next);
    }

    #[test]
    fn test_with_content_keeps_has_next() {
        let slice = Slice::from_overfetch(vec![1, 2, 3], PageRequest::new(1, 2));
        let replaced = slice.with_content(vec!["b", "a"]);
        assert!(replaced.has_next);
        assert_eq!(replaced.page, 1);
        assert_eq!(replaced.content, vec!["b", "a"]);
    }
}
