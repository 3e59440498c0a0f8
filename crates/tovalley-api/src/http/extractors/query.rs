//! Query parameter extractors for paged list endpoints.

use serde::Deserialize;

use tovalley_types::page::{DEFAULT_PAGE_SIZE, PageRequest};

/// `?page=&size=` for slice endpoints. Page is zero-based.
#[derive(Debug, Deserialize, Default)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub size: Option<u32>,
}

impl PageQuery {
    /// Convert to a page request; size is clamped to the allowed range.
    pub fn into_request(self) -> PageRequest {
        PageRequest::new(
            self.page.unwrap_or(0),
            self.size.unwrap_or(DEFAULT_PAGE_SIZE),
        )
    }
}
