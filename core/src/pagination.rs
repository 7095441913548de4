use serde::{Deserialize, Serialize};

pub const MIN_PAGE_SIZE: i64 = 1;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: i64,
    pub total_pages: i64,
    pub current_page: i64,
    pub page_size: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total_count: i64, page: i64, page_size: i64) -> Self {
        let total_pages = if total_count == 0 {
            0
        } else {
            (total_count + page_size - 1) / page_size
        };
        Self {
            items,
            total_count,
            total_pages,
            current_page: page,
            page_size,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }
}

/// Clamp a caller-supplied page size into the contract's `[1,100]` range.
pub fn clamp_page_size(limit: i64) -> i64 {
    limit.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE)
}
