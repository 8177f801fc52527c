//! Page/limit handling shared by every list operation.
//!
//! One clamp policy everywhere: `page >= 1`, `1 <= limit <= 50`, defaults
//! `page = 1` and `limit = 10`.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 10;
pub const MIN_LIMIT: u32 = 1;
pub const MAX_LIMIT: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    pub fn new(page: i64, limit: i64) -> Self {
        let page = page.clamp(1, i64::from(u32::MAX)) as u32;
        let limit = limit.clamp(i64::from(MIN_LIMIT), i64::from(MAX_LIMIT)) as u32;
        Self { page, limit }
    }

    /// Lenient parse of raw query values: anything non-numeric falls back to
    /// the default instead of failing the request.
    pub fn from_raw(page: Option<&str>, limit: Option<&str>) -> Self {
        let page = page
            .and_then(|value| value.trim().parse::<i64>().ok())
            .unwrap_or(i64::from(DEFAULT_PAGE));
        let limit = limit
            .and_then(|value| value.trim().parse::<i64>().ok())
            .unwrap_or(i64::from(DEFAULT_LIMIT));
        Self::new(page, limit)
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn offset(&self) -> i64 {
        (i64::from(self.page) - 1) * i64::from(self.limit)
    }

    pub fn info(&self, total: u64) -> PageInfo {
        PageInfo {
            total,
            current_page: self.page,
            total_pages: total.div_ceil(u64::from(self.limit)),
            limit: self.limit,
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub total: u64,
    pub current_page: u32,
    pub total_pages: u64,
    pub limit: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: PageInfo,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total: u64) -> Self {
        Self {
            items,
            pagination: request.info(total),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_missing_and_garbage_values() {
        assert_eq!(PageRequest::from_raw(None, None), PageRequest::default());
        assert_eq!(
            PageRequest::from_raw(Some("abc"), Some("")),
            PageRequest::default()
        );
    }

    #[test]
    fn page_and_limit_are_clamped() {
        let request = PageRequest::new(-4, 500);
        assert_eq!(request.page(), 1);
        assert_eq!(request.limit(), MAX_LIMIT);

        let request = PageRequest::from_raw(Some("3"), Some("0"));
        assert_eq!(request.page(), 3);
        assert_eq!(request.limit(), MIN_LIMIT);
    }

    #[test]
    fn offset_skips_previous_pages() {
        assert_eq!(PageRequest::new(1, 10).offset(), 0);
        assert_eq!(PageRequest::new(3, 7).offset(), 14);
    }

    #[test]
    fn total_pages_rounds_up() {
        let info = PageRequest::new(2, 10).info(21);
        assert_eq!(info.total_pages, 3);
        assert_eq!(info.current_page, 2);
        assert_eq!(info.limit, 10);

        assert_eq!(PageRequest::default().info(0).total_pages, 0);
    }
}
