//! Page request defaults and the paged response envelope

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    #[serde(default)]
    pub page: i64,
    #[serde(default)]
    pub page_size: i64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    pub fn apply_defaults(&mut self) {
        if self.page <= 0 {
            self.page = 1;
        }
        if self.page_size <= 0 {
            self.page_size = DEFAULT_PAGE_SIZE;
        }
        if self.page_size > MAX_PAGE_SIZE {
            self.page_size = MAX_PAGE_SIZE;
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PagedResponse<T> {
    pub total: i64,
    pub page_size: i64,
    pub page: i64,
    pub data: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_values() {
        let mut request = PageRequest { page: 0, page_size: 0 };
        request.apply_defaults();
        assert_eq!(request.page, 1);
        assert_eq!(request.page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn page_size_is_capped() {
        let mut request = PageRequest {
            page: 2,
            page_size: 5000,
        };
        request.apply_defaults();
        assert_eq!(request.page_size, MAX_PAGE_SIZE);
    }

    #[test]
    fn offset_is_zero_based() {
        let request = PageRequest { page: 3, page_size: 10 };
        assert_eq!(request.offset(), 20);
    }

    #[test]
    fn negative_values_are_normalized() {
        let mut request = PageRequest {
            page: -4,
            page_size: -1,
        };
        request.apply_defaults();
        assert_eq!(request.page, 1);
        assert_eq!(request.page_size, DEFAULT_PAGE_SIZE);
    }
}
