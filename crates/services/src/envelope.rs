//! Response envelope and pagination shared by every endpoint.

use serde::{Deserialize, Serialize};
use storage::repository::Window;

use crate::error::ServiceError;

pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const RECENT_PAGE_LIMIT: u32 = 30;
pub const MAX_PAGE_LIMIT: u32 = 200;

/// `{code, success, message?, data?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Envelope<T> {
    pub code: u16,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    #[must_use]
    pub fn ok(data: T) -> Self {
        Self {
            code: 200,
            success: true,
            message: None,
            data: Some(data),
        }
    }

    #[must_use]
    pub fn error(err: &ServiceError) -> Self {
        Self {
            code: err.code(),
            success: false,
            message: Some(err.public_message()),
            data: None,
        }
    }

    #[must_use]
    pub fn from_result(result: Result<T, ServiceError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(err) => Self::error(&err),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u64,
}

impl Pagination {
    #[must_use]
    pub fn new(page: u32, limit: u32, total: u64) -> Self {
        let pages = if limit == 0 {
            0
        } else {
            total.div_ceil(u64::from(limit))
        };
        Self {
            page,
            limit,
            total,
            pages,
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub list: Vec<T>,
    pub pagination: Pagination,
}

/// Raw `page`/`limit` query parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct PageRequest {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
}

impl PageRequest {
    #[must_use]
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
        }
    }

    /// Apply defaults and bounds.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for page 0 or a limit outside `1..=200`.
    pub fn resolve(self, default_limit: u32) -> Result<PageWindow, ServiceError> {
        let page = self.page.unwrap_or(1);
        let limit = self.limit.unwrap_or(default_limit);
        if page == 0 {
            return Err(ServiceError::Validation("page must be at least 1".into()));
        }
        if limit == 0 || limit > MAX_PAGE_LIMIT {
            return Err(ServiceError::Validation(format!(
                "limit must be between 1 and {MAX_PAGE_LIMIT}"
            )));
        }
        Ok(PageWindow { page, limit })
    }
}

/// Validated page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u32,
    pub limit: u32,
}

impl PageWindow {
    #[must_use]
    pub fn window(self) -> Window {
        Window::page(self.page, self.limit)
    }

    #[must_use]
    pub fn paginate<T>(self, list: Vec<T>, total: u64) -> Page<T> {
        Page {
            list,
            pagination: Pagination::new(self.page, self.limit, total),
        }
    }
}

impl Default for PageWindow {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}
