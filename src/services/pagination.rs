use serde::{Deserialize, Serialize};

use crate::config::ApiConfig;
use crate::database::Page;

/// Raw `page` / `limit` query parameters.
///
/// Kept as strings so that garbage falls back to the defaults instead of
/// failing the request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl PageParams {
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            page: page.map(|p| p.to_string()),
            limit: limit.map(|l| l.to_string()),
        }
    }

    /// Clamp to `page >= 1` and `1 <= limit <= max_page_limit`
    pub fn resolve(&self, api: &ApiConfig) -> PageRequest {
        let page = self
            .page
            .as_deref()
            .and_then(|p| p.trim().parse::<i64>().ok())
            .unwrap_or(1)
            .max(1) as u64;
        let limit = match self.limit.as_deref().and_then(|l| l.trim().parse::<i64>().ok()) {
            Some(limit) if limit > 0 => (limit as u64).min(api.max_page_limit),
            _ => api.default_page_limit,
        };
        PageRequest { page, limit }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl PageRequest {
    pub fn window(&self) -> Page {
        Page {
            limit: self.limit,
            offset: (self.page - 1).saturating_mul(self.limit),
        }
    }

    pub fn paginate<T>(&self, data: Vec<T>, total: u64) -> Paginated<T> {
        Paginated {
            data,
            pagination: Pagination {
                page: self.page,
                limit: self.limit,
                total,
                total_pages: total.div_ceil(self.limit),
            },
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1, limit: 50 }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}
