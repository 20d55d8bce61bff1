use serde::{Deserialize, Serialize};

/// Resolved limit/offset window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Page {
    /// 1-based page number of `offset`
    pub fn number(&self) -> u32 {
        self.offset / self.limit.max(1) + 1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationInfo {
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub has_more: bool,
}

impl PaginationInfo {
    pub fn new(total: i64, page: Page) -> Self {
        Self {
            total,
            page: page.number(),
            limit: page.limit,
            has_more: i64::from(page.offset) + i64::from(page.limit) < total,
        }
    }
}
