// Shared request models

use serde::{Deserialize, Serialize};

// Pagination parameters for list queries
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageParam {
    #[serde(default = "PageParam::default_page_no")]
    pub page_no: u64,
    #[serde(default = "PageParam::default_page_size")]
    pub page_size: u64,
}

impl Default for PageParam {
    fn default() -> Self {
        Self {
            page_no: Self::default_page_no(),
            page_size: Self::default_page_size(),
        }
    }
}

impl PageParam {
    pub fn new(page_no: u64, page_size: u64) -> Self {
        Self { page_no, page_size }
    }

    /// Offset of the first item; page numbers start at 1
    pub fn start(&self) -> u64 {
        self.page_no.saturating_sub(1) * self.page_size
    }

    /// Slices one page out of an already ordered list
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.start() as usize)
            .take(self.page_size as usize)
            .collect()
    }

    fn default_page_no() -> u64 {
        1
    }

    fn default_page_size() -> u64 {
        100
    }
}
