use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const CRAWL_STATE_VERSION: u32 = 1;

/// Committed crawl progress, written as the last step of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlState {
    pub version: u32,
    /// category -> newest modification time seen (epoch seconds)
    #[serde(default)]
    pub watermarks: BTreeMap<String, i64>,
    #[serde(default)]
    pub full_page_counter: u32,
    #[serde(default)]
    pub incremental_page_counter: u32,
}

impl Default for CrawlState {
    fn default() -> Self {
        Self {
            version: CRAWL_STATE_VERSION,
            watermarks: BTreeMap::new(),
            full_page_counter: 0,
            incremental_page_counter: 0,
        }
    }
}

impl CrawlState {
    pub fn watermark(&self, category: &str) -> i64 {
        self.watermarks.get(category).copied().unwrap_or(0)
    }

    /// Raise a category watermark; it never moves backwards.
    pub fn advance_watermark(&mut self, category: &str, seen: i64) {
        let entry = self.watermarks.entry(category.to_string()).or_insert(0);
        *entry = (*entry).max(seen);
    }
}
