//! Search metadata snapshot.
//!
//! One record per catalog item, with what a mod browser needs to display
//! and filter it. The image and icon mirrors read screenshots and the
//! restricted flag from here.

mod builder;

pub use builder::build_search_database;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFile {
    #[serde(rename = "URL")]
    pub url: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Size")]
    pub size: u64,
    #[serde(rename = "CreatedDate")]
    pub created: i64,
    #[serde(rename = "Downloads")]
    pub downloads: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRecord {
    #[serde(rename = "GameBananaType")]
    pub item_type: String,
    #[serde(rename = "GameBananaId")]
    pub id: u64,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Author")]
    pub author: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "PageURL")]
    pub page_url: String,
    #[serde(rename = "CategoryId", default)]
    pub category_id: Option<u64>,
    #[serde(rename = "CategoryName", default)]
    pub category_name: Option<String>,
    #[serde(rename = "Screenshots", default)]
    pub screenshots: Vec<String>,
    #[serde(rename = "Files", default)]
    pub files: Vec<SearchFile>,
    #[serde(rename = "Likes")]
    pub likes: u64,
    #[serde(rename = "Views")]
    pub views: u64,
    #[serde(rename = "Downloads")]
    pub downloads: u64,
    #[serde(rename = "CreatedDate")]
    pub created: i64,
    #[serde(rename = "ModifiedDate")]
    pub modified: i64,
    #[serde(rename = "Featured", default)]
    pub featured: bool,
    #[serde(rename = "Restricted", default)]
    pub restricted: bool,
}

/// Records sorted by type then id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchDatabase(Vec<SearchRecord>);

impl SearchDatabase {
    pub fn new(mut records: Vec<SearchRecord>) -> Self {
        records.sort_by(|a, b| (&a.item_type, a.id).cmp(&(&b.item_type, b.id)));
        records.dedup_by(|a, b| a.item_type == b.item_type && a.id == b.id);
        Self(records)
    }

    pub fn records(&self) -> &[SearchRecord] {
        &self.0
    }

    pub fn get(&self, item_type: &str, id: u64) -> Option<&SearchRecord> {
        self.0
            .binary_search_by(|r| (r.item_type.as_str(), r.id).cmp(&(item_type, id)))
            .ok()
            .map(|i| &self.0[i])
    }

    pub fn is_restricted(&self, item_type: &str, id: u64) -> bool {
        self.get(item_type, id).is_some_and(|r| r.restricted)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
