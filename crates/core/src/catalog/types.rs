//! Types returned by the upstream catalog.

use serde::{Deserialize, Serialize};

/// Listing order for catalog pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListSort {
    /// Newest submissions first.
    Newest,
    /// Most recently modified first.
    RecentlyModified,
}

/// One row of a listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogListEntry {
    pub item_type: String,
    pub id: u64,
    pub name: String,
    /// Epoch seconds.
    pub date_added: i64,
    /// Epoch seconds.
    pub date_modified: i64,
}

/// A downloadable file attached to an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogFile {
    pub id: u64,
    pub file_name: String,
    /// Canonical `mmdl` download link.
    pub url: String,
    pub size: u64,
    /// Epoch seconds.
    pub date_added: i64,
    pub description: String,
    pub download_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screenshot {
    pub base_url: String,
    pub file: String,
}

impl Screenshot {
    pub fn url(&self) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), self.file)
    }
}

/// Full record of one catalog item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDetails {
    pub item_type: String,
    pub id: u64,
    pub name: String,
    pub author: String,
    pub description: String,
    pub page_url: String,
    pub date_added: i64,
    pub date_modified: i64,
    pub category_id: Option<u64>,
    pub category_name: Option<String>,
    pub files: Vec<CatalogFile>,
    pub screenshots: Vec<Screenshot>,
    pub likes: u64,
    pub views: u64,
    pub downloads: u64,
}

impl ItemDetails {
    /// Files sorted by upload time, oldest first.
    pub fn files_by_upload(&self) -> Vec<&CatalogFile> {
        let mut files: Vec<&CatalogFile> = self.files.iter().collect();
        files.sort_by_key(|f| (f.date_added, f.id));
        files
    }
}

/// Content-rating flags set on an item's profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentWarnings {
    pub warnings: Vec<String>,
}

impl ContentWarnings {
    /// Restricted items are kept out of the icon mirror.
    pub fn is_restricted(&self) -> bool {
        !self.warnings.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryInfo {
    pub id: u64,
    pub name: String,
}

/// Featured item from the game's "top picks".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopPick {
    pub item_type: String,
    pub id: u64,
    pub period: String,
}
