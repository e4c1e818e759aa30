//! Archive file listings and plugin-entity indexes.
//!
//! Every catalog file gets its full path listing recorded once, keyed by
//! file id, under `file_listings/<Type>/<Id>/`. Files shipping map-editor
//! plugins also get the entity, trigger and effect names those plugins
//! define. The whole tree is rebuilt into a staging directory each run and
//! swapped in only after the run succeeds.

mod builder;
pub mod plugins;
mod tree;

pub use builder::{build_listings, StagedListings};
pub use plugins::{PluginEcosystem, PluginEntities, AHORN, ECOSYSTEMS, LOENN};
pub use tree::{carried_over_urls, ListingTree};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const INDEX_FILE: &str = "index.yaml";
pub const INFO_FILE: &str = "info.yaml";

/// `"<Type>/<Id>"`, also the item's directory relative to the tree root.
pub fn item_key(item_type: &str, id: u64) -> String {
    format!("{}/{}", item_type, id)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingIndexEntry {
    #[serde(rename = "Name")]
    pub name: String,
    /// File ids, oldest upload first.
    #[serde(rename = "Files")]
    pub files: Vec<u64>,
}

/// item key -> entry, for every item in the tree.
pub type ListingIndex = BTreeMap<String, ListingIndexEntry>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemInfoFile {
    #[serde(rename = "Id")]
    pub id: u64,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "URL")]
    pub url: String,
}

/// Per-item `info.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemInfo {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Author")]
    pub author: String,
    #[serde(rename = "PageURL")]
    pub page_url: String,
    #[serde(rename = "Files")]
    pub files: Vec<ItemInfoFile>,
}
