//! Persisted snapshots.
//!
//! Every dataset the crawler keeps between runs is a YAML document under
//! the data directory, read and written through one [`SnapshotCodec`].

mod codec;
mod records;
mod state;

pub use codec::{SnapshotCodec, SnapshotError};
pub use records::{ExclusionMap, ModDatabase, ModRecord, NoManifestSet};
pub use state::{CrawlState, CRAWL_STATE_VERSION};

/// mod name -> ModRecord
pub const MOD_DATABASE_FILE: &str = "everest_update.yaml";
/// URL or mod name -> reason
pub const EXCLUDED_FILE: &str = "everest_update_excluded.yaml";
pub const NO_MANIFEST_FILE: &str = "everest_update_no_yaml.yaml";
pub const DEPENDENCY_GRAPH_FILE: &str = "mod_dependency_graph.yaml";
pub const SEARCH_DATABASE_FILE: &str = "mod_search_database.yaml";
pub const CRAWL_STATE_FILE: &str = "crawl_state.yaml";
pub const FILE_LISTINGS_DIR: &str = "file_listings";
