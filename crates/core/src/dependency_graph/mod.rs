//! Mod dependency graph.
//!
//! One entry per mod in the database, holding the dependencies declared by
//! the manifest of the archive the mod currently comes from. Entries are
//! carried over as long as the mod's download link does not change.

mod builder;

pub use builder::{build_dependency_graph, DependencyCollector};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// dependency name -> version
pub type DependencyMap = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyGraphEntry {
    #[serde(rename = "URL")]
    pub url: String,
    #[serde(rename = "Dependencies", default)]
    pub dependencies: DependencyMap,
    #[serde(rename = "OptionalDependencies", default)]
    pub optional_dependencies: DependencyMap,
}

/// mod name -> entry
pub type DependencyGraph = BTreeMap<String, DependencyGraphEntry>;
