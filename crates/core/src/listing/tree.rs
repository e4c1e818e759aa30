use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, warn};
use walkdir::WalkDir;

use super::{ListingIndex, INDEX_FILE};
use crate::catalog::urls::canonical_url;
use crate::store::{SnapshotCodec, SnapshotError, FILE_LISTINGS_DIR};

/// On-disk layout of the listing tree and its staged replacement.
#[derive(Debug, Clone)]
pub struct ListingTree {
    root: PathBuf,
    staging: PathBuf,
    retired: PathBuf,
}

impl ListingTree {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            root: data_dir.join(FILE_LISTINGS_DIR),
            staging: data_dir.join(format!("{}.staging", FILE_LISTINGS_DIR)),
            retired: data_dir.join(format!("{}.old", FILE_LISTINGS_DIR)),
        }
    }

    /// The committed tree.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn staging(&self) -> &Path {
        &self.staging
    }

    pub fn listing_path(base: &Path, item_key: &str, file_id: u64) -> PathBuf {
        base.join(item_key).join(format!("{}.yaml", file_id))
    }

    pub fn plugin_path(base: &Path, item_key: &str, file_id: u64, ecosystem: &str) -> PathBuf {
        base.join(item_key)
            .join(format!("{}_{}.yaml", file_id, ecosystem))
    }

    pub fn vanilla_path(base: &Path, ecosystem: &str) -> PathBuf {
        base.join(format!("vanilla_{}.yaml", ecosystem))
    }

    /// Finish a swap interrupted between its two renames.
    pub fn recover(&self) -> io::Result<()> {
        if !self.root.exists() && self.retired.exists() {
            warn!("Restoring listing tree from {}", self.retired.display());
            fs::rename(&self.retired, &self.root)?;
        }
        Ok(())
    }

    /// Index of the committed tree (empty when there is none yet).
    pub fn load_index(&self, codec: &SnapshotCodec) -> Result<ListingIndex, SnapshotError> {
        codec.load_path(&self.root.join(INDEX_FILE))
    }

    /// Start an empty staging tree, dropping leftovers from a failed run.
    pub fn begin_staging(&self) -> io::Result<&Path> {
        if self.staging.exists() {
            fs::remove_dir_all(&self.staging)?;
        }
        fs::create_dir_all(&self.staging)?;
        Ok(&self.staging)
    }

    pub fn discard_staging(&self) -> io::Result<()> {
        if self.staging.exists() {
            fs::remove_dir_all(&self.staging)?;
        }
        Ok(())
    }

    /// Swap the staging tree in over the committed one.
    pub fn commit(&self) -> io::Result<()> {
        if self.retired.exists() {
            fs::remove_dir_all(&self.retired)?;
        }
        if self.root.exists() {
            fs::rename(&self.root, &self.retired)?;
        }
        fs::rename(&self.staging, &self.root)?;
        if self.retired.exists() {
            fs::remove_dir_all(&self.retired)?;
        }
        info!("Committed listing tree {}", self.root.display());
        Ok(())
    }
}

/// Recursively copy `src` into `dst`.
pub(crate) fn copy_dir(src: &Path, dst: &Path) -> io::Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(io::Error::other)?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(io::Error::other)?;
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Download links of every item in `index` that was not visited this run.
///
/// An incremental run only visits part of the catalog; these links stand in
/// for the rest of it when deciding what was deleted upstream.
pub fn carried_over_urls(index: &ListingIndex, visited: &HashSet<String>) -> BTreeSet<String> {
    index
        .iter()
        .filter(|(key, _)| !visited.contains(*key))
        .flat_map(|(_, entry)| entry.files.iter().map(|id| canonical_url(*id)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::ListingIndexEntry;
    use tempfile::TempDir;

    #[test]
    fn test_commit_swaps_trees() {
        let dir = TempDir::new().unwrap();
        let tree = ListingTree::new(dir.path());

        fs::create_dir_all(tree.root().join("Mod/1")).unwrap();
        fs::write(tree.root().join("Mod/1/10.yaml"), "- old\n").unwrap();

        let staging = tree.begin_staging().unwrap().to_path_buf();
        fs::create_dir_all(staging.join("Mod/2")).unwrap();
        fs::write(staging.join("Mod/2/20.yaml"), "- new\n").unwrap();
        tree.commit().unwrap();

        assert!(!tree.root().join("Mod/1").exists());
        assert!(tree.root().join("Mod/2/20.yaml").exists());
        assert!(!tree.staging().exists());
    }

    #[test]
    fn test_recover_interrupted_swap() {
        let dir = TempDir::new().unwrap();
        let tree = ListingTree::new(dir.path());
        let retired = dir.path().join("file_listings.old");
        fs::create_dir_all(&retired).unwrap();
        fs::write(retired.join("index.yaml"), "{}\n").unwrap();

        tree.recover().unwrap();
        assert!(tree.root().join("index.yaml").exists());
    }

    #[test]
    fn test_copy_dir() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("a/b")).unwrap();
        fs::write(src.join("a/b/c.yaml"), "x").unwrap();

        let dst = dir.path().join("dst");
        copy_dir(&src, &dst).unwrap();
        assert_eq!(fs::read_to_string(dst.join("a/b/c.yaml")).unwrap(), "x");
    }

    #[test]
    fn test_carried_over_skips_visited_items() {
        let mut index = ListingIndex::new();
        index.insert(
            "Mod/1".to_string(),
            ListingIndexEntry {
                name: "one".to_string(),
                files: vec![10, 11],
            },
        );
        index.insert(
            "Mod/2".to_string(),
            ListingIndexEntry {
                name: "two".to_string(),
                files: vec![20],
            },
        );
        let visited: HashSet<String> = ["Mod/2".to_string()].into_iter().collect();

        let urls = carried_over_urls(&index, &visited);
        let expected: BTreeSet<String> = [
            "https://gamebanana.com/mmdl/10".to_string(),
            "https://gamebanana.com/mmdl/11".to_string(),
        ]
        .into_iter()
        .collect();
        assert_eq!(urls, expected);
    }
}
