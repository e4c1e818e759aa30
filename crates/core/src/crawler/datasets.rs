use std::collections::{BTreeSet, HashSet};

use crate::catalog::ItemDetails;
use crate::store::{
    ExclusionMap, ModDatabase, NoManifestSet, SnapshotCodec, SnapshotError, EXCLUDED_FILE,
    MOD_DATABASE_FILE, NO_MANIFEST_FILE,
};

/// The three datasets a sweep mutates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModDatasets {
    pub mods: ModDatabase,
    pub excluded: ExclusionMap,
    pub no_manifest: NoManifestSet,
}

impl ModDatasets {
    pub fn load(codec: &SnapshotCodec) -> Result<Self, SnapshotError> {
        Ok(Self {
            mods: codec.load(MOD_DATABASE_FILE)?,
            excluded: codec.load(EXCLUDED_FILE)?,
            no_manifest: codec.load(NO_MANIFEST_FILE)?,
        })
    }

    pub fn save(&self, codec: &SnapshotCodec) -> Result<(), SnapshotError> {
        codec.dump(MOD_DATABASE_FILE, &self.mods)?;
        codec.dump(EXCLUDED_FILE, &self.excluded)?;
        codec.dump(NO_MANIFEST_FILE, &self.no_manifest)
    }
}

/// What one sweep saw and changed.
#[derive(Debug, Default)]
pub struct SweepProgress {
    /// Every file URL of every item visited this run.
    pub touched_urls: BTreeSet<String>,
    /// Details of every item visited this run, in visit order.
    pub visited: Vec<ItemDetails>,
    seen: HashSet<(String, u64)>,
    pub records_added: usize,
    pub records_updated: usize,
    /// Records whose upstream type/id/size was re-stamped.
    pub records_restamped: usize,
    pub exclusions_added: usize,
    pub no_manifest_added: usize,
}

impl SweepProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a visited item. Returns false if it was already visited this run.
    pub fn visit(&mut self, item: &ItemDetails) -> bool {
        if !self.seen.insert((item.item_type.clone(), item.id)) {
            return false;
        }
        self.touched_urls
            .extend(item.files.iter().map(|f| f.url.clone()));
        self.visited.push(item.clone());
        true
    }

    pub fn was_visited(&self, item_type: &str, id: u64) -> bool {
        self.seen.contains(&(item_type.to_string(), id))
    }

    /// Whether any ModRecord was created, replaced or re-stamped.
    pub fn records_mutated(&self) -> bool {
        self.records_added + self.records_updated + self.records_restamped > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[test]
    fn test_visit_is_deduplicated() {
        let item = fixtures::item("Mod", 1, 10, vec![fixtures::file(5, b"x", 10)]);
        let mut progress = SweepProgress::new();

        assert!(progress.visit(&item));
        assert!(!progress.visit(&item));
        assert_eq!(progress.visited.len(), 1);
        assert!(progress.was_visited("Mod", 1));
        assert!(progress
            .touched_urls
            .contains("https://gamebanana.com/mmdl/5"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let codec = SnapshotCodec::new(dir.path());
        let mut data = ModDatasets::default();
        data.excluded.insert("https://gamebanana.com/mmdl/1", "broken");
        data.no_manifest.insert("https://gamebanana.com/mmdl/2");

        data.save(&codec).unwrap();
        assert_eq!(ModDatasets::load(&codec).unwrap(), data);
    }
}
