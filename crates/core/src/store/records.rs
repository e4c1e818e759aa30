use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// The current version of one mod, keyed by its manifest name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModRecord {
    #[serde(rename = "Version")]
    pub version: String,
    /// Upload time of the file this record came from (epoch seconds).
    #[serde(rename = "LastUpdate")]
    pub last_update: i64,
    /// Always a single archive checksum.
    #[serde(rename = "xxHash")]
    pub hashes: Vec<String>,
    #[serde(rename = "URL")]
    pub url: String,
    #[serde(rename = "MirrorURL")]
    pub mirror_url: String,
    #[serde(rename = "GameBananaType")]
    pub item_type: String,
    #[serde(rename = "GameBananaId")]
    pub item_id: u64,
    #[serde(rename = "GameBananaFileId")]
    pub file_id: u64,
    #[serde(rename = "Size")]
    pub size: u64,
}

/// mod name -> current record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModDatabase(BTreeMap<String, ModRecord>);

impl ModDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&ModRecord> {
        self.0.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ModRecord> {
        self.0.get_mut(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, record: ModRecord) -> Option<ModRecord> {
        self.0.insert(name.into(), record)
    }

    pub fn remove(&mut self, name: &str) -> Option<ModRecord> {
        self.0.remove(name)
    }

    pub fn contains_url(&self, url: &str) -> bool {
        self.0.values().any(|r| r.url == url)
    }

    /// Records sharing one download URL (an archive may declare several mods).
    pub fn iter_mut_by_url<'a>(
        &'a mut self,
        url: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a mut ModRecord)> + 'a {
        self.0.iter_mut().filter(move |(_, r)| r.url == url)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ModRecord)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Remove every record matching `remove`, returning the removed ones.
    pub fn drain_where(&mut self, mut remove: impl FnMut(&ModRecord) -> bool) -> Vec<(String, ModRecord)> {
        let names: Vec<String> = self
            .0
            .iter()
            .filter(|(_, r)| remove(r))
            .map(|(name, _)| name.clone())
            .collect();
        names
            .into_iter()
            .filter_map(|name| self.0.remove(&name).map(|r| (name, r)))
            .collect()
    }
}

/// URL or mod name -> reason it is skipped.
///
/// URL keys are written by the crawler. Name keys are only ever added by
/// hand and block a mod name regardless of which file declares it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExclusionMap(BTreeMap<String, String>);

impl ExclusionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn reason(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, reason: impl Into<String>) {
        self.0.insert(key.into(), reason.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn retain(&mut self, keep: impl FnMut(&String, &mut String) -> bool) {
        self.0.retain(keep);
    }
}

/// URLs known to have no manifest; serialized as a sorted list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoManifestSet(BTreeSet<String>);

impl NoManifestSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.0.contains(url)
    }

    pub fn insert(&mut self, url: impl Into<String>) -> bool {
        self.0.insert(url.into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }

    pub fn retain(&mut self, keep: impl FnMut(&String) -> bool) {
        self.0.retain(keep);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(url: &str) -> ModRecord {
        ModRecord {
            version: "1.0.0".to_string(),
            last_update: 1_600_000_000,
            hashes: vec!["0123456789abcdef".to_string()],
            url: url.to_string(),
            mirror_url: "https://mirror.example/1.zip".to_string(),
            item_type: "Mod".to_string(),
            item_id: 10,
            file_id: 1,
            size: 42,
        }
    }

    #[test]
    fn test_mod_record_yaml_keys() {
        let mut db = ModDatabase::new();
        db.insert("Foo", record("https://gamebanana.com/mmdl/1"));
        let yaml = serde_yaml::to_string(&db).unwrap();

        for key in [
            "Foo:",
            "Version: 1.0.0",
            "LastUpdate: 1600000000",
            "xxHash:",
            "URL: https://gamebanana.com/mmdl/1",
            "MirrorURL:",
            "GameBananaType: Mod",
            "GameBananaId: 10",
            "GameBananaFileId: 1",
            "Size: 42",
        ] {
            assert!(yaml.contains(key), "missing {key} in {yaml}");
        }

        let back: ModDatabase = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, db);
    }

    #[test]
    fn test_drain_where() {
        let mut db = ModDatabase::new();
        db.insert("A", record("u1"));
        db.insert("B", record("u2"));
        db.insert("C", record("u1"));

        let removed = db.drain_where(|r| r.url == "u1");
        let names: Vec<&str> = removed.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["A", "C"]);
        assert_eq!(db.len(), 1);
        assert!(db.contains_url("u2"));
    }

    #[test]
    fn test_no_manifest_set_is_sorted_list() {
        let mut set = NoManifestSet::new();
        set.insert("b");
        set.insert("a");
        let yaml = serde_yaml::to_string(&set).unwrap();
        assert_eq!(yaml, "- a\n- b\n");
    }
}
