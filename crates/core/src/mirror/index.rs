use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{MirrorError, MirrorStore};
use crate::events::{CrawlEvent, EventHub};
use crate::store::{SnapshotCodec, SnapshotError};

/// Content key -> owning item references, as believed present on the mirror.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MirrorIndex(BTreeMap<String, BTreeSet<String>>);

impl MirrorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn owners(&self, key: &str) -> Option<&BTreeSet<String>> {
        self.0.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeSet<String>)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn insert(&mut self, key: impl Into<String>, owners: BTreeSet<String>) {
        self.0.insert(key.into(), owners);
    }

    pub fn remove(&mut self, key: &str) -> Option<BTreeSet<String>> {
        self.0.remove(key)
    }
}

impl<K: Into<String>> FromIterator<(K, BTreeSet<String>)> for MirrorIndex {
    fn from_iter<I: IntoIterator<Item = (K, BTreeSet<String>)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// A [`MirrorIndex`] that rewrites its snapshot on every mutation.
pub struct PersistedIndex<'a> {
    codec: &'a SnapshotCodec,
    file: &'a str,
    index: MirrorIndex,
}

impl<'a> PersistedIndex<'a> {
    pub fn load(codec: &'a SnapshotCodec, file: &'a str) -> Result<Self, SnapshotError> {
        Ok(Self {
            codec,
            file,
            index: codec.load(file)?,
        })
    }

    pub fn index(&self) -> &MirrorIndex {
        &self.index
    }

    pub fn insert(
        &mut self,
        key: impl Into<String>,
        owners: BTreeSet<String>,
    ) -> Result<(), SnapshotError> {
        self.index.insert(key, owners);
        self.codec.dump(self.file, &self.index)
    }

    pub fn remove(&mut self, key: &str) -> Result<(), SnapshotError> {
        self.index.remove(key);
        self.codec.dump(self.file, &self.index)
    }
}

/// Upload/delete counts of one synchronizer pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    pub uploaded: usize,
    pub deleted: usize,
    /// Desired keys whose content could not be produced this run.
    pub skipped: usize,
}

impl SyncOutcome {
    pub fn changed(&self) -> bool {
        self.uploaded > 0 || self.deleted > 0
    }
}

/// Bring the remote `dir` in line with `desired`.
///
/// Keys only in the index are deleted first, then keys only in `desired`
/// are produced and uploaded. `produce` returning `Ok(None)` skips a key
/// for this run. Owner sets of keys present on both sides are refreshed
/// without touching the remote store.
#[allow(clippy::too_many_arguments)]
pub async fn sync_index<F, Fut>(
    label: &str,
    store: &dyn MirrorStore,
    dir: &str,
    index: &mut PersistedIndex<'_>,
    desired: &BTreeMap<String, BTreeSet<String>>,
    remote_name: impl Fn(&str) -> String,
    events: &EventHub,
    mut produce: F,
) -> Result<SyncOutcome, MirrorError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<Option<Vec<u8>>, MirrorError>>,
{
    let stale: Vec<String> = index
        .index()
        .keys()
        .filter(|key| !desired.contains_key(*key))
        .cloned()
        .collect();
    let missing: Vec<String> = desired
        .keys()
        .filter(|key| !index.index().contains(key))
        .cloned()
        .collect();

    info!(
        mirror = label,
        to_delete = stale.len(),
        to_upload = missing.len(),
        "Synchronizing mirror"
    );

    let mut outcome = SyncOutcome::default();

    for key in stale {
        let name = remote_name(&key);
        store.delete(dir, &name).await?;
        index.remove(&key)?;
        debug!(mirror = label, key = %key, "Deleted from mirror");
        events.emit(CrawlEvent::MirrorDeleted {
            mirror: label.to_string(),
            key,
        });
        outcome.deleted += 1;
    }

    for key in missing {
        let Some(content) = produce(key.clone()).await? else {
            outcome.skipped += 1;
            continue;
        };
        let name = remote_name(&key);
        store.put(dir, &name, content).await?;
        let owners = desired.get(&key).cloned().unwrap_or_default();
        index.insert(key.clone(), owners)?;
        debug!(mirror = label, key = %key, "Uploaded to mirror");
        events.emit(CrawlEvent::MirrorUploaded {
            mirror: label.to_string(),
            key,
        });
        outcome.uploaded += 1;
    }

    let refreshed: Vec<(String, BTreeSet<String>)> = desired
        .iter()
        .filter(|(key, owners)| {
            index
                .index()
                .owners(key)
                .is_some_and(|current| current != *owners)
        })
        .map(|(key, owners)| (key.clone(), owners.clone()))
        .collect();
    for (key, owners) in refreshed {
        index.insert(key, owners)?;
    }

    Ok(outcome)
}
