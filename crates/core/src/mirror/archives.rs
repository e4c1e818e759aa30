//! Archive mirror: one `<file id>.zip` per distinct download link.

use std::collections::{BTreeMap, BTreeSet};

use tracing::warn;

use super::index::{sync_index, PersistedIndex, SyncOutcome};
use super::{MirrorError, MirrorStore, ARCHIVE_INDEX_FILE};
use crate::catalog::urls::file_id_of;
use crate::crawler::CrawlContext;
use crate::store::ModDatabase;
use crate::transport::{DownloadError, Retryable};

/// Where to fetch one mirrored archive from, and what it must hash to.
#[derive(Debug, Clone)]
struct ArchiveSource {
    url: String,
    size: u64,
    hashes: Vec<String>,
}

/// File id -> names of the mods served by that file.
///
/// Records whose URL is not a canonical download link are left out.
pub fn desired_archives(db: &ModDatabase) -> BTreeMap<String, BTreeSet<String>> {
    let mut desired: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for (name, record) in db.iter() {
        if let Some(id) = file_id_of(&record.url) {
            desired.entry(id.to_string()).or_default().insert(name.clone());
        }
    }
    desired
}

fn sources(db: &ModDatabase) -> BTreeMap<String, ArchiveSource> {
    let mut sources = BTreeMap::new();
    for (_, record) in db.iter() {
        if let Some(id) = file_id_of(&record.url) {
            sources.entry(id.to_string()).or_insert_with(|| ArchiveSource {
                url: record.url.clone(),
                size: record.size,
                hashes: record.hashes.clone(),
            });
        }
    }
    sources
}

/// Push new archives to the mirror and delete the ones no longer referenced.
///
/// An archive that no longer matches its recorded size or hash is skipped
/// for this run; it stays out of the index so it is retried next time.
pub async fn sync_archives(
    ctx: &CrawlContext,
    store: &dyn MirrorStore,
    db: &ModDatabase,
) -> Result<SyncOutcome, MirrorError> {
    let desired = desired_archives(db);
    let sources = sources(db);
    let mut index = PersistedIndex::load(&ctx.codec, ARCHIVE_INDEX_FILE)?;

    let downloads = &ctx.downloads;
    let sources = &sources;
    sync_index(
        "archives",
        store,
        &ctx.config.mirror.archive_dir,
        &mut index,
        &desired,
        |key| format!("{}.zip", key),
        &ctx.events,
        |key| async move {
            let Some(source) = sources.get(&key) else {
                return Ok(None);
            };
            let file = match downloads
                .fetch(&source.url, Some(source.size), Some(source.hashes.as_slice()))
                .await
            {
                Ok(file) => file,
                Err(e) if e.is_validation() => {
                    warn!("Not mirroring {}: {}", source.url, e);
                    return Ok(None);
                }
                Err(DownloadError::Transport(e)) if !e.is_retryable() => {
                    warn!("Not mirroring {}: {}", source.url, e);
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            };
            let content = tokio::fs::read(&file.path)
                .await
                .map_err(DownloadError::from)?;
            Ok(Some(content))
        },
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::events::EventHub;
    use crate::store::ModRecord;
    use crate::testing::{fixtures, MockCatalog, MockMirrorStore, MockTransport};
    use crate::transport::hash_bytes;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn record(file_id: u64, content: &[u8]) -> ModRecord {
        ModRecord {
            version: "1.0.0".to_string(),
            last_update: 100,
            hashes: vec![hash_bytes(content)],
            url: format!("https://gamebanana.com/mmdl/{}", file_id),
            mirror_url: String::new(),
            item_type: "Mod".to_string(),
            item_id: 1,
            file_id,
            size: content.len() as u64,
        }
    }

    #[test]
    fn test_desired_groups_mods_sharing_a_file() {
        let mut db = ModDatabase::new();
        db.insert("A", record(10, b"x"));
        db.insert("B", record(10, b"x"));
        db.insert("C", record(11, b"y"));
        let mut odd = record(12, b"z");
        odd.url = "https://example.org/foo.zip".to_string();
        db.insert("D", odd);

        let desired = desired_archives(&db);
        assert_eq!(desired.len(), 2);
        assert_eq!(desired["10"].len(), 2);
        assert!(!desired.contains_key("12"));
    }

    #[tokio::test]
    async fn test_sync_uploads_verified_archives_only() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.paths.data_dir = dir.path().join("data");
        config.paths.cache_dir = dir.path().join("cache");

        let good = fixtures::build_zip(&[("a.txt", "a")]);
        let transport = Arc::new(MockTransport::new());
        transport.add("https://gamebanana.com/mmdl/10", good.clone());
        transport.add("https://gamebanana.com/mmdl/11", b"tampered".to_vec());

        let ctx = CrawlContext::new(
            config,
            EventHub::new(),
            Arc::new(MockCatalog::new()),
            transport,
            None,
        );
        let mut db = ModDatabase::new();
        db.insert("Good", record(10, &good));
        db.insert("Bad", record(11, b"original"));

        let store = MockMirrorStore::new();
        let outcome = sync_archives(&ctx, &store, &db).await.unwrap();

        assert_eq!(outcome.uploaded, 1);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(store.file("banana-mirror", "10.zip").unwrap(), good);
        assert!(store.file("banana-mirror", "11.zip").is_none());

        // nothing left to do once the bad file is gone from the database
        db.remove("Bad");
        store.clear_ops();
        let outcome = sync_archives(&ctx, &store, &db).await.unwrap();
        assert!(!outcome.changed());
        assert!(store.ops().is_empty());
    }
}
