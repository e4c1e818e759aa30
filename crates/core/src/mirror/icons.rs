//! Shared map icons, deduplicated by content hash.
//!
//! The index maps each mirrored file id to the hashes of the icons found
//! in that archive. An icon is uploaded as `<hash>.png` when the first
//! file referencing it appears and deleted when the last one goes away.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use super::index::{PersistedIndex, SyncOutcome};
use super::{MirrorError, MirrorStore, ICON_INDEX_FILE};
use crate::archive::{has_zip_magic, open_archive, ArchiveError};
use crate::catalog::urls::file_id_of;
use crate::crawler::CrawlContext;
use crate::events::{CrawlEvent, EventHub};
use crate::search::SearchDatabase;
use crate::store::{ModDatabase, ModRecord};
use crate::transport::{hash_bytes, DownloadError, Retryable};

/// Published after every pass that changed the icon set.
pub const ICON_LIST_FILE: &str = "list.json";

const ICON_DIR_PREFIX: &str = "Graphics/Atlases/Gui/areas/";
const LABEL: &str = "icons";

pub fn is_icon_path(path: &str) -> bool {
    path.starts_with(ICON_DIR_PREFIX) && path.ends_with(".png") && path.len() > ICON_DIR_PREFIX.len() + 4
}

fn icon_name(hash: &str) -> String {
    format!("{}.png", hash)
}

/// Hash and content of every icon in an archive.
///
/// `None` when the archive could not be looked into at all; such files stay
/// out of the index so a later pass tries them again.
async fn extract_icons(
    ctx: &CrawlContext,
    record: &ModRecord,
) -> Result<Option<BTreeMap<String, Vec<u8>>>, MirrorError> {
    let file = match ctx
        .downloads
        .fetch(&record.url, Some(record.size), Some(record.hashes.as_slice()))
        .await
    {
        Ok(file) => file,
        Err(e) if e.is_validation() => {
            warn!("No icons taken from {}: {}", record.url, e);
            return Ok(None);
        }
        Err(DownloadError::Transport(e)) if !e.is_retryable() => {
            warn!("No icons taken from {}: {}", record.url, e);
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    if !has_zip_magic(&file.path)? {
        warn!("No icons taken from {}: not a zip archive", record.url);
        return Ok(None);
    }
    let mut handle = match open_archive(&file.path, &record.url, &EventHub::new()) {
        Ok(handle) => handle,
        Err(ArchiveError::Io(e)) => return Err(ArchiveError::Io(e).into()),
        Err(e) => {
            warn!("No icons taken from {}: {}", record.url, e);
            return Ok(None);
        }
    };

    let mut icons = BTreeMap::new();
    for (index, name) in handle.names().to_vec().into_iter().enumerate() {
        if !is_icon_path(&name) {
            continue;
        }
        match handle.read_bytes(index) {
            Ok(bytes) => {
                icons.insert(hash_bytes(&bytes), bytes);
            }
            Err(e) => warn!("Unreadable icon {} in {}: {}", name, record.url, e),
        }
    }
    Ok(Some(icons))
}

/// Mirror the icons of every non-restricted mod.
///
/// New archives are processed before removed ones, so an icon that only
/// moves between files is never deleted and re-uploaded.
pub async fn sync_icons(
    ctx: &CrawlContext,
    store: &dyn MirrorStore,
    db: &ModDatabase,
    search: &SearchDatabase,
) -> Result<SyncOutcome, MirrorError> {
    let dir = ctx.config.mirror.icon_dir.as_str();
    let mut index = PersistedIndex::load(&ctx.codec, ICON_INDEX_FILE)?;

    let mut wanted: BTreeMap<String, &ModRecord> = BTreeMap::new();
    for (name, record) in db.iter() {
        if search.is_restricted(&record.item_type, record.item_id) {
            debug!("Skipping icons of restricted mod {}", name);
            continue;
        }
        if let Some(id) = file_id_of(&record.url) {
            wanted.entry(id.to_string()).or_insert(record);
        }
    }

    let mut refcounts: BTreeMap<String, usize> = BTreeMap::new();
    for (_, hashes) in index.index().iter() {
        for hash in hashes {
            *refcounts.entry(hash.clone()).or_default() += 1;
        }
    }

    let added: Vec<String> = wanted
        .keys()
        .filter(|id| !index.index().contains(id))
        .cloned()
        .collect();
    let removed: Vec<String> = index
        .index()
        .keys()
        .filter(|id| !wanted.contains_key(*id))
        .cloned()
        .collect();
    info!(
        mirror = LABEL,
        new_files = added.len(),
        removed_files = removed.len(),
        "Synchronizing mirror"
    );

    let mut outcome = SyncOutcome::default();

    for file_id in added {
        let Some(record) = wanted.get(&file_id) else {
            continue;
        };
        let Some(icons) = extract_icons(ctx, record).await? else {
            outcome.skipped += 1;
            continue;
        };
        // a file is indexed with its whole icon set once every upload it
        // needs went through
        let mut uploaded = Vec::new();
        for (hash, content) in &icons {
            if refcounts.get(hash).copied().unwrap_or(0) == 0 {
                store.put(dir, &icon_name(hash), content.clone()).await?;
                refcounts.insert(hash.clone(), 1);
                uploaded.push(hash.clone());
            } else if let Some(count) = refcounts.get_mut(hash) {
                *count += 1;
            }
        }
        index.insert(file_id, icons.into_keys().collect())?;
        for hash in uploaded {
            ctx.events.emit(CrawlEvent::MirrorUploaded {
                mirror: LABEL.to_string(),
                key: hash,
            });
            outcome.uploaded += 1;
        }
    }

    for file_id in removed {
        let mut remaining = index.index().owners(&file_id).cloned().unwrap_or_default();
        for hash in remaining.clone() {
            let count = refcounts.entry(hash.clone()).or_default();
            *count = count.saturating_sub(1);
            if *count == 0 {
                store.delete(dir, &icon_name(&hash)).await?;
                remaining.remove(&hash);
                index.insert(file_id.clone(), remaining.clone())?;
                ctx.events.emit(CrawlEvent::MirrorDeleted {
                    mirror: LABEL.to_string(),
                    key: hash,
                });
                outcome.deleted += 1;
            }
        }
        index.remove(&file_id)?;
    }

    if outcome.changed() {
        let mirrored: BTreeSet<&String> = index
            .index()
            .iter()
            .flat_map(|(_, hashes)| hashes.iter())
            .collect();
        let list = serde_json::to_vec(&mirrored)?;
        store.put(dir, ICON_LIST_FILE, list).await?;
        info!(icons = mirrored.len(), "Published icon list");
    }

    Ok(outcome)
}
