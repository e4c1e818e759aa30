use tracing::{debug, info, warn};

use super::{CrawlContext, CrawlError, ModDatasets, SweepProgress};
use crate::archive::{has_zip_magic, open_archive, read_manifest, ArchiveError, ManifestEntry};
use crate::catalog::urls::to_mirror_url;
use crate::catalog::{CatalogFile, ItemDetails};
use crate::events::CrawlEvent;
use crate::store::ModRecord;
use crate::transport::{DownloadError, Retryable};

/// What came out of inspecting a downloaded file.
enum Inspection {
    Manifest { entries: Vec<ManifestEntry>, hash: String },
    NoManifest,
    Rejected(String),
}

/// Run one catalog file through the mod database.
///
/// Files already excluded or known to have no manifest are skipped; files
/// already in the database only get their upstream metadata refreshed.
/// Anything else is downloaded and its manifest entries are merged.
pub async fn consider_file(
    ctx: &CrawlContext,
    data: &mut ModDatasets,
    progress: &mut SweepProgress,
    item: &ItemDetails,
    file: &CatalogFile,
) -> Result<(), CrawlError> {
    let url = file.url.as_str();

    if data.excluded.contains(url) || data.no_manifest.contains(url) {
        return Ok(());
    }

    if data.mods.contains_url(url) {
        restamp(data, progress, item, file);
        return Ok(());
    }

    debug!(url = url, item = %format!("{}/{}", item.item_type, item.id), "Inspecting new file");

    match inspect(ctx, file).await? {
        Inspection::NoManifest => {
            info!(url = url, "No manifest in file");
            data.no_manifest.insert(url);
            progress.no_manifest_added += 1;
        }
        Inspection::Rejected(reason) => exclude(ctx, data, progress, url, reason),
        Inspection::Manifest { entries, hash } => {
            for entry in entries {
                merge_entry(ctx, data, progress, item, file, &entry, &hash);
            }
        }
    }
    Ok(())
}

/// Upstream ids can be reassigned without the download link changing.
fn restamp(data: &mut ModDatasets, progress: &mut SweepProgress, item: &ItemDetails, file: &CatalogFile) {
    for (name, record) in data.mods.iter_mut_by_url(&file.url) {
        if record.item_type != item.item_type
            || record.item_id != item.id
            || record.file_id != file.id
            || record.size != file.size
        {
            debug!(
                "Re-stamping {}: {} {} -> {} {}",
                name, record.item_type, record.item_id, item.item_type, item.id
            );
            record.item_type = item.item_type.clone();
            record.item_id = item.id;
            record.file_id = file.id;
            record.size = file.size;
            progress.records_restamped += 1;
        }
    }
}

async fn inspect(ctx: &CrawlContext, file: &CatalogFile) -> Result<Inspection, CrawlError> {
    let url = file.url.as_str();

    let downloaded = match ctx.downloads.fetch(url, Some(file.size), None).await {
        Ok(downloaded) => downloaded,
        Err(e) if e.is_validation() => return Ok(Inspection::Rejected(e.to_string())),
        Err(DownloadError::Transport(e)) if !e.is_retryable() => {
            return Ok(Inspection::Rejected(e.to_string()))
        }
        Err(e) => return Err(e.into()),
    };

    if !has_zip_magic(&downloaded.path)? {
        return Ok(Inspection::Rejected(format!(
            "{} is not a zip archive",
            url
        )));
    }

    let mut handle = match open_archive(&downloaded.path, url, &ctx.events) {
        Ok(handle) => handle,
        Err(ArchiveError::Io(e)) => return Err(e.into()),
        Err(e) => return Ok(Inspection::Rejected(format!("{} could not be opened: {}", url, e))),
    };

    match read_manifest(&mut handle) {
        Ok(Some(entries)) => Ok(Inspection::Manifest {
            entries,
            hash: downloaded.hash,
        }),
        Ok(None) => Ok(Inspection::NoManifest),
        Err(ArchiveError::Io(e)) => Err(e.into()),
        Err(e) => {
            ctx.events.emit(CrawlEvent::ManifestParseError {
                url: url.to_string(),
                error: e.to_string(),
            });
            Ok(Inspection::Rejected(format!(
                "{} has an unreadable manifest: {}",
                url, e
            )))
        }
    }
}

fn merge_entry(
    ctx: &CrawlContext,
    data: &mut ModDatasets,
    progress: &mut SweepProgress,
    item: &ItemDetails,
    file: &CatalogFile,
    entry: &ManifestEntry,
    hash: &str,
) {
    let url = file.url.as_str();
    let name = entry.name.as_str();

    if let Some(existing) = data.mods.get(name) {
        if existing.last_update > file.date_added {
            let reason = format!(
                "{} declares {} {} uploaded at {}, but {} has a newer version uploaded at {}",
                url, name, entry.version, file.date_added, existing.url, existing.last_update
            );
            exclude(ctx, data, progress, url, reason);
            return;
        }
        if existing.item_type != item.item_type || existing.item_id != item.id {
            let reason = format!(
                "{} declares {} which already belongs to {} {} ({})",
                url, name, existing.item_type, existing.item_id, existing.url
            );
            exclude(ctx, data, progress, url, reason);
            return;
        }
    }

    if data.excluded.contains(name) {
        warn!(url = url, "Mod {} is excluded by name, skipping", name);
        return;
    }

    let record = ModRecord {
        version: entry.version.clone(),
        last_update: file.date_added,
        hashes: vec![hash.to_string()],
        url: url.to_string(),
        mirror_url: to_mirror_url(&ctx.config.mirror.public_base_url, url)
            .unwrap_or_else(|| url.to_string()),
        item_type: item.item_type.clone(),
        item_id: item.id,
        file_id: file.id,
        size: file.size,
    };

    match data.mods.insert(name, record) {
        Some(previous) => {
            info!("Updated {} {} -> {} ({})", name, previous.version, entry.version, url);
            progress.records_updated += 1;
        }
        None => {
            info!("Added {} {} ({})", name, entry.version, url);
            progress.records_added += 1;
        }
    }
    ctx.events.emit(CrawlEvent::ModUpdated {
        name: name.to_string(),
        version: entry.version.clone(),
        url: url.to_string(),
    });
}

fn exclude(
    ctx: &CrawlContext,
    data: &mut ModDatasets,
    progress: &mut SweepProgress,
    url: &str,
    reason: String,
) {
    warn!(url = url, "Excluding file: {}", reason);
    data.excluded.insert(url, reason.clone());
    progress.exclusions_added += 1;
    ctx.events.emit(CrawlEvent::FileExcluded {
        url: url.to_string(),
        reason,
    });
}
