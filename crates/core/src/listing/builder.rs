use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use super::plugins::{PluginEcosystem, PluginEntities, ECOSYSTEMS};
use super::tree::copy_dir;
use super::{
    item_key, ItemInfo, ItemInfoFile, ListingIndex, ListingIndexEntry, ListingTree, INDEX_FILE,
    INFO_FILE,
};
use crate::archive::{has_zip_magic, open_archive, ArchiveError};
use crate::catalog::{CatalogFile, ItemDetails};
use crate::crawler::{CrawlContext, CrawlError};
use crate::events::{EventHub, SweepMode};
use crate::transport::{DownloadError, Retryable};

/// A fully written staging tree, ready to be committed.
#[derive(Debug)]
pub struct StagedListings {
    pub tree: ListingTree,
    pub index: ListingIndex,
    /// Archives listed for the first time this run.
    pub new_archives: usize,
    pub vanilla: BTreeMap<String, PluginEntities>,
}

/// Content extracted from one archive.
#[derive(Debug, Default)]
struct ArchiveContents {
    paths: Vec<String>,
    plugins: Vec<(&'static str, PluginEntities)>,
}

/// Build the listing tree for this run into its staging directory.
///
/// Listings already present in the committed tree are copied forward
/// without downloading. On incremental runs, items not visited this run are
/// carried over whole from the committed tree.
pub async fn build_listings(
    ctx: &CrawlContext,
    visited: &[ItemDetails],
    mode: SweepMode,
) -> Result<StagedListings, CrawlError> {
    let tree = ListingTree::new(ctx.codec.dir());
    tree.recover()?;
    let previous = tree.load_index(&ctx.codec)?;
    let staging = tree.begin_staging()?.to_path_buf();

    let mut index = ListingIndex::new();
    let mut new_archives = 0;

    for item in visited {
        let key = item_key(&item.item_type, item.id);
        fs::create_dir_all(staging.join(&key))?;

        let mut files = Vec::new();
        for file in item.files_by_upload() {
            let cached = ListingTree::listing_path(tree.root(), &key, file.id);
            if cached.exists() {
                copy_forward(tree.root(), &staging, &key, file.id)?;
            } else {
                let contents = list_archive(ctx, file).await?;
                write_contents(ctx, &staging, &key, file.id, &contents)?;
                new_archives += 1;
            }
            files.push(file.id);
        }

        let info = ItemInfo {
            name: item.name.clone(),
            author: item.author.clone(),
            page_url: item.page_url.clone(),
            files: item
                .files_by_upload()
                .into_iter()
                .map(|f| ItemInfoFile {
                    id: f.id,
                    name: f.file_name.clone(),
                    url: f.url.clone(),
                })
                .collect(),
        };
        ctx.codec
            .dump_path(&staging.join(&key).join(INFO_FILE), &info)?;

        index.insert(
            key,
            ListingIndexEntry {
                name: item.name.clone(),
                files,
            },
        );
    }

    if mode == SweepMode::Incremental {
        let mut carried = 0;
        for (key, entry) in &previous {
            if index.contains_key(key) {
                continue;
            }
            let source = tree.root().join(key);
            if source.exists() {
                copy_dir(&source, &staging.join(key))?;
            }
            index.insert(key.clone(), entry.clone());
            carried += 1;
        }
        debug!("Carried {} unvisited items over", carried);
    }

    let mut vanilla = BTreeMap::new();
    for ecosystem in ECOSYSTEMS {
        let target = ListingTree::vanilla_path(&staging, ecosystem.name);
        match vanilla_entities(ctx, ecosystem).await {
            Ok(found) => {
                ctx.codec.dump_path(&target, &found)?;
                vanilla.insert(ecosystem.name.to_string(), found);
            }
            Err(e) => {
                warn!("Could not refresh vanilla {} baseline: {}", ecosystem.name, e);
                let previous = ListingTree::vanilla_path(tree.root(), ecosystem.name);
                if previous.exists() {
                    fs::copy(&previous, &target)?;
                }
            }
        }
    }

    ctx.codec.dump_path(&staging.join(INDEX_FILE), &index)?;
    info!(
        items = index.len(),
        new_archives, "Staged file listings"
    );

    Ok(StagedListings {
        tree,
        index,
        new_archives,
        vanilla,
    })
}

fn copy_forward(root: &Path, staging: &Path, key: &str, file_id: u64) -> Result<(), CrawlError> {
    fs::copy(
        ListingTree::listing_path(root, key, file_id),
        ListingTree::listing_path(staging, key, file_id),
    )?;
    for ecosystem in ECOSYSTEMS {
        let plugin = ListingTree::plugin_path(root, key, file_id, ecosystem.name);
        if plugin.exists() {
            fs::copy(
                &plugin,
                ListingTree::plugin_path(staging, key, file_id, ecosystem.name),
            )?;
        }
    }
    Ok(())
}

fn write_contents(
    ctx: &CrawlContext,
    staging: &Path,
    key: &str,
    file_id: u64,
    contents: &ArchiveContents,
) -> Result<(), CrawlError> {
    ctx.codec.dump_path(
        &ListingTree::listing_path(staging, key, file_id),
        &contents.paths,
    )?;
    for (ecosystem, entities) in &contents.plugins {
        if !entities.is_empty() {
            ctx.codec.dump_path(
                &ListingTree::plugin_path(staging, key, file_id, ecosystem),
                entities,
            )?;
        }
    }
    Ok(())
}

/// List one archive. Unusable archives are listed as empty, so they are
/// never downloaded again.
async fn list_archive(ctx: &CrawlContext, file: &CatalogFile) -> Result<ArchiveContents, CrawlError> {
    let downloaded = match ctx.downloads.fetch(&file.url, Some(file.size), None).await {
        Ok(downloaded) => downloaded,
        Err(e) if e.is_validation() => {
            warn!("Listing {} as empty: {}", file.url, e);
            return Ok(ArchiveContents::default());
        }
        Err(DownloadError::Transport(e)) if !e.is_retryable() => {
            warn!("Listing {} as empty: {}", file.url, e);
            return Ok(ArchiveContents::default());
        }
        Err(e) => return Err(e.into()),
    };

    if !has_zip_magic(&downloaded.path)? {
        return Ok(ArchiveContents::default());
    }

    // charset fallbacks were already reported when the crawler inspected the file
    let mut handle = match open_archive(&downloaded.path, &file.url, &EventHub::new()) {
        Ok(handle) => handle,
        Err(ArchiveError::Io(e)) => return Err(e.into()),
        Err(e) => {
            warn!("Listing {} as empty: {}", file.url, e);
            return Ok(ArchiveContents::default());
        }
    };

    let paths = handle.file_paths();
    let mut plugins = Vec::new();
    for ecosystem in ECOSYSTEMS {
        if !ecosystem.is_present(&paths) {
            continue;
        }
        match ecosystem.scan(&mut handle, ecosystem.mod_root) {
            Ok(found) => plugins.push((ecosystem.name, found)),
            Err(e) => warn!("Could not scan {} plugins of {}: {}", ecosystem.name, file.url, e),
        }
    }

    Ok(ArchiveContents { paths, plugins })
}

async fn vanilla_entities(
    ctx: &CrawlContext,
    ecosystem: &PluginEcosystem,
) -> Result<PluginEntities, CrawlError> {
    let url = match ecosystem.name {
        "ahorn" => &ctx.config.plugins.ahorn_vanilla_url,
        _ => &ctx.config.plugins.loenn_vanilla_url,
    };
    let downloaded = ctx.downloads.fetch(url, None, None).await?;
    let mut handle = open_archive(&downloaded.path, url, &ctx.events)?;
    let Some(root) = ecosystem.vanilla_root_of(&handle) else {
        return Ok(PluginEntities::default());
    };
    Ok(ecosystem.scan(&mut handle, &root)?)
}
