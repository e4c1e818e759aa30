//! Full and incremental catalog sweeps.

use tracing::{debug, info};

use super::consider::consider_file;
use super::{CrawlContext, CrawlError, ModDatasets, SweepProgress};
use crate::catalog::{CatalogError, CatalogListEntry, ItemDetails, ListSort};
use crate::store::CrawlState;

/// Fetch item details; `None` when the item vanished between listing and lookup.
async fn fetch_details(
    ctx: &CrawlContext,
    entry: &CatalogListEntry,
) -> Result<Option<ItemDetails>, CrawlError> {
    match ctx.catalog.item_details(&entry.item_type, entry.id).await {
        Ok(details) => Ok(Some(details)),
        Err(CatalogError::NotFound { .. }) => {
            debug!("{} {} disappeared, skipping", entry.item_type, entry.id);
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Walk every category from page 1 until an empty page.
///
/// For each item, files are only inspected when at least one of them is
/// not already known to lack a manifest; then every file is considered,
/// oldest upload first.
pub async fn full_sweep(
    ctx: &CrawlContext,
    data: &mut ModDatasets,
    state: &mut CrawlState,
) -> Result<SweepProgress, CrawlError> {
    let mut progress = SweepProgress::new();
    let per_page = state.full_page_counter;

    for category in &ctx.config.catalog.categories {
        info!(category = %category, per_page, "Full sweep of category");
        let mut newest_modified = state.watermark(category);
        let mut page = 1;

        loop {
            let entries = ctx
                .catalog
                .list_page(category, ListSort::Newest, page, per_page)
                .await?;
            if entries.is_empty() {
                break;
            }

            for entry in &entries {
                newest_modified = newest_modified.max(entry.date_modified);
                let Some(item) = fetch_details(ctx, entry).await? else {
                    continue;
                };
                if !progress.visit(&item) {
                    continue;
                }

                let has_candidate = item
                    .files
                    .iter()
                    .any(|f| !data.no_manifest.contains(&f.url));
                if !has_candidate {
                    continue;
                }

                for file in item.files_by_upload() {
                    consider_file(ctx, data, &mut progress, &item, file).await?;
                }
            }
            page += 1;
        }

        state.advance_watermark(category, newest_modified);
    }

    info!(
        items = progress.visited.len(),
        added = progress.records_added,
        updated = progress.records_updated,
        "Full sweep finished"
    );
    Ok(progress)
}

/// Walk each category's recently-modified listing down to its watermark.
///
/// The listing is newest-first, so the scan of a category stops at the
/// first item modified at or before the stored watermark.
pub async fn incremental_sweep(
    ctx: &CrawlContext,
    data: &mut ModDatasets,
    state: &mut CrawlState,
) -> Result<SweepProgress, CrawlError> {
    let mut progress = SweepProgress::new();
    let per_page = state.incremental_page_counter;

    for category in &ctx.config.catalog.categories {
        let watermark = state.watermark(category);
        let mut newest_modified = watermark;
        let mut page = 1;
        debug!(category = %category, watermark, per_page, "Incremental sweep of category");

        'pages: loop {
            let entries = ctx
                .catalog
                .list_page(category, ListSort::RecentlyModified, page, per_page)
                .await?;
            if entries.is_empty() {
                break;
            }

            for entry in &entries {
                if entry.date_modified <= watermark {
                    break 'pages;
                }
                newest_modified = newest_modified.max(entry.date_modified);

                let Some(item) = fetch_details(ctx, entry).await? else {
                    continue;
                };
                if !progress.visit(&item) {
                    continue;
                }
                for file in item.files_by_upload() {
                    consider_file(ctx, data, &mut progress, &item, file).await?;
                }
            }
            page += 1;
        }

        state.advance_watermark(category, newest_modified);
    }

    info!(
        items = progress.visited.len(),
        added = progress.records_added,
        updated = progress.records_updated,
        "Incremental sweep finished"
    );
    Ok(progress)
}
