use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use super::{SearchDatabase, SearchFile, SearchRecord};
use crate::catalog::{CatalogError, ItemDetails};
use crate::crawler::{CrawlContext, CrawlError};
use crate::events::SweepMode;
use crate::store::SEARCH_DATABASE_FILE;

/// Rebuild the search snapshot from this run's visited items.
///
/// Incremental runs keep the previous records of items they did not visit;
/// full sweeps keep only what they visited.
pub async fn build_search_database(
    ctx: &CrawlContext,
    visited: &[ItemDetails],
    mode: SweepMode,
) -> Result<SearchDatabase, CrawlError> {
    let game_id = ctx.config.catalog.game_id;

    let categories: HashMap<u64, String> = match ctx.catalog.categories(game_id).await {
        Ok(categories) => categories.into_iter().map(|c| (c.id, c.name)).collect(),
        Err(e) => {
            warn!("Could not load categories, using item category names: {}", e);
            HashMap::new()
        }
    };
    let featured: HashSet<(String, u64)> = match ctx.catalog.top_picks(game_id).await {
        Ok(picks) => picks.into_iter().map(|p| (p.item_type, p.id)).collect(),
        Err(e) => {
            warn!("Could not load top picks: {}", e);
            HashSet::new()
        }
    };

    let mut records = Vec::with_capacity(visited.len());
    let mut seen = HashSet::new();
    for item in visited {
        if !seen.insert((item.item_type.clone(), item.id)) {
            continue;
        }
        let restricted = match ctx.catalog.content_warnings(&item.item_type, item.id).await {
            Ok(warnings) => warnings.is_restricted(),
            // removed since it was listed; reconciliation handles it next run
            Err(CatalogError::NotFound { .. }) => {
                debug!(
                    "{} {} vanished before its content warnings were read",
                    item.item_type, item.id
                );
                false
            }
            Err(e) => return Err(e.into()),
        };
        records.push(to_record(
            item,
            &categories,
            featured.contains(&(item.item_type.clone(), item.id)),
            restricted,
        ));
    }

    if mode == SweepMode::Incremental {
        let previous: SearchDatabase = ctx.codec.load(SEARCH_DATABASE_FILE)?;
        records.extend(
            previous
                .records()
                .iter()
                .filter(|r| !seen.contains(&(r.item_type.clone(), r.id)))
                .cloned(),
        );
    }

    let database = SearchDatabase::new(records);
    ctx.codec.dump(SEARCH_DATABASE_FILE, &database)?;
    info!(records = database.len(), "Search database written");
    Ok(database)
}

fn to_record(
    item: &ItemDetails,
    categories: &HashMap<u64, String>,
    featured: bool,
    restricted: bool,
) -> SearchRecord {
    let category_name = item
        .category_id
        .and_then(|id| categories.get(&id).cloned())
        .or_else(|| item.category_name.clone());

    SearchRecord {
        item_type: item.item_type.clone(),
        id: item.id,
        name: item.name.clone(),
        author: item.author.clone(),
        description: item.description.clone(),
        page_url: item.page_url.clone(),
        category_id: item.category_id,
        category_name,
        screenshots: item.screenshots.iter().map(|s| s.url()).collect(),
        files: item
            .files_by_upload()
            .into_iter()
            .map(|f| SearchFile {
                url: f.url.clone(),
                name: f.file_name.clone(),
                description: f.description.clone(),
                size: f.size,
                created: f.date_added,
                downloads: f.download_count,
            })
            .collect(),
        likes: item.likes,
        views: item.views,
        downloads: item.downloads,
        created: item.date_added,
        modified: item.date_modified,
        featured,
        restricted,
    }
}
