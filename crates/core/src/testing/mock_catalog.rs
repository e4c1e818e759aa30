//! Mock catalog for testing.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use super::lock;
use crate::catalog::{
    Catalog, CatalogError, CatalogListEntry, CategoryInfo, ContentWarnings, ItemDetails, ListSort,
    TopPick,
};

/// A recorded listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub category: String,
    pub sort: ListSort,
    pub page: u32,
    pub per_page: u32,
}

/// In-memory [`Catalog`].
///
/// Items are listed by their `item_type`, newest first by `date_added` or
/// by `date_modified` depending on the requested sort. Removing an item
/// makes its detail call answer `NotFound`. Listings of a category can be
/// made to fail, and profiles can go missing independently of listings.
#[derive(Debug, Default)]
pub struct MockCatalog {
    items: Mutex<BTreeMap<(String, u64), ItemDetails>>,
    warnings: Mutex<HashMap<(String, u64), ContentWarnings>>,
    categories: Mutex<Vec<CategoryInfo>>,
    top_picks: Mutex<Vec<TopPick>>,
    page_requests: Mutex<Vec<PageRequest>>,
    detail_requests: Mutex<Vec<(String, u64)>>,
    listing_failures: Mutex<HashMap<String, u16>>,
    missing_profiles: Mutex<HashSet<(String, u64)>>,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an item.
    pub fn add_item(&self, item: ItemDetails) {
        lock(&self.items).insert((item.item_type.clone(), item.id), item);
    }

    pub fn remove_item(&self, item_type: &str, id: u64) {
        lock(&self.items).remove(&(item_type.to_string(), id));
    }

    pub fn set_content_warnings(&self, item_type: &str, id: u64, warnings: &[&str]) {
        lock(&self.warnings).insert(
            (item_type.to_string(), id),
            ContentWarnings {
                warnings: warnings.iter().map(|w| w.to_string()).collect(),
            },
        );
    }

    /// Make listing requests for `category` fail with `status`.
    pub fn fail_listing(&self, category: &str, status: u16) {
        lock(&self.listing_failures).insert(category.to_string(), status);
    }

    pub fn clear_listing_failures(&self) {
        lock(&self.listing_failures).clear();
    }

    /// Make the content warnings of an item answer `NotFound`, as when an
    /// item disappears between listing and profile fetch.
    pub fn set_profile_missing(&self, item_type: &str, id: u64) {
        lock(&self.missing_profiles).insert((item_type.to_string(), id));
    }

    pub fn set_categories(&self, categories: Vec<CategoryInfo>) {
        *lock(&self.categories) = categories;
    }

    pub fn set_top_picks(&self, picks: Vec<TopPick>) {
        *lock(&self.top_picks) = picks;
    }

    pub fn page_requests(&self) -> Vec<PageRequest> {
        lock(&self.page_requests).clone()
    }

    /// Items whose details were requested, in request order.
    pub fn detail_requests(&self) -> Vec<(String, u64)> {
        lock(&self.detail_requests).clone()
    }

    pub fn clear_requests(&self) {
        lock(&self.page_requests).clear();
        lock(&self.detail_requests).clear();
    }
}

#[async_trait]
impl Catalog for MockCatalog {
    async fn list_page(
        &self,
        category: &str,
        sort: ListSort,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<CatalogListEntry>, CatalogError> {
        lock(&self.page_requests).push(PageRequest {
            category: category.to_string(),
            sort,
            page,
            per_page,
        });
        if let Some(status) = lock(&self.listing_failures).get(category).copied() {
            return Err(CatalogError::Status {
                url: format!("mock://{}/Index", category),
                status,
            });
        }

        let mut rows: Vec<CatalogListEntry> = lock(&self.items)
            .values()
            .filter(|item| item.item_type == category)
            .map(|item| CatalogListEntry {
                item_type: item.item_type.clone(),
                id: item.id,
                name: item.name.clone(),
                date_added: item.date_added,
                date_modified: item.date_modified,
            })
            .collect();

        match sort {
            ListSort::Newest => rows.sort_by(|a, b| b.date_added.cmp(&a.date_added)),
            ListSort::RecentlyModified => {
                rows.sort_by(|a, b| b.date_modified.cmp(&a.date_modified))
            }
        }

        let start = (page.saturating_sub(1) as usize).saturating_mul(per_page as usize);
        Ok(rows.into_iter().skip(start).take(per_page as usize).collect())
    }

    async fn item_details(&self, item_type: &str, id: u64) -> Result<ItemDetails, CatalogError> {
        lock(&self.detail_requests).push((item_type.to_string(), id));
        lock(&self.items)
            .get(&(item_type.to_string(), id))
            .cloned()
            .ok_or_else(|| CatalogError::NotFound {
                item_type: item_type.to_string(),
                id,
            })
    }

    async fn content_warnings(
        &self,
        item_type: &str,
        id: u64,
    ) -> Result<ContentWarnings, CatalogError> {
        let key = (item_type.to_string(), id);
        if lock(&self.missing_profiles).contains(&key) {
            return Err(CatalogError::NotFound {
                item_type: item_type.to_string(),
                id,
            });
        }
        Ok(lock(&self.warnings)
            .get(&key)
            .cloned()
            .unwrap_or_default())
    }

    async fn categories(&self, _game_id: u32) -> Result<Vec<CategoryInfo>, CatalogError> {
        Ok(lock(&self.categories).clone())
    }

    async fn top_picks(&self, _game_id: u32) -> Result<Vec<TopPick>, CatalogError> {
        Ok(lock(&self.top_picks).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[tokio::test]
    async fn test_pages_sorted_by_modification() {
        let catalog = MockCatalog::new();
        for (id, modified) in [(1, 900), (2, 1200), (3, 1000), (4, 1100)] {
            catalog.add_item(fixtures::item("Mod", id, modified, vec![]));
        }

        let first = catalog
            .list_page("Mod", ListSort::RecentlyModified, 1, 3)
            .await
            .unwrap();
        let ids: Vec<u64> = first.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 4, 3]);

        let second = catalog
            .list_page("Mod", ListSort::RecentlyModified, 2, 3)
            .await
            .unwrap();
        assert_eq!(second.len(), 1);
        assert!(catalog
            .list_page("Tool", ListSort::Newest, 1, 3)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_removed_item_is_not_found() {
        let catalog = MockCatalog::new();
        catalog.add_item(fixtures::item("Mod", 1, 10, vec![]));
        catalog.remove_item("Mod", 1);

        assert!(matches!(
            catalog.item_details("Mod", 1).await,
            Err(CatalogError::NotFound { .. })
        ));
        assert_eq!(catalog.detail_requests(), vec![("Mod".to_string(), 1)]);
    }

    #[tokio::test]
    async fn test_listing_failure_is_recorded_and_cleared() {
        let catalog = MockCatalog::new();
        catalog.add_item(fixtures::item("Mod", 1, 10, vec![]));
        catalog.fail_listing("Mod", 503);

        assert!(matches!(
            catalog.list_page("Mod", ListSort::Newest, 1, 20).await,
            Err(CatalogError::Status { status: 503, .. })
        ));
        assert_eq!(catalog.page_requests().len(), 1);

        catalog.clear_listing_failures();
        let rows = catalog.list_page("Mod", ListSort::Newest, 1, 20).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_profile_has_no_warnings() {
        let catalog = MockCatalog::new();
        catalog.set_content_warnings("Mod", 1, &["st"]);
        catalog.set_profile_missing("Mod", 1);

        assert!(matches!(
            catalog.content_warnings("Mod", 1).await,
            Err(CatalogError::NotFound { id: 1, .. })
        ));
        assert!(catalog.content_warnings("Mod", 2).await.unwrap().warnings.is_empty());
    }
}
