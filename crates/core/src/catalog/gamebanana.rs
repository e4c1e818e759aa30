//! GameBanana apiv11 client.
//!
//! All responses are decoded through private structs whose fields all
//! default, then converted into the public catalog types.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::urls::canonical_url;
use super::{
    Catalog, CatalogError, CatalogFile, CatalogListEntry, CategoryInfo, ContentWarnings,
    ItemDetails, ListSort, Screenshot, TopPick,
};
use crate::config::{CatalogConfig, HttpConfig};
use crate::transport::{build_client, RetryPolicy, TransportError};

/// GameBanana API client.
pub struct GameBananaClient {
    client: Client,
    base_url: String,
    game_id: u32,
    retry: RetryPolicy,
}

impl GameBananaClient {
    pub fn new(catalog: &CatalogConfig, http: &HttpConfig) -> Result<Self, TransportError> {
        Ok(Self {
            client: build_client(http, &catalog.user_agent)?,
            base_url: catalog.base_url.trim_end_matches('/').to_string(),
            game_id: catalog.game_id,
            retry: RetryPolicy::from_config(http),
        })
    }

    async fn get_once<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>, CatalogError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|source| CatalogError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if status == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(CatalogError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|source| CatalogError::Http {
            url: url.to_string(),
            source,
        })?;
        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|e| CatalogError::Parse {
                url: url.to_string(),
                message: e.to_string(),
            })
    }

    /// GET with retries. `Ok(None)` on 404.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>, CatalogError> {
        debug!("GameBanana GET {} {:?}", url, query);
        self.retry.run(url, || self.get_once(url, query)).await
    }

    async fn profile_page(&self, item_type: &str, id: u64) -> Result<ProfilePage, CatalogError> {
        let url = format!(
            "{}/{}/{}/ProfilePage",
            self.base_url,
            urlencoding::encode(item_type),
            id
        );
        self.get_json(&url, &[])
            .await?
            .ok_or_else(|| CatalogError::NotFound {
                item_type: item_type.to_string(),
                id,
            })
    }
}

/// A missing listing is an error rather than an empty page: an empty page
/// ends the category and lets reconciliation drop its records.
fn require_listing(url: &str, listing: Option<IndexResponse>) -> Result<IndexResponse, CatalogError> {
    listing.ok_or_else(|| CatalogError::Status {
        url: url.to_string(),
        status: 404,
    })
}

#[async_trait]
impl Catalog for GameBananaClient {
    async fn list_page(
        &self,
        category: &str,
        sort: ListSort,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<CatalogListEntry>, CatalogError> {
        let url = format!("{}/{}/Index", self.base_url, urlencoding::encode(category));
        let sort = match sort {
            ListSort::Newest => "Generic_Newest",
            ListSort::RecentlyModified => "Generic_LatestModified",
        };
        let query = [
            ("_nPage", page.to_string()),
            ("_nPerpage", per_page.to_string()),
            ("_aFilters[Generic_Game]", self.game_id.to_string()),
            ("_sSort", sort.to_string()),
        ];

        let listing = require_listing(&url, self.get_json(&url, &query).await?)?;
        Ok(listing
            .records
            .into_iter()
            .map(|r| r.into_entry(category))
            .collect())
    }

    async fn item_details(&self, item_type: &str, id: u64) -> Result<ItemDetails, CatalogError> {
        let page = self.profile_page(item_type, id).await?;
        Ok(page.into_details(item_type, id))
    }

    async fn content_warnings(
        &self,
        item_type: &str,
        id: u64,
    ) -> Result<ContentWarnings, CatalogError> {
        let page = self.profile_page(item_type, id).await?;
        // an object of code -> label when set, an empty list otherwise
        let warnings = match page.content_ratings {
            serde_json::Value::Object(map) => map
                .into_iter()
                .map(|(code, label)| label.as_str().map(str::to_string).unwrap_or(code))
                .collect(),
            _ => Vec::new(),
        };
        Ok(ContentWarnings { warnings })
    }

    async fn categories(&self, game_id: u32) -> Result<Vec<CategoryInfo>, CatalogError> {
        let url = format!("{}/Mod/Categories", self.base_url);
        let query = [
            ("_idGameRow", game_id.to_string()),
            ("_sSort", "a_to_z".to_string()),
            ("_bShowEmpty", "true".to_string()),
        ];
        let rows: Vec<CategoryRow> = self.get_json(&url, &query).await?.unwrap_or_default();
        Ok(rows
            .into_iter()
            .map(|r| CategoryInfo {
                id: r.id,
                name: r.name,
            })
            .collect())
    }

    async fn top_picks(&self, game_id: u32) -> Result<Vec<TopPick>, CatalogError> {
        let url = format!("{}/Game/{}/TopSubs", self.base_url, game_id);
        let rows: Vec<TopSubRow> = self.get_json(&url, &[]).await?.unwrap_or_default();
        Ok(rows
            .into_iter()
            .map(|r| TopPick {
                item_type: r.model_name,
                id: r.id,
                period: r.period,
            })
            .collect())
    }
}

// GameBanana API response types (internal)

#[derive(Debug, Default, Deserialize)]
struct IndexResponse {
    #[serde(rename = "_aRecords", default)]
    records: Vec<IndexRecord>,
}

#[derive(Debug, Deserialize)]
struct IndexRecord {
    #[serde(rename = "_idRow", default)]
    id: u64,
    #[serde(rename = "_sModelName", default)]
    model_name: String,
    #[serde(rename = "_sName", default)]
    name: String,
    #[serde(rename = "_tsDateAdded", default)]
    date_added: i64,
    #[serde(rename = "_tsDateModified", default)]
    date_modified: i64,
}

impl IndexRecord {
    fn into_entry(self, category: &str) -> CatalogListEntry {
        let item_type = if self.model_name.is_empty() {
            category.to_string()
        } else {
            self.model_name
        };
        CatalogListEntry {
            item_type,
            id: self.id,
            name: self.name,
            date_added: self.date_added,
            date_modified: self.date_modified,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ProfilePage {
    #[serde(rename = "_sName", default)]
    name: String,
    #[serde(rename = "_sProfileUrl", default)]
    profile_url: String,
    #[serde(rename = "_sText", default)]
    text: String,
    #[serde(rename = "_tsDateAdded", default)]
    date_added: i64,
    #[serde(rename = "_tsDateModified", default)]
    date_modified: i64,
    #[serde(rename = "_aSubmitter", default)]
    submitter: Option<Submitter>,
    #[serde(rename = "_aCategory", default)]
    category: Option<CategoryRow>,
    #[serde(rename = "_aFiles", default)]
    files: Vec<FileRow>,
    #[serde(rename = "_aPreviewMedia", default)]
    preview_media: Option<PreviewMedia>,
    #[serde(rename = "_nLikeCount", default)]
    like_count: u64,
    #[serde(rename = "_nViewCount", default)]
    view_count: u64,
    #[serde(rename = "_nDownloadCount", default)]
    download_count: u64,
    #[serde(rename = "_aContentRatings", default)]
    content_ratings: serde_json::Value,
}

impl ProfilePage {
    fn into_details(self, item_type: &str, id: u64) -> ItemDetails {
        let screenshots = self
            .preview_media
            .map(|m| m.images)
            .unwrap_or_default()
            .into_iter()
            .filter(|i| i.kind.is_empty() || i.kind == "screenshot")
            .map(|i| Screenshot {
                base_url: i.base_url,
                file: i.file,
            })
            .collect();

        ItemDetails {
            item_type: item_type.to_string(),
            id,
            name: self.name,
            author: self.submitter.map(|s| s.name).unwrap_or_default(),
            description: self.text,
            page_url: self.profile_url,
            date_added: self.date_added,
            date_modified: self.date_modified,
            category_id: self.category.as_ref().map(|c| c.id),
            category_name: self.category.map(|c| c.name),
            files: self.files.into_iter().map(FileRow::into_file).collect(),
            screenshots,
            likes: self.like_count,
            views: self.view_count,
            downloads: self.download_count,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Submitter {
    #[serde(rename = "_sName", default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct CategoryRow {
    #[serde(rename = "_idRow", default)]
    id: u64,
    #[serde(rename = "_sName", default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct FileRow {
    #[serde(rename = "_idRow", default)]
    id: u64,
    #[serde(rename = "_sFile", default)]
    file: String,
    #[serde(rename = "_nFilesize", default)]
    size: u64,
    #[serde(rename = "_sDescription", default)]
    description: String,
    #[serde(rename = "_tsDateAdded", default)]
    date_added: i64,
    #[serde(rename = "_nDownloadCount", default)]
    download_count: u64,
}

impl FileRow {
    fn into_file(self) -> CatalogFile {
        CatalogFile {
            url: canonical_url(self.id),
            id: self.id,
            file_name: self.file,
            size: self.size,
            date_added: self.date_added,
            description: self.description,
            download_count: self.download_count,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct PreviewMedia {
    #[serde(rename = "_aImages", default)]
    images: Vec<PreviewImage>,
}

#[derive(Debug, Deserialize)]
struct PreviewImage {
    #[serde(rename = "_sType", default)]
    kind: String,
    #[serde(rename = "_sBaseUrl", default)]
    base_url: String,
    #[serde(rename = "_sFile", default)]
    file: String,
}

#[derive(Debug, Deserialize)]
struct TopSubRow {
    #[serde(rename = "_idRow", default)]
    id: u64,
    #[serde(rename = "_sModelName", default)]
    model_name: String,
    #[serde(rename = "_sPeriod", default)]
    period: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_profile_page() {
        let json = r#"{
            "_idRow": 150813,
            "_sName": "Spring Collab 2020",
            "_sProfileUrl": "https://gamebanana.com/mods/150813",
            "_sText": "A collab",
            "_tsDateAdded": 1589000000,
            "_tsDateModified": 1600000000,
            "_aSubmitter": {"_idRow": 1, "_sName": "max480"},
            "_aCategory": {"_idRow": 6800, "_sName": "Maps"},
            "_aFiles": [
                {"_idRow": 484937, "_sFile": "collab.zip", "_nFilesize": 1234,
                 "_tsDateAdded": 1600000000, "_nDownloadCount": 9}
            ],
            "_aPreviewMedia": {"_aImages": [
                {"_sType": "screenshot", "_sBaseUrl": "https://images.gamebanana.com/img/ss/mods", "_sFile": "a.jpg"}
            ]},
            "_nLikeCount": 3,
            "_aContentRatings": {"st": "Sexual Themes"},
            "_unknownField": true
        }"#;
        let page: ProfilePage = serde_json::from_str(json).unwrap();
        let ratings = page.content_ratings.clone();
        let details = page.into_details("Mod", 150813);

        assert_eq!(details.author, "max480");
        assert_eq!(details.category_name.as_deref(), Some("Maps"));
        assert_eq!(details.files[0].url, "https://gamebanana.com/mmdl/484937");
        assert_eq!(details.files[0].size, 1234);
        assert_eq!(
            details.screenshots[0].url(),
            "https://images.gamebanana.com/img/ss/mods/a.jpg"
        );
        assert_eq!(details.likes, 3);
        assert!(ratings.is_object());
    }

    #[test]
    fn test_decode_sparse_listing() {
        let json = r#"{"_aMetadata": {"_bIsComplete": true}, "_aRecords": [{"_idRow": 7}]}"#;
        let listing: IndexResponse = serde_json::from_str(json).unwrap();
        let entry = listing.records.into_iter().next().unwrap().into_entry("Tool");
        assert_eq!(entry.item_type, "Tool");
        assert_eq!(entry.id, 7);
        assert_eq!(entry.date_modified, 0);
    }

    #[test]
    fn test_missing_listing_is_an_error() {
        let url = "https://gamebanana.com/apiv11/Mod/Index";
        assert!(matches!(
            require_listing(url, None),
            Err(CatalogError::Status { status: 404, .. })
        ));
        let listing = require_listing(url, Some(IndexResponse::default())).unwrap();
        assert!(listing.records.is_empty());
    }

    #[test]
    fn test_content_ratings_may_be_empty_list() {
        let page: ProfilePage = serde_json::from_str(r#"{"_aContentRatings": []}"#).unwrap();
        assert!(page.content_ratings.is_array());
    }
}
