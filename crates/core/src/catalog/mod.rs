//! Upstream catalog (GameBanana) access.
//!
//! The crawler only talks to the catalog through the [`Catalog`] trait;
//! [`GameBananaClient`] is the HTTP implementation and
//! `MockCatalog` (behind the `testing` feature) the in-memory one.

mod gamebanana;
mod types;
pub mod urls;

pub use gamebanana::GameBananaClient;
pub use types::*;

use async_trait::async_trait;
use thiserror::Error;

use crate::transport::Retryable;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("HTTP request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    /// The item no longer exists upstream.
    #[error("{item_type} {id} not found")]
    NotFound { item_type: String, id: u64 },

    #[error("failed to parse response from {url}: {message}")]
    Parse { url: String, message: String },
}

impl Retryable for CatalogError {
    fn is_retryable(&self) -> bool {
        match self {
            CatalogError::Http { .. } => true,
            CatalogError::Status { status, .. } => *status == 429 || *status >= 500,
            CatalogError::NotFound { .. } | CatalogError::Parse { .. } => false,
        }
    }
}

/// Read access to the upstream catalog.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// One page (1-based) of a category listing. An empty page ends the listing.
    async fn list_page(
        &self,
        category: &str,
        sort: ListSort,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<CatalogListEntry>, CatalogError>;

    async fn item_details(&self, item_type: &str, id: u64) -> Result<ItemDetails, CatalogError>;

    async fn content_warnings(
        &self,
        item_type: &str,
        id: u64,
    ) -> Result<ContentWarnings, CatalogError>;

    async fn categories(&self, game_id: u32) -> Result<Vec<CategoryInfo>, CatalogError>;

    async fn top_picks(&self, game_id: u32) -> Result<Vec<TopPick>, CatalogError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryability() {
        let server_error = CatalogError::Status {
            url: "u".to_string(),
            status: 502,
        };
        let gone = CatalogError::NotFound {
            item_type: "Mod".to_string(),
            id: 1,
        };
        assert!(server_error.is_retryable());
        assert!(!gone.is_retryable());
    }
}
