//! Types for the crawl runner.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::events::SweepMode;

/// Errors that abort a crawl run.
///
/// Content problems with individual files never surface here; they end up
/// in the exclusion or no-manifest lists instead.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// Catalog error after retries.
    #[error("catalog error: {0}")]
    Catalog(#[from] crate::catalog::CatalogError),

    /// Network or disk error while downloading.
    #[error("download error: {0}")]
    Download(#[from] crate::transport::DownloadError),

    #[error("transport error: {0}")]
    Transport(#[from] crate::transport::TransportError),

    /// Snapshot could not be read or written.
    #[error("snapshot error: {0}")]
    Snapshot(#[from] crate::store::SnapshotError),

    #[error("mirror error: {0}")]
    Mirror(#[from] crate::mirror::MirrorError),

    #[error("archive error: {0}")]
    Archive(#[from] crate::archive::ArchiveError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Summary of one finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub mode: SweepMode,
    pub items_visited: usize,
    pub records_added: usize,
    pub records_updated: usize,
    pub records_deleted: usize,
    pub exclusions_added: usize,
    pub mirror_uploads: usize,
    pub mirror_deletes: usize,
}

impl RunReport {
    pub fn new(run_id: impl Into<String>, mode: SweepMode) -> Self {
        Self {
            run_id: run_id.into(),
            mode,
            items_visited: 0,
            records_added: 0,
            records_updated: 0,
            records_deleted: 0,
            exclusions_added: 0,
            mirror_uploads: 0,
            mirror_deletes: 0,
        }
    }

    pub fn records_changed(&self) -> usize {
        self.records_added + self.records_updated
    }
}
