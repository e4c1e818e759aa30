//! Content-addressed mirror synchronizers.
//!
//! Each synchronizer keeps a [`MirrorIndex`] of what it believes is on the
//! remote store, computes what should be there, and pushes or deletes only
//! the difference. The index is persisted after every single remote
//! operation.

mod archives;
mod ftp;
mod icons;
mod images;
mod index;

pub use archives::{desired_archives, sync_archives};
pub use ftp::FtpMirrorStore;
pub use icons::{is_icon_path, sync_icons, ICON_LIST_FILE};
pub use images::{screenshot_key, sync_images, thumbnail_png};
pub use index::{sync_index, MirrorIndex, PersistedIndex, SyncOutcome};

use async_trait::async_trait;
use thiserror::Error;

use crate::archive::ArchiveError;
use crate::store::SnapshotError;
use crate::transport::{DownloadError, Retryable, TransportError};

/// Index files, one per mirror kind.
pub const ARCHIVE_INDEX_FILE: &str = "mirror_archives.yaml";
pub const IMAGE_INDEX_FILE: &str = "mirror_images.yaml";
pub const ICON_INDEX_FILE: &str = "mirror_icons.yaml";

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("{operation} failed on mirror: {message}")]
    Remote {
        operation: String,
        message: String,
        retryable: bool,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("image processing failed: {0}")]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error("could not encode icon list: {0}")]
    Encode(#[from] serde_json::Error),
}

impl Retryable for MirrorError {
    fn is_retryable(&self) -> bool {
        match self {
            MirrorError::Remote { retryable, .. } => *retryable,
            MirrorError::Transport(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// Remote file store the mirrors are published to.
#[async_trait]
pub trait MirrorStore: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Upload `content` as `dir/file_name`, replacing any existing file.
    async fn put(&self, dir: &str, file_name: &str, content: Vec<u8>) -> Result<(), MirrorError>;

    /// Delete `dir/file_name`. Deleting a file that is not there succeeds.
    async fn delete(&self, dir: &str, file_name: &str) -> Result<(), MirrorError>;
}

/// Upload and delete counts of one mirror pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MirrorReport {
    pub archives: SyncOutcome,
    pub images: SyncOutcome,
    pub icons: SyncOutcome,
}

impl MirrorReport {
    pub fn uploads(&self) -> usize {
        self.archives.uploaded + self.images.uploaded + self.icons.uploaded
    }

    pub fn deletes(&self) -> usize {
        self.archives.deleted + self.images.deleted + self.icons.deleted
    }
}
