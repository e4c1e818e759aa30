//! Archive inspection.
//!
//! Opens downloaded zip archives, reads the mod manifest out of them and
//! lists their content. Entry names are expected to be UTF-8; archives whose
//! names are not get a second chance through charset detection (see
//! [`charset`]).

pub mod charset;
mod inspector;
mod manifest;

pub use inspector::{
    has_zip_magic, open_archive, ArchiveHandle, MAX_ENTRY_SIZE, ZIP_LOCAL_HEADER_MAGIC,
};
pub use manifest::{
    parse_manifest, read_manifest, ManifestDependency, ManifestEntry, ManifestError,
    MANIFEST_FILE_NAMES, NO_VERSION,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unreadable zip: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// The name table is not valid UTF-8 at the given entry.
    #[error("invalid entry name at index {index}")]
    InvalidEntryName { index: usize },

    #[error("not a zip archive (bad local header signature)")]
    BadSignature,

    #[error("entry {name} is larger than {limit} bytes")]
    EntryTooLarge { name: String, limit: u64 },

    #[error("entry {name} is not valid UTF-8 text")]
    NotText { name: String },

    #[error("invalid manifest: {0}")]
    Manifest(#[from] ManifestError),
}
