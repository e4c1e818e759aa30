//! Per-run download cache.
//!
//! Every URL is downloaded at most once per run; later requests for the same
//! URL are answered from disk. Files are checked against the declared size
//! first and the declared content hashes second, and a failed download never
//! leaves a file behind. [`DownloadCache::clear`] wipes everything at the end
//! of a run.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{hash_file, Transport, TransportError};

/// Errors from [`DownloadCache::fetch`].
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("size mismatch for {url}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        url: String,
        expected: u64,
        actual: u64,
    },

    #[error("hash mismatch for {url}: expected one of {expected:?}, got {actual}")]
    HashMismatch {
        url: String,
        expected: Vec<String>,
        actual: String,
    },

    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DownloadError {
    /// Content was fetched but does not match what the catalog declared.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::SizeMismatch { .. } | Self::HashMismatch { .. })
    }
}

/// A verified file in the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub path: PathBuf,
    pub size: u64,
    /// XXH64 of the full content, fixed-width hex.
    pub hash: String,
}

pub struct DownloadCache {
    transport: Arc<dyn Transport>,
    dir: PathBuf,
    entries: Mutex<HashMap<String, DownloadedFile>>,
    counter: AtomicU64,
}

impl DownloadCache {
    pub fn new(transport: Arc<dyn Transport>, dir: impl Into<PathBuf>) -> Self {
        Self {
            transport,
            dir: dir.into(),
            entries: Mutex::new(HashMap::new()),
            counter: AtomicU64::new(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Number of files currently cached.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Download `url` (or reuse this run's copy) and verify it.
    pub async fn fetch(
        &self,
        url: &str,
        expected_size: Option<u64>,
        expected_hashes: Option<&[String]>,
    ) -> Result<DownloadedFile, DownloadError> {
        let cached = self.entries.lock().await.get(url).cloned();
        if let Some(file) = cached {
            debug!(url = url, "Download cache hit");
            verify(url, &file, expected_size, expected_hashes)?;
            return Ok(file);
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let path = self.dir.join(format!("download-{}.bin", n));

        match self.download_and_verify(url, &path, expected_size, expected_hashes).await {
            Ok(file) => {
                self.entries
                    .lock()
                    .await
                    .insert(url.to_string(), file.clone());
                Ok(file)
            }
            Err(e) => {
                if let Err(rm) = tokio::fs::remove_file(&path).await {
                    if rm.kind() != std::io::ErrorKind::NotFound {
                        warn!("Failed to remove partial download {}: {}", path.display(), rm);
                    }
                }
                Err(e)
            }
        }
    }

    async fn download_and_verify(
        &self,
        url: &str,
        path: &Path,
        expected_size: Option<u64>,
        expected_hashes: Option<&[String]>,
    ) -> Result<DownloadedFile, DownloadError> {
        let size = self.transport.download_to(url, path).await?;

        // size is checked before hashing so a truncated file never costs a hash pass
        if let Some(expected) = expected_size {
            if expected != size {
                return Err(DownloadError::SizeMismatch {
                    url: url.to_string(),
                    expected,
                    actual: size,
                });
            }
        }

        let file = DownloadedFile {
            path: path.to_path_buf(),
            size,
            hash: hash_file(path).await?,
        };
        verify(url, &file, None, expected_hashes)?;
        Ok(file)
    }

    /// Delete every cached file.
    pub async fn clear(&self) {
        let mut entries = self.entries.lock().await;
        for (_, file) in entries.drain() {
            if let Err(e) = tokio::fs::remove_file(&file.path).await {
                warn!("Failed to delete cached file {}: {}", file.path.display(), e);
            }
        }
    }
}

fn verify(
    url: &str,
    file: &DownloadedFile,
    expected_size: Option<u64>,
    expected_hashes: Option<&[String]>,
) -> Result<(), DownloadError> {
    if let Some(expected) = expected_size {
        if expected != file.size {
            return Err(DownloadError::SizeMismatch {
                url: url.to_string(),
                expected,
                actual: file.size,
            });
        }
    }
    if let Some(hashes) = expected_hashes {
        if !hashes.iter().any(|h| h == &file.hash) {
            return Err(DownloadError::HashMismatch {
                url: url.to_string(),
                expected: hashes.to_vec(),
                actual: file.hash.clone(),
            });
        }
    }
    Ok(())
}
