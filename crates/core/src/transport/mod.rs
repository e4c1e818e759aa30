//! Network transport: timed and retried HTTP fetches, plus the per-run
//! download cache that verifies archives against declared size and hash.

mod download;
mod hash;
mod http;
mod retry;

pub use download::{DownloadCache, DownloadError, DownloadedFile};
pub use hash::{format_hash, hash_bytes, hash_file, ContentHasher};
pub use http::{build_client, HttpTransport};
pub use retry::{Retryable, RetryPolicy};

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Errors raised while talking to a remote HTTP endpoint.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Request could not be sent or the body could not be read.
    #[error("HTTP request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// Local I/O while writing the response to disk.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    pub fn http(url: &str, source: reqwest::Error) -> Self {
        Self::Http {
            url: url.to_string(),
            source,
        }
    }
}

impl Retryable for TransportError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Http { .. } | Self::Io(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
        }
    }
}

/// Raw byte transport used by the download cache and the mirror
/// synchronizers.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch a whole resource into memory.
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, TransportError>;

    /// Stream a resource into `dest`, returning the number of bytes written.
    async fn download_to(&self, url: &str, dest: &Path) -> Result<u64, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_retryability() {
        let not_found = TransportError::Status {
            url: "u".to_string(),
            status: 404,
        };
        let unavailable = TransportError::Status {
            url: "u".to_string(),
            status: 503,
        };
        let throttled = TransportError::Status {
            url: "u".to_string(),
            status: 429,
        };
        assert!(!not_found.is_retryable());
        assert!(unavailable.is_retryable());
        assert!(throttled.is_retryable());
    }

    #[test]
    fn test_io_is_retryable() {
        let err = TransportError::Io(std::io::Error::other("disk hiccup"));
        assert!(err.is_retryable());
    }
}
