//! Mock transport for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use super::lock;
use crate::transport::{Transport, TransportError};

/// In-memory [`Transport`] serving registered URLs.
///
/// Unknown URLs answer with a 404 status. Every call is counted so tests can
/// assert on how often something was downloaded.
#[derive(Debug, Default)]
pub struct MockTransport {
    resources: Mutex<HashMap<String, Vec<u8>>>,
    failures: Mutex<HashMap<String, u16>>,
    downloads: Mutex<HashMap<String, usize>>,
    fetches: Mutex<HashMap<String, usize>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `content` at `url`.
    pub fn add(&self, url: &str, content: Vec<u8>) {
        lock(&self.resources).insert(url.to_string(), content);
    }

    pub fn remove(&self, url: &str) {
        lock(&self.resources).remove(url);
    }

    /// Answer every request for `url` with `status`.
    pub fn fail_with_status(&self, url: &str, status: u16) {
        lock(&self.failures).insert(url.to_string(), status);
    }

    /// Serve `url` normally again after [`Self::fail_with_status`].
    pub fn clear_failure(&self, url: &str) {
        lock(&self.failures).remove(url);
    }

    /// Number of `download_to` calls for `url`.
    pub fn download_count(&self, url: &str) -> usize {
        lock(&self.downloads).get(url).copied().unwrap_or(0)
    }

    /// Number of `fetch_bytes` calls for `url`.
    pub fn fetch_count(&self, url: &str) -> usize {
        lock(&self.fetches).get(url).copied().unwrap_or(0)
    }

    pub fn total_downloads(&self) -> usize {
        lock(&self.downloads).values().sum()
    }

    fn lookup(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        if let Some(status) = lock(&self.failures).get(url) {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: *status,
            });
        }
        lock(&self.resources)
            .get(url)
            .cloned()
            .ok_or_else(|| TransportError::Status {
                url: url.to_string(),
                status: 404,
            })
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        *lock(&self.fetches).entry(url.to_string()).or_insert(0) += 1;
        self.lookup(url)
    }

    async fn download_to(&self, url: &str, dest: &Path) -> Result<u64, TransportError> {
        *lock(&self.downloads).entry(url.to_string()).or_insert(0) += 1;
        let content = self.lookup(url)?;
        tokio::fs::write(dest, &content).await?;
        Ok(content.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_serves_registered_urls() {
        let transport = MockTransport::new();
        transport.add("https://x/a", b"abc".to_vec());

        assert_eq!(transport.fetch_bytes("https://x/a").await.unwrap(), b"abc");
        assert_eq!(transport.fetch_count("https://x/a"), 1);
        assert!(matches!(
            transport.fetch_bytes("https://x/b").await,
            Err(TransportError::Status { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn test_download_writes_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let dest = dir.path().join("out.bin");
        let transport = MockTransport::new();
        transport.add("u", vec![7; 10]);

        assert_eq!(transport.download_to("u", &dest).await.unwrap(), 10);
        assert_eq!(std::fs::read(&dest).unwrap(), vec![7; 10]);
        assert_eq!(transport.download_count("u"), 1);
    }

    #[tokio::test]
    async fn test_failure_overrides_until_cleared() {
        let transport = MockTransport::new();
        transport.add("u", b"abc".to_vec());
        transport.fail_with_status("u", 503);
        assert!(matches!(
            transport.fetch_bytes("u").await,
            Err(TransportError::Status { status: 503, .. })
        ));

        transport.clear_failure("u");
        assert_eq!(transport.fetch_bytes("u").await.unwrap(), b"abc");
    }
}
