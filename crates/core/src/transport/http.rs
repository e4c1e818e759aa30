use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::config::HttpConfig;

use super::{RetryPolicy, Transport, TransportError};

/// Build a client with the configured connect/read timeouts.
pub fn build_client(config: &HttpConfig, user_agent: &str) -> Result<Client, TransportError> {
    Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .read_timeout(Duration::from_secs(config.read_timeout_secs))
        .build()
        .map_err(|e| TransportError::http("<client>", e))
}

/// HTTP transport with bounded retries around every request.
pub struct HttpTransport {
    client: Client,
    retry: RetryPolicy,
}

impl HttpTransport {
    pub fn new(config: &HttpConfig, user_agent: &str) -> Result<Self, TransportError> {
        Ok(Self {
            client: build_client(config, user_agent)?,
            retry: RetryPolicy::from_config(config),
        })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, TransportError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TransportError::http(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    async fn download_once(&self, url: &str, dest: &Path) -> Result<u64, TransportError> {
        let response = self.get(url).await?;
        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| TransportError::http(url, e))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(written)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        debug!(url = url, "Fetching");
        self.retry
            .run(url, || async {
                let response = self.get(url).await?;
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| TransportError::http(url, e))?;
                Ok(bytes.to_vec())
            })
            .await
    }

    async fn download_to(&self, url: &str, dest: &Path) -> Result<u64, TransportError> {
        debug!(url = url, dest = %dest.display(), "Downloading");
        self.retry
            .run(url, || self.download_once(url, dest))
            .await
    }
}
