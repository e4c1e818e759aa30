use std::sync::Arc;

use tracing::info;

use crate::catalog::{Catalog, GameBananaClient};
use crate::config::Config;
use crate::events::EventHub;
use crate::mirror::{FtpMirrorStore, MirrorStore};
use crate::store::SnapshotCodec;
use crate::transport::{DownloadCache, HttpTransport, Transport, TransportError};

/// Everything a crawl run needs, constructed once and passed by reference.
pub struct CrawlContext {
    pub config: Config,
    pub events: EventHub,
    pub codec: SnapshotCodec,
    pub catalog: Arc<dyn Catalog>,
    pub downloads: DownloadCache,
    /// `None` when mirroring is disabled.
    pub mirror: Option<Arc<dyn MirrorStore>>,
}

impl CrawlContext {
    pub fn new(
        config: Config,
        events: EventHub,
        catalog: Arc<dyn Catalog>,
        transport: Arc<dyn Transport>,
        mirror: Option<Arc<dyn MirrorStore>>,
    ) -> Self {
        let codec = SnapshotCodec::new(&config.paths.data_dir);
        let downloads = DownloadCache::new(transport, &config.paths.cache_dir);
        Self {
            config,
            events,
            codec,
            catalog,
            downloads,
            mirror,
        }
    }

    /// Wire the production implementations from configuration.
    pub fn from_config(config: Config, events: EventHub) -> Result<Self, TransportError> {
        let catalog = Arc::new(GameBananaClient::new(&config.catalog, &config.http)?);
        let transport = Arc::new(HttpTransport::new(&config.http, &config.catalog.user_agent)?);
        let mirror: Option<Arc<dyn MirrorStore>> = if config.mirror.enabled {
            info!(host = %config.mirror.host, "Mirror synchronization enabled");
            Some(Arc::new(FtpMirrorStore::new(&config.mirror, &config.http)))
        } else {
            info!("Mirror synchronization disabled");
            None
        };
        Ok(Self::new(config, events, catalog, transport, mirror))
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        self.downloads.transport()
    }
}
