//! Screenshot thumbnails: the first two screenshots of every item, resized
//! and re-encoded as PNG.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Cursor;

use image::imageops::FilterType;
use image::ImageFormat;
use tracing::warn;

use super::index::{sync_index, PersistedIndex, SyncOutcome};
use super::{MirrorError, MirrorStore, IMAGE_INDEX_FILE};
use crate::crawler::CrawlContext;
use crate::listing::item_key;
use crate::search::SearchDatabase;
use crate::transport::Retryable;

const SCREENSHOT_PATH: &str = "/img/ss/";
const SCREENSHOTS_PER_ITEM: usize = 2;

/// Mirror key of a screenshot URL: its path below `/img/ss/`, flattened
/// with `_` and given a `.png` extension.
pub fn screenshot_key(url: &str) -> Option<String> {
    let (_, path) = url.split_once(SCREENSHOT_PATH)?;
    if path.is_empty() {
        return None;
    }
    let stem = match path.rsplit_once('.') {
        Some((stem, _)) if !stem.ends_with('/') && !stem.is_empty() => stem,
        _ => path,
    };
    Some(format!("{}.png", stem.replace('/', "_")))
}

/// Crop-to-fill `bytes` into a `width` x `height` PNG.
pub fn thumbnail_png(bytes: &[u8], width: u32, height: u32) -> Result<Vec<u8>, image::ImageError> {
    let thumbnail = image::load_from_memory(bytes)?.resize_to_fill(width, height, FilterType::Lanczos3);
    let mut out = Cursor::new(Vec::new());
    thumbnail.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}

pub async fn sync_images(
    ctx: &CrawlContext,
    store: &dyn MirrorStore,
    search: &SearchDatabase,
) -> Result<SyncOutcome, MirrorError> {
    let mut desired: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut sources: BTreeMap<String, String> = BTreeMap::new();
    for record in search.records() {
        for url in record.screenshots.iter().take(SCREENSHOTS_PER_ITEM) {
            let Some(key) = screenshot_key(url) else {
                continue;
            };
            desired
                .entry(key.clone())
                .or_default()
                .insert(item_key(&record.item_type, record.id));
            sources.entry(key).or_insert_with(|| url.clone());
        }
    }

    let mut index = PersistedIndex::load(&ctx.codec, IMAGE_INDEX_FILE)?;
    let transport = ctx.transport();
    let sources = &sources;
    let (width, height) = (
        ctx.config.mirror.thumbnail_width,
        ctx.config.mirror.thumbnail_height,
    );

    sync_index(
        "images",
        store,
        &ctx.config.mirror.image_dir,
        &mut index,
        &desired,
        |key| key.to_string(),
        &ctx.events,
        |key| async move {
            let Some(url) = sources.get(&key) else {
                return Ok(None);
            };
            let bytes = match transport.fetch_bytes(url).await {
                Ok(bytes) => bytes,
                Err(e) if !e.is_retryable() => {
                    warn!("Skipping screenshot {}: {}", url, e);
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            };
            match thumbnail_png(&bytes, width, height) {
                Ok(png) => Ok(Some(png)),
                Err(e) => {
                    warn!("Skipping undecodable screenshot {}: {}", url, e);
                    Ok(None)
                }
            }
        },
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::events::EventHub;
    use crate::search::SearchRecord;
    use crate::testing::{fixtures, MockCatalog, MockMirrorStore, MockTransport};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_screenshot_key() {
        assert_eq!(
            screenshot_key("https://images.gamebanana.com/img/ss/mods/5f2a1b.jpg").as_deref(),
            Some("mods_5f2a1b.png")
        );
        assert_eq!(
            screenshot_key("https://images.gamebanana.com/img/ss/mods/530-90_5f2a1b.webp").as_deref(),
            Some("mods_530-90_5f2a1b.png")
        );
        assert_eq!(screenshot_key("https://images.gamebanana.com/img/ico/x.png"), None);
    }

    #[test]
    fn test_thumbnail_has_requested_size() {
        let png = thumbnail_png(&fixtures::png(640, 480), 220, 124).unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (220, 124));
    }

    fn record(id: u64, screenshots: &[&str]) -> SearchRecord {
        SearchRecord {
            item_type: "Mod".to_string(),
            id,
            screenshots: screenshots.iter().map(|s| s.to_string()).collect(),
            ..SearchRecord::default()
        }
    }

    #[tokio::test]
    async fn test_sync_uploads_first_two_screenshots() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.paths.data_dir = dir.path().join("data");
        config.paths.cache_dir = dir.path().join("cache");

        let base = "https://images.example.org/img/ss/mods";
        let transport = Arc::new(MockTransport::new());
        transport.add(&format!("{}/a.jpg", base), fixtures::png(64, 64));
        transport.add(&format!("{}/b.jpg", base), b"not an image".to_vec());
        transport.add(&format!("{}/c.jpg", base), fixtures::png(64, 64));

        let ctx = CrawlContext::new(
            config,
            EventHub::new(),
            Arc::new(MockCatalog::new()),
            transport,
            None,
        );
        let urls: Vec<String> = ["a", "b", "c"]
            .iter()
            .map(|n| format!("{}/{}.jpg", base, n))
            .collect();
        let search = SearchDatabase::new(vec![record(
            1,
            &urls.iter().map(String::as_str).collect::<Vec<_>>(),
        )]);

        let store = MockMirrorStore::new();
        let outcome = sync_images(&ctx, &store, &search).await.unwrap();

        assert_eq!(outcome.uploaded, 1);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(store.puts(), vec!["mods_a.png"]);

        // item loses its screenshots
        let outcome = sync_images(&ctx, &store, &SearchDatabase::new(vec![record(1, &[])]))
            .await
            .unwrap();
        assert_eq!(outcome.deleted, 1);
        assert!(store.files_in("banana-mirror-images").is_empty());
    }
}
