//! Crawl lifecycle integration tests.
//!
//! Whole runs against the in-memory catalog and transport: records are
//! added, superseded, excluded and deleted across consecutive runs.

use std::sync::Arc;

use tempfile::TempDir;

use modmirror_core::{
    crawler::ModDatasets,
    dependency_graph::DependencyGraph,
    events::RecordingSubscriber,
    listing::{ListingIndex, PluginEntities, INDEX_FILE},
    store::{DEPENDENCY_GRAPH_FILE, FILE_LISTINGS_DIR},
    testing::{fixtures, MockCatalog, MockTransport},
    Config, CrawlContext, CrawlRunner, EventHub, SweepMode,
};

struct TestHarness {
    catalog: Arc<MockCatalog>,
    transport: Arc<MockTransport>,
    recorder: Arc<RecordingSubscriber>,
    runner: CrawlRunner,
    _temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut config = Config::default();
        config.paths.data_dir = temp_dir.path().join("data");
        config.paths.cache_dir = temp_dir.path().join("cache");
        config.catalog.categories = vec!["Mod".to_string()];

        let catalog = Arc::new(MockCatalog::new());
        let transport = Arc::new(MockTransport::new());
        let recorder = Arc::new(RecordingSubscriber::new());
        let ctx = CrawlContext::new(
            config,
            EventHub::new().with_subscriber(recorder.clone()),
            catalog.clone(),
            transport.clone(),
            None,
        );

        Self {
            catalog,
            transport,
            recorder,
            runner: CrawlRunner::new(ctx),
            _temp_dir: temp_dir,
        }
    }

    fn serve(&self, file_id: u64, content: &[u8], date_added: i64) -> modmirror_core::catalog::CatalogFile {
        let file = fixtures::file(file_id, content, date_added);
        self.transport.add(&file.url, content.to_vec());
        file
    }

    fn mod_archive(mods: &[(&str, &str)]) -> Vec<u8> {
        fixtures::build_zip(&[("everest.yaml", &fixtures::manifest(mods))])
    }

    fn datasets(&self) -> ModDatasets {
        ModDatasets::load(&self.runner.context().codec).expect("Failed to load datasets")
    }

    fn data_dir(&self) -> std::path::PathBuf {
        self.runner.context().config.paths.data_dir.clone()
    }
}

#[tokio::test]
async fn test_newer_upload_wins_when_seen_first() {
    let h = TestHarness::new();
    let newer = h.serve(20, &TestHarness::mod_archive(&[("Foo", "2.0.0")]), 200);
    h.catalog.add_item(fixtures::item("Mod", 1, 200, vec![newer]));
    h.runner.run(SweepMode::Full).await.unwrap();

    // the older upload shows up afterwards
    let older = h.serve(10, &TestHarness::mod_archive(&[("Foo", "1.0.0")]), 100);
    let newer = fixtures::file(20, &TestHarness::mod_archive(&[("Foo", "2.0.0")]), 200);
    h.catalog
        .add_item(fixtures::item("Mod", 1, 300, vec![older, newer]));
    h.runner.run(SweepMode::Full).await.unwrap();

    let data = h.datasets();
    let record = data.mods.get("Foo").unwrap();
    assert_eq!(record.version, "2.0.0");
    assert_eq!(record.last_update, 200);
    assert!(data.excluded.contains("https://gamebanana.com/mmdl/10"));
}

#[tokio::test]
async fn test_newer_upload_wins_when_seen_last() {
    let h = TestHarness::new();
    let older = h.serve(10, &TestHarness::mod_archive(&[("Foo", "1.0.0")]), 100);
    h.catalog
        .add_item(fixtures::item("Mod", 1, 100, vec![older.clone()]));
    h.runner.run(SweepMode::Full).await.unwrap();
    assert_eq!(h.datasets().mods.get("Foo").unwrap().version, "1.0.0");

    let newer = h.serve(20, &TestHarness::mod_archive(&[("Foo", "2.0.0")]), 200);
    h.catalog
        .add_item(fixtures::item("Mod", 1, 200, vec![older, newer]));
    let report = h.runner.run(SweepMode::Incremental).await.unwrap();
    assert_eq!(report.records_updated, 1);

    let data = h.datasets();
    let record = data.mods.get("Foo").unwrap();
    assert_eq!(record.version, "2.0.0");
    assert_eq!(record.url, "https://gamebanana.com/mmdl/20");
    assert_eq!(
        record.mirror_url,
        "https://celestemodupdater.0x0a.de/banana-mirror/20.zip"
    );
}

#[tokio::test]
async fn test_name_owned_by_another_item_is_excluded() {
    let h = TestHarness::new();
    let original = h.serve(10, &TestHarness::mod_archive(&[("Foo", "1.0.0")]), 200);
    h.catalog.add_item(fixtures::item("Mod", 1, 200, vec![original]));
    let impostor = h.serve(20, &TestHarness::mod_archive(&[("Foo", "9.0.0")]), 100);
    let mut item = fixtures::item("Mod", 2, 300, vec![impostor]);
    item.date_added = 300;
    h.catalog.add_item(item);

    h.runner.run(SweepMode::Full).await.unwrap();

    let data = h.datasets();
    let record = data.mods.get("Foo").unwrap();
    // item 2 is newest, so it claims the name first
    assert_eq!(record.item_id, 2);
    let reason = data.excluded.reason("https://gamebanana.com/mmdl/10").unwrap();
    assert!(reason.contains("already belongs to Mod 2"));
}

#[tokio::test]
async fn test_bad_archives_are_excluded_once() {
    let h = TestHarness::new();
    let junk = h.serve(10, b"this is not a zip file", 100);
    let empty = h.serve(11, &fixtures::build_zip(&[("readme.txt", "hi")]), 110);
    let broken = h.serve(12, &fixtures::build_zip(&[("everest.yaml", "- Name: [unclosed")]), 120);
    h.catalog
        .add_item(fixtures::item("Mod", 1, 120, vec![junk, empty, broken]));

    h.runner.run(SweepMode::Full).await.unwrap();
    let data = h.datasets();
    assert!(data.mods.is_empty());
    assert!(data.excluded.contains("https://gamebanana.com/mmdl/10"));
    assert!(data.excluded.contains("https://gamebanana.com/mmdl/12"));
    assert!(data.no_manifest.contains("https://gamebanana.com/mmdl/11"));
    assert_eq!(h.recorder.count("file_excluded"), 2);
    assert_eq!(h.recorder.count("manifest_parse_error"), 1);

    // nothing downloads them again: the crawler skips them, listings are cached
    let downloads = |h: &TestHarness| -> usize {
        (10..=12)
            .map(|id| h.transport.download_count(&format!("https://gamebanana.com/mmdl/{}", id)))
            .sum()
    };
    let before = downloads(&h);
    h.runner.run(SweepMode::Full).await.unwrap();
    assert_eq!(downloads(&h), before);
}

#[tokio::test]
async fn test_wrong_size_is_excluded_by_size() {
    let h = TestHarness::new();
    let mut file = h.serve(10, &TestHarness::mod_archive(&[("Foo", "1.0.0")]), 100);
    file.size += 7;
    h.catalog.add_item(fixtures::item("Mod", 1, 100, vec![file]));

    h.runner.run(SweepMode::Full).await.unwrap();
    let data = h.datasets();
    assert!(data.mods.get("Foo").is_none());
    let reason = data.excluded.reason("https://gamebanana.com/mmdl/10").unwrap();
    assert!(reason.contains("size mismatch"), "{}", reason);
    assert!(!reason.contains("hash"), "{}", reason);
}

#[tokio::test]
async fn test_oversized_manifest_entry_is_excluded() {
    let h = TestHarness::new();
    let manifest = fixtures::manifest(&[("Huge", "1.0.0")]);
    let mut archive =
        fixtures::stored_zip_with_raw_names(&[(b"everest.yaml".as_slice(), manifest.as_bytes())]);
    // claim almost 4 GiB for the manifest in the central directory
    let central = archive
        .windows(4)
        .position(|w| w == [0x50, 0x4b, 0x01, 0x02])
        .unwrap();
    archive[central + 24..central + 28].copy_from_slice(&0xFFFF_FFF0u32.to_le_bytes());
    let file = h.serve(10, &archive, 100);
    h.catalog.add_item(fixtures::item("Mod", 1, 100, vec![file]));

    h.runner.run(SweepMode::Full).await.unwrap();
    let data = h.datasets();
    assert!(data.mods.get("Huge").is_none());
    let reason = data.excluded.reason("https://gamebanana.com/mmdl/10").unwrap();
    assert!(reason.contains("larger than"), "{}", reason);
}

#[tokio::test]
async fn test_vanished_item_is_reconciled_away() {
    let h = TestHarness::new();
    let kept = h.serve(10, &TestHarness::mod_archive(&[("Kept", "1.0.0")]), 100);
    h.catalog.add_item(fixtures::item("Mod", 1, 100, vec![kept]));
    let gone = h.serve(20, &TestHarness::mod_archive(&[("Gone", "1.0.0")]), 200);
    h.catalog.add_item(fixtures::item("Mod", 2, 200, vec![gone]));
    h.runner.run(SweepMode::Full).await.unwrap();

    h.catalog.remove_item("Mod", 2);
    let fresh = h.serve(30, &TestHarness::mod_archive(&[("Fresh", "1.0.0")]), 300);
    h.catalog.add_item(fixtures::item("Mod", 3, 300, vec![fresh]));
    let report = h.runner.run(SweepMode::Full).await.unwrap();

    assert_eq!(report.records_deleted, 1);
    let data = h.datasets();
    assert!(data.mods.get("Gone").is_none());
    assert!(data.mods.get("Kept").is_some());
    assert!(data.mods.get("Fresh").is_some());
    assert_eq!(h.recorder.count("mod_deleted"), 1);

    let index: ListingIndex = h
        .runner
        .context()
        .codec
        .load_path(&h.data_dir().join(FILE_LISTINGS_DIR).join(INDEX_FILE))
        .unwrap();
    assert!(!index.contains_key("Mod/2"));
}

#[tokio::test]
async fn test_shift_jis_archive_is_read_through_fallback() {
    let h = TestHarness::new();
    let manifest = fixtures::manifest(&[("JapaneseMaps", "1.0.0")]);
    let names: Vec<Vec<u8>> = [
        "マップ/はじめてのステージ.bin",
        "マップ/ふたつめのステージ.bin",
        "説明書を読んでください.txt",
    ]
    .iter()
    .map(|s| encoding_rs::SHIFT_JIS.encode(s).0.into_owned())
    .collect();
    let mut entries: Vec<(&[u8], &[u8])> = vec![(b"everest.yaml".as_slice(), manifest.as_bytes())];
    entries.extend(names.iter().map(|n| (n.as_slice(), b"data".as_slice())));
    let archive = fixtures::stored_zip_with_raw_names(&entries);

    let file = h.serve(10, &archive, 100);
    h.catalog.add_item(fixtures::item("Mod", 1, 100, vec![file]));
    h.runner.run(SweepMode::Full).await.unwrap();

    assert!(h.datasets().mods.get("JapaneseMaps").is_some());
    assert_eq!(h.recorder.count("non_utf8_archive"), 1);

    let listing: Vec<String> = h
        .runner
        .context()
        .codec
        .load_path(&h.data_dir().join(FILE_LISTINGS_DIR).join("Mod/1/10.yaml"))
        .unwrap();
    assert!(listing.contains(&"説明書を読んでください.txt".to_string()));
}

#[tokio::test]
async fn test_listings_and_plugins_are_cached() {
    let h = TestHarness::new();
    let archive = fixtures::build_zip(&[
        ("everest.yaml", &fixtures::manifest(&[("Helper", "1.0.0")])),
        (
            "Ahorn/entities/spinner.jl",
            "module Spinner\n@mapdef Entity \"Helper/Spinner\" Spinner(x::Integer, y::Integer)\nend\n",
        ),
        (
            "Loenn/triggers/flag.lua",
            "local flag = {}\nflag.name = \"Helper/FlagTrigger\"\nflag.placements = { name = \"flag\" }\nreturn flag\n",
        ),
    ]);
    let file = h.serve(10, &archive, 100);
    h.catalog.add_item(fixtures::item("Mod", 1, 100, vec![file]));

    h.runner.run(SweepMode::Full).await.unwrap();
    let codec = &h.runner.context().codec;
    let item_dir = h.data_dir().join(FILE_LISTINGS_DIR).join("Mod/1");

    let ahorn: PluginEntities = codec.load_path(&item_dir.join("10_ahorn.yaml")).unwrap();
    assert!(ahorn.entities.contains("Helper/Spinner"));
    let loenn: PluginEntities = codec.load_path(&item_dir.join("10_loenn.yaml")).unwrap();
    assert!(loenn.triggers.contains("Helper/FlagTrigger"));
    assert!(!loenn.triggers.contains("flag"));
    assert!(item_dir.join("info.yaml").exists());

    // second run lists nothing new
    let before = h.transport.download_count("https://gamebanana.com/mmdl/10");
    h.runner.run(SweepMode::Full).await.unwrap();
    assert_eq!(
        h.transport.download_count("https://gamebanana.com/mmdl/10"),
        before
    );
    assert!(item_dir.join("10_ahorn.yaml").exists());
}

#[tokio::test]
async fn test_dependency_graph_skips_sibling_mods() {
    let h = TestHarness::new();
    let manifest = "\
- Name: A
  Version: 1.0.0
- Name: B
  Version: 1.0.0
  Dependencies:
    - Name: A
      Version: 1.0.0
    - Name: Everest
      Version: 1.4000.0
";
    let file = h.serve(10, &fixtures::build_zip(&[("everest.yaml", manifest)]), 100);
    h.catalog.add_item(fixtures::item("Mod", 1, 100, vec![file]));
    h.runner.run(SweepMode::Full).await.unwrap();

    let graph: DependencyGraph = h
        .runner
        .context()
        .codec
        .load(DEPENDENCY_GRAPH_FILE)
        .unwrap();
    let b = &graph["B"];
    assert_eq!(b.url, "https://gamebanana.com/mmdl/10");
    assert!(!b.dependencies.contains_key("A"));
    assert_eq!(b.dependencies.get("Everest").map(String::as_str), Some("1.4000.0"));
}
