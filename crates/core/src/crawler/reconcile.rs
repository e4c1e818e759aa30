//! Deletion reconciliation.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex_lite::Regex;
use tracing::info;

use super::ModDatasets;
use crate::events::{CrawlEvent, EventHub};

static EMBEDDED_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https://gamebanana\.com/mmdl/[0-9]+").expect("valid regex"));

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub records_deleted: usize,
    pub exclusions_pruned: usize,
    pub no_manifest_pruned: usize,
}

fn is_url(key: &str) -> bool {
    key.starts_with("http://") || key.starts_with("https://")
}

/// Drop everything that refers to a file missing from `enumeration`.
///
/// `enumeration` must be the complete set of current catalog file URLs.
/// Exclusion entries go when their URL key is gone or when their reason
/// references a download link that is gone. Entries keyed by mod name stay
/// unless their reason references a vanished link.
pub fn reconcile_deletions(
    data: &mut ModDatasets,
    enumeration: &BTreeSet<String>,
    events: &EventHub,
) -> ReconcileOutcome {
    let mut outcome = ReconcileOutcome::default();

    for (name, record) in data.mods.drain_where(|r| !enumeration.contains(&r.url)) {
        info!("Removing {} ({} no longer listed)", name, record.url);
        events.emit(CrawlEvent::ModDeleted {
            name,
            url: record.url,
        });
        outcome.records_deleted += 1;
    }

    let before = data.excluded.len();
    data.excluded.retain(|key, reason| {
        if is_url(key) && !enumeration.contains(key) {
            return false;
        }
        EMBEDDED_URL
            .find_iter(reason)
            .all(|m| enumeration.contains(m.as_str()))
    });
    outcome.exclusions_pruned = before - data.excluded.len();

    let before = data.no_manifest.len();
    data.no_manifest.retain(|url| enumeration.contains(url));
    outcome.no_manifest_pruned = before - data.no_manifest.len();

    info!(
        deleted = outcome.records_deleted,
        exclusions_pruned = outcome.exclusions_pruned,
        no_manifest_pruned = outcome.no_manifest_pruned,
        "Deletion reconciliation done"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingSubscriber;
    use crate::store::ModRecord;
    use std::sync::Arc;

    fn url(id: u64) -> String {
        format!("https://gamebanana.com/mmdl/{}", id)
    }

    fn record(file_id: u64) -> ModRecord {
        ModRecord {
            version: "1.0.0".to_string(),
            last_update: 100,
            hashes: vec!["0000000000000001".to_string()],
            url: url(file_id),
            mirror_url: String::new(),
            item_type: "Mod".to_string(),
            item_id: 1,
            file_id,
            size: 1,
        }
    }

    #[test]
    fn test_records_outside_enumeration_are_removed() {
        let mut data = ModDatasets::default();
        data.mods.insert("Kept", record(1));
        data.mods.insert("Gone", record(2));
        let enumeration: BTreeSet<String> = [url(1)].into_iter().collect();

        let recorder = Arc::new(RecordingSubscriber::new());
        let events = EventHub::new().with_subscriber(recorder.clone());
        let outcome = reconcile_deletions(&mut data, &enumeration, &events);

        assert_eq!(outcome.records_deleted, 1);
        assert!(data.mods.get("Kept").is_some());
        assert!(data.mods.get("Gone").is_none());
        assert_eq!(recorder.count("mod_deleted"), 1);
    }

    #[test]
    fn test_exclusions_pruned_by_key_and_reason() {
        let mut data = ModDatasets::default();
        data.excluded.insert(url(1), "broken zip");
        data.excluded.insert(url(2), "gone file");
        data.excluded.insert(
            url(3),
            format!("{} declares Foo which already belongs to Mod 9 ({})", url(3), url(4)),
        );
        data.excluded.insert("SomeModName", "blocked by hand");
        data.excluded.insert(
            "OtherName",
            format!("blocked because of {}", url(5)),
        );
        let enumeration: BTreeSet<String> = [url(1), url(3)].into_iter().collect();

        let outcome = reconcile_deletions(&mut data, &enumeration, &EventHub::new());

        assert!(data.excluded.contains(&url(1)));
        assert!(!data.excluded.contains(&url(2)));
        assert!(!data.excluded.contains(&url(3)));
        assert!(data.excluded.contains("SomeModName"));
        assert!(!data.excluded.contains("OtherName"));
        assert_eq!(outcome.exclusions_pruned, 3);
    }

    #[test]
    fn test_no_manifest_pruned() {
        let mut data = ModDatasets::default();
        data.no_manifest.insert(url(1));
        data.no_manifest.insert(url(2));
        let enumeration: BTreeSet<String> = [url(2)].into_iter().collect();

        reconcile_deletions(&mut data, &enumeration, &EventHub::new());
        assert!(!data.no_manifest.contains(&url(1)));
        assert!(data.no_manifest.contains(&url(2)));
    }
}
