use serde::{Deserialize, Serialize};

/// Which kind of sweep a run performs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SweepMode {
    Full,
    Incremental,
}

impl std::fmt::Display for SweepMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SweepMode::Full => write!(f, "full"),
            SweepMode::Incremental => write!(f, "incremental"),
        }
    }
}

/// Crawl event types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CrawlEvent {
    // Run lifecycle
    RunStarted {
        run_id: String,
        mode: SweepMode,
    },
    RunFinished {
        run_id: String,
        mode: SweepMode,
        items_visited: usize,
        records_changed: usize,
        records_deleted: usize,
    },
    RunFailed {
        run_id: String,
        error: String,
    },

    // Mod database
    ModUpdated {
        name: String,
        version: String,
        url: String,
    },
    ModDeleted {
        name: String,
        url: String,
    },
    FileExcluded {
        url: String,
        reason: String,
    },
    ManifestParseError {
        url: String,
        error: String,
    },
    /// An archive only opened after guessing the charset of its entry names.
    NonUtf8Archive {
        source: String,
        encoding: String,
    },

    // Mirror
    MirrorUploaded {
        mirror: String,
        key: String,
    },
    MirrorDeleted {
        mirror: String,
        key: String,
    },
}

impl CrawlEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            CrawlEvent::RunStarted { .. } => "run_started",
            CrawlEvent::RunFinished { .. } => "run_finished",
            CrawlEvent::RunFailed { .. } => "run_failed",
            CrawlEvent::ModUpdated { .. } => "mod_updated",
            CrawlEvent::ModDeleted { .. } => "mod_deleted",
            CrawlEvent::FileExcluded { .. } => "file_excluded",
            CrawlEvent::ManifestParseError { .. } => "manifest_parse_error",
            CrawlEvent::NonUtf8Archive { .. } => "non_utf8_archive",
            CrawlEvent::MirrorUploaded { .. } => "mirror_uploaded",
            CrawlEvent::MirrorDeleted { .. } => "mirror_deleted",
        }
    }
}
