//! Crawl orchestration.
//!
//! A run sweeps the catalog (full or incremental), merges what it finds
//! into the mod database, reconciles deletions, rebuilds the downstream
//! datasets and, when something changed, synchronizes the mirrors. The
//! crawl state is committed last, so a failed run is replayed from the
//! previous committed state.

mod consider;
mod context;
mod datasets;
mod reconcile;
mod runner;
mod sweep;
mod types;

pub use consider::consider_file;
pub use context::CrawlContext;
pub use datasets::{ModDatasets, SweepProgress};
pub use reconcile::{reconcile_deletions, ReconcileOutcome};
pub use runner::CrawlRunner;
pub use sweep::{full_sweep, incremental_sweep};
pub use types::{CrawlError, RunReport};
