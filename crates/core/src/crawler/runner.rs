//! Crawl run orchestration.
//!
//! One run, in order:
//! - sweep the catalog into the mod database
//! - reconcile deletions against the complete file enumeration
//! - stage file listings, rebuild the search snapshot
//! - synchronize the mirrors and rebuild the dependency graph if anything changed
//! - commit the listing tree, then the crawl state

use std::collections::{BTreeSet, HashSet};

use tracing::{error, info, warn};
use uuid::Uuid;

use super::reconcile::{reconcile_deletions, ReconcileOutcome};
use super::sweep::{full_sweep, incremental_sweep};
use super::{CrawlContext, CrawlError, ModDatasets, RunReport};
use crate::dependency_graph::build_dependency_graph;
use crate::events::{CrawlEvent, SweepMode};
use crate::listing::{build_listings, carried_over_urls, item_key, ListingTree};
use crate::mirror::{sync_archives, sync_icons, sync_images, MirrorReport};
use crate::search::build_search_database;
use crate::store::{CrawlState, CRAWL_STATE_FILE, CRAWL_STATE_VERSION, DEPENDENCY_GRAPH_FILE};

/// Runs crawls against one context. Runs are strictly sequential.
pub struct CrawlRunner {
    ctx: CrawlContext,
}

impl CrawlRunner {
    pub fn new(ctx: CrawlContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &CrawlContext {
        &self.ctx
    }

    /// Whether a run has ever been committed.
    pub fn has_committed_state(&self) -> bool {
        self.ctx.codec.exists(CRAWL_STATE_FILE)
    }

    /// Perform one run.
    ///
    /// An incremental run without committed state is promoted to a full
    /// sweep. The download cache is emptied whatever the outcome.
    pub async fn run(&self, requested: SweepMode) -> Result<RunReport, CrawlError> {
        let run_id = Uuid::new_v4().to_string();
        let mode = if requested == SweepMode::Incremental && !self.has_committed_state() {
            warn!("No committed crawl state, running a full sweep instead");
            SweepMode::Full
        } else {
            requested
        };

        info!(run_id = %run_id, mode = %mode, "Starting crawl run");
        self.ctx.events.emit(CrawlEvent::RunStarted {
            run_id: run_id.clone(),
            mode,
        });

        let result = self.execute(&run_id, mode).await;
        self.ctx.downloads.clear().await;

        match &result {
            Ok(report) => {
                info!(
                    run_id = %run_id,
                    visited = report.items_visited,
                    added = report.records_added,
                    updated = report.records_updated,
                    deleted = report.records_deleted,
                    uploads = report.mirror_uploads,
                    deletes = report.mirror_deletes,
                    "Crawl run finished"
                );
                self.ctx.events.emit(CrawlEvent::RunFinished {
                    run_id: run_id.clone(),
                    mode,
                    items_visited: report.items_visited,
                    records_changed: report.records_changed(),
                    records_deleted: report.records_deleted,
                });
            }
            Err(e) => {
                error!(run_id = %run_id, "Crawl run failed: {}", e);
                self.ctx.events.emit(CrawlEvent::RunFailed {
                    run_id: run_id.clone(),
                    error: e.to_string(),
                });
            }
        }
        result
    }

    async fn execute(&self, run_id: &str, mode: SweepMode) -> Result<RunReport, CrawlError> {
        let ctx = &self.ctx;
        let mut report = RunReport::new(run_id, mode);

        let mut state: CrawlState = ctx.codec.load(CRAWL_STATE_FILE)?;
        if state.version != CRAWL_STATE_VERSION {
            warn!(
                "Crawl state has version {}, expected {}",
                state.version, CRAWL_STATE_VERSION
            );
            state.version = CRAWL_STATE_VERSION;
        }
        let catalog = &ctx.config.catalog;
        state.full_page_counter = catalog.full_page_size.next(state.full_page_counter);
        state.incremental_page_counter = catalog
            .incremental_page_size
            .next(state.incremental_page_counter);

        let mut data = ModDatasets::load(&ctx.codec)?;
        let progress = match mode {
            SweepMode::Full => full_sweep(ctx, &mut data, &mut state).await?,
            SweepMode::Incremental => incremental_sweep(ctx, &mut data, &mut state).await?,
        };
        report.items_visited = progress.visited.len();
        report.records_added = progress.records_added;
        report.records_updated = progress.records_updated;
        report.exclusions_added = progress.exclusions_added;

        // must be merged before reconciliation, or every unvisited mod looks deleted
        let carried = match mode {
            SweepMode::Full => BTreeSet::new(),
            SweepMode::Incremental => {
                let tree = ListingTree::new(ctx.codec.dir());
                tree.recover()?;
                let previous = tree.load_index(&ctx.codec)?;
                let visited: HashSet<String> = progress
                    .visited
                    .iter()
                    .map(|item| item_key(&item.item_type, item.id))
                    .collect();
                carried_over_urls(&previous, &visited)
            }
        };

        let mut reconciled = ReconcileOutcome::default();
        if progress.records_mutated() {
            let mut enumeration = progress.touched_urls.clone();
            enumeration.extend(carried);
            reconciled = reconcile_deletions(&mut data, &enumeration, &ctx.events);
        }
        report.records_deleted = reconciled.records_deleted;
        data.save(&ctx.codec)?;

        let staged = build_listings(ctx, &progress.visited, mode).await?;
        let search = build_search_database(ctx, &progress.visited, mode).await?;

        let changed = progress.records_mutated() || reconciled.records_deleted > 0;
        if changed {
            if let Some(store) = &ctx.mirror {
                let mirrors = MirrorReport {
                    archives: sync_archives(ctx, store.as_ref(), &data.mods).await?,
                    images: sync_images(ctx, store.as_ref(), &search).await?,
                    icons: sync_icons(ctx, store.as_ref(), &data.mods, &search).await?,
                };
                report.mirror_uploads = mirrors.uploads();
                report.mirror_deletes = mirrors.deletes();
            }
        }
        if changed || !ctx.codec.exists(DEPENDENCY_GRAPH_FILE) {
            build_dependency_graph(ctx, &data.mods).await?;
        }

        staged.tree.commit()?;
        ctx.codec.dump_atomic(CRAWL_STATE_FILE, &state)?;
        Ok(report)
    }
}
