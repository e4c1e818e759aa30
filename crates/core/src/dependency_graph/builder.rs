use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use super::{DependencyGraph, DependencyGraphEntry, DependencyMap};
use crate::archive::{open_archive, read_manifest, ArchiveError, ManifestDependency, ManifestEntry};
use crate::crawler::{CrawlContext, CrawlError};
use crate::events::EventHub;
use crate::store::{ModDatabase, ModRecord, DEPENDENCY_GRAPH_FILE};
use crate::transport::{DownloadError, Retryable};

/// Accumulates the dependencies declared across one manifest.
///
/// Names declared by the manifest itself are never recorded, and the first
/// version seen for a name wins.
#[derive(Debug, Default)]
pub struct DependencyCollector {
    siblings: BTreeSet<String>,
    pub dependencies: DependencyMap,
    pub optional_dependencies: DependencyMap,
}

impl DependencyCollector {
    pub fn new(manifest: &[ManifestEntry]) -> Self {
        Self {
            siblings: manifest.iter().map(|e| e.name.clone()).collect(),
            ..Self::default()
        }
    }

    /// Collect every entry of a manifest.
    pub fn from_manifest(manifest: &[ManifestEntry]) -> Self {
        let mut collector = Self::new(manifest);
        for entry in manifest {
            collector.collect(entry);
        }
        collector
    }

    pub fn collect(&mut self, entry: &ManifestEntry) {
        add(&self.siblings, &mut self.dependencies, &entry.dependencies);
        add(
            &self.siblings,
            &mut self.optional_dependencies,
            &entry.optional_dependencies,
        );
    }
}

fn add(siblings: &BTreeSet<String>, into: &mut DependencyMap, declared: &[ManifestDependency]) {
    for dep in declared {
        if siblings.contains(&dep.name) || into.contains_key(&dep.name) {
            continue;
        }
        into.insert(dep.name.clone(), dep.version.clone());
    }
}

/// Rebuild the dependency graph for every mod in `db` and write it out.
///
/// Only mods whose download link changed since the previous graph are
/// re-read. An archive that cannot be read contributes no dependencies.
pub async fn build_dependency_graph(
    ctx: &CrawlContext,
    db: &ModDatabase,
) -> Result<DependencyGraph, CrawlError> {
    let previous: DependencyGraph = ctx.codec.load(DEPENDENCY_GRAPH_FILE)?;
    let mut graph = DependencyGraph::new();
    let mut refreshed = 0;

    for (name, record) in db.iter() {
        if let Some(entry) = previous.get(name).filter(|e| e.url == record.url) {
            graph.insert(name.clone(), entry.clone());
            continue;
        }

        let collector = read_dependencies(ctx, record).await?;
        debug!(
            "{} depends on {} mods ({} optional)",
            name,
            collector.dependencies.len(),
            collector.optional_dependencies.len()
        );
        graph.insert(
            name.clone(),
            DependencyGraphEntry {
                url: record.url.clone(),
                dependencies: collector.dependencies,
                optional_dependencies: collector.optional_dependencies,
            },
        );
        refreshed += 1;
    }

    ctx.codec.dump_atomic(DEPENDENCY_GRAPH_FILE, &graph)?;
    info!(mods = graph.len(), refreshed, "Dependency graph written");
    Ok(graph)
}

async fn read_dependencies(
    ctx: &CrawlContext,
    record: &ModRecord,
) -> Result<DependencyCollector, CrawlError> {
    let file = match ctx.downloads.fetch(&record.url, Some(record.size), None).await {
        Ok(file) => file,
        Err(DownloadError::Transport(e)) if e.is_retryable() => {
            return Err(DownloadError::Transport(e).into())
        }
        Err(e) => {
            warn!("No dependencies read from {}: {}", record.url, e);
            return Ok(DependencyCollector::default());
        }
    };

    let manifest = open_archive(&file.path, &record.url, &EventHub::new())
        .and_then(|mut handle| read_manifest(&mut handle));
    match manifest {
        Ok(Some(entries)) => Ok(DependencyCollector::from_manifest(&entries)),
        Ok(None) => Ok(DependencyCollector::default()),
        Err(ArchiveError::Io(e)) => Err(e.into()),
        Err(e) => {
            warn!("No dependencies read from {}: {}", record.url, e);
            Ok(DependencyCollector::default())
        }
    }
}
