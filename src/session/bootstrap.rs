use std::fs;
use std::io::Read;
use std::time::Duration;

use crate::config::SyncConfig;
use crate::db::RecordStore;
use crate::error::{error_chain, SyncError};
use crate::models::Collection;

/// Where snapshot bytes come from. The HTTP implementation is used at
/// runtime; tests plug in fixed payloads.
pub trait SnapshotSource {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, SyncError>;
}

/// Unauthenticated blocking HTTP GET.
pub struct HttpSource {
    agent: ureq::Agent,
}

impl HttpSource {
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }
}

impl SnapshotSource for HttpSource {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, SyncError> {
        let response = self.agent.get(url).call().map_err(|source| SyncError::Download {
            url: url.to_string(),
            source: Box::new(source),
        })?;
        let mut body = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut body)
            .map_err(|source| SyncError::Body {
                url: url.to_string(),
                source,
            })?;
        Ok(body)
    }
}

/// Per-collection result of a bootstrap run.
#[derive(Debug)]
pub struct BootstrapReport {
    pub outcomes: Vec<(Collection, Result<usize, SyncError>)>,
}

impl BootstrapReport {
    pub fn all_loaded(&self) -> bool {
        self.outcomes.iter().all(|(_, result)| result.is_ok())
    }

    /// One human-readable line per collection.
    pub fn summary_lines(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .map(|(collection, result)| match result {
                Ok(rows) => format!("{}: loaded {rows} records from snapshot", collection.title()),
                Err(err) => format!(
                    "{}: kept local records, snapshot failed ({})",
                    collection.title(),
                    error_chain(err)
                ),
            })
            .collect()
    }
}

/// Download both snapshots and replace the matching collections. A failure
/// for one collection is recorded and leaves its local contents untouched;
/// the other collection is still attempted.
pub fn bootstrap(
    store: &RecordStore,
    sync: &SyncConfig,
    source: &dyn SnapshotSource,
) -> BootstrapReport {
    let outcomes = Collection::ALL
        .into_iter()
        .map(|collection| {
            let result = load_snapshot(store, sync, source, collection);
            match &result {
                Ok(rows) => tracing::info!(%collection, rows, "bootstrap loaded snapshot"),
                Err(err) => tracing::error!(%collection, error = %error_chain(err), "bootstrap failed"),
            }
            (collection, result)
        })
        .collect();
    BootstrapReport { outcomes }
}

/// Bootstrap over HTTP with the configured timeout.
pub fn bootstrap_from_remote(store: &RecordStore, sync: &SyncConfig) -> BootstrapReport {
    let source = HttpSource::new(Duration::from_secs(sync.timeout_secs));
    bootstrap(store, sync, &source)
}

fn load_snapshot(
    store: &RecordStore,
    sync: &SyncConfig,
    source: &dyn SnapshotSource,
    collection: Collection,
) -> Result<usize, SyncError> {
    let url = sync.url(collection);
    tracing::debug!(%collection, url, "downloading snapshot");
    let body = source.fetch(url)?;

    // Keep the raw snapshot next to the publish checkout for inspection.
    let copy_path = sync.file_path(collection);
    if let Err(err) = fs::create_dir_all(&sync.repo_dir).and_then(|_| fs::write(&copy_path, &body)) {
        tracing::warn!(path = %copy_path.display(), error = %err, "could not keep snapshot copy");
    }

    Ok(store.import(collection, body.as_slice())?)
}
