use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    Document, Result, StoreError, StorePath, Version, WriteIntent,
    store::{DocumentStore, validate_commit},
};

#[derive(Debug, Clone)]
struct Entry {
    version: Version,
    body: Option<serde_json::Value>,
}

/// In-memory document store for tests and single-process deployments.
///
/// Keeps deleted paths as tombstones so their version keeps counting up.
/// Cloning shares the underlying state.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    documents: Arc<RwLock<BTreeMap<StorePath, Entry>>>,
    pending_conflicts: Arc<AtomicUsize>,
    commits: Arc<AtomicU64>,
    latency_micros: Arc<AtomicU64>,
}

impl InMemoryDocumentStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` commits fail with `ConcurrencyConflict`
    /// without applying anything.
    pub fn inject_conflicts(&self, count: usize) {
        self.pending_conflicts.store(count, Ordering::SeqCst);
    }

    /// Adds an artificial delay to every read and commit, widening the window
    /// between a snapshot and its conditional write.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_micros
            .store(latency.as_micros() as u64, Ordering::SeqCst);
    }

    /// Returns the number of commits that were applied.
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }

    /// Returns the number of live documents.
    pub async fn document_count(&self) -> usize {
        self.documents
            .read()
            .await
            .values()
            .filter(|e| e.body.is_some())
            .count()
    }

    /// Clears all documents and tombstones.
    pub async fn clear(&self) {
        self.documents.write().await.clear();
    }

    async fn simulate_latency(&self) {
        let micros = self.latency_micros.load(Ordering::SeqCst);
        if micros > 0 {
            tokio::time::sleep(Duration::from_micros(micros)).await;
        }
    }

    fn take_injected_conflict(&self) -> bool {
        self.pending_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn read(&self, path: &StorePath) -> Result<Document> {
        self.simulate_latency().await;

        let documents = self.documents.read().await;
        Ok(match documents.get(path) {
            Some(entry) => Document {
                path: path.clone(),
                version: entry.version,
                body: entry.body.clone(),
            },
            None => Document::absent(path.clone(), Version::initial()),
        })
    }

    async fn commit(&self, writes: Vec<WriteIntent>) -> Result<Vec<Version>> {
        validate_commit(&writes)?;
        self.simulate_latency().await;

        let mut documents = self.documents.write().await;

        // Verify every expectation before touching anything
        for write in &writes {
            let actual = documents
                .get(&write.path)
                .map(|e| e.version)
                .unwrap_or(Version::initial());

            if actual != write.expected {
                metrics::counter!("doc_store_conflicts_total").increment(1);
                return Err(StoreError::ConcurrencyConflict {
                    path: write.path.to_string(),
                    expected: write.expected,
                    actual,
                });
            }
        }

        if self.take_injected_conflict() {
            metrics::counter!("doc_store_conflicts_total").increment(1);
            let first = &writes[0];
            tracing::debug!(path = %first.path, "Injected commit conflict");
            return Err(StoreError::ConcurrencyConflict {
                path: first.path.to_string(),
                expected: first.expected,
                actual: first.expected.next(),
            });
        }

        let mut versions = Vec::with_capacity(writes.len());
        for write in writes {
            let version = write.expected.next();
            let body = write.body().cloned();
            documents.insert(write.path, Entry { version, body });
            versions.push(version);
        }

        self.commits.fetch_add(1, Ordering::SeqCst);
        metrics::counter!("doc_store_commits_total").increment(1);
        Ok(versions)
    }

    async fn list(&self, prefix: &StorePath) -> Result<Vec<Document>> {
        self.simulate_latency().await;

        let documents = self.documents.read().await;
        Ok(documents
            .range(prefix.clone()..)
            .take_while(|(path, _)| path.as_str().starts_with(prefix.as_str()))
            .filter(|(path, entry)| path.is_under(prefix) && entry.body.is_some())
            .map(|(path, entry)| Document {
                path: path.clone(),
                version: entry.version,
                body: entry.body.clone(),
            })
            .collect())
    }
}
