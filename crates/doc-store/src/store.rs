use std::collections::HashSet;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::{Document, Result, StoreError, StorePath, Version, WriteIntent};

/// Core trait for durable document stores.
///
/// A store exposes per-path reads that return the current version, and an
/// atomic conditional commit over one or more paths. It never performs a
/// blind overwrite: every write names the version it expects to replace.
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Reads a single path.
    ///
    /// Always returns a document; absent paths come back with `body: None`
    /// and the version a creating write must expect.
    async fn read(&self, path: &StorePath) -> Result<Document>;

    /// Applies a batch of conditional writes atomically.
    ///
    /// Either every intent's expected version matches and all writes apply,
    /// or the first mismatch is reported as `ConcurrencyConflict` and nothing
    /// is applied. Returns the new version of each path, in intent order.
    async fn commit(&self, writes: Vec<WriteIntent>) -> Result<Vec<Version>>;

    /// Lists live documents strictly below `prefix`, ordered by path.
    async fn list(&self, prefix: &StorePath) -> Result<Vec<Document>>;
}

/// Extension trait providing convenience methods for document stores.
#[async_trait]
pub trait DocumentStoreExt: DocumentStore {
    /// Single-path compare-and-swap.
    ///
    /// Returns `Ok(false)` when another writer got there first.
    async fn write_if_version(
        &self,
        path: &StorePath,
        value: serde_json::Value,
        expected: Version,
    ) -> Result<bool> {
        match self
            .commit(vec![WriteIntent::put(path.clone(), expected, value)])
            .await
        {
            Ok(_) => Ok(true),
            Err(StoreError::ConcurrencyConflict { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Reads a path and deserializes its body, keeping the version.
    async fn read_typed<T: DeserializeOwned + Send>(
        &self,
        path: &StorePath,
    ) -> Result<(Option<T>, Version)> {
        let document = self.read(path).await?;
        Ok((document.decode()?, document.version))
    }

    /// Checks if a document currently exists at `path`.
    async fn exists(&self, path: &StorePath) -> Result<bool> {
        Ok(self.read(path).await?.exists())
    }
}

// Blanket implementation for all DocumentStore implementations
impl<T: DocumentStore + ?Sized> DocumentStoreExt for T {}

/// Validates a commit batch before it reaches a backend.
pub fn validate_commit(writes: &[WriteIntent]) -> Result<()> {
    if writes.is_empty() {
        return Err(StoreError::InvalidCommit(
            "Cannot commit an empty write set".to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(writes.len());
    for write in writes {
        if !seen.insert(write.path.as_str()) {
            return Err(StoreError::InvalidCommit(format!(
                "Path {} appears more than once in a commit",
                write.path
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_commit() {
        assert!(matches!(
            validate_commit(&[]),
            Err(StoreError::InvalidCommit(_))
        ));
    }

    #[test]
    fn rejects_duplicate_paths() {
        let path = StorePath::parse("users/1").unwrap();
        let writes = vec![
            WriteIntent::put(path.clone(), Version::initial(), serde_json::json!({})),
            WriteIntent::delete(path, Version::first()),
        ];
        assert!(matches!(
            validate_commit(&writes),
            Err(StoreError::InvalidCommit(_))
        ));
    }
}
