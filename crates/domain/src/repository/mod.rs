//! Typed repositories over a `DocumentStore`.
//!
//! `try_*` methods make exactly one read-compute-commit attempt and surface
//! a lost race as a store conflict. The plain methods wrap them in
//! `retry_on_conflict`.

mod account;
mod inventory;

pub use account::AccountRepository;
pub use inventory::{InventoryRepository, MergeOutcome, RemovedItem};

use doc_store::{StorePath, Version, WriteIntent};
use serde::Serialize;

use crate::Result;

/// A decoded document together with the version it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub value: T,
    pub version: Version,
}

impl<T> Versioned<T> {
    pub fn new(value: T, version: Version) -> Self {
        Self { value, version }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Versioned<U> {
        Versioned {
            value: f(self.value),
            version: self.version,
        }
    }
}

impl<T: Serialize> Versioned<T> {
    /// A write replacing this document, valid only if nobody wrote it since
    /// it was read.
    pub fn put_intent(&self, path: StorePath) -> Result<WriteIntent> {
        Ok(WriteIntent::put_typed(path, self.version, &self.value)?)
    }

    /// A delete of this document under the same condition.
    pub fn delete_intent(&self, path: StorePath) -> WriteIntent {
        WriteIntent::delete(path, self.version)
    }
}
