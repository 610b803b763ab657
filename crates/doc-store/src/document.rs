use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{Result, StorePath};

/// Version number of a document, used for optimistic concurrency control.
///
/// A path that has never been written is at version 0. Every successful
/// write (put or delete) moves the path to the next version, and versions
/// never go backwards, so a deleted-then-recreated document cannot satisfy a
/// stale expectation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a new version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the initial version (0) of a path that was never written.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the version after the first write (1).
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Version> for i64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

/// A point-in-time read of one path.
///
/// `body` is `None` when the document does not exist (never written, or
/// deleted). The version is still meaningful in that case and must be used
/// as the expectation when creating the document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub path: StorePath,
    pub version: Version,
    pub body: Option<serde_json::Value>,
}

impl Document {
    /// An absent document at the given version.
    pub fn absent(path: StorePath, version: Version) -> Self {
        Self {
            path,
            version,
            body: None,
        }
    }

    /// Returns true if the document currently holds a value.
    pub fn exists(&self) -> bool {
        self.body.is_some()
    }

    /// Deserializes the body into a typed value.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        match &self.body {
            Some(body) => Ok(Some(serde_json::from_value(body.clone())?)),
            None => Ok(None),
        }
    }
}

/// What a conditional write does to its path.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Put(serde_json::Value),
    Delete,
}

/// One conditional write inside a commit.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteIntent {
    pub path: StorePath,
    /// The version the caller read. The write only applies if the path is
    /// still at this version.
    pub expected: Version,
    pub op: WriteOp,
}

impl WriteIntent {
    /// Puts a raw JSON value at `path`.
    pub fn put(path: StorePath, expected: Version, value: serde_json::Value) -> Self {
        Self {
            path,
            expected,
            op: WriteOp::Put(value),
        }
    }

    /// Serializes `value` and puts it at `path`.
    pub fn put_typed<T: Serialize>(path: StorePath, expected: Version, value: &T) -> Result<Self> {
        Ok(Self::put(path, expected, serde_json::to_value(value)?))
    }

    /// Deletes the document at `path`.
    pub fn delete(path: StorePath, expected: Version) -> Self {
        Self {
            path,
            expected,
            op: WriteOp::Delete,
        }
    }

    /// The body this intent leaves behind.
    pub fn body(&self) -> Option<&serde_json::Value> {
        match &self.op {
            WriteOp::Put(value) => Some(value),
            WriteOp::Delete => None,
        }
    }
}
