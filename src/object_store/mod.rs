// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Object storage for containers.
//!
//! Objects are addressed by an [`ObjectLocation`], a bucket plus a `/`
//! separated key. Reads support byte ranges, which is what lets the retrieval
//! API serve a single record out of an arbitrarily large aggregate.

mod local;
#[cfg(test)]
mod memory;
mod s3;

pub use local::LocalObjectStore;
#[cfg(test)]
pub use memory::MemoryObjectStore;
pub use s3::{S3Config, S3ObjectStore};

use async_trait::async_trait;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use tokio::io::AsyncRead;

pub type ObjectReader = Box<dyn AsyncRead + Send + Unpin>;

#[derive(Debug, thiserror::Error)]
pub enum ObjectStoreError {
    #[error("object not found: {0}")]
    NotFound(ObjectLocation),
    #[error("invalid range {start}..{end} for {location} of size {size}")]
    InvalidRange {
        location: ObjectLocation,
        start: u64,
        end: u64,
        size: u64,
    },
    #[error("invalid object location: {0}")]
    InvalidLocation(String),
    #[error("object store request failed: {0}")]
    Remote(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ObjectStoreError>;

/// `bucket/key`. The bucket never contains a `/`; the key may.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectLocation {
    bucket: String,
    key: String,
}

impl ObjectLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Result<Self> {
        let bucket = bucket.into();
        let key = key.into();
        if bucket.is_empty() || bucket.contains('/') || bucket.starts_with('.') {
            return Err(ObjectStoreError::InvalidLocation(format!(
                "bad bucket name {bucket:?}"
            )));
        }
        if key
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..")
        {
            return Err(ObjectStoreError::InvalidLocation(format!(
                "bad object key {key:?}"
            )));
        }
        Ok(Self { bucket, key })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

impl FromStr for ObjectLocation {
    type Err = ObjectStoreError;

    fn from_str(s: &str) -> Result<Self> {
        let (bucket, key) = s
            .split_once('/')
            .ok_or_else(|| ObjectStoreError::InvalidLocation(s.to_owned()))?;
        Self::new(bucket, key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub location: ObjectLocation,
    pub size: u64,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores everything `reader` yields under `location`, replacing any
    /// existing object, and returns the number of bytes stored. If the reader
    /// fails, nothing is stored.
    async fn put(
        &self,
        location: &ObjectLocation,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<u64>;

    /// Reads the whole object, or just `range` of it. The range must lie
    /// within the object.
    async fn get(&self, location: &ObjectLocation, range: Option<Range<u64>>)
    -> Result<ObjectReader>;

    /// Objects in `bucket` whose key starts with `prefix`, ordered by key.
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectMeta>>;

    /// Deletes the given objects. Missing objects are ignored.
    async fn delete_batch(&self, locations: &[ObjectLocation]) -> Result<()>;
}

fn check_range(location: &ObjectLocation, range: &Range<u64>, size: u64) -> Result<()> {
    if range.start > range.end || range.end > size {
        return Err(ObjectStoreError::InvalidRange {
            location: location.clone(),
            start: range.start,
            end: range.end,
            size,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_round_trips() {
        let loc: ObjectLocation = "blocks/avail/100.car".parse().unwrap();
        assert_eq!(loc.bucket(), "blocks");
        assert_eq!(loc.key(), "avail/100.car");
        assert_eq!(loc.to_string(), "blocks/avail/100.car");
    }

    #[test]
    fn bad_locations_are_rejected() {
        for bad in ["", "bucket", "/key", "bucket/", "bucket/a//b", "bucket/../x", ".hidden/key"] {
            assert!(bad.parse::<ObjectLocation>().is_err(), "{bad}");
        }
    }
}
