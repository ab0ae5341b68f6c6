// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::{
    ObjectLocation, ObjectMeta, ObjectReader, ObjectStore, ObjectStoreError, Result, check_range,
};
use async_trait::async_trait;
use std::io::SeekFrom;
use std::ops::Range;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt as _, AsyncSeekExt as _};

/// Directory where uploads are written before being moved into place.
const STAGING_DIR: &str = ".staging";

/// Objects stored as files:
/// ```text
/// {root}/
///   {bucket}/
///     {key}       # `/` in keys become directories
///   .staging/     # uploads in progress
/// ```
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, location: &ObjectLocation) -> PathBuf {
        let mut path = self.root.join(location.bucket());
        path.extend(location.key().split('/'));
        path
    }

    async fn open(&self, location: &ObjectLocation) -> Result<fs::File> {
        fs::File::open(self.path(location))
            .await
            .map_err(|e| not_found_or(e, location))
    }
}

fn not_found_or(e: std::io::Error, location: &ObjectLocation) -> ObjectStoreError {
    if e.kind() == std::io::ErrorKind::NotFound {
        ObjectStoreError::NotFound(location.clone())
    } else {
        ObjectStoreError::Io(e)
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(
        &self,
        location: &ObjectLocation,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<u64> {
        let staging = self.root.join(STAGING_DIR);
        fs::create_dir_all(&staging).await?;
        let temp = staging.join(uuid::Uuid::new_v4().to_string());

        let written = async {
            let mut file = fs::File::create(&temp).await?;
            let written = tokio::io::copy(reader, &mut file).await?;
            file.sync_all().await?;
            Ok::<_, std::io::Error>(written)
        }
        .await;
        let written = match written {
            Ok(written) => written,
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(&temp).await {
                    tracing::debug!(temp = %temp.display(), %cleanup, "couldn't remove staged upload");
                }
                return Err(e.into());
            }
        };

        let path = self.path(location);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::rename(&temp, &path).await?;
        Ok(written)
    }

    async fn get(
        &self,
        location: &ObjectLocation,
        range: Option<Range<u64>>,
    ) -> Result<ObjectReader> {
        let mut file = self.open(location).await?;
        match range {
            None => Ok(Box::new(file)),
            Some(range) => {
                let size = file.metadata().await?.len();
                check_range(location, &range, size)?;
                file.seek(SeekFrom::Start(range.start)).await?;
                Ok(Box::new(file.take(range.end - range.start)))
            }
        }
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let bucket_root = self.root.join(bucket);
        let mut objects = Vec::new();
        let mut pending = vec![bucket_root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                let path = entry.path();
                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() {
                    let Some(key) = key_of(&bucket_root, &path) else {
                        continue;
                    };
                    if !key.starts_with(prefix) {
                        continue;
                    }
                    let size = entry.metadata().await?.len();
                    objects.push(ObjectMeta {
                        location: ObjectLocation::new(bucket, key)?,
                        size,
                    });
                }
            }
        }
        objects.sort_by(|a, b| a.location.key().cmp(b.location.key()));
        Ok(objects)
    }

    async fn delete_batch(&self, locations: &[ObjectLocation]) -> Result<()> {
        for location in locations {
            match fs::remove_file(self.path(location)).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

/// Object key for a file under `bucket_root`, or `None` for names that no
/// key could produce.
fn key_of(bucket_root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(bucket_root).ok()?;
    let segments = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?;
    Some(segments.join("/"))
}
