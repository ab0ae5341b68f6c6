// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::{
    ObjectLocation, ObjectMeta, ObjectReader, ObjectStore, ObjectStoreError, Result, check_range,
};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncRead, AsyncReadExt as _};

/// Objects kept in a map, for tests. Uploads and deletes can be made to fail
/// on demand.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<ObjectLocation, Bytes>>,
    fail_puts: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following upload fail after consuming part of its input.
    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::Relaxed);
    }

    /// Makes every following `delete_batch` fail without removing anything.
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::Relaxed);
    }

    pub fn contains(&self, location: &ObjectLocation) -> bool {
        self.objects.lock().contains_key(location)
    }

    pub fn object(&self, location: &ObjectLocation) -> Option<Bytes> {
        self.objects.lock().get(location).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(
        &self,
        location: &ObjectLocation,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<u64> {
        if self.fail_puts.load(Ordering::Relaxed) {
            let mut first = [0u8; 16];
            let _ = reader.read(&mut first).await?;
            return Err(std::io::Error::other("injected upload failure").into());
        }
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await?;
        let len = buf.len() as u64;
        self.objects.lock().insert(location.clone(), buf.into());
        Ok(len)
    }

    async fn get(
        &self,
        location: &ObjectLocation,
        range: Option<Range<u64>>,
    ) -> Result<ObjectReader> {
        let object = self
            .object(location)
            .ok_or_else(|| ObjectStoreError::NotFound(location.clone()))?;
        let object = match range {
            None => object,
            Some(range) => {
                check_range(location, &range, object.len() as u64)?;
                object.slice(range.start as usize..range.end as usize)
            }
        };
        Ok(Box::new(std::io::Cursor::new(object)))
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectMeta>> {
        Ok(self
            .objects
            .lock()
            .iter()
            .filter(|(loc, _)| loc.bucket() == bucket && loc.key().starts_with(prefix))
            .map(|(loc, data)| ObjectMeta {
                location: loc.clone(),
                size: data.len() as u64,
            })
            .collect())
    }

    async fn delete_batch(&self, locations: &[ObjectLocation]) -> Result<()> {
        if self.fail_deletes.load(Ordering::Relaxed) {
            return Err(std::io::Error::other("injected delete failure").into());
        }
        let mut objects = self.objects.lock();
        for location in locations {
            objects.remove(location);
        }
        Ok(())
    }
}
