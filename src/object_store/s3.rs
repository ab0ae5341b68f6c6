// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! S3-compatible object storage (AWS S3, MinIO, R2, ...).
//!
//! An [`ObjectLocation`] maps one to one onto an S3 bucket and key. Uploads of
//! unknown length go through a multipart upload, which is aborted if the
//! reader or any part fails.

use super::{ObjectLocation, ObjectMeta, ObjectReader, ObjectStore, ObjectStoreError, Result};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{BehaviorVersion, Builder, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart, Delete, ObjectIdentifier};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Range;
use tokio::io::{AsyncRead, AsyncReadExt as _};
use tracing::{debug, warn};
use url::Url;

/// Size of every multipart upload part but the last one. S3 requires at
/// least 5 MiB.
const PART_SIZE: usize = 16 << 20;

/// Most keys a single `DeleteObjects` request accepts.
const DELETE_CHUNK: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Config {
    pub region: String,
    /// Custom endpoint for S3-compatible services.
    pub endpoint: Option<Url>,
    /// Path-style addressing, required by MinIO.
    pub force_path_style: bool,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            region: "us-east-1".into(),
            endpoint: None,
            force_path_style: false,
        }
    }
}

pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    /// Credentials come from the usual AWS sources: environment, profile, or
    /// instance metadata.
    pub async fn new(config: &S3Config) -> Self {
        let shared = aws_config::defaults(BehaviorVersion::latest()).load().await;
        let mut builder = Builder::from(&shared)
            .region(Region::new(config.region.clone()))
            .force_path_style(config.force_path_style);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint.as_str().trim_end_matches('/'));
        }
        Self::with_client(Client::from_conf(builder.build()))
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn size(&self, location: &ObjectLocation) -> Result<u64> {
        let head = self
            .client
            .head_object()
            .bucket(location.bucket())
            .key(location.key())
            .send()
            .await
            .map_err(|e| request_error(DisplayErrorContext(e).to_string(), location))?;
        Ok(head.content_length().unwrap_or_default().max(0) as u64)
    }

    async fn put_multipart(
        &self,
        location: &ObjectLocation,
        upload_id: &str,
        first: Vec<u8>,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<u64> {
        let mut parts = Vec::new();
        let mut written = 0;
        let mut part = first;
        while !part.is_empty() {
            let number = i32::try_from(parts.len() + 1)
                .map_err(|_| ObjectStoreError::Remote(format!("too many parts for {location}")))?;
            written += part.len() as u64;
            let uploaded = self
                .client
                .upload_part()
                .bucket(location.bucket())
                .key(location.key())
                .upload_id(upload_id)
                .part_number(number)
                .body(ByteStream::from(part))
                .send()
                .await
                .map_err(|e| request_error(DisplayErrorContext(e).to_string(), location))?;
            parts.push(
                CompletedPart::builder()
                    .part_number(number)
                    .set_e_tag(uploaded.e_tag().map(str::to_owned))
                    .build(),
            );
            part = read_part(reader).await?;
        }
        self.client
            .complete_multipart_upload()
            .bucket(location.bucket())
            .key(location.key())
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| request_error(DisplayErrorContext(e).to_string(), location))?;
        Ok(written)
    }
}

/// Reads up to [`PART_SIZE`] bytes. Shorter parts only happen at the end of
/// the stream.
async fn read_part(reader: &mut (dyn AsyncRead + Send + Unpin)) -> Result<Vec<u8>> {
    let mut part = Vec::with_capacity(PART_SIZE);
    (&mut *reader)
        .take(PART_SIZE as u64)
        .read_to_end(&mut part)
        .await?;
    Ok(part)
}

/// HTTP `Range` value for a half-open byte range. S3 ranges are inclusive, so
/// an empty range has no header form.
fn range_header(range: &Range<u64>) -> Option<String> {
    (range.start < range.end).then(|| format!("bytes={}-{}", range.start, range.end - 1))
}

fn request_error(message: String, location: &ObjectLocation) -> ObjectStoreError {
    if message.contains("NoSuchKey") || message.contains("NotFound") || message.contains("404")
    {
        ObjectStoreError::NotFound(location.clone())
    } else {
        ObjectStoreError::Remote(message)
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(
        &self,
        location: &ObjectLocation,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<u64> {
        let first = read_part(reader).await?;
        if first.len() < PART_SIZE {
            let size = first.len() as u64;
            self.client
                .put_object()
                .bucket(location.bucket())
                .key(location.key())
                .body(ByteStream::from(first))
                .send()
                .await
                .map_err(|e| request_error(DisplayErrorContext(e).to_string(), location))?;
            return Ok(size);
        }

        let upload = self
            .client
            .create_multipart_upload()
            .bucket(location.bucket())
            .key(location.key())
            .send()
            .await
            .map_err(|e| request_error(DisplayErrorContext(e).to_string(), location))?;
        let upload_id = upload
            .upload_id()
            .ok_or_else(|| ObjectStoreError::Remote(format!("no upload id for {location}")))?
            .to_owned();
        match self.put_multipart(location, &upload_id, first, reader).await {
            Ok(written) => Ok(written),
            Err(e) => {
                if let Err(abort) = self
                    .client
                    .abort_multipart_upload()
                    .bucket(location.bucket())
                    .key(location.key())
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    warn!(%location, error = %DisplayErrorContext(abort), "couldn't abort upload");
                }
                Err(e)
            }
        }
    }

    async fn get(
        &self,
        location: &ObjectLocation,
        range: Option<Range<u64>>,
    ) -> Result<ObjectReader> {
        let mut request = self
            .client
            .get_object()
            .bucket(location.bucket())
            .key(location.key());
        if let Some(range) = range {
            // S3 clamps ranges running past the end, so check against the size first
            let size = self.size(location).await?;
            super::check_range(location, &range, size)?;
            match range_header(&range) {
                Some(header) => request = request.range(header),
                None => return Ok(Box::new(tokio::io::empty())),
            }
        }
        let object = request
            .send()
            .await
            .map_err(|e| request_error(DisplayErrorContext(e).to_string(), location))?;
        Ok(Box::new(object.body.into_async_read()))
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let mut objects = Vec::new();
        let mut continuation_token: Option<String> = None;
        loop {
            let page = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .prefix(prefix)
                .set_continuation_token(continuation_token.take())
                .send()
                .await
                .map_err(|e| ObjectStoreError::Remote(DisplayErrorContext(e).to_string()))?;
            for object in page.contents() {
                let Some(key) = object.key() else { continue };
                match ObjectLocation::new(bucket, key) {
                    Ok(location) => objects.push(ObjectMeta {
                        location,
                        size: object.size().unwrap_or_default().max(0) as u64,
                    }),
                    Err(e) => debug!(bucket, key, %e, "skipping unaddressable key"),
                }
            }
            match page.next_continuation_token() {
                Some(token) if page.is_truncated().unwrap_or_default() => {
                    continuation_token = Some(token.to_owned());
                }
                _ => break,
            }
        }
        objects.sort_by(|a, b| a.location.cmp(&b.location));
        Ok(objects)
    }

    async fn delete_batch(&self, locations: &[ObjectLocation]) -> Result<()> {
        let mut by_bucket: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for location in locations {
            by_bucket
                .entry(location.bucket())
                .or_default()
                .push(location.key());
        }
        for (bucket, keys) in by_bucket {
            for chunk in keys.chunks(DELETE_CHUNK) {
                let objects = chunk
                    .iter()
                    .map(|key| ObjectIdentifier::builder().key(*key).build())
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(|e| ObjectStoreError::Remote(e.to_string()))?;
                let delete = Delete::builder()
                    .set_objects(Some(objects))
                    .quiet(true)
                    .build()
                    .map_err(|e| ObjectStoreError::Remote(e.to_string()))?;
                let output = self
                    .client
                    .delete_objects()
                    .bucket(bucket)
                    .delete(delete)
                    .send()
                    .await
                    .map_err(|e| ObjectStoreError::Remote(DisplayErrorContext(e).to_string()))?;
                // deleting a missing key succeeds, so every reported error is real
                if let Some(failed) = output.errors().first() {
                    return Err(ObjectStoreError::Remote(format!(
                        "couldn't delete {bucket}/{}: {}",
                        failed.key().unwrap_or_default(),
                        failed.message().unwrap_or_default()
                    )));
                }
            }
        }
        Ok(())
    }
}
