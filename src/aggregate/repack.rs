// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Concatenates containers into one, in a single pass.
//!
//! One producer re-encodes the source records and hands every chunk to two
//! consumers over bounded channels: the uploader and the commitment
//! calculator. A slow consumer holds the producer back, so memory use is
//! bounded by the channel depth whatever the size of the aggregate. A failure
//! on either side ends the other: consumers stop reading when the producer
//! reports an error, and the producer stops as soon as a consumer hangs up.

use crate::commp::Calc;
use crate::db::Manifest;
use crate::object_store::{ObjectLocation, ObjectMeta, ObjectStore};
use crate::utils::db::car_stream::{CarStream, CarV1Header};
use anyhow::Context as _;
use bytes::Bytes;
use cid::Cid;
use futures::TryStreamExt as _;
use std::io;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::io::StreamReader;

/// Chunks buffered per consumer.
const PIPE_DEPTH: usize = 32;

#[derive(Debug, thiserror::Error)]
#[error("aggregate consumer stopped")]
struct ConsumerGone;

/// Everything learned while writing an aggregate.
#[derive(Debug)]
pub struct Repacked {
    /// Root of the first source container.
    pub root: Cid,
    /// One manifest per record, addressing the aggregate.
    pub manifests: Vec<Manifest>,
    /// Bytes written.
    pub raw_size: u64,
    pub calc: Calc,
}

/// Writes the records of `sources`, in order, into a new container at
/// `destination` while feeding the same bytes into a commitment calculator.
pub async fn repack(
    objects: &dyn ObjectStore,
    sources: &[ObjectMeta],
    destination: &ObjectLocation,
) -> anyhow::Result<Repacked> {
    let (upload_tx, upload_rx) = mpsc::channel::<io::Result<Bytes>>(PIPE_DEPTH);
    let (hash_tx, mut hash_rx) = mpsc::channel::<Bytes>(PIPE_DEPTH);

    let producer = async move {
        let result = produce(objects, sources, destination, &upload_tx, &hash_tx).await;
        if let Err(e) = &result {
            // make sure the upload fails instead of seeing a clean end of stream
            let _ = upload_tx
                .send(Err(io::Error::other(format!("{e:#}"))))
                .await;
        }
        result
    };

    let uploader = async move {
        let mut reader = StreamReader::new(ReceiverStream::new(upload_rx));
        objects
            .put(destination, &mut reader)
            .await
            .with_context(|| format!("couldn't upload {destination}"))
    };

    let hasher = tokio::task::spawn_blocking(move || {
        let mut calc = Calc::new();
        while let Some(chunk) = hash_rx.blocking_recv() {
            calc.write(&chunk)?;
        }
        anyhow::Ok(calc)
    });

    let (produced, uploaded, hashed) = tokio::join!(producer, uploader, hasher);
    // A consumer that fails first makes the producer fail with `ConsumerGone`,
    // so report the consumer's own error instead.
    let calc = hashed.context("commitment task panicked")??;
    let produced = match produced {
        Err(e) if !e.is::<ConsumerGone>() => return Err(e),
        other => other,
    };
    let uploaded = uploaded?;
    let (root, manifests, raw_size) = produced?;
    anyhow::ensure!(
        uploaded == raw_size,
        "uploaded {uploaded} bytes to {destination} but wrote {raw_size}"
    );
    Ok(Repacked {
        root,
        manifests,
        raw_size,
        calc,
    })
}

async fn produce(
    objects: &dyn ObjectStore,
    sources: &[ObjectMeta],
    destination: &ObjectLocation,
    upload_tx: &mpsc::Sender<io::Result<Bytes>>,
    hash_tx: &mpsc::Sender<Bytes>,
) -> anyhow::Result<(Cid, Vec<Manifest>, u64)> {
    let emit = async |chunk: Vec<u8>| -> anyhow::Result<()> {
        let chunk = Bytes::from(chunk);
        upload_tx
            .send(Ok(chunk.clone()))
            .await
            .map_err(|_| ConsumerGone)?;
        hash_tx.send(chunk).await.map_err(|_| ConsumerGone)?;
        Ok(())
    };

    let mut root = None;
    let mut manifests = vec![];
    let mut offset = 0u64;
    for source in sources {
        let reader = objects.get(&source.location, None).await?;
        let mut records = CarStream::new(reader)
            .await
            .with_context(|| format!("couldn't read the header of {}", source.location))?;

        if root.is_none() {
            let first_root = *records.header.roots.first();
            let header = CarV1Header::new(nunny::vec![first_root]).encode()?;
            offset += header.len() as u64;
            emit(header).await?;
            root = Some(first_root);
        }

        while let Some(block) = records
            .try_next()
            .await
            .with_context(|| format!("malformed container {}", source.location))?
        {
            let (frame, payload_offset) = block.encode()?;
            manifests.push(Manifest {
                cid: block.cid,
                location: destination.clone(),
                offset: offset + payload_offset as u64,
                length: block.data.len() as u64,
            });
            offset += frame.len() as u64;
            emit(frame).await?;
        }
    }
    let root = root.context("nothing to aggregate")?;
    Ok((root, manifests, offset))
}
