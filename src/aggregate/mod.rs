// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Repacks per-block containers into pieces.
//!
//! A pass lists the ingested containers once, selects a batch whose size
//! lies within the configured window, writes it out as one container while
//! computing its piece commitment, and only after the new manifests and the
//! piece are committed removes the sources.

mod repack;
mod selection;

use repack::{Repacked, repack};
use selection::{Selection, select_batch};

use crate::commp::{PieceCommitment, piece_commitment};
use crate::db::{BlockKey, IndexStore, Piece};
use crate::ingest::IngestConfig;
use crate::networks::Network;
use crate::object_store::{ObjectLocation, ObjectMeta, ObjectStore};
use anyhow::Context as _;
use human_repr::HumanCount as _;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Source objects and manifests removed per round trip.
const DELETE_CHUNK: usize = 100;

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateConfig {
    /// Bucket receiving the aggregates.
    pub bucket: String,
    /// Key prefix of the aggregates.
    pub prefix: String,
    /// Smallest total size of containers worth aggregating.
    pub min_piece_size: u64,
    /// Largest total size of containers in one aggregate.
    pub max_piece_size: u64,
    /// Padded piece size commitments are extended to. A power of two.
    pub target_piece_size: u64,
    /// Time between passes, e.g. `"10m"`.
    #[serde_as(as = "DisplayFromStr")]
    pub interval: humantime::Duration,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        const TARGET: u64 = 32 << 30;
        Self {
            bucket: "archive".into(),
            prefix: "pieces".into(),
            min_piece_size: 16 << 30,
            // fr32 padding must still fit in the target
            max_piece_size: TARGET / 128 * 127,
            target_piece_size: TARGET,
            interval: Duration::from_secs(600).into(),
        }
    }
}

impl AggregateConfig {
    fn object_key(&self, name: &str) -> String {
        match self.prefix.trim_end_matches('/') {
            "" => format!("{name}.car"),
            prefix => format!("{prefix}/{name}.car"),
        }
    }
}

pub struct Aggregator {
    network: Network,
    source: IngestConfig,
    config: AggregateConfig,
    objects: Arc<dyn ObjectStore>,
    index: IndexStore,
}

impl Aggregator {
    pub fn new(
        network: Network,
        source: IngestConfig,
        config: AggregateConfig,
        objects: Arc<dyn ObjectStore>,
        index: IndexStore,
    ) -> Self {
        Self {
            network,
            source,
            config,
            objects,
            index,
        }
    }

    /// Runs a pass every interval. Only returns on error.
    #[tracing::instrument(skip_all, fields(network = %self.network))]
    pub async fn run(&self) -> anyhow::Result<()> {
        let mut ticker = tokio::time::interval(self.config.interval.into());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.run_once().await?;
            info!("next aggregation pass in {}", self.config.interval);
        }
    }

    /// One aggregation pass. Returns the piece produced, if any.
    pub async fn run_once(&self) -> anyhow::Result<Option<Piece>> {
        let listing: Vec<ObjectMeta> = self
            .objects
            .list(&self.source.bucket, &self.source.list_prefix(self.network))
            .await
            .context("couldn't list containers")?
            .into_iter()
            .filter(|object| object.location.key().ends_with(".car"))
            .collect();
        let listing = self.referenced_sources(listing).await?;
        let available = listing.len();

        let (sources, size) = match select_batch(
            listing,
            self.config.min_piece_size,
            self.config.max_piece_size,
        ) {
            Selection::Batch { objects, size } => (objects, size),
            Selection::Wait { size, blocked_by } => {
                if let Some(object) = blocked_by
                    && object.size > self.config.max_piece_size
                {
                    warn!(
                        location = %object.location,
                        size = %object.size.human_count_bytes(),
                        max = %self.config.max_piece_size.human_count_bytes(),
                        "container is larger than the maximum piece size and blocks aggregation"
                    );
                }
                info!(
                    available,
                    size = %size.human_count_bytes(),
                    "not enough data for a piece yet"
                );
                return Ok(None);
            }
        };
        info!(
            count = sources.len(),
            size = %size.human_count_bytes(),
            "aggregating containers"
        );

        let destination = ObjectLocation::new(
            &self.config.bucket,
            self.config.object_key(&uuid::Uuid::new_v4().to_string()),
        )?;
        let piece = match self.write_piece(&sources, &destination).await {
            Ok(piece) => piece,
            Err(e) => {
                self.discard(&destination).await;
                return Err(e);
            }
        };
        info!(
            piece_cid = %piece.piece_cid,
            piece_size = piece.piece_size,
            raw_size = %piece.raw_size.human_count_bytes(),
            location = %piece.location,
            "created piece"
        );

        self.remove_sources(&sources).await?;
        Ok(Some(piece))
    }

    /// Keeps the containers some manifest still points into. Of the others,
    /// those whose block is indexed were aggregated by a pass that failed to
    /// delete them, and are removed now. The rest are uploads not indexed yet.
    async fn referenced_sources(
        &self,
        listing: Vec<ObjectMeta>,
    ) -> anyhow::Result<Vec<ObjectMeta>> {
        let locations: Vec<ObjectLocation> = listing.iter().map(|o| o.location.clone()).collect();
        let referenced = self
            .index
            .referenced_object_locations(&locations)
            .await
            .context("couldn't look up source manifests")?;
        let (sources, unreferenced): (Vec<_>, Vec<_>) = listing
            .into_iter()
            .partition(|object| referenced.contains(&object.location));

        let mut stale = vec![];
        for object in unreferenced {
            let indexed = match self.source_height(&object.location) {
                Some(height) => self
                    .index
                    .lookup_block(self.network, &BlockKey::Height(height))
                    .await?
                    .is_some(),
                None => false,
            };
            if indexed {
                stale.push(object);
            } else {
                debug!(location = %object.location, "skipping container that isn't indexed");
            }
        }
        if !stale.is_empty() {
            warn!(
                count = stale.len(),
                "removing containers left behind by an earlier pass"
            );
            self.remove_sources(&stale).await?;
        }
        Ok(sources)
    }

    fn source_height(&self, location: &ObjectLocation) -> Option<u64> {
        location
            .key()
            .strip_prefix(&self.source.list_prefix(self.network))?
            .strip_suffix(".car")?
            .parse()
            .ok()
    }

    /// Writes the aggregate and commits its manifests together with its piece.
    async fn write_piece(
        &self,
        sources: &[ObjectMeta],
        destination: &ObjectLocation,
    ) -> anyhow::Result<Piece> {
        let Repacked {
            root,
            manifests,
            raw_size,
            calc,
        } = repack(self.objects.as_ref(), sources, destination).await?;
        let PieceCommitment { cid, size } = piece_commitment(calc, self.config.target_piece_size)
            .with_context(|| format!("couldn't compute the commitment of {destination}"))?;
        let piece = Piece {
            network: self.network,
            piece_cid: cid,
            piece_size: size.0,
            location: destination.clone(),
            raw_size,
            root_cid: root,
        };
        self.index.commit_aggregate(&manifests, &piece).await?;
        Ok(piece)
    }

    /// Removes an aggregate that will never be referenced.
    async fn discard(&self, destination: &ObjectLocation) {
        match self
            .objects
            .delete_batch(std::slice::from_ref(destination))
            .await
        {
            Ok(()) => info!(location = %destination, "discarded unfinished aggregate"),
            Err(e) => warn!(location = %destination, "couldn't discard unfinished aggregate: {e}"),
        }
    }

    /// Deletes the manifests still pointing into `sources`, then the sources.
    /// Repeating this after a partial failure is harmless.
    async fn remove_sources(&self, sources: &[ObjectMeta]) -> anyhow::Result<()> {
        let locations: Vec<ObjectLocation> = sources.iter().map(|o| o.location.clone()).collect();
        for chunk in locations.chunks(DELETE_CHUNK) {
            self.index
                .delete_manifests_by_object_locations(chunk)
                .await
                .context("couldn't delete source manifests")?;
            self.objects
                .delete_batch(chunk)
                .await
                .context("couldn't delete source containers")?;
        }
        Ok(())
    }
}
