// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Follows finalized heads and archives every block as a one-record
//! container.
//!
//! Heights are processed one at a time and in order: the cursor is always
//! derived from the index, so a crashed run resumes exactly after the last
//! block that was recorded.

use crate::chain::{ChainBlock, ChainClient};
use crate::db::{BlockRecord, IndexStore, Manifest};
use crate::networks::Network;
use crate::object_store::{ObjectLocation, ObjectStore};
use crate::utils::cid::CidJsonExt as _;
use crate::utils::db::car_stream::{CarBlock, encode_car};
use anyhow::Context as _;
use cid::Cid;
use futures::StreamExt as _;
use human_repr::HumanCount as _;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Bucket receiving the per-block containers.
    pub bucket: String,
    /// Key prefix of the per-block containers, without a trailing `/`.
    pub prefix: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            bucket: "archive".into(),
            prefix: "blocks".into(),
        }
    }
}

impl IngestConfig {
    /// The key a block's container is stored under. Networks share the bucket,
    /// so every network gets its own directory below the prefix.
    pub fn object_key(&self, network: Network, height: u64) -> String {
        format!("{}{network}/{height}.car", self.root_prefix())
    }

    /// Listing prefix matching exactly the containers of `network` written by
    /// [`IngestConfig::object_key`].
    pub fn list_prefix(&self, network: Network) -> String {
        format!("{}{network}/", self.root_prefix())
    }

    /// Listing prefix covering the containers of every network.
    pub fn root_prefix(&self) -> String {
        match self.prefix.trim_end_matches('/') {
            "" => String::new(),
            prefix => format!("{prefix}/"),
        }
    }
}

pub struct Ingestor {
    network: Network,
    config: IngestConfig,
    /// Cursor for a network without any recorded block.
    start_height: u64,
    chain: Arc<dyn ChainClient>,
    objects: Arc<dyn ObjectStore>,
    index: IndexStore,
}

impl Ingestor {
    pub fn new(
        network: Network,
        config: IngestConfig,
        start_height: u64,
        chain: Arc<dyn ChainClient>,
        objects: Arc<dyn ObjectStore>,
        index: IndexStore,
    ) -> Self {
        Self {
            network,
            config,
            start_height,
            chain,
            objects,
            index,
        }
    }

    /// The next height to archive.
    pub async fn resume_height(&self) -> anyhow::Result<u64> {
        Ok(match self.index.latest_height(self.network).await? {
            Some(latest) => latest + 1,
            None => self.start_height,
        })
    }

    /// Archives blocks as heads are finalized. Only returns on error, which
    /// includes the head subscription ending.
    #[tracing::instrument(skip_all, fields(network = %self.network))]
    pub async fn run(&self) -> anyhow::Result<()> {
        let mut cursor = self.resume_height().await?;
        info!(cursor, "resuming ingestion");
        let mut heads = self.chain.subscribe_finalized_heads().await?;
        while let Some(head) = heads.next().await {
            let head = head.context("finalized head subscription failed")?;
            debug!(head, cursor, "finalized head");
            cursor = self.catch_up(cursor, head).await?;
        }
        anyhow::bail!("finalized head subscription closed")
    }

    /// Archives every height from `cursor` up to and including `head`, and
    /// returns the new cursor.
    pub async fn catch_up(&self, cursor: u64, head: u64) -> anyhow::Result<u64> {
        if cursor > head {
            return Ok(cursor);
        }
        // the cursor after `u64::MAX` doesn't exist, so refuse before archiving it
        let next = head
            .checked_add(1)
            .with_context(|| format!("height {head} leaves no next height to resume from"))?;
        for height in cursor..=head {
            self.process_height(height).await?;
        }
        Ok(next)
    }

    /// Fetches, encodes, uploads and indexes one block.
    pub async fn process_height(&self, height: u64) -> anyhow::Result<BlockRecord> {
        let ChainBlock { hash, block } = self.chain.block_by_height(height).await?;
        let (cid, payload) = Cid::from_json_sha256(&block)
            .with_context(|| format!("couldn't serialize block {height}"))?;

        let (container, positions) =
            encode_car(nunny::vec![cid], &[CarBlock { cid, data: payload }])?;
        let position = positions
            .into_iter()
            .next()
            .context("container without a record")?;

        let location = ObjectLocation::new(
            &self.config.bucket,
            self.config.object_key(self.network, height),
        )?;
        let size = self
            .objects
            .put(&location, &mut container.as_slice())
            .await
            .with_context(|| format!("couldn't upload {location}"))?;

        let record = BlockRecord {
            network: self.network,
            height,
            hash,
            cid,
        };
        let manifest = Manifest {
            cid,
            location,
            offset: position.offset,
            length: position.length,
        };
        self.index
            .insert_block_and_manifest(&record, &manifest)
            .await
            .with_context(|| format!("couldn't index block {height}"))?;

        info!(
            height,
            %cid,
            location = %manifest.location,
            size = %size.human_count_bytes(),
            "archived block"
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::BlockKey;
    use crate::object_store::MemoryObjectStore;
    use crate::test_utils::{
        MockChain, block_hash, canonical_payload, memory_index, mock_block_with_logs,
    };
    use crate::utils::cid::CidJsonExt as _;
    use crate::utils::db::car_stream::CarStream;
    use futures::TryStreamExt as _;
    use pretty_assertions::assert_eq;
    use tokio::io::AsyncReadExt as _;

    const NET: Network = Network::AvailGoldbergTestnet;

    fn ingestor(
        chain: Arc<MockChain>,
        objects: Arc<MemoryObjectStore>,
        index: IndexStore,
        start_height: u64,
    ) -> Ingestor {
        Ingestor::new(
            NET,
            IngestConfig::default(),
            start_height,
            chain,
            objects,
            index,
        )
    }

    async fn heights(index: &IndexStore, range: std::ops::RangeInclusive<u64>) -> Vec<u64> {
        let mut found = vec![];
        for height in range {
            if let Some(block) = index.lookup_block(NET, &BlockKey::Height(height)).await.unwrap() {
                found.push(block.height);
            }
        }
        found
    }

    #[test]
    fn object_keys() {
        let mut config = IngestConfig::default();
        assert_eq!(config.object_key(NET, 7), "blocks/avail-goldberg-testnet/7.car");
        assert_eq!(config.list_prefix(NET), "blocks/avail-goldberg-testnet/");
        assert_eq!(config.root_prefix(), "blocks/");
        config.prefix = "a/b/".into();
        assert_eq!(
            config.object_key(Network::AvailMainnet, 7),
            "a/b/avail-mainnet/7.car"
        );
        config.prefix = String::new();
        assert_eq!(config.object_key(NET, 7), "avail-goldberg-testnet/7.car");
        assert_eq!(config.list_prefix(NET), "avail-goldberg-testnet/");
        assert_eq!(config.root_prefix(), "");
    }

    #[tokio::test]
    async fn networks_keep_separate_containers() {
        let index = memory_index().await;
        let objects = Arc::new(MemoryObjectStore::new());
        let other = Network::AvailTuringTestnet;
        let goldberg = ingestor(Arc::new(MockChain::new(vec![])), objects.clone(), index.clone(), 0);
        let turing = Ingestor::new(
            other,
            IngestConfig::default(),
            0,
            Arc::new(MockChain::new(vec![]).with_logs(&["0x74757269"])),
            objects.clone(),
            index.clone(),
        );

        // the same height on both chains, written into one bucket
        goldberg.process_height(5).await.unwrap();
        turing.process_height(5).await.unwrap();
        assert_eq!(objects.len(), 2);

        let turing_payload = serde_json::to_vec(&mock_block_with_logs(5, &["0x74757269"])).unwrap();
        for (network, expected) in [(NET, canonical_payload(5)), (other, turing_payload)] {
            let block = index
                .lookup_block(network, &BlockKey::Height(5))
                .await
                .unwrap()
                .unwrap();
            let manifest = index.lookup_manifest(&block.cid).await.unwrap().unwrap();
            assert_eq!(manifest.location.key(), format!("blocks/{network}/5.car"));
            let mut payload = vec![];
            objects
                .get(&manifest.location, Some(manifest.range()))
                .await
                .unwrap()
                .read_to_end(&mut payload)
                .await
                .unwrap();
            assert_eq!(payload, expected, "{network}");
        }
    }

    #[tokio::test]
    async fn cursor_cannot_pass_the_last_height() {
        let index = memory_index().await;
        let objects = Arc::new(MemoryObjectStore::new());
        let chain = Arc::new(MockChain::new(vec![]));
        let ingestor = ingestor(chain.clone(), objects.clone(), index.clone(), 0);

        let err = ingestor.catch_up(u64::MAX, u64::MAX).await.unwrap_err();
        assert!(err.to_string().contains("no next height"));
        assert!(chain.fetched().is_empty());
        assert_eq!(objects.len(), 0);

        // heads behind the cursor leave it alone
        assert_eq!(ingestor.catch_up(u64::MAX, 3).await.unwrap(), u64::MAX);
    }

    #[tokio::test]
    async fn archived_block_is_addressable() {
        let chain = Arc::new(MockChain::new(vec![]));
        let objects = Arc::new(MemoryObjectStore::new());
        let index = memory_index().await;
        let ingestor = ingestor(chain, objects.clone(), index.clone(), 0);

        let record = ingestor.process_height(12).await.unwrap();
        assert_eq!(record.hash, block_hash(12));
        assert_eq!(record.cid, Cid::from_dag_json_bytes(&canonical_payload(12)));

        let manifest = index.lookup_manifest(&record.cid).await.unwrap().unwrap();
        assert_eq!(
            manifest.location.to_string(),
            "archive/blocks/avail-goldberg-testnet/12.car"
        );
        let mut reader = objects
            .get(&manifest.location, Some(manifest.range()))
            .await
            .unwrap();
        let mut payload = vec![];
        reader.read_to_end(&mut payload).await.unwrap();
        assert_eq!(payload, canonical_payload(12));

        // the object is a well formed container rooted at the block
        let object = objects.object(&manifest.location).unwrap();
        let stream = CarStream::new(&object[..]).await.unwrap();
        assert_eq!(stream.header.roots.first(), &record.cid);
        let blocks: Vec<CarBlock> = stream.try_collect().await.unwrap();
        assert_eq!(blocks.len(), 1);
    }

    #[tokio::test]
    async fn follows_heads_without_gaps() {
        // heads may repeat, lag behind the cursor or jump ahead
        let chain = Arc::new(MockChain::new(vec![2, 2, 1, 5, 9]));
        let objects = Arc::new(MemoryObjectStore::new());
        let index = memory_index().await;
        let ingestor = ingestor(chain.clone(), objects.clone(), index.clone(), 0);

        let err = ingestor.run().await.unwrap_err();
        assert!(err.to_string().contains("subscription closed"));
        assert_eq!(chain.fetched(), (0..=9).collect::<Vec<_>>());
        assert_eq!(heights(&index, 0..=20).await, (0..=9).collect::<Vec<_>>());
        assert_eq!(index.latest_height(NET).await.unwrap(), Some(9));
        assert_eq!(objects.len(), 10);
    }

    #[tokio::test]
    async fn resumes_after_the_last_recorded_block() {
        let index = memory_index().await;
        let objects = Arc::new(MemoryObjectStore::new());

        let first = ingestor(Arc::new(MockChain::new(vec![])), objects.clone(), index.clone(), 100);
        assert_eq!(first.resume_height().await.unwrap(), 100);
        first.catch_up(100, 102).await.unwrap();

        let chain = Arc::new(MockChain::new(vec![104]));
        let second = ingestor(chain.clone(), objects, index.clone(), 100);
        assert_eq!(second.resume_height().await.unwrap(), 103);
        second.run().await.unwrap_err();
        assert_eq!(chain.fetched(), [103, 104]);
        assert_eq!(heights(&index, 0..=200).await, [100, 101, 102, 103, 104]);
    }

    #[tokio::test]
    async fn chain_failure_stops_at_the_failing_height() {
        let index = memory_index().await;
        let objects = Arc::new(MemoryObjectStore::new());
        let chain = Arc::new(MockChain::new(vec![6]).failing_at(4));
        let ingestor = ingestor(chain.clone(), objects, index.clone(), 0);

        let err = ingestor.run().await.unwrap_err();
        assert!(format!("{err:#}").contains("node unavailable"));
        assert_eq!(chain.fetched(), [0, 1, 2, 3, 4]);
        assert_eq!(index.latest_height(NET).await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn upload_failure_indexes_nothing() {
        let index = memory_index().await;
        let objects = Arc::new(MemoryObjectStore::new());
        objects.fail_puts(true);
        let ingestor = ingestor(Arc::new(MockChain::new(vec![])), objects.clone(), index.clone(), 0);

        assert!(ingestor.process_height(0).await.is_err());
        assert_eq!(index.latest_height(NET).await.unwrap(), None);

        objects.fail_puts(false);
        ingestor.process_height(0).await.unwrap();
        assert_eq!(index.latest_height(NET).await.unwrap(), Some(0));
    }
}
