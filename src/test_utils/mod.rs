// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT


use crate::chain::{ChainBlock, ChainClient};
use crate::db::IndexStore;
use crate::utils::cid::CidJsonExt as _;
use crate::utils::sqlite::open_memory;
use async_trait::async_trait;
use cid::Cid;
use futures::stream::{BoxStream, StreamExt as _};
use parking_lot::Mutex;
use serde_json::json;

pub async fn memory_index() -> IndexStore {
    IndexStore::new(open_memory().await.unwrap()).await.unwrap()
}

pub fn payload_cid(payload: &[u8]) -> Cid {
    Cid::from_dag_json_bytes(payload)
}

pub fn block_hash(height: u64) -> String {
    format!("0x{height:064x}")
}

/// A block shaped like `chain_getBlock` output, deliberately written with
/// unsorted keys.
pub fn mock_block(height: u64) -> serde_json::Value {
    mock_block_with_logs(height, &[])
}

/// [`mock_block`] with digest logs, which tells apart blocks of the same
/// height on different chains.
pub fn mock_block_with_logs(height: u64, logs: &[&str]) -> serde_json::Value {
    json!({
        "justifications": null,
        "block": {
            "header": {
                "parentHash": block_hash(height.wrapping_sub(1)),
                "number": format!("{height:#x}"),
                "stateRoot": format!("0x{:064x}", height.wrapping_mul(31)),
                "extrinsicsRoot": format!("0x{:064x}", height.wrapping_mul(17)),
                "digest": { "logs": logs }
            },
            "extrinsics": (0..height % 5).map(|i| format!("0x{i:04x}{height:08x}")).collect::<Vec<_>>()
        }
    })
}

/// The bytes a block is archived as.
pub fn canonical_payload(height: u64) -> Vec<u8> {
    serde_json::to_vec(&mock_block(height)).unwrap()
}

/// A chain that announces a fixed sequence of finalized heads.
pub struct MockChain {
    heads: Vec<u64>,
    logs: Vec<String>,
    fail_at: Option<u64>,
    fetched: Mutex<Vec<u64>>,
}

impl MockChain {
    pub fn new(heads: Vec<u64>) -> Self {
        Self {
            heads,
            logs: Vec::new(),
            fail_at: None,
            fetched: Mutex::default(),
        }
    }

    /// Every block carries these digest logs.
    pub fn with_logs(mut self, logs: &[&str]) -> Self {
        self.logs = logs.iter().map(|log| log.to_string()).collect();
        self
    }

    /// Fetching the block at `height` fails.
    pub fn failing_at(mut self, height: u64) -> Self {
        self.fail_at = Some(height);
        self
    }

    /// Heights fetched so far, in order.
    pub fn fetched(&self) -> Vec<u64> {
        self.fetched.lock().clone()
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn subscribe_finalized_heads(
        &self,
    ) -> anyhow::Result<BoxStream<'static, anyhow::Result<u64>>> {
        Ok(futures::stream::iter(self.heads.clone().into_iter().map(Ok)).boxed())
    }

    async fn block_by_height(&self, height: u64) -> anyhow::Result<ChainBlock> {
        self.fetched.lock().push(height);
        if self.fail_at == Some(height) {
            anyhow::bail!("node unavailable");
        }
        Ok(ChainBlock {
            hash: block_hash(height),
            block: mock_block_with_logs(
                height,
                &self.logs.iter().map(String::as_str).collect::<Vec<_>>(),
            ),
        })
    }
}
