// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Access to the chain being archived.

mod substrate;

pub use substrate::SubstrateClient;

use async_trait::async_trait;
use futures::stream::BoxStream;

/// A block as returned by the node, with its chain-native hash.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainBlock {
    pub hash: String,
    pub block: serde_json::Value,
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Heights of newly finalized heads, non-decreasing. The stream ending
    /// means the node went away.
    async fn subscribe_finalized_heads(
        &self,
    ) -> anyhow::Result<BoxStream<'static, anyhow::Result<u64>>>;

    /// The finalized block at `height`.
    async fn block_by_height(&self, height: u64) -> anyhow::Result<ChainBlock>;
}
