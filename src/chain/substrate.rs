// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::{ChainBlock, ChainClient};
use anyhow::Context as _;
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt as _};
use jsonrpsee::core::client::{ClientT as _, SubscriptionClientT as _};
use jsonrpsee::rpc_params;
use jsonrpsee::ws_client::{WsClient, WsClientBuilder};
use serde::Deserialize;
use url::Url;

/// JSON-RPC client for Substrate based chains. Subscriptions need a
/// websocket, so only `ws://` and `wss://` endpoints are accepted.
pub struct SubstrateClient {
    inner: WsClient,
}

impl SubstrateClient {
    pub async fn connect(url: &Url) -> anyhow::Result<Self> {
        let inner = match url.scheme() {
            "ws" | "wss" => WsClientBuilder::new()
                .build(url.as_str())
                .await
                .with_context(|| format!("couldn't connect to {url}"))?,
            it => anyhow::bail!("Unsupported URL scheme: {it}"),
        };
        Ok(Self { inner })
    }
}

#[derive(Debug, Deserialize)]
struct Header {
    /// Hex encoded, `0x` prefixed.
    number: String,
}

fn parse_block_number(number: &str) -> anyhow::Result<u64> {
    let digits = number
        .strip_prefix("0x")
        .with_context(|| format!("block number {number:?} is not hex"))?;
    u64::from_str_radix(digits, 16).with_context(|| format!("invalid block number {number:?}"))
}

#[async_trait]
impl ChainClient for SubstrateClient {
    async fn subscribe_finalized_heads(
        &self,
    ) -> anyhow::Result<BoxStream<'static, anyhow::Result<u64>>> {
        let subscription = self
            .inner
            .subscribe::<Header, _>(
                "chain_subscribeFinalizedHeads",
                rpc_params![],
                "chain_unsubscribeFinalizedHeads",
            )
            .await
            .context("couldn't subscribe to finalized heads")?;
        Ok(subscription
            .map(|header| parse_block_number(&header?.number))
            .boxed())
    }

    async fn block_by_height(&self, height: u64) -> anyhow::Result<ChainBlock> {
        let hash: Option<String> = self
            .inner
            .request("chain_getBlockHash", rpc_params![height])
            .await
            .with_context(|| format!("chain_getBlockHash({height}) failed"))?;
        let hash = hash.with_context(|| format!("no block at height {height}"))?;
        let block: Option<serde_json::Value> = self
            .inner
            .request("chain_getBlock", rpc_params![&hash])
            .await
            .with_context(|| format!("chain_getBlock({hash}) failed"))?;
        let block = block.with_context(|| format!("block {hash} not found"))?;
        Ok(ChainBlock { hash, block })
    }
}
