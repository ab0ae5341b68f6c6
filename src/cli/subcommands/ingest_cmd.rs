// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::{open_index, open_object_store};
use crate::chain::SubstrateClient;
use crate::cli_shared::cli::Config;
use crate::ingest::Ingestor;
use std::sync::Arc;
use url::Url;

#[derive(Debug, clap::Args)]
pub struct IngestCommand {
    /// Node to follow, instead of `chain.rpc_url`
    #[arg(long)]
    rpc_url: Option<Url>,
}

impl IngestCommand {
    pub async fn run(self, config: Config) -> anyhow::Result<()> {
        let rpc_url = self.rpc_url.unwrap_or_else(|| config.chain.rpc_url.clone());
        let chain = SubstrateClient::connect(&rpc_url).await?;
        let index = open_index(&config).await?;
        let objects = open_object_store(&config).await;
        Ingestor::new(
            config.network,
            config.ingest,
            config.chain.start_height,
            Arc::new(chain),
            objects,
            index,
        )
        .run()
        .await
    }
}
