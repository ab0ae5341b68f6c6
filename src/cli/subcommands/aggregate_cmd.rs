// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::{open_index, open_object_store};
use crate::aggregate::Aggregator;
use crate::cli_shared::cli::Config;

#[derive(Debug, clap::Args)]
pub struct AggregateCommand {
    /// Run a single pass and exit
    #[arg(long)]
    once: bool,
}

impl AggregateCommand {
    pub async fn run(self, config: Config) -> anyhow::Result<()> {
        let index = open_index(&config).await?;
        let aggregator = Aggregator::new(
            config.network,
            config.ingest.clone(),
            config.aggregate.clone(),
            open_object_store(&config).await,
            index.clone(),
        );
        if self.once {
            match aggregator.run_once().await? {
                Some(piece) => println!("{} {}", piece.piece_cid, piece.location),
                None => println!("Not enough data to aggregate"),
            }
            index.close().await;
            Ok(())
        } else {
            aggregator.run().await
        }
    }
}
