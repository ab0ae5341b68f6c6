// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::open_index;
use crate::cli_shared::cli::Config;
use clap::Subcommand;
use human_repr::HumanCount as _;

#[derive(Debug, Subcommand)]
pub enum DbCommands {
    /// Create the index schema, or upgrade it in place
    Init,
    /// List the pieces produced for the configured network
    Pieces,
}

impl DbCommands {
    pub async fn run(self, config: &Config) -> anyhow::Result<()> {
        let index = open_index(config).await?;
        match self {
            Self::Init => {
                println!("Index ready at {}", config.database.path.display());
            }
            Self::Pieces => {
                for piece in index.list_pieces(config.network).await? {
                    println!(
                        "{} {} {} ({} stored, root {})",
                        piece.piece_cid,
                        piece.piece_size,
                        piece.location,
                        piece.raw_size.human_count_bytes(),
                        piece.root_cid
                    );
                }
            }
        }
        index.close().await;
        Ok(())
    }
}
