// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::{open_index, open_object_store};
use crate::api::{ApiState, serve};
use crate::cli_shared::cli::Config;
use anyhow::Context as _;
use std::net::SocketAddr;
use tokio::net::TcpListener;

#[derive(Debug, clap::Args)]
pub struct ServeCommand {
    /// Address to listen on, instead of `api.listen_address`
    #[arg(long)]
    listen: Option<SocketAddr>,
}

impl ServeCommand {
    pub async fn run(self, config: Config) -> anyhow::Result<()> {
        let address = self.listen.unwrap_or(config.api.listen_address);
        let index = open_index(&config).await?;
        let listener = TcpListener::bind(address)
            .await
            .with_context(|| format!("couldn't listen on {address}"))?;
        serve(listener, ApiState::new(index, open_object_store(&config).await)).await
    }
}
