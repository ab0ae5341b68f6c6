// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

mod aggregate_cmd;
mod config_cmd;
mod db_cmd;
mod ingest_cmd;
mod serve_cmd;

pub(super) use self::{
    aggregate_cmd::AggregateCommand, config_cmd::ConfigCommands, db_cmd::DbCommands,
    ingest_cmd::IngestCommand, serve_cmd::ServeCommand,
};
use crate::cli_shared::cli::{CliOpts, Config, ObjectStoreConfig};
use crate::db::IndexStore;
use crate::object_store::{LocalObjectStore, ObjectStore, S3ObjectStore};
use anyhow::Context as _;
use clap::Parser;
use std::sync::Arc;

/// CLI structure generated when interacting with the archiver binary
#[derive(Parser)]
#[command(name = env!("CARGO_PKG_NAME"), bin_name = "archiver", author = env!("CARGO_PKG_AUTHORS"), version, about = env!("CARGO_PKG_DESCRIPTION"))]
pub struct Cli {
    #[command(flatten)]
    pub opts: CliOpts,
    #[command(subcommand)]
    pub cmd: Subcommand,
}

/// archiver sub-commands available.
#[derive(clap::Subcommand, Debug)]
pub enum Subcommand {
    /// Manage the block index
    #[command(subcommand)]
    Db(DbCommands),

    /// Archive finalized blocks as the chain produces them
    Ingest(IngestCommand),

    /// Repack archived blocks into pieces
    Aggregate(AggregateCommand),

    /// Serve archived blocks over HTTP
    Serve(ServeCommand),

    /// Inspect the configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

impl Subcommand {
    pub async fn run(self, config: Config) -> anyhow::Result<()> {
        match self {
            Self::Db(cmd) => cmd.run(&config).await,
            Self::Ingest(cmd) => cmd.run(config).await,
            Self::Aggregate(cmd) => cmd.run(config).await,
            Self::Serve(cmd) => cmd.run(config).await,
            Self::Config(cmd) => cmd.run(&config, &mut std::io::stdout()),
        }
    }
}

async fn open_index(config: &Config) -> anyhow::Result<IndexStore> {
    IndexStore::open(&config.database.path)
        .await
        .with_context(|| format!("couldn't open {}", config.database.path.display()))
}

async fn open_object_store(config: &Config) -> Arc<dyn ObjectStore> {
    match &config.object_store {
        ObjectStoreConfig::Local { root } => Arc::new(LocalObjectStore::new(root)),
        ObjectStoreConfig::S3(s3) => Arc::new(S3ObjectStore::new(s3).await),
    }
}
