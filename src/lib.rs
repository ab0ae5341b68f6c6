// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

#![recursion_limit = "1024"]

mod aggregate;
mod api;
mod chain;
mod cli;
mod cli_shared;
mod commp;
mod db;
mod ingest;
mod networks;
mod object_store;
#[cfg(test)]
mod test_utils;
mod utils;

pub use aggregate::{AggregateConfig, Aggregator};
pub use api::{ApiConfig, ApiState};
pub use cli::main::main as archiver_main;
pub use cli_shared::cli::Config;
pub use commp::{Calc, PieceCommitment, piece_commitment};
pub use db::IndexStore;
pub use ingest::{IngestConfig, Ingestor};
pub use networks::Network;
pub use object_store::{LocalObjectStore, ObjectLocation, ObjectStore, S3Config, S3ObjectStore};
