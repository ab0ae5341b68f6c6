// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::aggregate::AggregateConfig;
use crate::api::ApiConfig;
use crate::commp::padded_piece_size;
use crate::ingest::IngestConfig;
use crate::networks::Network;
use crate::object_store::S3Config;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file holding the index.
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/index.sqlite3"),
        }
    }
}

/// Where containers and pieces are stored, picked by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectStoreConfig {
    Local {
        /// Directory holding one subdirectory per bucket.
        #[serde(default = "default_objects_root")]
        root: PathBuf,
    },
    S3(S3Config),
}

fn default_objects_root() -> PathBuf {
    PathBuf::from("data/objects")
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self::Local {
            root: default_objects_root(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// JSON-RPC websocket endpoint of a node.
    pub rpc_url: Url,
    /// First height archived for a network without any recorded block.
    pub start_height: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: "ws://127.0.0.1:9944"
                .parse()
                .expect("hard-coded URL must parse"),
            start_height: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("aggregate.target_piece_size must be a power of two of at least 128 bytes, got {0}")]
    TargetPieceSize(u64),
    #[error("aggregate.min_piece_size must be positive")]
    MinPieceSizeZero,
    #[error("aggregate.min_piece_size ({min}) exceeds aggregate.max_piece_size ({max})")]
    EmptyWindow { min: u64, max: u64 },
    #[error(
        "aggregate.max_piece_size ({max}) exceeds the {unpadded} bytes a piece of {target} bytes can hold"
    )]
    MaxExceedsTarget { max: u64, target: u64, unpadded: u64 },
    #[error("{0}.bucket must not be empty")]
    EmptyBucket(&'static str),
    #[error("aggregates written to {bucket}/{prefix} would be aggregated again")]
    DestinationInsideSource { bucket: String, prefix: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub network: Network,
    pub database: DatabaseConfig,
    pub object_store: ObjectStoreConfig,
    pub chain: ChainConfig,
    pub ingest: IngestConfig,
    pub aggregate: AggregateConfig,
    pub api: ApiConfig,
}

impl Config {
    /// Rejects settings no component could run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let aggregate = &self.aggregate;
        let target = padded_piece_size(aggregate.target_piece_size)
            .map_err(|_| ConfigError::TargetPieceSize(aggregate.target_piece_size))?;
        if aggregate.min_piece_size == 0 {
            return Err(ConfigError::MinPieceSizeZero);
        }
        if aggregate.min_piece_size > aggregate.max_piece_size {
            return Err(ConfigError::EmptyWindow {
                min: aggregate.min_piece_size,
                max: aggregate.max_piece_size,
            });
        }
        if aggregate.max_piece_size > target.unpadded().0 {
            return Err(ConfigError::MaxExceedsTarget {
                max: aggregate.max_piece_size,
                target: target.0,
                unpadded: target.unpadded().0,
            });
        }
        if self.ingest.bucket.is_empty() {
            return Err(ConfigError::EmptyBucket("ingest"));
        }
        if aggregate.bucket.is_empty() {
            return Err(ConfigError::EmptyBucket("aggregate"));
        }
        // the aggregator only lists `.car` keys under the ingestion prefix
        let destination = format!("{}/", aggregate.prefix.trim_end_matches('/'));
        if aggregate.bucket == self.ingest.bucket
            && destination.starts_with(&self.ingest.root_prefix())
        {
            return Err(ConfigError::DestinationInsideSource {
                bucket: aggregate.bucket.clone(),
                prefix: aggregate.prefix.clone(),
            });
        }
        Ok(())
    }
}
