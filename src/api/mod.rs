// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Read-only HTTP access to archived blocks.
//!
//! `GET /{network}/{height|hash}/{value}` answers with the exact payload bytes
//! of the block, streamed from wherever the index says they currently live.

mod error;

pub use error::ApiError;

use crate::db::{BlockKey, IndexStore};
use crate::networks::Network;
use crate::object_store::ObjectStore;
use anyhow::Context as _;
use axum::Router;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderValue, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::io::ReaderStream;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub listen_address: SocketAddr,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_address: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

#[derive(Clone)]
pub struct ApiState {
    index: IndexStore,
    objects: Arc<dyn ObjectStore>,
}

impl ApiState {
    pub fn new(index: IndexStore, objects: Arc<dyn ObjectStore>) -> Self {
        Self { index, objects }
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/{network}/{field}/{value}", get(get_block))
        .with_state(state)
}

/// Serves the API until the listener fails.
pub async fn serve(listener: TcpListener, state: ApiState) -> anyhow::Result<()> {
    info!("serving blocks on {}", listener.local_addr()?);
    axum::serve(listener, router(state).into_make_service())
        .await
        .context("API server failed")
}

fn block_key(field: &str, value: String) -> Result<BlockKey, ApiError> {
    match field {
        "height" => value
            .parse()
            .map(BlockKey::Height)
            .map_err(|_| ApiError::not_found(format!("invalid height: {value}"))),
        "hash" => Ok(BlockKey::Hash(value)),
        _ => Err(ApiError::not_found("invalid field")),
    }
}

async fn get_block(
    State(state): State<ApiState>,
    Path((network, field, value)): Path<(String, String, String)>,
) -> Result<Response, ApiError> {
    let network: Network = network
        .parse()
        .map_err(|e: crate::networks::UnknownNetwork| ApiError::not_found(e.to_string()))?;
    let key = block_key(&field, value)?;

    let block = state
        .index
        .lookup_block(network, &key)
        .await?
        .ok_or_else(|| ApiError::not_found("block not found"))?;
    // an indexed block without a manifest means the index is inconsistent
    let manifest = state
        .index
        .lookup_manifest(&block.cid)
        .await?
        .with_context(|| format!("no manifest for {}", block.cid))?;
    let reader = state
        .objects
        .get(&manifest.location, Some(manifest.range()))
        .await
        .with_context(|| format!("couldn't read {} from {}", block.cid, manifest.location))?;

    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            ),
            (header::CONTENT_LENGTH, HeaderValue::from(manifest.length)),
        ],
        Body::from_stream(ReaderStream::new(reader)),
    )
        .into_response())
}
