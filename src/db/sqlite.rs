// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::{BlockKey, BlockRecord, Manifest, Piece};
use crate::commp::cid_to_data_commitment_v1;
use crate::networks::Network;
use crate::object_store::ObjectLocation;
use crate::utils::sqlite::{SqliteQuery, init_db, open_file};
use anyhow::Context as _;
use cid::Cid;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::collections::HashSet;
use std::path::Path;

const SCHEMA_VERSION: u32 = 1;

/// Rows per multi-row statement. Keeps the bind count well below SQLite's limit.
const BATCH_SIZE: usize = 100;

fn ddls() -> [SqliteQuery<'static>; 6] {
    [
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS blocks (
                network INTEGER NOT NULL,
                height INTEGER NOT NULL,
                hash TEXT NOT NULL,
                cid TEXT NOT NULL,
                PRIMARY KEY (network, height),
                UNIQUE (network, hash)
            )",
        ),
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS manifests (
                cid TEXT PRIMARY KEY,
                object_location TEXT NOT NULL,
                payload_offset INTEGER NOT NULL,
                payload_length INTEGER NOT NULL
            )",
        ),
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS manifests_object_location ON manifests (object_location)",
        ),
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS pieces (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                network INTEGER NOT NULL,
                piece_cid TEXT NOT NULL,
                piece_size INTEGER NOT NULL,
                object_location TEXT NOT NULL,
                raw_size INTEGER NOT NULL,
                root_cid TEXT NOT NULL
            )",
        ),
        sqlx::query("CREATE INDEX IF NOT EXISTS pieces_network ON pieces (network)"),
        sqlx::query("CREATE INDEX IF NOT EXISTS blocks_cid ON blocks (cid)"),
    ]
}

#[derive(sqlx::FromRow)]
struct BlockRow {
    network: i64,
    height: i64,
    hash: String,
    cid: String,
}

impl TryFrom<BlockRow> for BlockRecord {
    type Error = anyhow::Error;

    fn try_from(row: BlockRow) -> anyhow::Result<Self> {
        Ok(BlockRecord {
            network: Network::from_code(row.network)?,
            height: u64::try_from(row.height)?,
            hash: row.hash,
            cid: row.cid.parse()?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ManifestRow {
    cid: String,
    object_location: String,
    payload_offset: i64,
    payload_length: i64,
}

impl TryFrom<ManifestRow> for Manifest {
    type Error = anyhow::Error;

    fn try_from(row: ManifestRow) -> anyhow::Result<Self> {
        Ok(Manifest {
            cid: row.cid.parse()?,
            location: row.object_location.parse()?,
            offset: u64::try_from(row.payload_offset)?,
            length: u64::try_from(row.payload_length)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PieceRow {
    network: i64,
    piece_cid: String,
    piece_size: i64,
    object_location: String,
    raw_size: i64,
    root_cid: String,
}

impl TryFrom<PieceRow> for Piece {
    type Error = anyhow::Error;

    fn try_from(row: PieceRow) -> anyhow::Result<Self> {
        let piece_cid: Cid = row.piece_cid.parse()?;
        cid_to_data_commitment_v1(&piece_cid).map_err(anyhow::Error::msg)?;
        Ok(Piece {
            network: Network::from_code(row.network)?,
            piece_cid,
            piece_size: u64::try_from(row.piece_size)?,
            location: row.object_location.parse()?,
            raw_size: u64::try_from(row.raw_size)?,
            root_cid: row.root_cid.parse()?,
        })
    }
}

fn to_sql_int(value: u64) -> anyhow::Result<i64> {
    i64::try_from(value).with_context(|| format!("{value} does not fit in an SQLite integer"))
}

/// SQLite-backed index of blocks, manifests and pieces.
///
/// Every write that must be observed atomically runs in a single transaction.
#[derive(Debug, Clone)]
pub struct IndexStore {
    pool: SqlitePool,
}

impl IndexStore {
    /// Opens (creating if needed) the database file and brings its schema up to date.
    pub async fn open(path: &Path) -> anyhow::Result<Self> {
        Self::new(open_file(path).await?).await
    }

    pub async fn new(pool: SqlitePool) -> anyhow::Result<Self> {
        init_db(&pool, "index", ddls(), SCHEMA_VERSION).await?;
        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await
    }

    /// Highest block height recorded for `network`.
    pub async fn latest_height(&self, network: Network) -> anyhow::Result<Option<u64>> {
        let height: Option<i64> = sqlx::query_scalar("SELECT max(height) FROM blocks WHERE network = ?")
            .bind(network.code())
            .fetch_one(&self.pool)
            .await?;
        height.map(u64::try_from).transpose().map_err(Into::into)
    }

    /// Records a block together with the manifest of its record.
    pub async fn insert_block_and_manifest(
        &self,
        block: &BlockRecord,
        manifest: &Manifest,
    ) -> anyhow::Result<()> {
        anyhow::ensure!(
            block.cid == manifest.cid,
            "block {} is recorded as {} but the manifest is for {}",
            block.height,
            block.cid,
            manifest.cid
        );
        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO blocks (network, height, hash, cid) VALUES (?, ?, ?, ?)")
            .bind(block.network.code())
            .bind(to_sql_int(block.height)?)
            .bind(&block.hash)
            .bind(block.cid.to_string())
            .execute(tx.as_mut())
            .await
            .with_context(|| format!("couldn't insert block {}", block.height))?;
        upsert_manifests(tx.as_mut(), std::slice::from_ref(manifest)).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Inserts manifests, replacing existing ones for the same identifiers.
    pub async fn insert_manifests_batch(&self, manifests: &[Manifest]) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        upsert_manifests(tx.as_mut(), manifests).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn insert_piece(&self, piece: &Piece) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        insert_piece(tx.as_mut(), piece).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Points `manifests` at a new aggregate and records its piece, in one
    /// transaction.
    pub async fn commit_aggregate(
        &self,
        manifests: &[Manifest],
        piece: &Piece,
    ) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        upsert_manifests(tx.as_mut(), manifests).await?;
        insert_piece(tx.as_mut(), piece).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Deletes every manifest pointing into one of `locations`. Returns the
    /// number of rows removed.
    pub async fn delete_manifests_by_object_locations(
        &self,
        locations: &[ObjectLocation],
    ) -> anyhow::Result<u64> {
        let mut deleted = 0;
        for chunk in locations.chunks(BATCH_SIZE) {
            let mut query = QueryBuilder::<Sqlite>::new(
                "DELETE FROM manifests WHERE object_location IN (",
            );
            let mut values = query.separated(", ");
            for location in chunk {
                values.push_bind(location.to_string());
            }
            values.push_unseparated(")");
            deleted += query.build().execute(&self.pool).await?.rows_affected();
        }
        Ok(deleted)
    }

    /// The subset of `locations` at least one manifest points into.
    pub async fn referenced_object_locations(
        &self,
        locations: &[ObjectLocation],
    ) -> anyhow::Result<HashSet<ObjectLocation>> {
        let mut referenced = HashSet::new();
        for chunk in locations.chunks(BATCH_SIZE) {
            let mut query = QueryBuilder::<Sqlite>::new(
                "SELECT DISTINCT object_location FROM manifests WHERE object_location IN (",
            );
            let mut values = query.separated(", ");
            for location in chunk {
                values.push_bind(location.to_string());
            }
            values.push_unseparated(")");
            for location in query
                .build_query_scalar::<String>()
                .fetch_all(&self.pool)
                .await?
            {
                referenced.insert(location.parse()?);
            }
        }
        Ok(referenced)
    }

    pub async fn lookup_block(
        &self,
        network: Network,
        key: &BlockKey,
    ) -> anyhow::Result<Option<BlockRecord>> {
        let query = match key {
            BlockKey::Height(height) => sqlx::query_as::<_, BlockRow>(
                "SELECT network, height, hash, cid FROM blocks WHERE network = ? AND height = ?",
            )
            .bind(network.code())
            .bind(to_sql_int(*height)?),
            BlockKey::Hash(hash) => sqlx::query_as::<_, BlockRow>(
                "SELECT network, height, hash, cid FROM blocks WHERE network = ? AND hash = ?",
            )
            .bind(network.code())
            .bind(hash.clone()),
        };
        query
            .fetch_optional(&self.pool)
            .await?
            .map(BlockRecord::try_from)
            .transpose()
    }

    pub async fn lookup_manifest(&self, cid: &Cid) -> anyhow::Result<Option<Manifest>> {
        sqlx::query_as::<_, ManifestRow>(
            "SELECT cid, object_location, payload_offset, payload_length FROM manifests WHERE cid = ?",
        )
        .bind(cid.to_string())
        .fetch_optional(&self.pool)
        .await?
        .map(Manifest::try_from)
        .transpose()
    }

    /// Pieces of `network` in the order they were produced.
    pub async fn list_pieces(&self, network: Network) -> anyhow::Result<Vec<Piece>> {
        sqlx::query_as::<_, PieceRow>(
            "SELECT network, piece_cid, piece_size, object_location, raw_size, root_cid
             FROM pieces WHERE network = ? ORDER BY id",
        )
        .bind(network.code())
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Piece::try_from)
        .collect()
    }
}

async fn upsert_manifests(
    conn: &mut SqliteConnection,
    manifests: &[Manifest],
) -> anyhow::Result<()> {
    for chunk in manifests.chunks(BATCH_SIZE) {
        let rows = chunk
            .iter()
            .map(|m| {
                Ok((
                    m.cid.to_string(),
                    m.location.to_string(),
                    to_sql_int(m.offset)?,
                    to_sql_int(m.length)?,
                ))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        let mut query = QueryBuilder::<Sqlite>::new(
            "INSERT INTO manifests (cid, object_location, payload_offset, payload_length) ",
        );
        query.push_values(rows, |mut row, (cid, location, offset, length)| {
            row.push_bind(cid)
                .push_bind(location)
                .push_bind(offset)
                .push_bind(length);
        });
        query.push(
            " ON CONFLICT (cid) DO UPDATE SET
                object_location = excluded.object_location,
                payload_offset = excluded.payload_offset,
                payload_length = excluded.payload_length",
        );
        query
            .build()
            .execute(&mut *conn)
            .await
            .context("couldn't upsert manifests")?;
    }
    Ok(())
}

async fn insert_piece(conn: &mut SqliteConnection, piece: &Piece) -> anyhow::Result<()> {
    sqlx::query(
        "INSERT INTO pieces (network, piece_cid, piece_size, object_location, raw_size, root_cid)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(piece.network.code())
    .bind(piece.piece_cid.to_string())
    .bind(to_sql_int(piece.piece_size)?)
    .bind(piece.location.to_string())
    .bind(to_sql_int(piece.raw_size)?)
    .bind(piece.root_cid.to_string())
    .execute(conn)
    .await
    .context("couldn't insert piece")?;
    Ok(())
}
