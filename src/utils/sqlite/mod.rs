// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Opening and versioning of SQLite databases.

use anyhow::Context as _;
use sqlx::{
    SqlitePool,
    query::Query,
    sqlite::{
        SqliteArguments, SqliteAutoVacuum, SqliteConnectOptions, SqliteJournalMode,
        SqlitePoolOptions, SqliteSynchronous,
    },
};
use std::path::Path;

pub type SqliteQuery<'q> = Query<'q, sqlx::Sqlite, SqliteArguments<'q>>;

/// Opens or creates a database at the specified path
pub async fn open_file(file: &Path) -> anyhow::Result<SqlitePool> {
    if let Some(dir) = file.parent()
        && !dir.as_os_str().is_empty()
        && !dir.is_dir()
    {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("couldn't create {}", dir.display()))?;
    }
    let options = SqliteConnectOptions::new()
        .filename(file)
        .create_if_missing(true);
    open(options, SqlitePoolOptions::new())
        .await
        .with_context(|| format!("couldn't open database {}", file.display()))
}

#[cfg(test)]
/// Opens a private in-memory database.
///
/// Every connection to `:memory:` is a separate database, so the pool holds
/// exactly one connection and never lets it go.
pub async fn open_memory() -> sqlx::Result<SqlitePool> {
    open(
        SqliteConnectOptions::new().in_memory(true),
        SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None),
    )
    .await
}

async fn open(
    options: SqliteConnectOptions,
    pool: SqlitePoolOptions,
) -> sqlx::Result<SqlitePool> {
    let options = options
        .synchronous(SqliteSynchronous::Normal)
        .pragma("temp_store", "memory")
        .auto_vacuum(SqliteAutoVacuum::None)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .read_only(false);
    pool.connect_with(options).await
}

/// Creates the schema of a new database, or checks the version of an existing one.
///
/// `ddls` must be idempotent. They run, together with recording `schema_version`
/// in the `_meta` table, in a single transaction. An existing database with a
/// newer schema than `schema_version` is refused.
pub async fn init_db<'q>(
    db: &SqlitePool,
    name: &str,
    ddls: impl IntoIterator<Item = SqliteQuery<'q>>,
    schema_version: u32,
) -> anyhow::Result<()> {
    let mut tx = db.begin().await?;
    sqlx::query("CREATE TABLE IF NOT EXISTS _meta (version UINT64 NOT NULL UNIQUE)")
        .execute(tx.as_mut())
        .await?;
    let found_version: Option<i64> = sqlx::query_scalar("SELECT max(version) FROM _meta")
        .fetch_one(tx.as_mut())
        .await
        .with_context(|| format!("error reading {name} database version"))?;

    if let Some(found_version) = found_version
        && found_version > i64::from(schema_version)
    {
        anyhow::bail!(
            "invalid {name} database version: version {found_version} is newer than {schema_version}"
        );
    }

    for ddl in ddls {
        ddl.execute(tx.as_mut()).await?;
    }
    sqlx::query("INSERT OR IGNORE INTO _meta (version) VALUES (?)")
        .bind(i64::from(schema_version))
        .execute(tx.as_mut())
        .await?;
    tx.commit().await?;

    if found_version.is_none() {
        tracing::info!(%name, schema_version, "created database schema");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ddls() -> Vec<SqliteQuery<'static>> {
        vec![sqlx::query(
            "CREATE TABLE IF NOT EXISTS things (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
        )]
    }

    #[tokio::test]
    async fn init_is_idempotent() {
        let db = open_memory().await.unwrap();
        init_db(&db, "test", ddls(), 1).await.unwrap();
        sqlx::query("INSERT INTO things (name) VALUES ('a')")
            .execute(&db)
            .await
            .unwrap();
        init_db(&db, "test", ddls(), 1).await.unwrap();
        let count: i64 = sqlx::query_scalar("SELECT count(*) FROM things")
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn newer_schema_is_refused() {
        let db = open_memory().await.unwrap();
        init_db(&db, "test", ddls(), 2).await.unwrap();
        assert!(init_db(&db, "test", ddls(), 1).await.is_err());
    }

    #[tokio::test]
    async fn file_database_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("index.db");
        let db = open_file(&path).await.unwrap();
        init_db(&db, "test", ddls(), 1).await.unwrap();
        db.close().await;
        assert!(path.is_file());
    }
}
