// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::path::{Path, PathBuf};

use assert_cmd::{Command, cargo::cargo_bin_cmd};
use tempfile::TempDir;

pub fn archiver() -> Command {
    cargo_bin_cmd!("archiver")
}

/// Writes a configuration keeping all state under a fresh temporary
/// directory, with `extra` appended verbatim.
pub fn create_tmp_config(extra: &str) -> (PathBuf, TempDir) {
    let temp_dir = tempfile::tempdir().expect("couldn't create temp dir");
    let config = format!(
        r#"
network = "avail-goldberg-testnet"

[database]
path = "{db}"

[object_store]
type = "local"
root = "{objects}"
{extra}"#,
        db = temp_dir.path().join("index.sqlite3").display(),
        objects = temp_dir.path().join("objects").display(),
    );
    let config_file = temp_dir.path().join("config.toml");
    std::fs::write(&config_file, config).expect("couldn't write config");
    (config_file, temp_dir)
}

pub fn db_path(temp_dir: &Path) -> PathBuf {
    temp_dir.join("index.sqlite3")
}
