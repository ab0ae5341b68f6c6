// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

pub mod cli;
pub mod logger;

use crate::cli_shared::cli::Config;
use crate::utils::io::read_toml_file;
use std::path::Path;

/// Reads the configuration file, or returns the defaults when no file was
/// given. The result is validated either way.
pub fn read_config(config_path: Option<&Path>) -> anyhow::Result<Config> {
    let config: Config = match config_path {
        Some(path) => read_toml_file(path)?,
        None => Config::default(),
    };
    config.validate()?;
    Ok(config)
}
