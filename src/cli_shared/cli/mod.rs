// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

mod config;

pub use config::{ChainConfig, Config, ConfigError, DatabaseConfig, ObjectStoreConfig};

use crate::utils::misc::LoggingColor;
use clap::Args;
use std::path::PathBuf;

/// Options shared by every command.
#[derive(Debug, Default, Clone, Args)]
pub struct CliOpts {
    /// A TOML file containing relevant configurations
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
    /// Directory for hourly rotated log files, in addition to the console
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,
    /// Enable or disable colored logging in `stderr`
    #[arg(long, global = true, default_value_t = LoggingColor::Auto)]
    pub color: LoggingColor,
}
