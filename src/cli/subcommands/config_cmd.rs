// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::cli_shared::cli::Config;
use clap::Subcommand;
use std::io::Write;

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Dump the effective configuration as TOML
    Dump,
    /// Check the configuration and exit
    Validate,
}

impl ConfigCommands {
    /// Configuration is validated when it is read, so by now it is known to be
    /// good.
    pub fn run<W: Write>(self, config: &Config, sink: &mut W) -> anyhow::Result<()> {
        match self {
            Self::Dump => {
                writeln!(sink, "{}", toml::to_string(config)?)?;
            }
            Self::Validate => {
                writeln!(sink, "Configuration is valid")?;
            }
        }
        Ok(())
    }
}
