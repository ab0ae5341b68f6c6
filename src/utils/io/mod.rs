// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use anyhow::Context as _;
use std::path::Path;

/// Converts a TOML file represented as a string to `S`
pub fn read_toml<S>(toml_string: &str) -> anyhow::Result<S>
where
    for<'de> S: serde::de::Deserialize<'de>,
{
    let new_struct: S = toml::from_str(toml_string)?;
    Ok(new_struct)
}

/// Reads and parses a TOML file, naming the file in any error.
pub fn read_toml_file<S>(path: &Path) -> anyhow::Result<S>
where
    for<'de> S: serde::de::Deserialize<'de>,
{
    let toml = std::fs::read_to_string(path)
        .with_context(|| format!("couldn't read {}", path.display()))?;
    read_toml(&toml).with_context(|| format!("couldn't parse {}", path.display()))
}
