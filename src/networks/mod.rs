// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The chains whose blocks are archived. Each network keeps its own resume
/// cursor and its own pieces.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Network {
    #[default]
    AvailGoldbergTestnet,
    AvailTuringTestnet,
    AvailMainnet,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown network type: {0}")]
pub struct UnknownNetwork(pub String);

impl FromStr for Network {
    type Err = UnknownNetwork;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "avail-goldberg-testnet" => Ok(Network::AvailGoldbergTestnet),
            "avail-turing-testnet" => Ok(Network::AvailTuringTestnet),
            "avail-mainnet" => Ok(Network::AvailMainnet),
            other => Err(UnknownNetwork(other.to_owned())),
        }
    }
}

impl Network {
    /// Persisted tag. `0` is never assigned.
    pub fn code(self) -> i64 {
        match self {
            Network::AvailGoldbergTestnet => 1,
            Network::AvailTuringTestnet => 2,
            Network::AvailMainnet => 3,
        }
    }

    pub fn from_code(code: i64) -> Result<Self, UnknownNetwork> {
        match code {
            1 => Ok(Network::AvailGoldbergTestnet),
            2 => Ok(Network::AvailTuringTestnet),
            3 => Ok(Network::AvailMainnet),
            other => Err(UnknownNetwork(format!("#{other}"))),
        }
    }
}
