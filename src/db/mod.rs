// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! The index: which block went into which record, where each record's
//! payload lives, and which pieces were produced.

mod sqlite;
#[cfg(test)]
mod tests;

pub use sqlite::IndexStore;

use crate::networks::Network;
use crate::object_store::ObjectLocation;
use cid::Cid;

/// A finalized block and the identifier of the record it was encoded into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRecord {
    pub network: Network,
    pub height: u64,
    pub hash: String,
    pub cid: Cid,
}

/// How a block is looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKey {
    Height(u64),
    Hash(String),
}

/// Byte range of a record's payload inside an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub cid: Cid,
    pub location: ObjectLocation,
    pub offset: u64,
    pub length: u64,
}

impl Manifest {
    pub fn range(&self) -> std::ops::Range<u64> {
        self.offset..self.offset + self.length
    }
}

/// A finished aggregate and its commitment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Piece {
    pub network: Network,
    pub piece_cid: Cid,
    /// Padded size, a power of two.
    pub piece_size: u64,
    pub location: ObjectLocation,
    /// Bytes actually stored.
    pub raw_size: u64,
    pub root_cid: Cid,
}
