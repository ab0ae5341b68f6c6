// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Streaming piece commitment (`CommP`) calculation.
//!
//! Payload bytes are fr32-padded into 32-byte leaves and folded into a binary
//! SHA-256 (trunc254) Merkle tree as they arrive. Only one pending node per
//! tree layer is kept, so memory stays logarithmic in the payload size and
//! nothing is ever re-read.
//!
//! A finished commitment can be padded to a larger power-of-two piece by
//! hashing it against the commitments of all-zero subtrees, which is the same
//! as having appended zeros to the payload.

mod fr32;

pub use fvm_shared4::commcid::{cid_to_data_commitment_v1, data_commitment_v1_to_cid};
pub use fvm_shared4::piece::PaddedPieceSize;

use crate::utils::next_power_of_two;
use cid::Cid;
use fr32::{QUAD_PADDED_SIZE, QUAD_PAYLOAD_SIZE};
use sha2::{Digest as _, Sha256};
use std::sync::LazyLock;

/// A 32-byte Merkle node.
pub type Commitment = [u8; 32];

const NODE_SIZE: u64 = 32;
/// Commitments are undefined for anything shorter.
pub const MIN_PIECE_PAYLOAD: u64 = 65;
const MAX_LAYERS: u32 = 31;
pub const MAX_PIECE_SIZE: u64 = 1 << (MAX_LAYERS + 5);
pub const MAX_PIECE_PAYLOAD: u64 = MAX_PIECE_SIZE / 128 * 127;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommpError {
    #[error(
        "commP is not defined for inputs shorter than {MIN_PIECE_PAYLOAD} bytes, but only {0} processed"
    )]
    PayloadTooSmall(u64),
    #[error("payload exceeds the maximum piece payload of {MAX_PIECE_PAYLOAD} bytes")]
    PayloadTooLarge,
    #[error("piece size must be a power of two: {0}")]
    NotPowerOfTwo(u64),
    #[error("target piece size {target} is smaller than the piece size {natural}")]
    TargetTooSmall { target: u64, natural: u64 },
    #[error("invalid commitment CID: {0}")]
    InvalidCommitmentCid(&'static str),
}

/// Checks that `size` is a usable padded piece size: a power of two of at
/// least one quad.
pub fn padded_piece_size(size: u64) -> Result<PaddedPieceSize, CommpError> {
    let size = PaddedPieceSize(size);
    size.validate().map_err(|_| CommpError::NotPowerOfTwo(size.0))?;
    Ok(size)
}

/// Number of tree layers above the leaves.
fn tree_height(size: PaddedPieceSize) -> u32 {
    size.0.trailing_zeros() - NODE_SIZE.trailing_zeros()
}

/// Root of the tree over `2^i` zero leaves, for every `i` a `u64` size can reach.
static ZERO_COMMITMENTS: LazyLock<[Commitment; 64]> = LazyLock::new(|| {
    let mut table = [[0u8; 32]; 64];
    for i in 1..table.len() {
        table[i] = hash_pair(&table[i - 1], &table[i - 1]);
    }
    table
});

fn hash_pair(left: &Commitment, right: &Commitment) -> Commitment {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    let mut out: Commitment = hasher.finalize().into();
    out[31] &= 0x3f;
    out
}

/// Incremental `CommP` accumulator.
#[derive(Debug, Default)]
pub struct Calc {
    buffer: Vec<u8>,
    quads: u64,
    /// Pending left node per layer, waiting for its right sibling.
    layers: Vec<Option<Commitment>>,
}

impl Calc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes fed in so far.
    pub fn processed(&self) -> u64 {
        self.quads * QUAD_PAYLOAD_SIZE as u64 + self.buffer.len() as u64
    }

    /// Feeds the next bytes of the payload. Chunk boundaries don't matter.
    pub fn write(&mut self, mut data: &[u8]) -> Result<(), CommpError> {
        if self.processed().saturating_add(data.len() as u64) > MAX_PIECE_PAYLOAD {
            return Err(CommpError::PayloadTooLarge);
        }

        if !self.buffer.is_empty() {
            let take = (QUAD_PAYLOAD_SIZE - self.buffer.len()).min(data.len());
            self.buffer.extend_from_slice(&data[..take]);
            data = &data[take..];
            if self.buffer.len() < QUAD_PAYLOAD_SIZE {
                return Ok(());
            }
            let quad = std::mem::take(&mut self.buffer);
            self.digest_quad(&quad);
        }

        let mut quads = data.chunks_exact(QUAD_PAYLOAD_SIZE);
        for quad in &mut quads {
            self.digest_quad(quad);
        }
        self.buffer.extend_from_slice(quads.remainder());
        Ok(())
    }

    fn digest_quad(&mut self, quad: &[u8]) {
        let mut input = [0u8; QUAD_PAYLOAD_SIZE];
        input.copy_from_slice(quad);
        let mut padded = [0u8; QUAD_PADDED_SIZE];
        fr32::pad_quad(&input, &mut padded);
        for leaf in padded.chunks_exact(NODE_SIZE as usize) {
            let mut node = [0u8; 32];
            node.copy_from_slice(leaf);
            self.push(node, 0);
        }
        self.quads += 1;
    }

    fn push(&mut self, mut node: Commitment, mut layer: usize) {
        loop {
            if self.layers.len() <= layer {
                self.layers.resize(layer + 1, None);
            }
            match self.layers[layer].take() {
                Some(left) => {
                    node = hash_pair(&left, &node);
                    layer += 1;
                }
                None => {
                    self.layers[layer] = Some(node);
                    return;
                }
            }
        }
    }

    /// Closes the accumulator, returning the commitment and the natural piece
    /// size: the padded payload rounded up to a power of two.
    pub fn finalize(mut self) -> Result<(Commitment, PaddedPieceSize), CommpError> {
        let processed = self.processed();
        if processed < MIN_PIECE_PAYLOAD {
            return Err(CommpError::PayloadTooSmall(processed));
        }
        if !self.buffer.is_empty() {
            let mut quad = std::mem::take(&mut self.buffer);
            quad.resize(QUAD_PAYLOAD_SIZE, 0);
            self.digest_quad(&quad);
        }

        let size = next_power_of_two(self.quads * QUAD_PADDED_SIZE as u64)
            .ok_or(CommpError::PayloadTooLarge)
            .and_then(padded_piece_size)?;
        let height = tree_height(size) as usize;

        // Complete the right edge of the tree with zero subtrees.
        let mut carry: Option<Commitment> = None;
        for layer in 0..height {
            let left = self.layers.get(layer).copied().flatten();
            let zero = &ZERO_COMMITMENTS[layer];
            carry = match (left, carry) {
                (Some(l), Some(c)) => Some(hash_pair(&l, &c)),
                (Some(l), None) => Some(hash_pair(&l, zero)),
                (None, Some(c)) => Some(hash_pair(&c, zero)),
                (None, None) => None,
            };
        }
        let root = carry
            .or_else(|| self.layers.get(height).copied().flatten())
            .ok_or(CommpError::PayloadTooSmall(processed))?;
        Ok((root, size))
    }
}

impl std::io::Write for Calc {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        Calc::write(self, buf).map_err(std::io::Error::other)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Extends a commitment over `natural` bytes to one over `target` bytes, the
/// difference being zeros.
pub fn pad_commp(
    commp: Commitment,
    natural: PaddedPieceSize,
    target: u64,
) -> Result<Commitment, CommpError> {
    let target = padded_piece_size(target)?;
    if target.0 < natural.0 {
        return Err(CommpError::TargetTooSmall {
            target: target.0,
            natural: natural.0,
        });
    }
    let mut out = commp;
    for layer in tree_height(natural)..tree_height(target) {
        out = hash_pair(&out, &ZERO_COMMITMENTS[layer as usize]);
    }
    Ok(out)
}

/// The finished commitment of an aggregate, as recorded with its piece.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PieceCommitment {
    pub cid: Cid,
    pub size: PaddedPieceSize,
}

/// Finalizes `calc` and pads the result to `target_piece_size` when the
/// natural piece is smaller.
pub fn piece_commitment(calc: Calc, target_piece_size: u64) -> Result<PieceCommitment, CommpError> {
    let (mut commp, mut size) = calc.finalize()?;
    if size.0 < target_piece_size {
        commp = pad_commp(commp, size, target_piece_size)?;
        size = padded_piece_size(target_piece_size)?;
    }
    Ok(PieceCommitment {
        cid: data_commitment_v1_to_cid(&commp).map_err(CommpError::InvalidCommitmentCid)?,
        size,
    })
}
