// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Fr32 padding: every 254 bits of payload become one 256-bit field element
//! whose two most significant bits are zero. 127 payload bytes therefore fill
//! exactly four 32-byte leaves.

pub const QUAD_PAYLOAD_SIZE: usize = 127;
pub const QUAD_PADDED_SIZE: usize = 128;

/// Spreads one 127-byte quad over four 32-byte leaves. Bits are taken
/// least-significant first, and each leaf starts 254 bits after the previous.
pub fn pad_quad(input: &[u8; QUAD_PAYLOAD_SIZE], out: &mut [u8; QUAD_PADDED_SIZE]) {
    // leaf 0: bits 0..254
    out[..32].copy_from_slice(&input[..32]);
    out[31] &= 0x3f;

    // leaf 1: starts at bit 254, i.e. byte 31 shifted by 6
    for i in 32..64 {
        out[i] = (input[i - 1] >> 6) | (input[i] << 2);
    }
    out[63] &= 0x3f;

    // leaf 2: starts at bit 508, i.e. byte 63 shifted by 4
    for i in 64..96 {
        out[i] = (input[i - 1] >> 4) | (input[i] << 4);
    }
    out[95] &= 0x3f;

    // leaf 3: starts at bit 762, i.e. byte 95 shifted by 2
    for i in 96..127 {
        out[i] = (input[i - 1] >> 2) | (input[i] << 6);
    }
    out[127] = input[126] >> 2;
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;

    #[derive(Debug, Clone)]
    struct Quad([u8; QUAD_PAYLOAD_SIZE]);

    impl Arbitrary for Quad {
        fn arbitrary(g: &mut Gen) -> Self {
            let mut quad = [0u8; QUAD_PAYLOAD_SIZE];
            quad.iter_mut().for_each(|b| *b = u8::arbitrary(g));
            Quad(quad)
        }
    }

    fn bit(bytes: &[u8], i: usize) -> u8 {
        (bytes[i / 8] >> (i % 8)) & 1
    }

    /// Reads the padded leaves back into the original bit sequence.
    fn unpad(out: &[u8; QUAD_PADDED_SIZE]) -> [u8; QUAD_PAYLOAD_SIZE] {
        let mut res = [0u8; QUAD_PAYLOAD_SIZE];
        for leaf in 0..4 {
            for j in 0..254 {
                let src = leaf * 256 + j;
                let dst = leaf * 254 + j;
                res[dst / 8] |= bit(out, src) << (dst % 8);
            }
        }
        res
    }

    #[quickcheck]
    fn padding_is_lossless(quad: Quad) {
        let mut out = [0u8; QUAD_PADDED_SIZE];
        pad_quad(&quad.0, &mut out);
        assert_eq!(unpad(&out), quad.0);
    }

    #[quickcheck]
    fn top_bits_are_clear(quad: Quad) {
        let mut out = [0u8; QUAD_PADDED_SIZE];
        pad_quad(&quad.0, &mut out);
        for leaf in out.chunks(32) {
            assert_eq!(leaf[31] & 0xc0, 0);
        }
    }
}
