// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

pub mod cid;
pub mod db;
pub mod io;
pub mod misc;
pub mod multihash;
pub mod sqlite;

/// Smallest power of two that is greater than or equal to `x`, with `0`
/// mapping to `1`. Returns [`None`] on overflow.
pub fn next_power_of_two(x: u64) -> Option<u64> {
    x.max(1).checked_next_power_of_two()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_power_of_two_edges() {
        assert_eq!(next_power_of_two(0), Some(1));
        assert_eq!(next_power_of_two(1), Some(1));
        assert_eq!(next_power_of_two(3), Some(4));
        assert_eq!(next_power_of_two(1024), Some(1024));
        assert_eq!(next_power_of_two(1025), Some(2048));
        assert_eq!(next_power_of_two(u64::MAX), None);
    }
}
