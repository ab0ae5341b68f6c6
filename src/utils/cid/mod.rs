// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::utils::multihash::prelude::*;
use cid::Cid;

/// Multicodec code for `dag-json`.
pub const DAG_JSON: u64 = 0x0129;

/// Extension methods for constructing `dag-json` [Cid]
pub trait CidJsonExt {
    /// Serializes `obj` to its canonical JSON form and addresses it with a
    /// `dag-json` CIDv1 over SHA-256.
    ///
    /// Object keys come out sorted because `serde_json` maps are ordered, so
    /// equal documents always produce equal bytes and equal identifiers.
    fn from_json_sha256<S: serde::Serialize>(obj: &S) -> serde_json::Result<(Cid, Vec<u8>)> {
        let bytes = serde_json::to_vec(obj)?;
        Ok((Cid::from_dag_json_bytes(&bytes), bytes))
    }

    /// Addresses bytes that are already canonical `dag-json`.
    fn from_dag_json_bytes(bytes: &[u8]) -> Cid {
        Cid::new_v1(DAG_JSON, MultihashCode::Sha2_256.digest(bytes))
    }
}

impl CidJsonExt for Cid {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_change_the_cid() {
        let a: serde_json::Value =
            serde_json::from_str(r#"{"b":1,"a":{"y":2,"x":3}}"#).unwrap();
        let b = json!({"a": {"x": 3, "y": 2}, "b": 1});
        let (cid_a, bytes_a) = Cid::from_json_sha256(&a).unwrap();
        let (cid_b, bytes_b) = Cid::from_json_sha256(&b).unwrap();
        assert_eq!(bytes_a, br#"{"a":{"x":3,"y":2},"b":1}"#);
        assert_eq!(bytes_a, bytes_b);
        assert_eq!(cid_a, cid_b);
        assert_eq!(cid_a.codec(), DAG_JSON);
        assert_eq!(cid_a.hash().code(), 0x12);
    }
}
