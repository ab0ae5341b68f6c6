// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::*;
use crate::commp::data_commitment_v1_to_cid;
use crate::test_utils::{memory_index, payload_cid};
use pretty_assertions::assert_eq;

fn loc(s: &str) -> ObjectLocation {
    s.parse().unwrap()
}

fn block(network: Network, height: u64) -> (BlockRecord, Manifest) {
    let cid = payload_cid(format!("{{\"height\":{height}}}").as_bytes());
    let block = BlockRecord {
        network,
        height,
        hash: format!("0x{height:064x}"),
        cid,
    };
    let manifest = Manifest {
        cid,
        location: loc(&format!("blocks/{network}/{height}.car")),
        offset: 59,
        length: 14,
    };
    (block, manifest)
}

fn piece(location: &str) -> Piece {
    Piece {
        network: Network::AvailGoldbergTestnet,
        piece_cid: data_commitment_v1_to_cid(&[7; 32]).unwrap(),
        piece_size: 1 << 20,
        location: loc(location),
        raw_size: 1000,
        root_cid: payload_cid(b"root"),
    }
}

#[tokio::test]
async fn latest_height_is_per_network() {
    let store = memory_index().await;
    assert_eq!(
        store.latest_height(Network::AvailGoldbergTestnet).await.unwrap(),
        None
    );
    for height in [5, 7, 6] {
        let (b, m) = block(Network::AvailGoldbergTestnet, height);
        store.insert_block_and_manifest(&b, &m).await.unwrap();
    }
    let (b, m) = block(Network::AvailMainnet, 100);
    store.insert_block_and_manifest(&b, &m).await.unwrap();

    assert_eq!(
        store.latest_height(Network::AvailGoldbergTestnet).await.unwrap(),
        Some(7)
    );
    assert_eq!(
        store.latest_height(Network::AvailMainnet).await.unwrap(),
        Some(100)
    );
    assert_eq!(
        store.latest_height(Network::AvailTuringTestnet).await.unwrap(),
        None
    );
}

#[tokio::test]
async fn blocks_are_found_by_height_and_hash() {
    let store = memory_index().await;
    let (b, m) = block(Network::AvailGoldbergTestnet, 42);
    store.insert_block_and_manifest(&b, &m).await.unwrap();

    let net = Network::AvailGoldbergTestnet;
    let by_height = store.lookup_block(net, &BlockKey::Height(42)).await.unwrap();
    let by_hash = store
        .lookup_block(net, &BlockKey::Hash(b.hash.clone()))
        .await
        .unwrap();
    assert_eq!(by_height.as_ref(), Some(&b));
    assert_eq!(by_hash.as_ref(), Some(&b));
    assert_eq!(store.lookup_manifest(&b.cid).await.unwrap(), Some(m));

    assert_eq!(
        store.lookup_block(net, &BlockKey::Height(43)).await.unwrap(),
        None
    );
    assert_eq!(
        store
            .lookup_block(Network::AvailMainnet, &BlockKey::Height(42))
            .await
            .unwrap(),
        None
    );
}

#[tokio::test]
async fn failed_block_insert_leaves_no_manifest() {
    let store = memory_index().await;
    let (b, m) = block(Network::AvailGoldbergTestnet, 1);
    store.insert_block_and_manifest(&b, &m).await.unwrap();

    // same height again violates the primary key
    let (_, other_manifest) = block(Network::AvailGoldbergTestnet, 2);
    let duplicate = BlockRecord {
        cid: other_manifest.cid,
        ..b.clone()
    };
    assert!(
        store
            .insert_block_and_manifest(&duplicate, &other_manifest)
            .await
            .is_err()
    );
    assert_eq!(store.lookup_manifest(&other_manifest.cid).await.unwrap(), None);
}

#[tokio::test]
async fn manifest_upsert_replaces_location() {
    let store = memory_index().await;
    let manifests: Vec<Manifest> = (0..250)
        .map(|h| block(Network::AvailGoldbergTestnet, h).1)
        .collect();
    store.insert_manifests_batch(&manifests).await.unwrap();

    let moved: Vec<Manifest> = manifests
        .iter()
        .enumerate()
        .map(|(i, m)| Manifest {
            location: loc("pieces/aggregate.car"),
            offset: 100 + i as u64,
            ..m.clone()
        })
        .collect();
    store.commit_aggregate(&moved, &piece("pieces/aggregate.car")).await.unwrap();

    for m in &moved {
        assert_eq!(store.lookup_manifest(&m.cid).await.unwrap().as_ref(), Some(m));
    }
    assert_eq!(
        store
            .list_pieces(Network::AvailGoldbergTestnet)
            .await
            .unwrap(),
        vec![piece("pieces/aggregate.car")]
    );
}

#[tokio::test]
async fn delete_by_location_only_touches_those_objects() {
    let store = memory_index().await;
    let manifests: Vec<Manifest> = (0..3)
        .map(|h| block(Network::AvailGoldbergTestnet, h).1)
        .collect();
    store.insert_manifests_batch(&manifests).await.unwrap();

    let deleted = store
        .delete_manifests_by_object_locations(&[
            manifests[0].location.clone(),
            manifests[2].location.clone(),
            loc("blocks/unknown.car"),
        ])
        .await
        .unwrap();
    assert_eq!(deleted, 2);
    assert_eq!(store.lookup_manifest(&manifests[0].cid).await.unwrap(), None);
    assert!(store.lookup_manifest(&manifests[1].cid).await.unwrap().is_some());

    // repeating the delete is a no-op
    let deleted = store
        .delete_manifests_by_object_locations(&[manifests[0].location.clone()])
        .await
        .unwrap();
    assert_eq!(deleted, 0);
}

#[tokio::test]
async fn referenced_locations_are_those_with_manifests() {
    let store = memory_index().await;
    let manifests: Vec<Manifest> = (0..2)
        .map(|h| block(Network::AvailGoldbergTestnet, h).1)
        .collect();
    store.insert_manifests_batch(&manifests).await.unwrap();

    let unknown = loc("blocks/unknown.car");
    let referenced = store
        .referenced_object_locations(&[manifests[1].location.clone(), unknown.clone()])
        .await
        .unwrap();
    assert_eq!(referenced, [manifests[1].location.clone()].into_iter().collect());

    store
        .delete_manifests_by_object_locations(&[manifests[1].location.clone()])
        .await
        .unwrap();
    assert!(
        store
            .referenced_object_locations(&[manifests[1].location.clone()])
            .await
            .unwrap()
            .is_empty()
    );
    assert!(store.referenced_object_locations(&[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn pieces_are_listed_in_order() {
    let store = memory_index().await;
    store.insert_piece(&piece("pieces/a.car")).await.unwrap();
    store.insert_piece(&piece("pieces/b.car")).await.unwrap();
    let locations: Vec<String> = store
        .list_pieces(Network::AvailGoldbergTestnet)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.location.to_string())
        .collect();
    assert_eq!(locations, ["pieces/a.car", "pieces/b.car"]);
    assert!(store.list_pieces(Network::AvailMainnet).await.unwrap().is_empty());
}
