// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! Fixture factories shared by the ingestion test suites.

use meridian_hash::Hash;
use meridian_models::block::Block;
use meridian_models::block_header::ChainId;
use meridian_models::block_id::BlockId;
use meridian_models::collection::{Collection, CollectionGuarantee, Transaction};
use meridian_models::commitment::StateCommitment;
use meridian_models::node::NodeId;

/// Chain namespace used by every fixture.
const TEST_CHAIN_ID: ChainId = ChainId(99);

/// A collection whose content is derived from `seed`.
pub fn collection_fixture(seed: &str) -> Collection {
    Collection {
        transactions: vec![
            Transaction {
                payload: format!("{}-tx-0", seed).into_bytes(),
            },
            Transaction {
                payload: format!("{}-tx-1", seed).into_bytes(),
            },
        ],
    }
}

/// A deterministic node id derived from `seed`.
pub fn node_id_fixture(seed: &str) -> NodeId {
    NodeId(Hash::compute_from(seed.as_bytes()))
}

/// The commitment the mock computer reports for a given block.
pub fn commitment_for(block_id: &BlockId) -> StateCommitment {
    StateCommitment(
        Hash::compute_from_tuple(&[b"post-state".as_slice(), block_id.to_bytes().as_slice()])
            .into_bytes(),
    )
}

/// The genesis block of a test chain, at height 0 with a self-referential
/// parent.
pub fn genesis_block() -> Block {
    let zero_parent = BlockId(Hash::compute_from(b"genesis-parent"));
    Block::new(zero_parent, 0, 0, TEST_CHAIN_ID, vec![]).unwrap()
}

/// A block with no guaranteed collections on top of `parent`.
pub fn empty_block(parent: &Block, height: u64) -> Block {
    Block::new(parent.id(), height, height, TEST_CHAIN_ID, vec![]).unwrap()
}

/// A block guaranteeing the given collections on top of `parent`. The
/// guarantees reference the parent block.
pub fn block_with_guarantees(parent: &Block, height: u64, collections: &[&Collection]) -> Block {
    let guarantees = collections
        .iter()
        .map(|collection| CollectionGuarantee {
            collection_id: collection.id(),
            reference_block_id: parent.id(),
            signer_indices: vec![0, 1],
        })
        .collect();
    Block::new(parent.id(), height, height, TEST_CHAIN_ID, guarantees).unwrap()
}
