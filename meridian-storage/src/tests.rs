// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crate::Storage;
use meridian_hash::Hash;
use meridian_models::block_id::BlockId;
use meridian_models::collection::{Collection, Transaction};
use meridian_models::prehash::PreHashSet;

fn collection_fixture(tag: &str) -> Collection {
    Collection {
        transactions: vec![Transaction {
            payload: tag.as_bytes().to_vec(),
        }],
    }
}

#[test]
fn test_store_and_retrieve() {
    let storage = Storage::new();
    let collection = collection_fixture("a");
    let id = storage.store_collection(collection.clone());
    assert!(storage.contains(&id));
    assert_eq!(storage.retrieve_collection(&id), Some(collection));
}

#[test]
fn test_duplicate_store_is_noop() {
    let storage = Storage::new();
    let collection = collection_fixture("a");
    let id1 = storage.store_collection(collection.clone());
    let id2 = storage.store_collection(collection);
    assert_eq!(id1, id2);
    assert_eq!(storage.read_collections().len(), 1);
}

#[test]
fn test_find_collections_subset() {
    let storage = Storage::new();
    let stored = storage.store_collection(collection_fixture("a"));
    let missing = collection_fixture("b").id();
    let query: PreHashSet<_> = [stored, missing].into_iter().collect();
    let found = storage.find_collections(&query);
    assert!(found.contains(&stored));
    assert!(!found.contains(&missing));
}

#[test]
fn test_transaction_index() {
    let storage = Storage::new();
    let collection = collection_fixture("a");
    let tx_id = collection.transactions[0].id();
    let id = storage.store_collection(collection);
    let store = storage.read_collections();
    assert_eq!(store.get_collection_by_transaction(&tx_id), Some(&id));
}

#[test]
fn test_reference_block_index() {
    let storage = Storage::new();
    let id = storage.store_collection(collection_fixture("a"));
    let reference = BlockId(Hash::compute_from(b"ref"));
    storage.link_reference_block(reference, id);
    let store = storage.read_collections();
    let linked = store.get_collections_by_reference_block(&reference).unwrap();
    assert!(linked.contains(&id));
}

#[test]
fn test_shared_clone_sees_writes() {
    let storage = Storage::new();
    let clone = storage.clone();
    let id = storage.store_collection(collection_fixture("a"));
    assert!(clone.contains(&id));
}
