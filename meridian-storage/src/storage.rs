// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crate::collection_indexes::CollectionIndexes;
use meridian_models::block_id::BlockId;
use meridian_models::collection::{Collection, CollectionId};
use meridian_models::prehash::PreHashSet;
use parking_lot::{RwLock, RwLockReadGuard};
use std::sync::Arc;
use tracing::debug;

/// A storage of collections, shared by various components.
///
/// Collections are stored once and never deleted by the ingestion core;
/// consumers read them through short-lived read guards.
#[derive(Clone, Default)]
pub struct Storage {
    collections: Arc<RwLock<CollectionIndexes>>,
}

impl Storage {
    /// Creates an empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a collection under its content id.
    /// Storing the same collection twice is a no-op.
    pub fn store_collection(&self, collection: Collection) -> CollectionId {
        let id = collection.id();
        debug!("storage: storing collection {}", id);
        self.collections.write().insert(id, collection);
        id
    }

    /// Store a batch of collections.
    pub fn store_collections(&self, collections: Vec<Collection>) {
        let mut store = self.collections.write();
        for collection in collections {
            let id = collection.id();
            store.insert(id, collection);
        }
    }

    /// Record which reference block a collection was guaranteed at, so that
    /// cluster lookups can later be answered per reference block.
    pub fn link_reference_block(&self, reference_block_id: BlockId, id: CollectionId) {
        self.collections
            .write()
            .link_reference_block(reference_block_id, id);
    }

    /// Checks whether a collection exists in storage.
    pub fn contains(&self, id: &CollectionId) -> bool {
        self.collections.read().contains(id)
    }

    /// Return the subset of `ids` that is present in storage.
    pub fn find_collections(&self, ids: &PreHashSet<CollectionId>) -> PreHashSet<CollectionId> {
        let store = self.collections.read();
        ids.iter().filter(|id| store.contains(id)).copied().collect()
    }

    /// Get a clone of a potentially stored collection.
    pub fn retrieve_collection(&self, id: &CollectionId) -> Option<Collection> {
        self.collections.read().get(id).cloned()
    }

    /// Get a read guard over the stored collections.
    pub fn read_collections(&self) -> RwLockReadGuard<CollectionIndexes> {
        self.collections.read()
    }
}
