// Copyright (c) 2022 MASSA LABS <info@massa.net>

use meridian_models::block_id::BlockId;
use meridian_models::collection::{Collection, CollectionId, TransactionId};
use meridian_models::prehash::{PreHashMap, PreHashSet};

/// Container for all stored collections and their indexes.
/// Note: The structure can evolve and store more indexes.
#[derive(Default)]
pub struct CollectionIndexes {
    /// Collections structure container
    collections: PreHashMap<CollectionId, Collection>,
    /// Structure mapping transaction ids with the collection carrying them
    index_by_transaction: PreHashMap<TransactionId, CollectionId>,
    /// Structure mapping reference block ids with the collections guaranteed there
    index_by_reference_block: PreHashMap<BlockId, PreHashSet<CollectionId>>,
}

impl CollectionIndexes {
    /// Insert a collection and populate the indexes.
    /// Inserting the same collection id twice leaves the first copy in place.
    pub(crate) fn insert(&mut self, id: CollectionId, collection: Collection) {
        if self.collections.contains_key(&id) {
            return;
        }
        for transaction in &collection.transactions {
            self.index_by_transaction.insert(transaction.id(), id);
        }
        self.collections.insert(id, collection);
    }

    /// Record which reference block a collection was guaranteed at.
    pub(crate) fn link_reference_block(&mut self, reference_block_id: BlockId, id: CollectionId) {
        self.index_by_reference_block
            .entry(reference_block_id)
            .or_default()
            .insert(id);
    }

    /// Get a collection reference by its ID
    pub fn get(&self, id: &CollectionId) -> Option<&Collection> {
        self.collections.get(id)
    }

    /// Checks whether a collection exists in the store.
    pub fn contains(&self, id: &CollectionId) -> bool {
        self.collections.contains_key(id)
    }

    /// Get the collection id carrying a given transaction.
    pub fn get_collection_by_transaction(&self, id: &TransactionId) -> Option<&CollectionId> {
        self.index_by_transaction.get(id)
    }

    /// Get the collection ids guaranteed at a given reference block.
    pub fn get_collections_by_reference_block(
        &self,
        id: &BlockId,
    ) -> Option<&PreHashSet<CollectionId>> {
        self.index_by_reference_block.get(id)
    }

    /// Number of stored collections.
    pub fn len(&self) -> usize {
        self.collections.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}
