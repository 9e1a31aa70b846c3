// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crate::{DbBatch, DbError, Key, Value};
use parking_lot::RwLock;
use std::fmt::Debug;
use std::sync::Arc;

/// Callback invoked exactly once with the commit outcome of a batch write,
/// before `write_batch` returns.
pub type BatchCallback = Box<dyn FnOnce(&Result<(), DbError>) + Send>;

/// Contract the storage engine must honor.
pub trait DbController: Send + Sync + Debug {
    /// Point read. `Ok(None)` means the key is absent; errors are engine
    /// failures only.
    fn get(&self, key: &[u8]) -> Result<Option<Value>, DbError>;

    /// Atomically commit `batch`: either every entry becomes visible to
    /// concurrent readers or none does. The callback, when provided, observes
    /// the commit outcome before this call returns.
    fn write_batch(&mut self, batch: DbBatch, on_commit: Option<BatchCallback>)
        -> Result<(), DbError>;

    /// Iterate over all entries whose key starts with `prefix`, in ascending
    /// key order.
    fn prefix_iterator(&self, prefix: &[u8]) -> Box<dyn Iterator<Item = (Key, Value)> + '_>;

    /// Utility function to put / update a key & value in a batch
    fn put_or_update_entry_value(&self, batch: &mut DbBatch, key: Key, value: &[u8]) {
        batch.insert(key, Some(value.to_vec()));
    }

    /// Utility function to delete a key in a batch
    fn delete_key(&self, batch: &mut DbBatch, key: Key) {
        batch.insert(key, None);
    }
}

/// The shareable handle every store holds on the database.
pub type ShareableDb = Arc<RwLock<Box<dyn DbController>>>;
