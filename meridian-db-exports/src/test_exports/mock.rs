// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! In-memory stand-in for the storage engine, honoring the atomicity and
//! callback contract of `DbController`.

use crate::{BatchCallback, DbBatch, DbController, DbError, Key, ShareableDb, Value};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// BTreeMap-backed database. Batches commit under a single write lock so the
/// all-or-nothing visibility of `write_batch` holds under concurrency.
#[derive(Default)]
pub struct MemoryDb {
    entries: RwLock<BTreeMap<Key, Value>>,
    fail_next_write: AtomicBool,
}

impl std::fmt::Debug for MemoryDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDb")
            .field("entries", &self.entries.read().len())
            .finish()
    }
}

impl MemoryDb {
    /// Creates an empty in-memory database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a fresh database into the shareable handle used by the stores.
    pub fn new_shareable() -> ShareableDb {
        Arc::new(RwLock::new(Box::new(MemoryDb::new()) as Box<dyn DbController>))
    }

    /// Make the next `write_batch` fail, to exercise fatal-error paths.
    pub fn fail_next_write(&self) {
        self.fail_next_write.store(true, Ordering::SeqCst);
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the database is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl DbController for MemoryDb {
    fn get(&self, key: &[u8]) -> Result<Option<Value>, DbError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn write_batch(
        &mut self,
        batch: DbBatch,
        on_commit: Option<BatchCallback>,
    ) -> Result<(), DbError> {
        let outcome = if self.fail_next_write.swap(false, Ordering::SeqCst) {
            Err(DbError::WriteError("injected write failure".to_string()))
        } else {
            let mut entries = self.entries.write();
            for (key, value) in batch {
                match value {
                    Some(value) => {
                        entries.insert(key, value);
                    }
                    None => {
                        entries.remove(&key);
                    }
                }
            }
            Ok(())
        };
        if let Some(callback) = on_commit {
            callback(&outcome);
        }
        outcome
    }

    fn prefix_iterator(&self, prefix: &[u8]) -> Box<dyn Iterator<Item = (Key, Value)> + '_> {
        let snapshot: Vec<(Key, Value)> = self
            .entries
            .read()
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Box::new(snapshot.into_iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_absent_is_none() {
        let db = MemoryDb::new();
        assert!(db.get(b"missing").unwrap().is_none());
    }

    #[test]
    fn test_batch_commit_and_delete() {
        let mut db = MemoryDb::new();
        let mut batch = DbBatch::new();
        batch.insert(b"a".to_vec(), Some(b"1".to_vec()));
        batch.insert(b"b".to_vec(), Some(b"2".to_vec()));
        db.write_batch(batch, None).unwrap();
        assert_eq!(db.get(b"a").unwrap(), Some(b"1".to_vec()));

        let mut batch = DbBatch::new();
        batch.insert(b"a".to_vec(), None);
        db.write_batch(batch, None).unwrap();
        assert!(db.get(b"a").unwrap().is_none());
        assert_eq!(db.get(b"b").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn test_injected_failure_leaves_state_untouched() {
        let mut db = MemoryDb::new();
        let mut batch = DbBatch::new();
        batch.insert(b"a".to_vec(), Some(b"1".to_vec()));
        db.write_batch(batch, None).unwrap();

        db.fail_next_write();
        let mut batch = DbBatch::new();
        batch.insert(b"a".to_vec(), Some(b"2".to_vec()));
        let result = db.write_batch(
            batch,
            Some(Box::new(|outcome: &Result<(), DbError>| {
                // callback observes the same failure as the caller
                assert!(outcome.is_err());
            })),
        );
        assert!(result.is_err());
        assert_eq!(db.get(b"a").unwrap(), Some(b"1".to_vec()));
    }

    #[test]
    fn test_prefix_iterator_bounds() {
        let mut db = MemoryDb::new();
        let mut batch = DbBatch::new();
        batch.insert(b"commitment/a".to_vec(), Some(b"1".to_vec()));
        batch.insert(b"commitment/b".to_vec(), Some(b"2".to_vec()));
        batch.insert(b"result/a".to_vec(), Some(b"3".to_vec()));
        db.write_batch(batch, None).unwrap();

        let keys: Vec<Key> = db
            .prefix_iterator(b"commitment/")
            .map(|(key, _)| key)
            .collect();
        assert_eq!(keys, vec![b"commitment/a".to_vec(), b"commitment/b".to_vec()]);
    }
}
