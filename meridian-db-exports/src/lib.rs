// Copyright (c) 2022 MASSA LABS <info@massa.net>
//! Interface to the key-value storage engine backing the execution node.
//!
//! The engine itself (RocksDB or similar) lives outside this workspace; the
//! ingestion core only relies on the [`DbController`] contract: point reads
//! with a distinguished not-found, atomic batch writes with post-commit
//! callbacks, and prefix iteration.

mod controller;
mod error;

pub use controller::{BatchCallback, DbController, ShareableDb};
pub use error::DbError;

use std::collections::BTreeMap;

/// Raw key in the storage engine
pub type Key = Vec<u8>;
/// Raw value in the storage engine
pub type Value = Vec<u8>;

/// We use batching to reduce the number of writes to the database.
///
/// A `DbBatch` is a map from `Key` to `Some(Value)` for a new or updated
/// value, or `None` for a deletion. The whole batch commits atomically.
pub type DbBatch = BTreeMap<Key, Option<Value>>;

/// Test utils
#[cfg(feature = "testing")]
pub mod test_exports;
