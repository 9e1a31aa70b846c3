// Copyright (c) 2022 MASSA LABS <info@massa.net>

use displaydoc::Display;
use meridian_db_exports::DbError;
use meridian_models::block_id::BlockId;
use thiserror::Error;

/// Errors of the execution state store.
#[non_exhaustive]
#[derive(Display, Error, Debug, Clone)]
pub enum ExecutionStateError {
    /// database error: {0}
    DbError(#[from] DbError),

    /// a different result is already persisted for block {0}
    ResultAlreadyExists(BlockId),

    /// corrupted persisted entry under key {0}
    CorruptedEntry(String),

    /// serialization error: {0}
    SerializeError(String),

    /// the store holds no executed block yet
    NotBootstrapped,
}

impl From<meridian_serialization::SerializeError> for ExecutionStateError {
    fn from(err: meridian_serialization::SerializeError) -> Self {
        ExecutionStateError::SerializeError(err.to_string())
    }
}
