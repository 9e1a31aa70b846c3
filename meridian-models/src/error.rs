// Copyright (c) 2022 MASSA LABS <info@massa.net>

use displaydoc::Display;
use thiserror::Error;

/// models error
#[non_exhaustive]
#[derive(Display, Error, Debug, Clone)]
pub enum ModelsError {
    /// hashing error
    HashError,
    /// Serialization error: {0}
    SerializeError(String),
    /// Deserialization error: {0}
    DeserializeError(String),
    /// block id parsing error
    BlockIdParseError,
    /// collection id parsing error
    CollectionIdParseError,
    /// transaction id parsing error
    TransactionIdParseError,
    /// result id parsing error
    ResultIdParseError,
    /// node id parsing error
    NodeIdParseError,
    /// state commitment parsing error
    StateCommitmentParseError,
}

impl From<meridian_serialization::SerializeError> for ModelsError {
    fn from(err: meridian_serialization::SerializeError) -> Self {
        ModelsError::SerializeError(err.to_string())
    }
}
