// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! this file defines all possible execution error categories

use displaydoc::Display;
use meridian_models::ModelsError;
use thiserror::Error;

/// Errors of the execution ingestion module.
#[non_exhaustive]
#[derive(Clone, Display, Error, Debug)]
pub enum ExecutionError {
    /// Channel error: {0}
    ChannelError(String),

    /// models error: {0}
    ModelsError(#[from] ModelsError),

    /// chain state error: {0}
    ChainStateError(String),

    /// computation failed: {0}
    ComputationError(String),

    /// upload failed: {0}
    UploadError(String),

    /// collection request could not be issued: {0}
    RequestError(String),

    /// stop parameters refused: {0}
    StopRefused(String),

    /// invariant violation, the node must restart: {0}
    InvariantViolation(String),
}
