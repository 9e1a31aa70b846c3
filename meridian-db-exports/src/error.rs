// Copyright (c) 2022 MASSA LABS <info@massa.net>

use displaydoc::Display;
use thiserror::Error;

/// Database error.
///
/// A missing key is NOT an error: point reads return `Option`. Every variant
/// here is an engine failure and is fatal to the operation in progress.
#[non_exhaustive]
#[derive(Display, Error, Debug, Clone)]
pub enum DbError {
    /// Write error: {0}
    WriteError(String),
    /// Read error: {0}
    ReadError(String),
    /// Engine unavailable: {0}
    EngineError(String),
}
