// Copyright (c) 2022 MASSA LABS <info@massa.net>
//! Definitions and exports of the execution ingestion module.
//!
//! This crate is the boundary of the block ingestion engine: the controller
//! and manager traits implemented by `meridian-execution-worker`, the
//! collaborator contracts the engine consumes (computation, upload,
//! collection transport, protocol chain state), and the types that cross
//! those seams.

mod channels;
mod collaborators;
mod controller_traits;
mod error;
mod events;
mod settings;
mod types;

pub use channels::ExecutionChannels;
pub use collaborators::{BlockComputer, ChainState, CollectionRequester, Uploader};
pub use controller_traits::{ExecutionController, ExecutionManager};
pub use error::ExecutionError;
pub use events::ExecutionEvent;
pub use settings::ExecutionConfig;
pub use types::{
    Chunk, ComputationResult, EventRecord, ExecutableBlock, ServiceEvent, StopParameters,
    StopParametersDeserializer, StopParametersSerializer, TransactionResult,
};

/// Test utils
#[cfg(feature = "testing")]
/// Exports related to tests as Mocks and configurations
pub mod test_exports;
