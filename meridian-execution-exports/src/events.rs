// Copyright (c) 2022 MASSA LABS <info@massa.net>

use meridian_models::block_id::BlockId;
use meridian_models::commitment::StateCommitment;

/// Events that are emitted by the execution ingestion engine.
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    /// A block was executed and its results persisted.
    BlockExecuted {
        /// id of the executed block
        block_id: BlockId,
        /// post-execution state commitment
        commitment: StateCommitment,
    },
    /// The configured stop height was reached: no block at or above it will
    /// execute, and nothing below it is still in flight.
    ExecutionStopped {
        /// the armed stop height
        stop_before_height: u64,
    },
    /// An irrecoverable failure: the node is expected to restart.
    FatalError {
        /// human-readable failure description
        message: String,
    },
}
