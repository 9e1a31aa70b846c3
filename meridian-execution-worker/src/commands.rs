// Copyright (c) 2022 MASSA LABS <info@massa.net>

use meridian_execution_exports::ExecutionError;
use meridian_models::block::Block;
use meridian_models::block_header::BlockHeader;
use meridian_models::block_id::BlockId;
use meridian_models::collection::{Collection, CollectionId};
use meridian_models::commitment::StateCommitment;
use meridian_models::node::NodeId;

/// Commands driving the ingestion thread. All of them are posted by the
/// controller or by the engine's own helper threads and return immediately.
#[derive(Debug, Clone)]
pub enum IngestionCommand {
    /// A finalized block is ready to be assembled and executed.
    BlockProcessable(Block),
    /// The fetch thread stored a collection; the listed blocks were waiting
    /// for it.
    CollectionStored {
        /// id of the stored collection
        collection_id: CollectionId,
        /// blocks waiting on that collection
        blocks: Vec<BlockId>,
    },
    /// Consensus finalized a block.
    BlockFinalized(BlockHeader),
    /// An executor thread finished a block and persisted its results.
    ExecutionDone {
        /// the executed block
        block_id: BlockId,
        /// height of the executed block
        height: u64,
        /// its post-execution state commitment
        commitment: StateCommitment,
    },
    /// An executor thread hit an irrecoverable failure.
    ExecutionFailed {
        /// the failed block
        block_id: BlockId,
        /// what went wrong
        error: ExecutionError,
    },
    /// Pause or resume dispatching of ready blocks.
    SetPaused(bool),
    /// Stop the ingestion thread.
    Stop,
}

/// Commands driving the collection fetch thread.
#[derive(Debug, Clone)]
pub enum FetcherCommand {
    /// Make sure every listed collection ends up in storage, requesting the
    /// missing ones from their guarantor clusters.
    EnsureCollections {
        /// block whose guarantees are listed
        block_id: BlockId,
        /// the block's guarantees
        guarantees: Vec<meridian_models::collection::CollectionGuarantee>,
    },
    /// A collection arrived from the network.
    CollectionReceived {
        /// peer that sent the collection
        origin: NodeId,
        /// the collection itself
        collection: Collection,
    },
    /// Stop the fetch thread.
    Stop,
}
