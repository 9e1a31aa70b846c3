// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! Contracts of the external collaborators the ingestion engine drives.
//! Their implementations live outside this workspace: the virtual machine,
//! the networking layer and the protocol state are all separate modules.

use crate::error::ExecutionError;
use crate::types::{ComputationResult, ExecutableBlock};
use meridian_models::block::Block;
use meridian_models::block_header::BlockHeader;
use meridian_models::block_id::BlockId;
use meridian_models::collection::{CollectionGuarantee, CollectionId};
use meridian_models::node::NodeId;
use meridian_models::result_id::ResultId;

/// The computation layer: executes the transactions of a complete block on
/// top of its start state.
pub trait BlockComputer: Send + Sync {
    /// Execute `block`. Pure with respect to the start snapshot carried by
    /// the executable block: identical inputs produce identical results.
    ///
    /// # Arguments
    /// * `previous_result_id`: id of the parent block's computation result
    /// * `block`: complete executable block, start state set
    fn compute_block(
        &self,
        previous_result_id: ResultId,
        block: &ExecutableBlock,
    ) -> Result<ComputationResult, ExecutionError>;
}

/// An upload sink for computation results. Multiple uploaders compose with
/// independent failure isolation: one failing never hides the result from
/// the others.
pub trait Uploader: Send + Sync {
    /// Push one computation result to the sink.
    fn upload(&self, result: &ComputationResult) -> Result<(), ExecutionError>;
}

/// Out-of-band transport used to ask a collection node for a collection.
/// Completion is delivered through `ExecutionController::collection_received`.
pub trait CollectionRequester: Send + Sync {
    /// Issue a request for `collection_id` to `target`.
    fn request_collection(
        &self,
        collection_id: CollectionId,
        target: NodeId,
    ) -> Result<(), ExecutionError>;
}

/// Read-only view over the protocol state maintained by consensus.
/// Snapshots are consistent: identical queries produce identical answers.
pub trait ChainState: Send + Sync {
    /// Header of the latest finalized block.
    fn finalized_head(&self) -> Result<BlockHeader, ExecutionError>;

    /// Root block of the spork, the lowest block this node can know about.
    fn finalized_root(&self) -> Result<BlockHeader, ExecutionError>;

    /// Full block by id, if known.
    fn block_by_id(&self, id: &BlockId) -> Result<Option<Block>, ExecutionError>;

    /// Full finalized block at a height, if finalized.
    fn finalized_block_by_height(&self, height: u64) -> Result<Option<Block>, ExecutionError>;

    /// Members of the collection cluster committed to `guarantee`, resolved
    /// at the guarantee's reference block.
    fn cluster_for_guarantee(
        &self,
        guarantee: &CollectionGuarantee,
    ) -> Result<Vec<NodeId>, ExecutionError>;
}
