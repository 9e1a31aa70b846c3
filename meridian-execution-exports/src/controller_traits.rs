// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! This module exports the traits used by the rest of the node to interact
//! with the execution ingestion engine.

use crate::error::ExecutionError;
use crate::types::StopParameters;
use meridian_models::block::Block;
use meridian_models::block_header::BlockHeader;
use meridian_models::collection::Collection;
use meridian_models::node::NodeId;

/// interface that communicates with the ingestion worker thread
pub trait ExecutionController: Send + Sync {
    /// Notify that a finalized block can be processed.
    /// Non-blocking: the work is queued and picked up by the worker.
    ///
    /// # Arguments
    /// * `block`: the processable block, payload included
    fn block_processable(&self, block: Block);

    /// Deliver a collection received from a collection node.
    /// Non-blocking; duplicate and unsolicited deliveries are no-ops.
    ///
    /// # Arguments
    /// * `origin`: the peer the collection came from
    /// * `collection`: the collection itself
    fn collection_received(&self, origin: NodeId, collection: Collection);

    /// Notify that consensus finalized a block.
    fn block_finalized(&self, header: BlockHeader);

    /// Install a stop point: no block at height >= `params.stop_before_height`
    /// will execute once that height is finalized.
    ///
    /// Refused when a previously configured stop is already armed.
    fn set_stop_parameters(&self, params: StopParameters) -> Result<(), ExecutionError>;

    /// Remove a pending stop point. Refused once the stop is armed.
    fn clear_stop_parameters(&self) -> Result<(), ExecutionError>;

    /// Currently configured stop point, if any.
    fn get_stop_parameters(&self) -> Option<StopParameters>;

    /// Whether the armed stop has fully taken effect: nothing below the stop
    /// height is still executing and nothing at or above it ever will.
    fn is_execution_stopped(&self) -> bool;

    /// Pause or resume dispatching of ready blocks. While paused, blocks
    /// keep accumulating in the queue.
    fn set_execution_paused(&self, paused: bool);

    /// Whether dispatching is currently paused.
    fn is_execution_paused(&self) -> bool;

    /// Returns a boxed clone of self.
    /// Useful to allow cloning `Box<dyn ExecutionController>`.
    fn clone_box(&self) -> Box<dyn ExecutionController>;
}

/// Allow cloning `Box<dyn ExecutionController>`
/// Used in `ExecutionChannels` and other shared structures.
impl Clone for Box<dyn ExecutionController> {
    fn clone(&self) -> Box<dyn ExecutionController> {
        self.clone_box()
    }
}

/// execution manager used to stop the execution thread
pub trait ExecutionManager {
    /// stop the worker and join its threads
    fn stop(&mut self);
}
