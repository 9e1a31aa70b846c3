// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! This module implements the execution ingestion controller.
//! See `meridian-execution-exports/controller_traits.rs` for functional
//! details.
//!
//! Mutations are posted to the worker thread through command channels so
//! entry points never block; queries read the shared state or the stop
//! controller directly.

use crate::commands::{FetcherCommand, IngestionCommand};
use crate::state::IngestionState;
use crate::stop::StopControl;
use meridian_channel::sender::MeridianSender;
use meridian_execution_exports::{
    ExecutionController, ExecutionError, ExecutionManager, StopParameters,
};
use meridian_models::block::Block;
use meridian_models::block_header::BlockHeader;
use meridian_models::collection::Collection;
use meridian_models::node::NodeId;
use parking_lot::RwLock;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{info, warn};

#[derive(Clone)]
/// implementation of the execution ingestion controller
pub struct ExecutionControllerImpl {
    pub(crate) command_tx: MeridianSender<IngestionCommand>,
    pub(crate) fetcher_tx: MeridianSender<FetcherCommand>,
    pub(crate) shared_state: Arc<RwLock<IngestionState>>,
    pub(crate) stop_control: StopControl,
}

impl ExecutionController for ExecutionControllerImpl {
    fn block_processable(&self, block: Block) {
        if let Err(err) = self
            .command_tx
            .send(IngestionCommand::BlockProcessable(block))
        {
            warn!("could not post processable block to ingestion: {}", err);
        }
    }

    fn collection_received(&self, origin: NodeId, collection: Collection) {
        if let Err(err) = self
            .fetcher_tx
            .send(FetcherCommand::CollectionReceived { origin, collection })
        {
            warn!("could not post received collection to fetcher: {}", err);
        }
    }

    fn block_finalized(&self, header: BlockHeader) {
        if let Err(err) = self
            .command_tx
            .send(IngestionCommand::BlockFinalized(header))
        {
            warn!("could not post finalization to ingestion: {}", err);
        }
    }

    fn set_stop_parameters(&self, params: StopParameters) -> Result<(), ExecutionError> {
        self.stop_control.set_stop_parameters(params)
    }

    fn clear_stop_parameters(&self) -> Result<(), ExecutionError> {
        self.stop_control.clear_stop_parameters()
    }

    fn get_stop_parameters(&self) -> Option<StopParameters> {
        self.stop_control.get_stop_parameters()
    }

    fn is_execution_stopped(&self) -> bool {
        self.stop_control.is_execution_stopped()
    }

    fn set_execution_paused(&self, paused: bool) {
        if let Err(err) = self.command_tx.send(IngestionCommand::SetPaused(paused)) {
            warn!("could not post pause toggle to ingestion: {}", err);
        }
    }

    fn is_execution_paused(&self) -> bool {
        self.shared_state.read().paused
    }

    /// Returns a boxed clone of self.
    /// Allows cloning `Box<dyn ExecutionController>`.
    fn clone_box(&self) -> Box<dyn ExecutionController> {
        Box::new(self.clone())
    }
}

/// Execution ingestion manager
/// Allows stopping the worker and joining every engine thread.
pub struct ExecutionManagerImpl {
    pub(crate) command_tx: MeridianSender<IngestionCommand>,
    pub(crate) fetcher_tx: MeridianSender<FetcherCommand>,
    pub(crate) ingestion_handle: Option<JoinHandle<()>>,
    pub(crate) fetcher_handle: Option<JoinHandle<()>>,
    pub(crate) executor_handles: Vec<JoinHandle<()>>,
}

impl ExecutionManager for ExecutionManagerImpl {
    fn stop(&mut self) {
        info!("stopping execution ingestion...");
        // the ingestion thread owns the job channel: joining it disconnects
        // the executors, which then drain and exit
        let _ = self.command_tx.send(IngestionCommand::Stop);
        if let Some(handle) = self.ingestion_handle.take() {
            handle
                .join()
                .expect("ingestion thread panicked on try to join");
        }
        let _ = self.fetcher_tx.send(FetcherCommand::Stop);
        if let Some(handle) = self.fetcher_handle.take() {
            handle
                .join()
                .expect("collection fetch thread panicked on try to join");
        }
        for handle in self.executor_handles.drain(..) {
            handle
                .join()
                .expect("execution worker thread panicked on try to join");
        }
        info!("execution ingestion stopped");
    }
}
