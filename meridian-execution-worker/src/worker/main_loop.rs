// Copyright (c) 2022 MASSA LABS <info@massa.net>

use super::ExecutionWorker;
use crate::commands::{FetcherCommand, IngestionCommand};
use crate::executor::ExecutionJob;
use meridian_execution_exports::{ExecutableBlock, ExecutionError, ExecutionEvent};
use meridian_models::block::Block;
use meridian_models::block_header::BlockHeader;
use meridian_models::block_id::BlockId;
use meridian_models::collection::CollectionId;
use meridian_models::commitment::StateCommitment;
use tracing::{debug, error, info, warn};

impl ExecutionWorker {
    /// Runs in a loop until a stop command, a channel disconnection or a
    /// fatal error.
    pub(crate) fn run(&mut self) {
        if let Err(err) = self.init() {
            self.fatal(format!("ingestion startup failed: {}", err));
            return;
        }
        loop {
            match self.command_receiver.recv() {
                Ok(command) => {
                    if !self.manage_command(command) {
                        break;
                    }
                }
                // channel disconnected (sender dropped) => quit main loop
                Err(_) => break,
            }
        }
        info!("execution ingestion loop exited");
    }

    /// Execute one command.
    ///
    /// # Returns
    /// true if the loop should continue, false if it should stop.
    fn manage_command(&mut self, command: IngestionCommand) -> bool {
        match command {
            IngestionCommand::BlockProcessable(block) => {
                self.on_block_processable(block);
                self.dispatch_ready();
            }
            IngestionCommand::CollectionStored {
                collection_id,
                blocks,
            } => {
                self.on_collection_stored(collection_id, blocks);
                self.dispatch_ready();
            }
            IngestionCommand::BlockFinalized(header) => {
                self.on_block_finalized(header);
                self.dispatch_ready();
            }
            IngestionCommand::ExecutionDone {
                block_id,
                height,
                commitment,
            } => {
                self.on_execution_done(block_id, height, commitment);
                self.dispatch_ready();
            }
            IngestionCommand::ExecutionFailed { block_id, error } => {
                self.on_execution_failed(block_id, error);
            }
            IngestionCommand::SetPaused(paused) => {
                self.shared_state.write().paused = paused;
                info!("execution dispatch paused: {}", paused);
                if !paused {
                    self.dispatch_ready();
                }
            }
            IngestionCommand::Stop => return false,
        }
        !self.fatal_hit
    }

    /// Track a processable block: enqueue it, ask for its missing
    /// collections and look up the parent's post-state.
    pub(super) fn on_block_processable(&mut self, block: Block) {
        let block_id = block.id();
        if block.header.chain_id != self.config.chain_id {
            warn!(
                "dropping block {} from foreign chain {:?}",
                block_id, block.header.chain_id
            );
            self.metrics.inc_operational_errors();
            return;
        }
        if block.header.height == 0 {
            debug!("ignoring root block {}", block_id);
            return;
        }

        // an executed block re-announced after a reload is a no-op
        match self.store.is_block_executed(&block_id) {
            Ok(true) => {
                debug!("block {} already executed, ignoring", block_id);
                return;
            }
            Ok(false) => {}
            Err(err) => {
                self.fatal(format!(
                    "could not check execution status of block {}: {}",
                    block_id, err
                ));
                return;
            }
        }

        let parent_id = block.header.parent_id;
        let guarantees = block.guarantees.clone();
        let executable = ExecutableBlock::new(block);

        let added = self.shared_state.write().queue.enqueue(executable);
        if !added {
            return;
        }
        debug!("tracking block {} at parent {}", block_id, parent_id);

        if !guarantees.is_empty() {
            if let Err(err) = self.fetcher_tx.send(FetcherCommand::EnsureCollections {
                block_id,
                guarantees,
            }) {
                warn!(
                    "could not ask fetcher for collections of block {}: {}",
                    block_id, err
                );
            }
        }

        match self.store.state_commitment_by_block_id(&parent_id) {
            Ok(Some(commitment)) => {
                self.shared_state
                    .write()
                    .queue
                    .set_start_state(&block_id, commitment);
            }
            Ok(None) => {
                // the parent is pending; its completion will propagate the
                // start state through the queue
            }
            Err(err) => {
                self.fatal(format!(
                    "could not look up parent commitment of block {}: {}",
                    block_id, err
                ));
            }
        }
    }

    /// A collection reached storage: fill it into every waiting block.
    fn on_collection_stored(&mut self, collection_id: CollectionId, blocks: Vec<BlockId>) {
        let Some(collection) = self.storage.retrieve_collection(&collection_id) else {
            warn!(
                "fetcher reported collection {} stored but it is not in storage",
                collection_id
            );
            self.metrics.inc_operational_errors();
            return;
        };
        let mut state = self.shared_state.write();
        for block_id in blocks {
            if state
                .queue
                .store_collection(&block_id, collection_id, collection.clone())
            {
                debug!("block {} is complete", block_id);
            }
        }
    }

    /// A finalization event: maybe arm the stop, then catch up on newly
    /// finalized blocks.
    fn on_block_finalized(&mut self, header: BlockHeader) {
        if self.stop_control.on_block_finalized(&header) {
            self.emit_execution_stopped();
        }
        match self.loader.load_unexecuted() {
            Ok(blocks) => {
                for block in blocks {
                    self.on_block_processable(block);
                }
            }
            Err(ExecutionError::InvariantViolation(message)) => {
                self.fatal(message);
            }
            Err(err) => {
                warn!("loader could not catch up after finalization: {}", err);
                self.metrics.inc_operational_errors();
            }
        }
    }

    /// A block finished executing and its results are durable.
    fn on_execution_done(
        &mut self,
        block_id: BlockId,
        height: u64,
        commitment: StateCommitment,
    ) {
        let children = self
            .shared_state
            .write()
            .queue
            .on_executed(&block_id, commitment);
        debug!(
            "block {} executed at height {}, {} dependent(s) released",
            block_id,
            height,
            children.len()
        );
        if self.stop_control.on_block_executed(&block_id, height) {
            self.emit_execution_stopped();
        }
        self.emit_event(ExecutionEvent::BlockExecuted {
            block_id,
            commitment,
        });
    }

    /// Computation or persistence failed: the engine cannot continue past
    /// this safely.
    fn on_execution_failed(&mut self, block_id: BlockId, error: ExecutionError) {
        self.shared_state.write().queue.on_fatal(&block_id);
        self.fatal(format!("execution of block {} failed: {}", block_id, error));
    }

    /// Hand every ready block to the executor pool, in height-then-id order.
    pub(super) fn dispatch_ready(&mut self) {
        if self.fatal_hit || self.shared_state.read().paused {
            return;
        }
        let stop_control = self.stop_control.clone();
        let ready = self
            .shared_state
            .read()
            .queue
            .ready_blocks(|height| stop_control.should_execute(height));

        for block_id in ready {
            let Some(block) = self.shared_state.write().queue.start_executing(&block_id)
            else {
                continue;
            };
            let parent_id = block.parent_id();
            let previous_result_id = match self.store.get_execution_result_id(&parent_id) {
                Ok(Some(result_id)) => result_id,
                Ok(None) => {
                    self.fatal(format!(
                        "parent {} of dispatched block {} is executed but has no result",
                        parent_id, block_id
                    ));
                    return;
                }
                Err(err) => {
                    self.fatal(format!(
                        "could not chain result of parent {}: {}",
                        parent_id, err
                    ));
                    return;
                }
            };
            debug!("dispatching block {} for execution", block_id);
            if let Err(err) = self.job_tx.send(ExecutionJob {
                block,
                previous_result_id,
            }) {
                warn!("could not dispatch block {}: {}", block_id, err);
            }
        }
    }

    fn emit_execution_stopped(&self) {
        let stop_before_height = self
            .stop_control
            .get_stop_parameters()
            .map(|params| params.stop_before_height)
            .unwrap_or_default();
        self.emit_event(ExecutionEvent::ExecutionStopped { stop_before_height });
    }

    fn emit_event(&self, event: ExecutionEvent) {
        if let Err(err) = self.channels.controller_event_tx.send(event) {
            warn!("could not send execution event: {}", err);
        }
    }

    /// Report an irrecoverable failure and schedule the loop to end.
    fn fatal(&mut self, message: String) {
        error!("{}", message);
        self.metrics.inc_fatal_errors();
        self.emit_event(ExecutionEvent::FatalError { message });
        self.fatal_hit = true;
    }
}
