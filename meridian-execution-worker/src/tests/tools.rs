// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! Test universe: a fully wired ingestion worker whose collaborators are all
//! programmable fakes.

use crate::worker::start_execution_worker;
use meridian_db_exports::test_exports::MemoryDb;
use meridian_db_exports::ShareableDb;
use meridian_execution_exports::test_exports::{
    commitment_for, default_testing_config, genesis_block, node_id_fixture, ComputeCall,
    MockBlockComputer, MockChainState, MockCollectionRequester, MockUploader,
};
use meridian_execution_exports::{
    ExecutionChannels, ExecutionController, ExecutionEvent, ExecutionManager,
};
use meridian_execution_state::ExecutionStateStore;
use meridian_models::block::Block;
use meridian_models::block_id::BlockId;
use meridian_models::collection::{Collection, CollectionId};
use meridian_models::node::NodeId;
use meridian_storage::Storage;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How long a test waits for engine activity before giving up.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);
/// How long a test observes silence before declaring "nothing happened".
pub const SILENCE_TIMEOUT: Duration = Duration::from_millis(200);

pub struct TestUniverse {
    pub controller: Box<dyn ExecutionController>,
    pub manager: Box<dyn ExecutionManager>,
    pub computer: Arc<MockBlockComputer>,
    pub compute_rx: Receiver<ComputeCall>,
    pub request_rx: Receiver<(CollectionId, NodeId)>,
    pub uploader: Arc<MockUploader>,
    pub chain_state: MockChainState,
    pub store: ExecutionStateStore,
    pub storage: Storage,
    pub event_rx: crossbeam_channel::Receiver<ExecutionEvent>,
    pub genesis: Block,
    pub cluster_member: NodeId,
}

impl TestUniverse {
    /// A fresh universe over a fresh database.
    pub fn new() -> Self {
        Self::over_db(MemoryDb::new_shareable(), None)
    }

    /// A universe over an existing database (and optionally an existing
    /// chain state), as after a process restart.
    pub fn over_db(db: ShareableDb, chain_state: Option<MockChainState>) -> Self {
        let genesis = genesis_block();
        let cluster_member = node_id_fixture("collection-node-0");
        let chain_state = chain_state.unwrap_or_else(|| {
            MockChainState::new(
                genesis.clone(),
                vec![cluster_member, node_id_fixture("collection-node-1")],
            )
        });

        let store = ExecutionStateStore::new(db.clone());
        store
            .bootstrap(genesis.id(), 0, commitment_for(&genesis.id()))
            .unwrap();

        let (computer, compute_rx) =
            MockBlockComputer::new_with_receiver(node_id_fixture("executor"));
        let (requester, request_rx) = MockCollectionRequester::new_with_receiver();
        let (uploader, _upload_rx) = MockUploader::new_with_receiver("primary");
        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        let storage = Storage::new();

        let mut config = default_testing_config();
        config.chain_id = genesis.header.chain_id;

        let (controller, manager) = start_execution_worker(
            config,
            ExecutionChannels {
                controller_event_tx: event_tx,
            },
            Arc::new(chain_state.clone()),
            computer.clone(),
            requester,
            vec![uploader.clone()],
            storage.clone(),
            db,
        );

        TestUniverse {
            controller,
            manager,
            computer,
            compute_rx,
            request_rx,
            uploader,
            chain_state,
            store,
            storage,
            event_rx,
            genesis,
            cluster_member,
        }
    }

    /// Register a block with the protocol state and announce it to the
    /// engine.
    pub fn announce(&self, block: &Block) {
        self.chain_state.register_block(block);
        self.controller.block_processable(block.clone());
    }

    /// Finalize a registered block and deliver the finalization event.
    pub fn finalize(&self, block: &Block) {
        self.chain_state.register_block(block);
        let header = self.chain_state.finalize_block(&block.id());
        self.controller.block_finalized(header);
    }

    /// Deliver a collection from a legitimate cluster member.
    pub fn deliver_collection(&self, collection: &Collection) {
        self.controller
            .collection_received(self.cluster_member, collection.clone());
    }

    /// Wait until `block_id` is reported executed on the event channel.
    pub fn wait_executed(&self, block_id: &BlockId) {
        let deadline = Instant::now() + WAIT_TIMEOUT;
        loop {
            let remaining = deadline
                .checked_duration_since(Instant::now())
                .unwrap_or_else(|| panic!("timed out waiting for execution of {}", block_id));
            match self.event_rx.recv_timeout(remaining) {
                Ok(ExecutionEvent::BlockExecuted {
                    block_id: executed, ..
                }) if executed == *block_id => return,
                Ok(_) => continue,
                Err(_) => panic!("timed out waiting for execution of {}", block_id),
            }
        }
    }

    /// Wait until the engine reports the execution-stopped latch.
    pub fn wait_execution_stopped(&self) {
        let deadline = Instant::now() + WAIT_TIMEOUT;
        loop {
            let remaining = deadline
                .checked_duration_since(Instant::now())
                .unwrap_or_else(|| panic!("timed out waiting for execution stop"));
            match self.event_rx.recv_timeout(remaining) {
                Ok(ExecutionEvent::ExecutionStopped { .. }) => return,
                Ok(_) => continue,
                Err(_) => panic!("timed out waiting for execution stop"),
            }
        }
    }

    /// Wait until the engine reports a fatal error.
    pub fn wait_fatal_error(&self) -> String {
        let deadline = Instant::now() + WAIT_TIMEOUT;
        loop {
            let remaining = deadline
                .checked_duration_since(Instant::now())
                .unwrap_or_else(|| panic!("timed out waiting for fatal error"));
            match self.event_rx.recv_timeout(remaining) {
                Ok(ExecutionEvent::FatalError { message }) => return message,
                Ok(_) => continue,
                Err(_) => panic!("timed out waiting for fatal error"),
            }
        }
    }

    /// Wait until `compute_block` has been invoked for `block_id`.
    pub fn wait_compute_started(&self, block_id: &BlockId) -> ComputeCall {
        let deadline = Instant::now() + WAIT_TIMEOUT;
        loop {
            let remaining = deadline
                .checked_duration_since(Instant::now())
                .unwrap_or_else(|| panic!("timed out waiting for computation of {}", block_id));
            match self.compute_rx.recv_timeout(remaining) {
                Ok(call) if call.block_id == *block_id => return call,
                Ok(_) => continue,
                Err(_) => panic!("timed out waiting for computation of {}", block_id),
            }
        }
    }

    /// Wait until a collection request is observed on the transport.
    pub fn wait_collection_requested(&self, collection_id: &CollectionId) -> NodeId {
        let deadline = Instant::now() + WAIT_TIMEOUT;
        loop {
            let remaining = deadline
                .checked_duration_since(Instant::now())
                .unwrap_or_else(|| panic!("timed out waiting for request of {}", collection_id));
            match self.request_rx.recv_timeout(remaining) {
                Ok((requested, target)) if requested == *collection_id => return target,
                Ok(_) => continue,
                Err(_) => panic!("timed out waiting for request of {}", collection_id),
            }
        }
    }

    /// Let the engine run for the silence window, then assert the given
    /// block was never computed.
    pub fn assert_never_computed(&self, block_id: &BlockId) {
        std::thread::sleep(SILENCE_TIMEOUT);
        assert_eq!(
            self.computer.call_count(block_id),
            0,
            "block {} must not be computed",
            block_id
        );
    }

    /// Stop the worker and join its threads.
    pub fn shutdown(mut self) {
        self.manager.stop();
    }
}
