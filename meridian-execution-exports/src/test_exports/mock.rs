// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! This file defines programmable fakes for every collaborator of the
//! ingestion engine. Each fake records the calls it receives and emits them
//! on an mpsc channel so tests can wait for engine activity with a timeout
//! instead of sleeping.

use crate::error::ExecutionError;
use crate::test_exports::tools::commitment_for;
use crate::types::{Chunk, ComputationResult, ExecutableBlock};
use crate::{BlockComputer, ChainState, CollectionRequester, Uploader};
use meridian_models::block::Block;
use meridian_models::block_header::BlockHeader;
use meridian_models::block_id::BlockId;
use meridian_models::collection::{CollectionGuarantee, CollectionId};
use meridian_models::commitment::StateCommitment;
use meridian_models::node::NodeId;
use meridian_models::prehash::{PreHashMap, PreHashSet};
use meridian_models::result_id::ResultId;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

/// One recorded `compute_block` invocation.
#[derive(Debug, Clone)]
pub struct ComputeCall {
    /// computed block
    pub block_id: BlockId,
    /// previous result id passed by the engine
    pub previous_result_id: ResultId,
    /// start state carried by the executable block
    pub start_state: Option<StateCommitment>,
}

/// A computation layer fake: produces deterministic commitments
/// (`commitment_for(block_id)`), can hold a block's computation open to
/// provoke races, and can fail on demand.
pub struct MockBlockComputer {
    executor_id: NodeId,
    calls: Mutex<Vec<ComputeCall>>,
    gates: Mutex<PreHashMap<BlockId, Receiver<()>>>,
    failing: Mutex<PreHashSet<BlockId>>,
    notify_tx: Mutex<Sender<ComputeCall>>,
}

impl MockBlockComputer {
    /// Create the fake together with the receiver of recorded calls.
    pub fn new_with_receiver(executor_id: NodeId) -> (Arc<Self>, Receiver<ComputeCall>) {
        let (tx, rx) = mpsc::channel();
        (
            Arc::new(MockBlockComputer {
                executor_id,
                calls: Mutex::new(Vec::new()),
                gates: Mutex::new(PreHashMap::default()),
                failing: Mutex::new(PreHashSet::default()),
                notify_tx: Mutex::new(tx),
            }),
            rx,
        )
    }

    /// Hold the computation of `block_id` open: `compute_block` will not
    /// return until the returned sender is used or dropped.
    pub fn hold_block(&self, block_id: BlockId) -> Sender<()> {
        let (tx, rx) = mpsc::channel();
        self.gates.lock().insert(block_id, rx);
        tx
    }

    /// Make the computation of `block_id` fail.
    pub fn fail_block(&self, block_id: BlockId) {
        self.failing.lock().insert(block_id);
    }

    /// Every recorded call, in invocation order.
    pub fn calls(&self) -> Vec<ComputeCall> {
        self.calls.lock().clone()
    }

    /// Number of times `compute_block` ran for `block_id`.
    pub fn call_count(&self, block_id: &BlockId) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| &call.block_id == block_id)
            .count()
    }

    fn build_result(&self, previous_result_id: ResultId, block: &ExecutableBlock) -> ComputationResult {
        let end_state = commitment_for(&block.id());
        let mut chunks = Vec::with_capacity(block.block.guarantees.len());
        let mut running_state = block.start_state.unwrap_or_default();
        for (index, guarantee) in block.block.guarantees.iter().enumerate() {
            let number_of_transactions = block
                .collections
                .get(&guarantee.collection_id)
                .map(|collection| collection.transactions.len() as u32)
                .unwrap_or(0);
            chunks.push(Chunk {
                index: index as u32,
                collection_id: guarantee.collection_id,
                start_state: running_state,
                end_state,
                number_of_transactions,
            });
            running_state = end_state;
        }
        ComputationResult {
            block_id: block.id(),
            height: block.height(),
            previous_result_id,
            chunks,
            events: vec![],
            service_events: vec![],
            transaction_results: vec![],
            new_state_commitment: end_state,
            executor_id: self.executor_id,
        }
    }
}

impl BlockComputer for MockBlockComputer {
    fn compute_block(
        &self,
        previous_result_id: ResultId,
        block: &ExecutableBlock,
    ) -> Result<ComputationResult, ExecutionError> {
        let call = ComputeCall {
            block_id: block.id(),
            previous_result_id,
            start_state: block.start_state,
        };
        self.calls.lock().push(call.clone());
        let _ = self.notify_tx.lock().send(call);

        // park here while the test holds the gate open
        let gate = self.gates.lock().remove(&block.id());
        if let Some(gate) = gate {
            let _ = gate.recv();
        }

        if self.failing.lock().contains(&block.id()) {
            return Err(ExecutionError::ComputationError(format!(
                "injected computation failure for {}",
                block.id()
            )));
        }
        Ok(self.build_result(previous_result_id, block))
    }
}

/// Shared content of the protocol-state fake.
struct ChainStateData {
    blocks: PreHashMap<BlockId, Block>,
    finalized_by_height: BTreeMap<u64, BlockId>,
    cluster: Vec<NodeId>,
    root_id: BlockId,
}

/// A programmable protocol-state view: register blocks, then finalize them
/// in any order the test needs.
#[derive(Clone)]
pub struct MockChainState(Arc<Mutex<ChainStateData>>);

impl MockChainState {
    /// Create a chain state whose root (and finalized head) is `genesis`.
    pub fn new(genesis: Block, cluster: Vec<NodeId>) -> Self {
        let root_id = genesis.id();
        let mut blocks = PreHashMap::default();
        let mut finalized_by_height = BTreeMap::new();
        finalized_by_height.insert(genesis.header.height, root_id);
        blocks.insert(root_id, genesis);
        MockChainState(Arc::new(Mutex::new(ChainStateData {
            blocks,
            finalized_by_height,
            cluster,
            root_id,
        })))
    }

    /// Make a block known to the protocol state (not yet finalized).
    pub fn register_block(&self, block: &Block) {
        self.0.lock().blocks.insert(block.id(), block.clone());
    }

    /// Members of the configured guarantor cluster.
    pub fn cluster_members(&self) -> Vec<NodeId> {
        self.0.lock().cluster.clone()
    }

    /// Mark a registered block as finalized.
    pub fn finalize_block(&self, block_id: &BlockId) -> BlockHeader {
        let mut data = self.0.lock();
        let block = data
            .blocks
            .get(block_id)
            .expect("finalizing an unregistered block")
            .clone();
        data.finalized_by_height
            .insert(block.header.height, *block_id);
        block.header
    }
}

impl ChainState for MockChainState {
    fn finalized_head(&self) -> Result<BlockHeader, ExecutionError> {
        let data = self.0.lock();
        let (_, id) = data
            .finalized_by_height
            .iter()
            .next_back()
            .ok_or_else(|| ExecutionError::ChainStateError("no finalized block".to_string()))?;
        Ok(data.blocks[id].header.clone())
    }

    fn finalized_root(&self) -> Result<BlockHeader, ExecutionError> {
        let data = self.0.lock();
        let root_id = data.root_id;
        Ok(data.blocks[&root_id].header.clone())
    }

    fn block_by_id(&self, id: &BlockId) -> Result<Option<Block>, ExecutionError> {
        Ok(self.0.lock().blocks.get(id).cloned())
    }

    fn finalized_block_by_height(&self, height: u64) -> Result<Option<Block>, ExecutionError> {
        let data = self.0.lock();
        Ok(data
            .finalized_by_height
            .get(&height)
            .and_then(|id| data.blocks.get(id))
            .cloned())
    }

    fn cluster_for_guarantee(
        &self,
        _guarantee: &CollectionGuarantee,
    ) -> Result<Vec<NodeId>, ExecutionError> {
        Ok(self.0.lock().cluster.clone())
    }
}

/// A transport fake recording every issued collection request.
pub struct MockCollectionRequester {
    requests: Mutex<Vec<(CollectionId, NodeId)>>,
    notify_tx: Mutex<Sender<(CollectionId, NodeId)>>,
}

impl MockCollectionRequester {
    /// Create the fake together with the receiver of recorded requests.
    pub fn new_with_receiver() -> (Arc<Self>, Receiver<(CollectionId, NodeId)>) {
        let (tx, rx) = mpsc::channel();
        (
            Arc::new(MockCollectionRequester {
                requests: Mutex::new(Vec::new()),
                notify_tx: Mutex::new(tx),
            }),
            rx,
        )
    }

    /// Every recorded request, in issue order.
    pub fn requests(&self) -> Vec<(CollectionId, NodeId)> {
        self.requests.lock().clone()
    }
}

impl CollectionRequester for MockCollectionRequester {
    fn request_collection(
        &self,
        collection_id: CollectionId,
        target: NodeId,
    ) -> Result<(), ExecutionError> {
        self.requests.lock().push((collection_id, target));
        let _ = self.notify_tx.lock().send((collection_id, target));
        Ok(())
    }
}

/// An upload sink fake, optionally failing every upload.
pub struct MockUploader {
    name: String,
    fail_all: Mutex<bool>,
    uploaded: Mutex<Vec<BlockId>>,
    notify_tx: Mutex<Sender<BlockId>>,
}

impl MockUploader {
    /// Create the fake together with the receiver of uploaded block ids.
    pub fn new_with_receiver(name: &str) -> (Arc<Self>, Receiver<BlockId>) {
        let (tx, rx) = mpsc::channel();
        (
            Arc::new(MockUploader {
                name: name.to_string(),
                fail_all: Mutex::new(false),
                uploaded: Mutex::new(Vec::new()),
                notify_tx: Mutex::new(tx),
            }),
            rx,
        )
    }

    /// Make every subsequent upload fail.
    pub fn fail_uploads(&self) {
        *self.fail_all.lock() = true;
    }

    /// Block ids uploaded so far, in order.
    pub fn uploaded(&self) -> Vec<BlockId> {
        self.uploaded.lock().clone()
    }
}

impl Uploader for MockUploader {
    fn upload(&self, result: &ComputationResult) -> Result<(), ExecutionError> {
        self.uploaded.lock().push(result.block_id);
        let _ = self.notify_tx.lock().send(result.block_id);
        if *self.fail_all.lock() {
            return Err(ExecutionError::UploadError(format!(
                "uploader {} failed for {}",
                self.name, result.block_id
            )));
        }
        Ok(())
    }
}
