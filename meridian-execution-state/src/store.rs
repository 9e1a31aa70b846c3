// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! This module implements the state commitment store on top of the
//! key-value storage engine.

use crate::error::ExecutionStateError;
use crate::keys::{
    commitment_key, result_key, HIGHEST_EXECUTED_KEY, STOP_PARAMETERS_KEY,
};
use crate::result_meta::{ResultMeta, ResultMetaDeserializer, ResultMetaSerializer};
use meridian_db_exports::{DbBatch, ShareableDb};
use meridian_execution_exports::{
    ComputationResult, StopParameters, StopParametersDeserializer, StopParametersSerializer,
};
use meridian_models::block_id::{BlockId, BlockIdDeserializer, BlockIdSerializer};
use meridian_models::commitment::{
    StateCommitment, StateCommitmentDeserializer, StateCommitmentSerializer,
};
use meridian_models::result_id::ResultId;
use meridian_serialization::{
    DeserializeError, Deserializer, Serializer, U64VarIntDeserializer, U64VarIntSerializer,
};
use std::ops::Bound::Included;
use tracing::debug;

/// Store of everything the execution of a block leaves behind: its state
/// commitment, its chained result metadata and the highest-executed
/// watermark.
///
/// All writes of one block commit in a single atomic batch; concurrent
/// savers serialize on the database write lock, which makes the
/// check-then-write of `save_execution_results` race-free.
#[derive(Clone)]
pub struct ExecutionStateStore {
    db: ShareableDb,
}

impl ExecutionStateStore {
    /// Wrap the shared database handle.
    pub fn new(db: ShareableDb) -> Self {
        ExecutionStateStore { db }
    }

    /// The underlying database handle, shared with the caller.
    pub fn db_handle(&self) -> ShareableDb {
        self.db.clone()
    }

    /// Post-execution state commitment of `block_id`, if the block was
    /// executed. Safe under concurrent readers.
    pub fn state_commitment_by_block_id(
        &self,
        block_id: &BlockId,
    ) -> Result<Option<StateCommitment>, ExecutionStateError> {
        let value = self.db.read().get(&commitment_key(block_id))?;
        match value {
            None => Ok(None),
            Some(bytes) => {
                let (_, commitment) = StateCommitmentDeserializer::new()
                    .deserialize::<DeserializeError>(&bytes)
                    .map_err(|_| {
                        ExecutionStateError::CorruptedEntry(format!(
                            "commitment/{}",
                            block_id
                        ))
                    })?;
                Ok(Some(commitment))
            }
        }
    }

    /// Whether `block_id` was executed (has a persisted commitment).
    pub fn is_block_executed(&self, block_id: &BlockId) -> Result<bool, ExecutionStateError> {
        Ok(self.state_commitment_by_block_id(block_id)?.is_some())
    }

    /// Result id persisted for `block_id`, used to chain the next result.
    pub fn get_execution_result_id(
        &self,
        block_id: &BlockId,
    ) -> Result<Option<ResultId>, ExecutionStateError> {
        Ok(self.read_result_meta(block_id)?.map(|meta| meta.result_id))
    }

    /// Full persisted result metadata for `block_id`.
    pub fn read_result_meta(
        &self,
        block_id: &BlockId,
    ) -> Result<Option<ResultMeta>, ExecutionStateError> {
        let value = self.db.read().get(&result_key(block_id))?;
        match value {
            None => Ok(None),
            Some(bytes) => {
                let (_, meta) = ResultMetaDeserializer::new()
                    .deserialize::<DeserializeError>(&bytes)
                    .map_err(|_| {
                        ExecutionStateError::CorruptedEntry(format!("result/{}", block_id))
                    })?;
                Ok(Some(meta))
            }
        }
    }

    /// Height and id of the executed block with the greatest height.
    pub fn get_highest_executed_block(&self) -> Result<(u64, BlockId), ExecutionStateError> {
        let value = self
            .db
            .read()
            .get(HIGHEST_EXECUTED_KEY)?
            .ok_or(ExecutionStateError::NotBootstrapped)?;
        Self::parse_highest(&value)
    }

    fn parse_highest(bytes: &[u8]) -> Result<(u64, BlockId), ExecutionStateError> {
        let height_deserializer = U64VarIntDeserializer::new(Included(0), Included(u64::MAX));
        let block_id_deserializer = BlockIdDeserializer::new();
        let (rest, height) = height_deserializer
            .deserialize::<DeserializeError>(bytes)
            .map_err(|_| ExecutionStateError::CorruptedEntry("highest_executed".to_string()))?;
        let (_, block_id) = block_id_deserializer
            .deserialize::<DeserializeError>(rest)
            .map_err(|_| ExecutionStateError::CorruptedEntry("highest_executed".to_string()))?;
        Ok((height, block_id))
    }

    fn serialize_highest(
        height: u64,
        block_id: &BlockId,
    ) -> Result<Vec<u8>, ExecutionStateError> {
        let mut buffer = Vec::new();
        U64VarIntSerializer::new().serialize(&height, &mut buffer)?;
        BlockIdSerializer::new().serialize(block_id, &mut buffer)?;
        Ok(buffer)
    }

    /// Result id assigned to the sealed root at bootstrap time.
    pub fn root_result_id(block_id: &BlockId) -> ResultId {
        ResultId(meridian_hash::Hash::compute_from_tuple(&[
            b"sealed-root-result".as_slice(),
            block_id.to_bytes().as_slice(),
        ]))
    }

    /// Seed the store with the sealed root of the chain, including a
    /// synthetic root result so the first child can chain onto it. A no-op
    /// when the store already holds an executed block.
    pub fn bootstrap(
        &self,
        block_id: BlockId,
        height: u64,
        commitment: StateCommitment,
    ) -> Result<(), ExecutionStateError> {
        let mut db = self.db.write();
        if db.get(HIGHEST_EXECUTED_KEY)?.is_some() {
            return Ok(());
        }
        let mut batch = DbBatch::new();
        let mut commitment_bytes = Vec::new();
        StateCommitmentSerializer::new().serialize(&commitment, &mut commitment_bytes)?;
        db.put_or_update_entry_value(&mut batch, commitment_key(&block_id), &commitment_bytes);

        let root_meta = ResultMeta {
            result_id: Self::root_result_id(&block_id),
            previous_result_id: ResultId(meridian_hash::Hash::from_bytes(&[0u8; 32])),
            height,
            end_state: commitment,
            chunk_count: 0,
        };
        let mut meta_bytes = Vec::new();
        ResultMetaSerializer::new().serialize(&root_meta, &mut meta_bytes)?;
        db.put_or_update_entry_value(&mut batch, result_key(&block_id), &meta_bytes);

        db.put_or_update_entry_value(
            &mut batch,
            HIGHEST_EXECUTED_KEY.to_vec(),
            &Self::serialize_highest(height, &block_id)?,
        );
        db.write_batch(batch, None)?;
        debug!(
            "execution state bootstrapped at height {} block {}",
            height, block_id
        );
        Ok(())
    }

    /// Atomically persist a computation result: commitment, chained result
    /// metadata and (when the height advances) the highest-executed
    /// watermark, all in one batch.
    ///
    /// Collision policy is first-writer-wins: persisting the byte-identical
    /// result again is a silent success, persisting a *different* result for
    /// the same block fails with `ResultAlreadyExists` and mutates nothing.
    pub fn save_execution_results(
        &self,
        result: &ComputationResult,
    ) -> Result<(), ExecutionStateError> {
        let result_id = result.result_id();

        // the write lock spans the duplicate check and the commit, making
        // the check-then-write atomic with respect to concurrent savers
        let mut db = self.db.write();

        if let Some(existing) = db.get(&result_key(&result.block_id))? {
            let (_, existing_meta) = ResultMetaDeserializer::new()
                .deserialize::<DeserializeError>(&existing)
                .map_err(|_| {
                    ExecutionStateError::CorruptedEntry(format!("result/{}", result.block_id))
                })?;
            if existing_meta.result_id == result_id {
                return Ok(());
            }
            return Err(ExecutionStateError::ResultAlreadyExists(result.block_id));
        }

        let meta = ResultMeta {
            result_id,
            previous_result_id: result.previous_result_id,
            height: result.height,
            end_state: result.new_state_commitment,
            chunk_count: result.chunks.len() as u64,
        };

        let mut batch = DbBatch::new();

        let mut commitment_bytes = Vec::new();
        StateCommitmentSerializer::new()
            .serialize(&result.new_state_commitment, &mut commitment_bytes)?;
        db.put_or_update_entry_value(
            &mut batch,
            commitment_key(&result.block_id),
            &commitment_bytes,
        );

        let mut meta_bytes = Vec::new();
        ResultMetaSerializer::new().serialize(&meta, &mut meta_bytes)?;
        db.put_or_update_entry_value(&mut batch, result_key(&result.block_id), &meta_bytes);

        // the watermark only ever moves forward
        let advance = match db.get(HIGHEST_EXECUTED_KEY)? {
            None => true,
            Some(bytes) => Self::parse_highest(&bytes)?.0 < result.height,
        };
        if advance {
            db.put_or_update_entry_value(
                &mut batch,
                HIGHEST_EXECUTED_KEY.to_vec(),
                &Self::serialize_highest(result.height, &result.block_id)?,
            );
        }

        db.write_batch(batch, None)?;
        debug!(
            "persisted execution result {} for block {} at height {}",
            result_id, result.block_id, result.height
        );
        Ok(())
    }

    /// Currently persisted stop parameters, if any.
    pub fn get_stop_parameters(&self) -> Result<Option<StopParameters>, ExecutionStateError> {
        let value = self.db.read().get(STOP_PARAMETERS_KEY)?;
        match value {
            None => Ok(None),
            Some(bytes) => {
                let (_, params) = StopParametersDeserializer::new()
                    .deserialize::<DeserializeError>(&bytes)
                    .map_err(|_| {
                        ExecutionStateError::CorruptedEntry("stop/current".to_string())
                    })?;
                Ok(Some(params))
            }
        }
    }

    /// Persist or clear the stop parameters.
    pub fn set_stop_parameters(
        &self,
        params: Option<StopParameters>,
    ) -> Result<(), ExecutionStateError> {
        let mut db = self.db.write();
        let mut batch = DbBatch::new();
        match params {
            Some(params) => {
                let mut bytes = Vec::new();
                StopParametersSerializer::new().serialize(&params, &mut bytes)?;
                db.put_or_update_entry_value(&mut batch, STOP_PARAMETERS_KEY.to_vec(), &bytes);
            }
            None => {
                db.delete_key(&mut batch, STOP_PARAMETERS_KEY.to_vec());
            }
        }
        db.write_batch(batch, None)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_db_exports::test_exports::MemoryDb;
    use meridian_execution_exports::test_exports::{commitment_for, node_id_fixture};
    use meridian_hash::Hash;
    use meridian_models::node::NodeId;
    use std::thread;

    fn result_fixture(tag: &str, height: u64, executor: NodeId) -> ComputationResult {
        let block_id = BlockId(Hash::compute_from(tag.as_bytes()));
        ComputationResult {
            block_id,
            height,
            previous_result_id: ResultId(Hash::compute_from(b"previous")),
            chunks: vec![],
            events: vec![],
            service_events: vec![],
            transaction_results: vec![],
            new_state_commitment: commitment_for(&block_id),
            executor_id: executor,
        }
    }

    fn store_fixture() -> ExecutionStateStore {
        ExecutionStateStore::new(MemoryDb::new_shareable())
    }

    #[test]
    fn test_absent_commitment_is_none() {
        let store = store_fixture();
        let block_id = BlockId(Hash::compute_from(b"nowhere"));
        assert!(store
            .state_commitment_by_block_id(&block_id)
            .unwrap()
            .is_none());
        assert!(!store.is_block_executed(&block_id).unwrap());
    }

    #[test]
    fn test_save_then_lookup() {
        let store = store_fixture();
        let result = result_fixture("a", 1, node_id_fixture("me"));
        store.save_execution_results(&result).unwrap();

        assert_eq!(
            store
                .state_commitment_by_block_id(&result.block_id)
                .unwrap(),
            Some(result.new_state_commitment)
        );
        assert_eq!(
            store.get_execution_result_id(&result.block_id).unwrap(),
            Some(result.result_id())
        );
        assert_eq!(
            store.get_highest_executed_block().unwrap(),
            (1, result.block_id)
        );
    }

    #[test]
    fn test_same_result_twice_is_idempotent() {
        let store = store_fixture();
        let result = result_fixture("a", 1, node_id_fixture("me"));
        store.save_execution_results(&result).unwrap();
        store.save_execution_results(&result).unwrap();
    }

    #[test]
    fn test_different_executor_receipt_rejected() {
        let store = store_fixture();
        let winner = result_fixture("a", 1, node_id_fixture("executor-1"));
        let mut loser = winner.clone();
        loser.executor_id = node_id_fixture("executor-2");
        // same block, same post-state, different executor: distinct result id
        store.save_execution_results(&winner).unwrap();
        match store.save_execution_results(&loser) {
            Err(ExecutionStateError::ResultAlreadyExists(id)) => {
                assert_eq!(id, winner.block_id)
            }
            other => panic!("expected ResultAlreadyExists, got {:?}", other),
        }
        // the stored commitment is the winner's
        assert_eq!(
            store.read_result_meta(&winner.block_id).unwrap().unwrap().result_id,
            winner.result_id()
        );
    }

    #[test]
    fn test_concurrent_racing_receipts_one_winner() {
        let store = store_fixture();
        let result1 = result_fixture("a", 1, node_id_fixture("executor-1"));
        let mut result2 = result1.clone();
        result2.executor_id = node_id_fixture("executor-2");

        let store1 = store.clone();
        let store2 = store.clone();
        let r1 = result1.clone();
        let r2 = result2.clone();
        let handle1 = thread::spawn(move || store1.save_execution_results(&r1));
        let handle2 = thread::spawn(move || store2.save_execution_results(&r2));
        let outcomes = [handle1.join().unwrap(), handle2.join().unwrap()];

        let failures = outcomes.iter().filter(|outcome| outcome.is_err()).count();
        assert_eq!(failures, 1, "exactly one of the racing saves must fail");

        let stored = store
            .read_result_meta(&result1.block_id)
            .unwrap()
            .unwrap()
            .result_id;
        assert!(stored == result1.result_id() || stored == result2.result_id());
    }

    #[test]
    fn test_highest_executed_is_monotone() {
        let store = store_fixture();
        let high = result_fixture("high", 5, node_id_fixture("me"));
        let low = result_fixture("low", 3, node_id_fixture("me"));
        store.save_execution_results(&high).unwrap();
        store.save_execution_results(&low).unwrap();
        assert_eq!(
            store.get_highest_executed_block().unwrap(),
            (5, high.block_id)
        );
    }

    #[test]
    fn test_bootstrap_once() {
        let store = store_fixture();
        let genesis = BlockId(Hash::compute_from(b"genesis"));
        let commitment = StateCommitment([3u8; 32]);
        store.bootstrap(genesis, 0, commitment).unwrap();
        assert_eq!(store.get_highest_executed_block().unwrap(), (0, genesis));
        // the root carries a synthetic result to chain the first child onto
        assert_eq!(
            store.get_execution_result_id(&genesis).unwrap(),
            Some(ExecutionStateStore::root_result_id(&genesis))
        );

        // bootstrapping again must not rewind anything
        let other = BlockId(Hash::compute_from(b"other"));
        store.bootstrap(other, 0, StateCommitment([4u8; 32])).unwrap();
        assert_eq!(store.get_highest_executed_block().unwrap(), (0, genesis));
        assert!(store.state_commitment_by_block_id(&other).unwrap().is_none());
    }

    #[test]
    fn test_failed_write_leaves_no_partial_state() {
        let db = MemoryDb::new();
        db.fail_next_write();
        let shareable: ShareableDb = std::sync::Arc::new(parking_lot::RwLock::new(
            Box::new(db) as Box<dyn meridian_db_exports::DbController>,
        ));
        let store = ExecutionStateStore::new(shareable);
        let result = result_fixture("a", 1, node_id_fixture("me"));
        assert!(store.save_execution_results(&result).is_err());
        // neither the commitment nor the metadata became visible
        assert!(store
            .state_commitment_by_block_id(&result.block_id)
            .unwrap()
            .is_none());
        assert!(store.read_result_meta(&result.block_id).unwrap().is_none());
        assert!(matches!(
            store.get_highest_executed_block(),
            Err(ExecutionStateError::NotBootstrapped)
        ));
    }

    #[test]
    fn test_stop_parameters_persist_and_clear() {
        let store = store_fixture();
        assert!(store.get_stop_parameters().unwrap().is_none());
        let params = StopParameters {
            stop_before_height: 9,
            set_at_millis: 1,
        };
        store.set_stop_parameters(Some(params)).unwrap();
        assert_eq!(store.get_stop_parameters().unwrap(), Some(params));
        store.set_stop_parameters(None).unwrap();
        assert!(store.get_stop_parameters().unwrap().is_none());
    }
}
