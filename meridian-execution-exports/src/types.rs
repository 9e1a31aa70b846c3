// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! This module exports generic types used by the execution ingestion engine
//! and its collaborators.

use meridian_hash::Hash;
use meridian_models::block::Block;
use meridian_models::block_id::BlockId;
use meridian_models::collection::{Collection, CollectionId, TransactionId};
use meridian_models::commitment::StateCommitment;
use meridian_models::node::NodeId;
use meridian_models::prehash::{PreHashMap, PreHashSet};
use meridian_models::result_id::ResultId;
use meridian_serialization::{
    Deserializer, SerializeError, Serializer, U64VarIntDeserializer, U64VarIntSerializer,
};
use nom::error::{context, ContextError, ParseError};
use nom::IResult;
use serde::{Deserialize, Serialize};
use std::ops::Bound::Included;

/// A block in the process of becoming executable: the header and payload are
/// known, the guaranteed collections are filled in as they arrive, and the
/// start state is set once the parent's post-state is known.
#[derive(Clone, Debug)]
pub struct ExecutableBlock {
    /// the block itself
    pub block: Block,
    /// fetched collections, keyed by collection id
    pub collections: PreHashMap<CollectionId, Collection>,
    /// the parent's post-execution state commitment, once known
    pub start_state: Option<StateCommitment>,
}

impl ExecutableBlock {
    /// Wrap a block whose collections are not fetched yet.
    pub fn new(block: Block) -> Self {
        ExecutableBlock {
            block,
            collections: PreHashMap::default(),
            start_state: None,
        }
    }

    /// id of the underlying block
    pub fn id(&self) -> BlockId {
        self.block.header.id
    }

    /// id of the parent block
    pub fn parent_id(&self) -> BlockId {
        self.block.header.parent_id
    }

    /// height of the underlying block
    pub fn height(&self) -> u64 {
        self.block.header.height
    }

    /// A block is complete when every guaranteed collection has been filled in.
    pub fn is_complete(&self) -> bool {
        self.block
            .guarantees
            .iter()
            .all(|g| self.collections.contains_key(&g.collection_id))
    }

    /// Ids of the guaranteed collections still missing.
    pub fn missing_collections(&self) -> PreHashSet<CollectionId> {
        self.block
            .guarantees
            .iter()
            .map(|g| g.collection_id)
            .filter(|id| !self.collections.contains_key(id))
            .collect()
    }

    /// Fill in one fetched collection. Returns false if the collection is not
    /// guaranteed by this block.
    pub fn fill_collection(&mut self, id: CollectionId, collection: Collection) -> bool {
        if !self
            .block
            .guarantees
            .iter()
            .any(|g| g.collection_id == id)
        {
            return false;
        }
        self.collections.entry(id).or_insert(collection);
        true
    }
}

/// Execution output of the transactions of one collection.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// position of the chunk inside the block
    pub index: u32,
    /// collection whose transactions the chunk covers
    pub collection_id: CollectionId,
    /// state commitment before the chunk
    pub start_state: StateCommitment,
    /// state commitment after the chunk
    pub end_state: StateCommitment,
    /// number of transactions in the chunk
    pub number_of_transactions: u32,
}

/// An event emitted by a transaction during execution.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// emitting transaction
    pub transaction_id: TransactionId,
    /// opaque event payload
    pub payload: Vec<u8>,
}

/// An event addressed to the protocol itself (epoch transitions and similar).
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ServiceEvent {
    /// opaque event payload
    pub payload: Vec<u8>,
}

/// Per-transaction outcome.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TransactionResult {
    /// the transaction
    pub transaction_id: TransactionId,
    /// failure message, if the transaction reverted
    pub error_message: Option<String>,
}

/// Everything the computation layer produced for one block. Consumed by the
/// state commitment store and by the upload sinks.
#[derive(Clone, Debug)]
pub struct ComputationResult {
    /// id of the computed block
    pub block_id: BlockId,
    /// height of the computed block
    pub height: u64,
    /// result id of the parent block's computation
    pub previous_result_id: ResultId,
    /// per-collection execution outputs
    pub chunks: Vec<Chunk>,
    /// transaction events
    pub events: Vec<EventRecord>,
    /// protocol-facing events
    pub service_events: Vec<ServiceEvent>,
    /// per-transaction outcomes
    pub transaction_results: Vec<TransactionResult>,
    /// post-execution state commitment
    pub new_state_commitment: StateCommitment,
    /// identity of the executing node
    pub executor_id: NodeId,
}

impl ComputationResult {
    /// Content id of the result.
    ///
    /// Results chain like blocks do: the id commits to the parent result, the
    /// end state and the executor, so two executors producing different
    /// post-states for the same block yield different result ids.
    pub fn result_id(&self) -> ResultId {
        ResultId(Hash::compute_from_tuple(&[
            self.block_id.to_bytes().as_slice(),
            self.previous_result_id.to_bytes().as_slice(),
            self.new_state_commitment.to_bytes().as_slice(),
            self.executor_id.0.to_bytes().as_slice(),
        ]))
    }
}

/// Optional stop point of the node: once a block at or above
/// `stop_before_height` is finalized, no block at or above that height will
/// be executed.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct StopParameters {
    /// first height that must NOT be executed
    pub stop_before_height: u64,
    /// unix timestamp (milliseconds) at which the stop was requested
    pub set_at_millis: u64,
}

/// Serializer for `StopParameters`
#[derive(Clone, Default)]
pub struct StopParametersSerializer {
    u64_serializer: U64VarIntSerializer,
}

impl StopParametersSerializer {
    /// Creates a serializer for `StopParameters`
    pub const fn new() -> Self {
        Self {
            u64_serializer: U64VarIntSerializer::new(),
        }
    }
}

impl Serializer<StopParameters> for StopParametersSerializer {
    fn serialize(
        &self,
        value: &StopParameters,
        buffer: &mut Vec<u8>,
    ) -> Result<(), SerializeError> {
        self.u64_serializer
            .serialize(&value.stop_before_height, buffer)?;
        self.u64_serializer.serialize(&value.set_at_millis, buffer)?;
        Ok(())
    }
}

/// Deserializer for `StopParameters`
#[derive(Clone)]
pub struct StopParametersDeserializer {
    u64_deserializer: U64VarIntDeserializer,
}

impl StopParametersDeserializer {
    /// Creates a deserializer for `StopParameters`
    pub const fn new() -> Self {
        Self {
            u64_deserializer: U64VarIntDeserializer::new(Included(0), Included(u64::MAX)),
        }
    }
}

impl Default for StopParametersDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer<StopParameters> for StopParametersDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], StopParameters, E> {
        context("Failed StopParameters deserialization", |input| {
            let (rest, stop_before_height) = self.u64_deserializer.deserialize(input)?;
            let (rest, set_at_millis) = self.u64_deserializer.deserialize(rest)?;
            Ok((
                rest,
                StopParameters {
                    stop_before_height,
                    set_at_millis,
                },
            ))
        })(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_models::block_header::ChainId;
    use meridian_models::collection::{CollectionGuarantee, Transaction};
    use meridian_serialization::DeserializeError;

    fn block_with_one_guarantee() -> (Block, Collection) {
        let collection = Collection {
            transactions: vec![Transaction {
                payload: b"tx".to_vec(),
            }],
        };
        let guarantee = CollectionGuarantee {
            collection_id: collection.id(),
            reference_block_id: BlockId(Hash::compute_from(b"ref")),
            signer_indices: vec![0],
        };
        let block = Block::new(
            BlockId(Hash::compute_from(b"parent")),
            1,
            1,
            ChainId(0),
            vec![guarantee],
        )
        .unwrap();
        (block, collection)
    }

    #[test]
    fn test_completeness_tracks_collections() {
        let (block, collection) = block_with_one_guarantee();
        let mut executable = ExecutableBlock::new(block);
        assert!(!executable.is_complete());
        assert_eq!(executable.missing_collections().len(), 1);
        assert!(executable.fill_collection(collection.id(), collection));
        assert!(executable.is_complete());
        assert!(executable.missing_collections().is_empty());
    }

    #[test]
    fn test_fill_unguaranteed_collection_refused() {
        let (block, _) = block_with_one_guarantee();
        let mut executable = ExecutableBlock::new(block);
        let foreign = Collection {
            transactions: vec![Transaction {
                payload: b"foreign".to_vec(),
            }],
        };
        assert!(!executable.fill_collection(foreign.id(), foreign));
    }

    #[test]
    fn test_result_id_depends_on_executor() {
        let (block, _) = block_with_one_guarantee();
        let template = ComputationResult {
            block_id: block.id(),
            height: block.header.height,
            previous_result_id: ResultId(Hash::compute_from(b"prev")),
            chunks: vec![],
            events: vec![],
            service_events: vec![],
            transaction_results: vec![],
            new_state_commitment: StateCommitment([1u8; 32]),
            executor_id: NodeId(Hash::compute_from(b"executor-1")),
        };
        let mut other = template.clone();
        other.executor_id = NodeId(Hash::compute_from(b"executor-2"));
        assert_ne!(template.result_id(), other.result_id());
    }

    #[test]
    fn test_stop_parameters_round_trip() {
        let params = StopParameters {
            stop_before_height: 42,
            set_at_millis: 1_700_000_000_000,
        };
        let mut buffer = Vec::new();
        StopParametersSerializer::new()
            .serialize(&params, &mut buffer)
            .unwrap();
        let (rest, deser) = StopParametersDeserializer::new()
            .deserialize::<DeserializeError>(&buffer)
            .unwrap();
        assert!(rest.is_empty());
        assert_eq!(deser, params);
    }
}
