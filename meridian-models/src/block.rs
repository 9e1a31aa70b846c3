// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crate::block_header::{BlockHeader, BlockHeaderDeserializer, BlockHeaderSerializer, ChainId};
use crate::block_id::BlockId;
use crate::collection::{
    CollectionGuarantee, CollectionGuaranteeDeserializer, CollectionGuaranteeSerializer,
    CollectionId,
};
use crate::constants::MAX_GUARANTEES_PER_BLOCK;
use crate::error::ModelsError;
use meridian_hash::Hash;
use meridian_serialization::{
    Deserializer, SerializeError, Serializer, U32VarIntDeserializer, U32VarIntSerializer,
};
use nom::{
    error::{context, ContextError, ParseError},
    multi::length_count,
    IResult,
};
use serde::{Deserialize, Serialize};
use std::ops::Bound::Included;

/// A block: header plus the payload of guaranteed collections.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// block header
    pub header: BlockHeader,
    /// guaranteed collections, in payload order
    pub guarantees: Vec<CollectionGuarantee>,
}

impl Block {
    /// Assemble a block: the payload hash of the header commits to the
    /// guarantee list.
    pub fn new(
        parent_id: BlockId,
        height: u64,
        view: u64,
        chain_id: ChainId,
        guarantees: Vec<CollectionGuarantee>,
    ) -> Result<Self, ModelsError> {
        let payload_hash = Self::compute_payload_hash(&guarantees)?;
        let header = BlockHeader::new(parent_id, height, view, chain_id, payload_hash)?;
        Ok(Block { header, guarantees })
    }

    /// Content hash of the guarantee list.
    pub fn compute_payload_hash(
        guarantees: &[CollectionGuarantee],
    ) -> Result<Hash, ModelsError> {
        let guarantee_serializer = CollectionGuaranteeSerializer::new();
        let mut buffer = Vec::new();
        for guarantee in guarantees {
            guarantee_serializer.serialize(guarantee, &mut buffer)?;
        }
        Ok(Hash::compute_from(&buffer))
    }

    /// id of the block
    pub fn id(&self) -> BlockId {
        self.header.id
    }

    /// Ids of the guaranteed collections, in payload order.
    pub fn guaranteed_collection_ids(&self) -> Vec<CollectionId> {
        self.guarantees.iter().map(|g| g.collection_id).collect()
    }
}

/// Serializer for `Block`
#[derive(Clone, Default)]
pub struct BlockSerializer {
    header_serializer: BlockHeaderSerializer,
    count_serializer: U32VarIntSerializer,
    guarantee_serializer: CollectionGuaranteeSerializer,
}

impl BlockSerializer {
    /// Creates a serializer for `Block`
    pub const fn new() -> Self {
        Self {
            header_serializer: BlockHeaderSerializer::new(),
            count_serializer: U32VarIntSerializer::new(),
            guarantee_serializer: CollectionGuaranteeSerializer::new(),
        }
    }
}

impl Serializer<Block> for BlockSerializer {
    fn serialize(&self, value: &Block, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        self.header_serializer.serialize(&value.header, buffer)?;
        let count: u32 = value.guarantees.len().try_into().map_err(|err| {
            SerializeError::GeneralError(format!("too many guarantees in block: {}", err))
        })?;
        self.count_serializer.serialize(&count, buffer)?;
        for guarantee in &value.guarantees {
            self.guarantee_serializer.serialize(guarantee, buffer)?;
        }
        Ok(())
    }
}

/// Deserializer for `Block`
#[derive(Clone)]
pub struct BlockDeserializer {
    header_deserializer: BlockHeaderDeserializer,
    count_deserializer: U32VarIntDeserializer,
    guarantee_deserializer: CollectionGuaranteeDeserializer,
}

impl BlockDeserializer {
    /// Creates a deserializer for `Block`
    pub const fn new() -> Self {
        Self {
            header_deserializer: BlockHeaderDeserializer::new(),
            count_deserializer: U32VarIntDeserializer::new(
                Included(0),
                Included(MAX_GUARANTEES_PER_BLOCK as u32),
            ),
            guarantee_deserializer: CollectionGuaranteeDeserializer::new(),
        }
    }
}

impl Default for BlockDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer<Block> for BlockDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], Block, E> {
        context("Failed Block deserialization", |input: &'a [u8]| {
            let (rest, header) = self.header_deserializer.deserialize(input)?;
            let (rest, guarantees) = length_count(
                context("guarantee count", |input| {
                    self.count_deserializer.deserialize(input)
                }),
                context("guarantee", |input| {
                    self.guarantee_deserializer.deserialize(input)
                }),
            )(rest)?;
            // the header commits to the payload
            let expected =
                Block::compute_payload_hash(&guarantees).map_err(|_| {
                    nom::Err::Error(ParseError::from_error_kind(
                        input,
                        nom::error::ErrorKind::Fail,
                    ))
                })?;
            if expected != header.payload_hash {
                return Err(nom::Err::Error(ParseError::from_error_kind(
                    input,
                    nom::error::ErrorKind::Verify,
                )));
            }
            Ok((rest, Block { header, guarantees }))
        })(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::{Collection, Transaction};
    use meridian_serialization::DeserializeError;

    fn block_fixture() -> Block {
        let collection = Collection {
            transactions: vec![Transaction {
                payload: b"tx".to_vec(),
            }],
        };
        let guarantee = CollectionGuarantee {
            collection_id: collection.id(),
            reference_block_id: BlockId(Hash::compute_from(b"ref")),
            signer_indices: vec![0, 1],
        };
        Block::new(
            BlockId(Hash::compute_from(b"parent")),
            3,
            3,
            ChainId(7),
            vec![guarantee],
        )
        .unwrap()
    }

    #[test]
    fn test_block_round_trip() {
        let block = block_fixture();
        let mut buffer = Vec::new();
        BlockSerializer::new().serialize(&block, &mut buffer).unwrap();
        let (rest, deser) = BlockDeserializer::new()
            .deserialize::<DeserializeError>(&buffer)
            .unwrap();
        assert!(rest.is_empty());
        assert_eq!(deser, block);
    }

    #[test]
    fn test_payload_hash_commits_to_guarantees() {
        let block = block_fixture();
        let without_guarantees = Block::new(
            block.header.parent_id,
            block.header.height,
            block.header.view,
            block.header.chain_id,
            vec![],
        )
        .unwrap();
        assert_ne!(block.header.payload_hash, without_guarantees.header.payload_hash);
        assert_ne!(block.id(), without_guarantees.id());
    }
}
