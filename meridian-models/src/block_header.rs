// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crate::block_id::{BlockId, BlockIdDeserializer, BlockIdSerializer};
use crate::error::ModelsError;
use meridian_hash::{Hash, HashDeserializer, HashSerializer};
use meridian_serialization::{
    Deserializer, SerializeError, Serializer, U64VarIntDeserializer, U64VarIntSerializer,
};
use nom::{
    error::{context, ContextError, ParseError},
    IResult,
};
use serde::{Deserialize, Serialize};
use std::ops::Bound::Included;

/// Numeric namespace separating independent chains (mainnet, testnets,
/// transient local networks).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct ChainId(pub u64);

/// Header of a block. Immutable once observed: the id commits to every other
/// field.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// content hash of the header
    pub id: BlockId,
    /// id of the parent block
    pub parent_id: BlockId,
    /// height in the chain, counted from the genesis block at 0
    pub height: u64,
    /// consensus view in which the block was proposed
    pub view: u64,
    /// chain namespace
    pub chain_id: ChainId,
    /// commitment to the block payload
    pub payload_hash: Hash,
}

impl BlockHeader {
    /// Assemble a header, computing its content id.
    pub fn new(
        parent_id: BlockId,
        height: u64,
        view: u64,
        chain_id: ChainId,
        payload_hash: Hash,
    ) -> Result<Self, ModelsError> {
        let id = Self::compute_id(&parent_id, height, view, &chain_id, &payload_hash)?;
        Ok(BlockHeader {
            id,
            parent_id,
            height,
            view,
            chain_id,
            payload_hash,
        })
    }

    /// Content hash over every field except the id itself.
    pub fn compute_id(
        parent_id: &BlockId,
        height: u64,
        view: u64,
        chain_id: &ChainId,
        payload_hash: &Hash,
    ) -> Result<BlockId, ModelsError> {
        let u64_serializer = U64VarIntSerializer::new();
        let mut buffer = Vec::new();
        buffer.extend(parent_id.to_bytes());
        u64_serializer.serialize(&height, &mut buffer)?;
        u64_serializer.serialize(&view, &mut buffer)?;
        u64_serializer.serialize(&chain_id.0, &mut buffer)?;
        buffer.extend(payload_hash.to_bytes());
        Ok(BlockId(Hash::compute_from(&buffer)))
    }
}

/// Serializer for `BlockHeader`
#[derive(Clone, Default)]
pub struct BlockHeaderSerializer {
    block_id_serializer: BlockIdSerializer,
    u64_serializer: U64VarIntSerializer,
    hash_serializer: HashSerializer,
}

impl BlockHeaderSerializer {
    /// Creates a serializer for `BlockHeader`
    pub const fn new() -> Self {
        Self {
            block_id_serializer: BlockIdSerializer::new(),
            u64_serializer: U64VarIntSerializer::new(),
            hash_serializer: HashSerializer::new(),
        }
    }
}

impl Serializer<BlockHeader> for BlockHeaderSerializer {
    /// The id is not written: it is recomputed from the content at
    /// deserialization time, so a corrupted or forged id cannot survive a
    /// round trip.
    fn serialize(&self, value: &BlockHeader, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        self.block_id_serializer.serialize(&value.parent_id, buffer)?;
        self.u64_serializer.serialize(&value.height, buffer)?;
        self.u64_serializer.serialize(&value.view, buffer)?;
        self.u64_serializer.serialize(&value.chain_id.0, buffer)?;
        self.hash_serializer.serialize(&value.payload_hash, buffer)?;
        Ok(())
    }
}

/// Deserializer for `BlockHeader`
#[derive(Clone)]
pub struct BlockHeaderDeserializer {
    block_id_deserializer: BlockIdDeserializer,
    u64_deserializer: U64VarIntDeserializer,
    hash_deserializer: HashDeserializer,
}

impl BlockHeaderDeserializer {
    /// Creates a deserializer for `BlockHeader`
    pub const fn new() -> Self {
        Self {
            block_id_deserializer: BlockIdDeserializer::new(),
            u64_deserializer: U64VarIntDeserializer::new(Included(0), Included(u64::MAX)),
            hash_deserializer: HashDeserializer::new(),
        }
    }
}

impl Default for BlockHeaderDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer<BlockHeader> for BlockHeaderDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], BlockHeader, E> {
        context("Failed BlockHeader deserialization", |input: &'a [u8]| {
            let (rest, parent_id) = self.block_id_deserializer.deserialize(input)?;
            let (rest, height) = self.u64_deserializer.deserialize(rest)?;
            let (rest, view) = self.u64_deserializer.deserialize(rest)?;
            let (rest, chain_id) = self.u64_deserializer.deserialize(rest)?;
            let (rest, payload_hash) = self.hash_deserializer.deserialize(rest)?;
            let header = BlockHeader::new(parent_id, height, view, ChainId(chain_id), payload_hash)
                .map_err(|_| {
                    nom::Err::Error(ParseError::from_error_kind(
                        input,
                        nom::error::ErrorKind::Fail,
                    ))
                })?;
            Ok((rest, header))
        })(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_serialization::DeserializeError;

    #[test]
    fn test_header_round_trip() {
        let header = BlockHeader::new(
            BlockId(Hash::compute_from(b"parent")),
            12,
            34,
            ChainId(1),
            Hash::compute_from(b"payload"),
        )
        .unwrap();
        let mut buffer = Vec::new();
        BlockHeaderSerializer::new()
            .serialize(&header, &mut buffer)
            .unwrap();
        let (rest, deser) = BlockHeaderDeserializer::new()
            .deserialize::<DeserializeError>(&buffer)
            .unwrap();
        assert!(rest.is_empty());
        assert_eq!(deser, header);
    }

    #[test]
    fn test_id_commits_to_height() {
        let parent = BlockId(Hash::compute_from(b"parent"));
        let payload = Hash::compute_from(b"payload");
        let h1 = BlockHeader::new(parent, 1, 0, ChainId(1), payload).unwrap();
        let h2 = BlockHeader::new(parent, 2, 0, ChainId(1), payload).unwrap();
        assert_ne!(h1.id, h2.id);
    }
}
