// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! Collections are ordered batches of transactions produced by collection
//! nodes. A block payload does not embed collections directly: it carries
//! guarantees, and the collections themselves are fetched on demand.

use crate::block_id::{BlockId, BlockIdDeserializer, BlockIdSerializer};
use crate::constants::{
    MAX_GUARANTEE_SIGNERS, MAX_TRANSACTIONS_PER_COLLECTION, MAX_TRANSACTION_PAYLOAD_SIZE,
};
use crate::error::ModelsError;
use crate::prehash::PreHashed;
use crate::serialization::{VecU8Deserializer, VecU8Serializer};
use meridian_hash::{Hash, HashDeserializer};
use meridian_serialization::{
    Deserializer, SerializeError, Serializer, U32VarIntDeserializer, U32VarIntSerializer,
    U64VarIntDeserializer, U64VarIntSerializer,
};
use nom::{
    error::{context, ContextError, ParseError},
    multi::length_count,
    IResult,
};
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use std::ops::Bound::Included;
use std::str::FromStr;

/// transaction id: content hash of the transaction payload
#[derive(
    Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, SerializeDisplay, DeserializeFromStr,
)]
pub struct TransactionId(pub Hash);

impl PreHashed for TransactionId {}

const TRANSACTIONID_PREFIX: char = 'T';

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}{}", TRANSACTIONID_PREFIX, self.0.to_bs58_check())
    }
}

impl std::fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

impl FromStr for TransactionId {
    type Err = ModelsError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match chars.next() {
            Some(prefix) if prefix == TRANSACTIONID_PREFIX => {
                let data = chars.collect::<String>();
                Ok(TransactionId(
                    Hash::from_bs58_check(&data)
                        .map_err(|_| ModelsError::TransactionIdParseError)?,
                ))
            }
            _ => Err(ModelsError::TransactionIdParseError),
        }
    }
}

/// A transaction, opaque to the ingestion core: the payload is interpreted by
/// the computation layer only.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// opaque transaction payload
    pub payload: Vec<u8>,
}

impl Transaction {
    /// Compute the content id of the transaction
    pub fn id(&self) -> TransactionId {
        TransactionId(Hash::compute_from(&self.payload))
    }
}

/// Serializer for `Transaction`
#[derive(Clone, Default)]
pub struct TransactionSerializer {
    payload_serializer: VecU8Serializer,
}

impl TransactionSerializer {
    /// Creates a serializer for `Transaction`
    pub const fn new() -> Self {
        Self {
            payload_serializer: VecU8Serializer::new(),
        }
    }
}

impl Serializer<Transaction> for TransactionSerializer {
    fn serialize(&self, value: &Transaction, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        self.payload_serializer.serialize(&value.payload, buffer)
    }
}

/// Deserializer for `Transaction`
#[derive(Clone)]
pub struct TransactionDeserializer {
    payload_deserializer: VecU8Deserializer,
}

impl TransactionDeserializer {
    /// Creates a deserializer for `Transaction`
    pub const fn new() -> Self {
        Self {
            payload_deserializer: VecU8Deserializer::new(MAX_TRANSACTION_PAYLOAD_SIZE),
        }
    }
}

impl Default for TransactionDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer<Transaction> for TransactionDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], Transaction, E> {
        context("Failed Transaction deserialization", |input| {
            let (rest, payload) = self.payload_deserializer.deserialize(input)?;
            Ok((rest, Transaction { payload }))
        })(buffer)
    }
}

/// collection id: content hash of the ordered transaction ids
#[derive(
    Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, SerializeDisplay, DeserializeFromStr,
)]
pub struct CollectionId(pub Hash);

impl PreHashed for CollectionId {}

/// Size in bytes of a serialized collection ID
pub const COLLECTION_ID_SIZE_BYTES: usize = meridian_hash::HASH_SIZE_BYTES;

const COLLECTIONID_PREFIX: char = 'C';

impl std::fmt::Display for CollectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}{}", COLLECTIONID_PREFIX, self.0.to_bs58_check())
    }
}

impl std::fmt::Debug for CollectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

impl FromStr for CollectionId {
    type Err = ModelsError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match chars.next() {
            Some(prefix) if prefix == COLLECTIONID_PREFIX => {
                let data = chars.collect::<String>();
                Ok(CollectionId(
                    Hash::from_bs58_check(&data).map_err(|_| ModelsError::CollectionIdParseError)?,
                ))
            }
            _ => Err(ModelsError::CollectionIdParseError),
        }
    }
}

impl CollectionId {
    /// collection id to bytes
    pub fn to_bytes(&self) -> &[u8; COLLECTION_ID_SIZE_BYTES] {
        self.0.to_bytes()
    }

    /// collection id from bytes
    pub fn from_bytes(data: &[u8; COLLECTION_ID_SIZE_BYTES]) -> CollectionId {
        CollectionId(Hash::from_bytes(data))
    }
}

/// Serializer for `CollectionId`
#[derive(Default, Clone)]
pub struct CollectionIdSerializer;

impl CollectionIdSerializer {
    /// Creates a serializer for `CollectionId`
    pub const fn new() -> Self {
        Self
    }
}

impl Serializer<CollectionId> for CollectionIdSerializer {
    fn serialize(&self, value: &CollectionId, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        buffer.extend(value.to_bytes());
        Ok(())
    }
}

/// Deserializer for `CollectionId`
#[derive(Default, Clone)]
pub struct CollectionIdDeserializer {
    hash_deserializer: HashDeserializer,
}

impl CollectionIdDeserializer {
    /// Creates a deserializer for `CollectionId`
    pub const fn new() -> Self {
        Self {
            hash_deserializer: HashDeserializer::new(),
        }
    }
}

impl Deserializer<CollectionId> for CollectionIdDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], CollectionId, E> {
        context("Failed CollectionId deserialization", |input| {
            let (rest, hash) = self.hash_deserializer.deserialize(input)?;
            Ok((rest, CollectionId(hash)))
        })(buffer)
    }
}

/// An ordered batch of transactions, addressed by the hash of its ordered
/// transaction ids.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    /// ordered transactions
    pub transactions: Vec<Transaction>,
}

impl Collection {
    /// Compute the content id of the collection.
    pub fn id(&self) -> CollectionId {
        let tx_ids: Vec<[u8; 32]> = self
            .transactions
            .iter()
            .map(|tx| tx.id().0.into_bytes())
            .collect();
        let slices: Vec<&[u8]> = tx_ids.iter().map(|id| id.as_slice()).collect();
        CollectionId(Hash::compute_from_tuple(&slices))
    }
}

/// Serializer for `Collection`
#[derive(Clone, Default)]
pub struct CollectionSerializer {
    count_serializer: U32VarIntSerializer,
    transaction_serializer: TransactionSerializer,
}

impl CollectionSerializer {
    /// Creates a serializer for `Collection`
    pub const fn new() -> Self {
        Self {
            count_serializer: U32VarIntSerializer::new(),
            transaction_serializer: TransactionSerializer::new(),
        }
    }
}

impl Serializer<Collection> for CollectionSerializer {
    fn serialize(&self, value: &Collection, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        let count: u32 = value.transactions.len().try_into().map_err(|err| {
            SerializeError::GeneralError(format!("too many transactions in collection: {}", err))
        })?;
        self.count_serializer.serialize(&count, buffer)?;
        for transaction in &value.transactions {
            self.transaction_serializer.serialize(transaction, buffer)?;
        }
        Ok(())
    }
}

/// Deserializer for `Collection`
#[derive(Clone)]
pub struct CollectionDeserializer {
    count_deserializer: U32VarIntDeserializer,
    transaction_deserializer: TransactionDeserializer,
}

impl CollectionDeserializer {
    /// Creates a deserializer for `Collection`
    pub const fn new() -> Self {
        Self {
            count_deserializer: U32VarIntDeserializer::new(
                Included(0),
                Included(MAX_TRANSACTIONS_PER_COLLECTION as u32),
            ),
            transaction_deserializer: TransactionDeserializer::new(),
        }
    }
}

impl Default for CollectionDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer<Collection> for CollectionDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], Collection, E> {
        context(
            "Failed Collection deserialization",
            length_count(
                context("transaction count", |input| {
                    self.count_deserializer.deserialize(input)
                }),
                context("transaction", |input| {
                    self.transaction_deserializer.deserialize(input)
                }),
            ),
        )(buffer)
        .map(|(rest, transactions)| (rest, Collection { transactions }))
    }
}

/// Commitment, embedded in a block payload, that a collection will be made
/// available for execution. The reference block pins the committee that
/// signed the guarantee.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CollectionGuarantee {
    /// id of the guaranteed collection
    pub collection_id: CollectionId,
    /// block at which the guarantor cluster is resolved
    pub reference_block_id: BlockId,
    /// indices of the cluster members that signed the guarantee
    pub signer_indices: Vec<u32>,
}

/// Serializer for `CollectionGuarantee`
#[derive(Clone, Default)]
pub struct CollectionGuaranteeSerializer {
    collection_id_serializer: CollectionIdSerializer,
    block_id_serializer: BlockIdSerializer,
    count_serializer: U32VarIntSerializer,
    index_serializer: U64VarIntSerializer,
}

impl CollectionGuaranteeSerializer {
    /// Creates a serializer for `CollectionGuarantee`
    pub const fn new() -> Self {
        Self {
            collection_id_serializer: CollectionIdSerializer::new(),
            block_id_serializer: BlockIdSerializer::new(),
            count_serializer: U32VarIntSerializer::new(),
            index_serializer: U64VarIntSerializer::new(),
        }
    }
}

impl Serializer<CollectionGuarantee> for CollectionGuaranteeSerializer {
    fn serialize(
        &self,
        value: &CollectionGuarantee,
        buffer: &mut Vec<u8>,
    ) -> Result<(), SerializeError> {
        self.collection_id_serializer
            .serialize(&value.collection_id, buffer)?;
        self.block_id_serializer
            .serialize(&value.reference_block_id, buffer)?;
        let count: u32 = value.signer_indices.len().try_into().map_err(|err| {
            SerializeError::GeneralError(format!("too many signer indices: {}", err))
        })?;
        self.count_serializer.serialize(&count, buffer)?;
        for index in &value.signer_indices {
            self.index_serializer.serialize(&(*index as u64), buffer)?;
        }
        Ok(())
    }
}

/// Deserializer for `CollectionGuarantee`
#[derive(Clone)]
pub struct CollectionGuaranteeDeserializer {
    collection_id_deserializer: CollectionIdDeserializer,
    block_id_deserializer: BlockIdDeserializer,
    count_deserializer: U32VarIntDeserializer,
    index_deserializer: U64VarIntDeserializer,
}

impl CollectionGuaranteeDeserializer {
    /// Creates a deserializer for `CollectionGuarantee`
    pub const fn new() -> Self {
        Self {
            collection_id_deserializer: CollectionIdDeserializer::new(),
            block_id_deserializer: BlockIdDeserializer::new(),
            count_deserializer: U32VarIntDeserializer::new(
                Included(0),
                Included(MAX_GUARANTEE_SIGNERS as u32),
            ),
            index_deserializer: U64VarIntDeserializer::new(
                Included(0),
                Included(u32::MAX as u64),
            ),
        }
    }
}

impl Default for CollectionGuaranteeDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer<CollectionGuarantee> for CollectionGuaranteeDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], CollectionGuarantee, E> {
        context("Failed CollectionGuarantee deserialization", |input| {
            let (rest, collection_id) = self.collection_id_deserializer.deserialize(input)?;
            let (rest, reference_block_id) = self.block_id_deserializer.deserialize(rest)?;
            let (rest, indices) = length_count(
                context("signer count", |input| {
                    self.count_deserializer.deserialize(input)
                }),
                context("signer index", |input| {
                    self.index_deserializer.deserialize(input)
                }),
            )(rest)?;
            Ok((
                rest,
                CollectionGuarantee {
                    collection_id,
                    reference_block_id,
                    signer_indices: indices.into_iter().map(|i| i as u32).collect(),
                },
            ))
        })(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_serialization::DeserializeError;

    fn collection_fixture() -> Collection {
        Collection {
            transactions: vec![
                Transaction {
                    payload: b"transfer 10".to_vec(),
                },
                Transaction {
                    payload: b"transfer 20".to_vec(),
                },
            ],
        }
    }

    #[test]
    fn test_collection_id_depends_on_order() {
        let collection = collection_fixture();
        let mut reversed = collection.clone();
        reversed.transactions.reverse();
        assert_ne!(collection.id(), reversed.id());
    }

    #[test]
    fn test_collection_round_trip() {
        let collection = collection_fixture();
        let mut buffer = Vec::new();
        CollectionSerializer::new()
            .serialize(&collection, &mut buffer)
            .unwrap();
        let (rest, deser) = CollectionDeserializer::new()
            .deserialize::<DeserializeError>(&buffer)
            .unwrap();
        assert!(rest.is_empty());
        assert_eq!(deser, collection);
        assert_eq!(deser.id(), collection.id());
    }

    #[test]
    fn test_guarantee_round_trip() {
        let guarantee = CollectionGuarantee {
            collection_id: collection_fixture().id(),
            reference_block_id: BlockId(Hash::compute_from(b"ref")),
            signer_indices: vec![0, 3, 7],
        };
        let mut buffer = Vec::new();
        CollectionGuaranteeSerializer::new()
            .serialize(&guarantee, &mut buffer)
            .unwrap();
        let (rest, deser) = CollectionGuaranteeDeserializer::new()
            .deserialize::<DeserializeError>(&buffer)
            .unwrap();
        assert!(rest.is_empty());
        assert_eq!(deser, guarantee);
    }
}
