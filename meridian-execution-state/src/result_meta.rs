// Copyright (c) 2022 MASSA LABS <info@massa.net>

use meridian_models::commitment::{
    StateCommitment, StateCommitmentDeserializer, StateCommitmentSerializer,
};
use meridian_models::result_id::{ResultId, ResultIdDeserializer, ResultIdSerializer};
use meridian_serialization::{
    Deserializer, SerializeError, Serializer, U64VarIntDeserializer, U64VarIntSerializer,
};
use nom::error::{context, ContextError, ParseError};
use nom::IResult;
use std::ops::Bound::Included;

/// Persisted metadata of one computation result. The full result (events,
/// transaction outcomes) is handed to the upload sinks; only what the chain
/// of results needs survives in the store.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResultMeta {
    /// content id of the result
    pub result_id: ResultId,
    /// result id of the parent block's computation
    pub previous_result_id: ResultId,
    /// height of the computed block
    pub height: u64,
    /// post-execution state commitment
    pub end_state: StateCommitment,
    /// number of chunks in the result
    pub chunk_count: u64,
}

/// Serializer for `ResultMeta`
#[derive(Clone, Default)]
pub struct ResultMetaSerializer {
    result_id_serializer: ResultIdSerializer,
    commitment_serializer: StateCommitmentSerializer,
    u64_serializer: U64VarIntSerializer,
}

impl ResultMetaSerializer {
    /// Creates a serializer for `ResultMeta`
    pub const fn new() -> Self {
        Self {
            result_id_serializer: ResultIdSerializer::new(),
            commitment_serializer: StateCommitmentSerializer::new(),
            u64_serializer: U64VarIntSerializer::new(),
        }
    }
}

impl Serializer<ResultMeta> for ResultMetaSerializer {
    fn serialize(&self, value: &ResultMeta, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        self.result_id_serializer.serialize(&value.result_id, buffer)?;
        self.result_id_serializer
            .serialize(&value.previous_result_id, buffer)?;
        self.u64_serializer.serialize(&value.height, buffer)?;
        self.commitment_serializer.serialize(&value.end_state, buffer)?;
        self.u64_serializer.serialize(&value.chunk_count, buffer)?;
        Ok(())
    }
}

/// Deserializer for `ResultMeta`
#[derive(Clone)]
pub struct ResultMetaDeserializer {
    result_id_deserializer: ResultIdDeserializer,
    commitment_deserializer: StateCommitmentDeserializer,
    u64_deserializer: U64VarIntDeserializer,
}

impl ResultMetaDeserializer {
    /// Creates a deserializer for `ResultMeta`
    pub const fn new() -> Self {
        Self {
            result_id_deserializer: ResultIdDeserializer::new(),
            commitment_deserializer: StateCommitmentDeserializer::new(),
            u64_deserializer: U64VarIntDeserializer::new(Included(0), Included(u64::MAX)),
        }
    }
}

impl Default for ResultMetaDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer<ResultMeta> for ResultMetaDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], ResultMeta, E> {
        context("Failed ResultMeta deserialization", |input| {
            let (rest, result_id) = self.result_id_deserializer.deserialize(input)?;
            let (rest, previous_result_id) = self.result_id_deserializer.deserialize(rest)?;
            let (rest, height) = self.u64_deserializer.deserialize(rest)?;
            let (rest, end_state) = self.commitment_deserializer.deserialize(rest)?;
            let (rest, chunk_count) = self.u64_deserializer.deserialize(rest)?;
            Ok((
                rest,
                ResultMeta {
                    result_id,
                    previous_result_id,
                    height,
                    end_state,
                    chunk_count,
                },
            ))
        })(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_hash::Hash;
    use meridian_serialization::DeserializeError;

    #[test]
    fn test_result_meta_round_trip() {
        let meta = ResultMeta {
            result_id: ResultId(Hash::compute_from(b"result")),
            previous_result_id: ResultId(Hash::compute_from(b"previous")),
            height: 17,
            end_state: StateCommitment([9u8; 32]),
            chunk_count: 3,
        };
        let mut buffer = Vec::new();
        ResultMetaSerializer::new().serialize(&meta, &mut buffer).unwrap();
        let (rest, deser) = ResultMetaDeserializer::new()
            .deserialize::<DeserializeError>(&buffer)
            .unwrap();
        assert!(rest.is_empty());
        assert_eq!(deser, meta);
    }
}
