// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crate::error::ModelsError;
use meridian_serialization::{Deserializer, SerializeError, Serializer};
use nom::{
    bytes::complete::take,
    error::{context, ContextError, ParseError},
    IResult,
};
use serde::{Deserialize, Serialize};

/// Size in bytes of a serialized state commitment
pub const STATE_COMMITMENT_SIZE_BYTES: usize = 32;

/// Root of the post-execution state of a block.
///
/// Opaque to the ingestion core: it is produced by the computation layer and
/// only ever compared and persisted here.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize, Default)]
pub struct StateCommitment(pub [u8; STATE_COMMITMENT_SIZE_BYTES]);

impl StateCommitment {
    /// state commitment as bytes
    pub fn to_bytes(&self) -> &[u8; STATE_COMMITMENT_SIZE_BYTES] {
        &self.0
    }

    /// state commitment from bytes
    pub fn from_bytes(data: &[u8; STATE_COMMITMENT_SIZE_BYTES]) -> StateCommitment {
        StateCommitment(*data)
    }

    /// state commitment from a raw slice
    pub fn try_from_slice(data: &[u8]) -> Result<StateCommitment, ModelsError> {
        Ok(StateCommitment(
            data.try_into()
                .map_err(|_| ModelsError::StateCommitmentParseError)?,
        ))
    }
}

impl std::fmt::Display for StateCommitment {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", bs58::encode(self.0).with_check().into_string())
    }
}

impl std::fmt::Debug for StateCommitment {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

/// Serializer for `StateCommitment`
#[derive(Default, Clone)]
pub struct StateCommitmentSerializer;

impl StateCommitmentSerializer {
    /// Creates a serializer for `StateCommitment`
    pub const fn new() -> Self {
        Self
    }
}

impl Serializer<StateCommitment> for StateCommitmentSerializer {
    fn serialize(
        &self,
        value: &StateCommitment,
        buffer: &mut Vec<u8>,
    ) -> Result<(), SerializeError> {
        buffer.extend(value.to_bytes());
        Ok(())
    }
}

/// Deserializer for `StateCommitment`
#[derive(Default, Clone)]
pub struct StateCommitmentDeserializer;

impl StateCommitmentDeserializer {
    /// Creates a deserializer for `StateCommitment`
    pub const fn new() -> Self {
        Self
    }
}

impl Deserializer<StateCommitment> for StateCommitmentDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], StateCommitment, E> {
        context("Failed StateCommitment deserialization", |input: &'a [u8]| {
            let (rest, bytes) = take(STATE_COMMITMENT_SIZE_BYTES)(input)?;
            Ok((
                rest,
                StateCommitment::from_bytes(bytes.try_into().map_err(|_| {
                    nom::Err::Error(ParseError::from_error_kind(
                        input,
                        nom::error::ErrorKind::Fail,
                    ))
                })?),
            ))
        })(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_serialization::DeserializeError;

    #[test]
    fn test_commitment_round_trip() {
        let commitment = StateCommitment([7u8; STATE_COMMITMENT_SIZE_BYTES]);
        let mut buffer = Vec::new();
        StateCommitmentSerializer::new()
            .serialize(&commitment, &mut buffer)
            .unwrap();
        let (rest, deser) = StateCommitmentDeserializer::new()
            .deserialize::<DeserializeError>(&buffer)
            .unwrap();
        assert!(rest.is_empty());
        assert_eq!(deser, commitment);
    }

    #[test]
    fn test_commitment_short_input() {
        let buffer = vec![0u8; STATE_COMMITMENT_SIZE_BYTES - 1];
        assert!(StateCommitmentDeserializer::new()
            .deserialize::<DeserializeError>(&buffer)
            .is_err());
    }
}
