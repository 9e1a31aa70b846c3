// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crate::error::ModelsError;
use crate::prehash::PreHashed;
use meridian_hash::{Hash, HashDeserializer};
use meridian_serialization::{Deserializer, SerializeError, Serializer};
use nom::error::{context, ContextError, ParseError};
use nom::IResult;
use serde_with::{DeserializeFromStr, SerializeDisplay};
use std::str::FromStr;

/// Size in bytes of a serialized result ID
pub const RESULT_ID_SIZE_BYTES: usize = meridian_hash::HASH_SIZE_BYTES;

/// execution result id: content hash of a computation result.
///
/// Results form their own hash-linked chain: each result commits to the id of
/// its parent block's result.
#[derive(
    Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, SerializeDisplay, DeserializeFromStr,
)]
pub struct ResultId(pub Hash);

impl PreHashed for ResultId {}

const RESULTID_PREFIX: char = 'R';

impl std::fmt::Display for ResultId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}{}", RESULTID_PREFIX, self.0.to_bs58_check())
    }
}

impl std::fmt::Debug for ResultId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

impl FromStr for ResultId {
    type Err = ModelsError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match chars.next() {
            Some(prefix) if prefix == RESULTID_PREFIX => {
                let data = chars.collect::<String>();
                Ok(ResultId(
                    Hash::from_bs58_check(&data).map_err(|_| ModelsError::ResultIdParseError)?,
                ))
            }
            _ => Err(ModelsError::ResultIdParseError),
        }
    }
}

impl ResultId {
    /// result id to bytes
    pub fn to_bytes(&self) -> &[u8; RESULT_ID_SIZE_BYTES] {
        self.0.to_bytes()
    }

    /// result id from bytes
    pub fn from_bytes(data: &[u8; RESULT_ID_SIZE_BYTES]) -> ResultId {
        ResultId(Hash::from_bytes(data))
    }
}

/// Serializer for `ResultId`
#[derive(Default, Clone)]
pub struct ResultIdSerializer;

impl ResultIdSerializer {
    /// Creates a serializer for `ResultId`
    pub const fn new() -> Self {
        Self
    }
}

impl Serializer<ResultId> for ResultIdSerializer {
    fn serialize(&self, value: &ResultId, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        buffer.extend(value.to_bytes());
        Ok(())
    }
}

/// Deserializer for `ResultId`
#[derive(Default, Clone)]
pub struct ResultIdDeserializer {
    hash_deserializer: HashDeserializer,
}

impl ResultIdDeserializer {
    /// Creates a deserializer for `ResultId`
    pub const fn new() -> Self {
        Self {
            hash_deserializer: HashDeserializer::new(),
        }
    }
}

impl Deserializer<ResultId> for ResultIdDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], ResultId, E> {
        context("Failed ResultId deserialization", |input| {
            let (rest, hash) = self.hash_deserializer.deserialize(input)?;
            Ok((rest, ResultId(hash)))
        })(buffer)
    }
}
