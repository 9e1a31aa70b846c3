// Copyright (c) 2022 MASSA LABS <info@massa.net>

use meridian_serialization::{
    Deserializer, SerializeError, Serializer, U64VarIntDeserializer, U64VarIntSerializer,
};
use nom::{
    bytes::complete::take,
    error::{context, ContextError, ParseError},
    IResult,
};
use std::ops::Bound::Included;

/// Serializer for a length-prefixed byte vector
#[derive(Clone, Default)]
pub struct VecU8Serializer {
    len_serializer: U64VarIntSerializer,
}

impl VecU8Serializer {
    /// Creates a `VecU8Serializer`
    pub const fn new() -> Self {
        Self {
            len_serializer: U64VarIntSerializer::new(),
        }
    }
}

impl Serializer<Vec<u8>> for VecU8Serializer {
    fn serialize(&self, value: &Vec<u8>, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        let len: u64 = value.len().try_into().map_err(|err| {
            SerializeError::GeneralError(format!("too many bytes in vector: {}", err))
        })?;
        self.len_serializer.serialize(&len, buffer)?;
        buffer.extend(value);
        Ok(())
    }
}

/// Deserializer for a length-prefixed byte vector
#[derive(Clone)]
pub struct VecU8Deserializer {
    len_deserializer: U64VarIntDeserializer,
}

impl VecU8Deserializer {
    /// Creates a `VecU8Deserializer` accepting at most `max_len` bytes
    pub const fn new(max_len: u64) -> Self {
        Self {
            len_deserializer: U64VarIntDeserializer::new(Included(0), Included(max_len)),
        }
    }
}

impl Deserializer<Vec<u8>> for VecU8Deserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], Vec<u8>, E> {
        context("Failed Vec<u8> deserialization", |input| {
            let (rest, len) = self.len_deserializer.deserialize(input)?;
            let (rest, data) = take(len as usize)(rest)?;
            Ok((rest, data.to_vec()))
        })(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_serialization::DeserializeError;

    #[test]
    fn test_vec_u8_round_trip() {
        let serializer = VecU8Serializer::new();
        let deserializer = VecU8Deserializer::new(1024);
        let data = vec![1u8, 2, 3, 4, 5];
        let mut buffer = Vec::new();
        serializer.serialize(&data, &mut buffer).unwrap();
        let (rest, deser) = deserializer
            .deserialize::<DeserializeError>(&buffer)
            .unwrap();
        assert!(rest.is_empty());
        assert_eq!(deser, data);
    }

    #[test]
    fn test_vec_u8_too_long() {
        let serializer = VecU8Serializer::new();
        let deserializer = VecU8Deserializer::new(4);
        let data = vec![0u8; 8];
        let mut buffer = Vec::new();
        serializer.serialize(&data, &mut buffer).unwrap();
        assert!(deserializer
            .deserialize::<DeserializeError>(&buffer)
            .is_err());
    }
}
