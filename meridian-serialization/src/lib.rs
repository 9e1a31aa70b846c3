// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! Binary serialization traits shared by every meridian module.
//!
//! Serialized forms are written through [`Serializer`] implementations and
//! read back with nom-based [`Deserializer`] implementations so that framing
//! errors carry context about where the decoding failed.

use std::{
    collections::VecDeque,
    fmt::{Debug, Display},
    ops::{Bound, RangeBounds},
};

use displaydoc::Display;
use nom::{
    branch::alt,
    bytes::complete::tag,
    combinator::value,
    error::{context, ContextError, ParseError},
    sequence::preceded,
    IResult, Parser,
};
use thiserror::Error;

#[non_exhaustive]
#[derive(Display, Error, Debug, Clone)]
pub enum SerializeError {
    /// Number {0} is too big to be serialized
    NumberTooBig(String),
    /// General error {0}
    GeneralError(String),
}

/// Accumulates the nom error trail so that failures print as a path of
/// contexts instead of a single opaque error kind.
#[derive(Clone, Error)]
pub struct DeserializeError<'a> {
    errors: VecDeque<(&'a [u8], String)>,
}

impl<'a> ContextError<&'a [u8]> for DeserializeError<'a> {
    fn add_context(input: &'a [u8], ctx: &'static str, mut other: Self) -> Self {
        other.errors.push_front((input, ctx.to_string()));
        other
    }
}

impl<'a> ParseError<&'a [u8]> for DeserializeError<'a> {
    fn append(input: &'a [u8], kind: nom::error::ErrorKind, mut other: Self) -> Self {
        other
            .errors
            .push_front((input, kind.description().to_string()));
        other
    }
    fn from_error_kind(input: &'a [u8], kind: nom::error::ErrorKind) -> Self {
        let mut errors = VecDeque::new();
        errors.push_front((input, kind.description().to_string()));
        Self { errors }
    }
    fn from_char(input: &'a [u8], _: char) -> Self {
        Self::from_error_kind(input, nom::error::ErrorKind::Char)
    }
    fn or(self, other: Self) -> Self {
        other
    }
}

impl<'a> Display for DeserializeError<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for error in &self.errors {
            write!(f, "{} / ", error.1)?;
        }
        Ok(())
    }
}

impl<'a> Debug for DeserializeError<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut last_input = None;
        for error in &self.errors {
            write!(f, "{} / ", error.1)?;
            last_input = Some(error.0);
        }
        if let Some(last_input) = last_input {
            writeln!(f, "Input: {:?}", last_input)?;
        }
        Ok(())
    }
}

/// Serialize a value `T` into a byte buffer.
pub trait Serializer<T> {
    /// Append the serialized form of `value` to `buffer`.
    fn serialize(&self, value: &T, buffer: &mut Vec<u8>) -> Result<(), SerializeError>;
}

/// Deserialize a value `T` from a byte buffer.
///
/// Implementations are nom parsers: they return the unconsumed rest of the
/// input together with the decoded value.
pub trait Deserializer<T> {
    /// Deserialize a value `T` from `buffer`.
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], T, E>;
}

/// Serializer for `u64` in varint form.
#[derive(Clone, Default)]
pub struct U64VarIntSerializer;

impl U64VarIntSerializer {
    /// Create a serializer for `u64` in varint form.
    pub const fn new() -> Self {
        Self
    }
}

impl Serializer<u64> for U64VarIntSerializer {
    fn serialize(&self, value: &u64, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        buffer.extend_from_slice(unsigned_varint::encode::u64(
            *value,
            &mut unsigned_varint::encode::u64_buffer(),
        ));
        Ok(())
    }
}

/// Deserializer for `u64` in varint form, bounded to a configured range.
#[derive(Clone)]
pub struct U64VarIntDeserializer {
    range: (Bound<u64>, Bound<u64>),
}

impl U64VarIntDeserializer {
    /// Create a deserializer for `u64` accepting only values within the bounds.
    pub const fn new(min: Bound<u64>, max: Bound<u64>) -> Self {
        Self { range: (min, max) }
    }
}

impl Deserializer<u64> for U64VarIntDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], u64, E> {
        context("Failed u64 deserialization", |input: &'a [u8]| {
            let (rest, value) = unsigned_varint::nom::u64(input).map_err(|_| {
                nom::Err::Error(ParseError::from_error_kind(
                    input,
                    nom::error::ErrorKind::Fail,
                ))
            })?;
            if !self.range.contains(&value) {
                return Err(nom::Err::Error(ParseError::from_error_kind(
                    input,
                    nom::error::ErrorKind::Fail,
                )));
            }
            Ok((rest, value))
        })(buffer)
    }
}

/// Serializer for `u32` in varint form.
#[derive(Clone, Default)]
pub struct U32VarIntSerializer;

impl U32VarIntSerializer {
    /// Create a serializer for `u32` in varint form.
    pub const fn new() -> Self {
        Self
    }
}

impl Serializer<u32> for U32VarIntSerializer {
    fn serialize(&self, value: &u32, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        buffer.extend_from_slice(unsigned_varint::encode::u32(
            *value,
            &mut unsigned_varint::encode::u32_buffer(),
        ));
        Ok(())
    }
}

/// Deserializer for `u32` in varint form, bounded to a configured range.
#[derive(Clone)]
pub struct U32VarIntDeserializer {
    range: (Bound<u32>, Bound<u32>),
}

impl U32VarIntDeserializer {
    /// Create a deserializer for `u32` accepting only values within the bounds.
    pub const fn new(min: Bound<u32>, max: Bound<u32>) -> Self {
        Self { range: (min, max) }
    }
}

impl Deserializer<u32> for U32VarIntDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], u32, E> {
        context("Failed u32 deserialization", |input: &'a [u8]| {
            let (rest, value) = unsigned_varint::nom::u32(input).map_err(|_| {
                nom::Err::Error(ParseError::from_error_kind(
                    input,
                    nom::error::ErrorKind::Fail,
                ))
            })?;
            if !self.range.contains(&value) {
                return Err(nom::Err::Error(ParseError::from_error_kind(
                    input,
                    nom::error::ErrorKind::Fail,
                )));
            }
            Ok((rest, value))
        })(buffer)
    }
}

/// Serializer for `Option<T>` given a serializer for `T`.
#[derive(Clone)]
pub struct OptionSerializer<T, ST>
where
    ST: Serializer<T>,
{
    data_serializer: ST,
    phantom_t: std::marker::PhantomData<T>,
}

impl<T, ST> OptionSerializer<T, ST>
where
    ST: Serializer<T>,
{
    /// Wrap `data_serializer` into an option serializer.
    pub fn new(data_serializer: ST) -> Self {
        OptionSerializer {
            data_serializer,
            phantom_t: std::marker::PhantomData,
        }
    }
}

impl<T, ST> Serializer<Option<T>> for OptionSerializer<T, ST>
where
    ST: Serializer<T>,
{
    fn serialize(&self, opt_value: &Option<T>, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        if let Some(value) = opt_value {
            buffer.push(b'1');
            self.data_serializer.serialize(value, buffer)?;
        } else {
            buffer.push(b'0');
        }
        Ok(())
    }
}

/// Deserializer for `Option<T>` given a deserializer for `T`.
#[derive(Clone)]
pub struct OptionDeserializer<T, DT>
where
    T: Clone,
    DT: Deserializer<T>,
{
    data_deserializer: DT,
    phantom_t: std::marker::PhantomData<T>,
}

impl<T, DT> OptionDeserializer<T, DT>
where
    T: Clone,
    DT: Deserializer<T>,
{
    /// Wrap `data_deserializer` into an option deserializer.
    pub fn new(data_deserializer: DT) -> Self {
        OptionDeserializer {
            data_deserializer,
            phantom_t: std::marker::PhantomData,
        }
    }
}

impl<T, DT> Deserializer<Option<T>> for OptionDeserializer<T, DT>
where
    T: Clone,
    DT: Deserializer<T>,
{
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], Option<T>, E> {
        context(
            "Option<_> deserializer failed",
            alt((
                context("None", value(None, tag(b"0"))),
                context(
                    "Some(_)",
                    preceded(tag(b"1"), |input| {
                        self.data_deserializer
                            .deserialize(input)
                            .map(|(rest, data)| (rest, Some(data)))
                    }),
                ),
            )),
        )
        .parse(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u64_varint_round_trip() {
        let serializer = U64VarIntSerializer::new();
        let deserializer = U64VarIntDeserializer::new(Bound::Included(0), Bound::Included(u64::MAX));
        let mut buffer = Vec::new();
        serializer.serialize(&300_000u64, &mut buffer).unwrap();
        let (rest, value) = deserializer
            .deserialize::<DeserializeError>(&buffer)
            .unwrap();
        assert!(rest.is_empty());
        assert_eq!(value, 300_000);
    }

    #[test]
    fn test_u64_varint_out_of_range() {
        let serializer = U64VarIntSerializer::new();
        let deserializer = U64VarIntDeserializer::new(Bound::Included(0), Bound::Included(100));
        let mut buffer = Vec::new();
        serializer.serialize(&101u64, &mut buffer).unwrap();
        assert!(deserializer
            .deserialize::<DeserializeError>(&buffer)
            .is_err());
    }

    #[test]
    fn test_option_round_trip() {
        let serializer = OptionSerializer::new(U64VarIntSerializer::new());
        let deserializer = OptionDeserializer::new(U64VarIntDeserializer::new(
            Bound::Included(0),
            Bound::Included(u64::MAX),
        ));
        for case in [Some(42u64), None] {
            let mut buffer = Vec::new();
            serializer.serialize(&case, &mut buffer).unwrap();
            let (rest, value) = deserializer
                .deserialize::<DeserializeError>(&buffer)
                .unwrap();
            assert!(rest.is_empty());
            assert_eq!(value, case);
        }
    }
}
