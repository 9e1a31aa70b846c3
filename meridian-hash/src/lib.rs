// Copyright (c) 2022 MASSA LABS <info@massa.net>
//! Content hashing for meridian: every identifier in the node is a 32-byte
//! Blake3 digest of the entity it names.

mod error;
mod hash;
mod settings;

pub use error::MeridianHashError;
pub use hash::{Hash, HashDeserializer, HashSerializer};
pub use settings::HASH_SIZE_BYTES;
