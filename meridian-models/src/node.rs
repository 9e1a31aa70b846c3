// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crate::error::ModelsError;
use crate::prehash::PreHashed;
use meridian_hash::Hash;
use serde_with::{DeserializeFromStr, SerializeDisplay};
use std::str::FromStr;

/// identity of a peer node in the network
#[derive(
    Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, SerializeDisplay, DeserializeFromStr,
)]
pub struct NodeId(pub Hash);

impl PreHashed for NodeId {}

const NODEID_PREFIX: char = 'N';

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}{}", NODEID_PREFIX, self.0.to_bs58_check())
    }
}

impl std::fmt::Debug for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

impl FromStr for NodeId {
    type Err = ModelsError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match chars.next() {
            Some(prefix) if prefix == NODEID_PREFIX => {
                let data = chars.collect::<String>();
                Ok(NodeId(
                    Hash::from_bs58_check(&data).map_err(|_| ModelsError::NodeIdParseError)?,
                ))
            }
            _ => Err(ModelsError::NodeIdParseError),
        }
    }
}
