// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! Key layout of the execution state keyspace.

use meridian_models::block_id::BlockId;

/// prefix of per-block state commitments
pub const COMMITMENT_PREFIX: &[u8] = b"commitment/";
/// prefix of per-block result metadata
pub const RESULT_PREFIX: &[u8] = b"result/";
/// singleton key of the highest executed block
pub const HIGHEST_EXECUTED_KEY: &[u8] = b"highest_executed";
/// singleton key of the persisted stop parameters
pub const STOP_PARAMETERS_KEY: &[u8] = b"stop/current";

/// key of the state commitment of `block_id`
pub fn commitment_key(block_id: &BlockId) -> Vec<u8> {
    let mut key = Vec::with_capacity(COMMITMENT_PREFIX.len() + 32);
    key.extend_from_slice(COMMITMENT_PREFIX);
    key.extend_from_slice(block_id.to_bytes());
    key
}

/// key of the result metadata of `block_id`
pub fn result_key(block_id: &BlockId) -> Vec<u8> {
    let mut key = Vec::with_capacity(RESULT_PREFIX.len() + 32);
    key.extend_from_slice(RESULT_PREFIX);
    key.extend_from_slice(block_id.to_bytes());
    key
}
