// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! Node-wide default constants.

/// Default capacity of inter-module command channels
pub const CHANNEL_SIZE: usize = 1024;

/// Maximum number of transactions accepted in one collection
pub const MAX_TRANSACTIONS_PER_COLLECTION: u64 = 1_000;

/// Maximum serialized size of one transaction payload, in bytes
pub const MAX_TRANSACTION_PAYLOAD_SIZE: u64 = 512 * 1024;

/// Maximum number of guaranteed collections referenced by one block
pub const MAX_GUARANTEES_PER_BLOCK: u64 = 500;

/// Maximum number of signer indices carried by one collection guarantee
pub const MAX_GUARANTEE_SIGNERS: u64 = 4_096;
